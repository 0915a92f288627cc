use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use rust_adauth::{AuthError, AuthOutcome, Authenticator, Config, Credentials, DirectoryAuthenticator};
use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const PASSWORD_ENV: &str = "ADAUTH_PASSWORD";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.yml");

    match matches.subcommand() {
        Some(("generate-config", sub)) => {
            let path = sub
                .get_one::<String>("file")
                .ok_or_else(|| anyhow!("missing output file"))?;
            generate_default_config(path)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("check-config", _)) => {
            let config = load_config(config_path)?;
            let _guard = setup_logging(&config, &matches)?;
            info!("Configuration {} is valid", config_path);
            println!("Configuration {} is valid", config_path);
            Ok(ExitCode::SUCCESS)
        }
        Some(("authenticate", sub)) => {
            let config = load_config(config_path)?;
            let _guard = setup_logging(&config, &matches)?;
            authenticate(&config, sub).await
        }
        _ => Err(anyhow!("no command given, see --help")),
    }
}

fn cli() -> Command {
    Command::new("rust-adauth")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Authenticate users against Active Directory and print their directory record")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.yml")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::Count)
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress all output except errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose")
                .global(true),
        )
        .subcommand(
            Command::new("generate-config")
                .about("Write a default configuration file")
                .arg(Arg::new("file").value_name("FILE").required(true)),
        )
        .subcommand(Command::new("check-config").about("Load and validate the configuration"))
        .subcommand(
            Command::new("authenticate")
                .about("Authenticate a user and print the normalized record as YAML")
                .arg(
                    Arg::new("username")
                        .short('u')
                        .long("username")
                        .value_name("USER")
                        .required_unless_present("basic"),
                )
                .arg(
                    Arg::new("password-stdin")
                        .long("password-stdin")
                        .help(format!("Read the password from stdin instead of ${}", PASSWORD_ENV))
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("basic")
                        .long("basic")
                        .value_name("HEADER")
                        .help("Take the credentials from an HTTP Basic authorization value")
                        .conflicts_with_all(["username", "password-stdin"]),
                ),
        )
}

async fn authenticate(config: &Config, matches: &ArgMatches) -> Result<ExitCode> {
    let credentials = match read_credentials(matches) {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::from(1));
        }
    };

    let authenticator = DirectoryAuthenticator::from_config(config)?;

    match authenticator.authenticate(&credentials).await {
        Ok(AuthOutcome::Authenticated(user)) => {
            print!("{}", serde_yaml::to_string(&user)?);
            Ok(ExitCode::SUCCESS)
        }
        Ok(AuthOutcome::Rejected) => {
            eprintln!("Authentication failed for {}", credentials.username());
            Ok(ExitCode::from(1))
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            Ok(exit_code(&e))
        }
    }
}

fn exit_code(e: &AuthError) -> ExitCode {
    match e {
        AuthError::Validation(_) => ExitCode::from(1),
        AuthError::Transport(_) => ExitCode::from(2),
        AuthError::DirectoryInconsistency { .. } => ExitCode::from(3),
    }
}

fn read_credentials(matches: &ArgMatches) -> Result<Credentials, AuthError> {
    if let Some(header) = matches.get_one::<String>("basic") {
        return Credentials::from_basic_auth(header);
    }

    let username = matches
        .get_one::<String>("username")
        .cloned()
        .unwrap_or_default();

    let password = if matches.get_flag("password-stdin") {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| AuthError::Validation(format!("failed to read password: {}", e)))?;
        line.trim_end_matches(['\r', '\n']).to_string()
    } else {
        std::env::var(PASSWORD_ENV).unwrap_or_default()
    };

    Ok(Credentials::new(username, password))
}

fn load_config(path: &str) -> Result<Config> {
    Config::load_from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path))
}

fn generate_default_config(path: &str) -> Result<()> {
    let config = Config::default();
    config.save_to_file(path)?;

    println!("Generated default configuration file: {}", path);
    println!("Edit this file to point at your directory service.");

    Ok(())
}

fn setup_logging(config: &Config, matches: &ArgMatches) -> Result<Option<WorkerGuard>> {
    let log_level = if matches.get_flag("quiet") {
        Level::ERROR
    } else {
        match matches.get_count("verbose") {
            0 => match config.logging.level.as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "warn" => Level::WARN,
                "error" => Level::ERROR,
                _ => Level::INFO,
            },
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(log_level).into()));

    // stdout carries the user record, so console logs go to stderr
    let console = config.logging.console.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let (file, guard) = match &config.logging.file {
        Some(path) => {
            let path = Path::new(path);
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(guard)
}

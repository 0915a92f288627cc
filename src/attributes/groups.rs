const COMMON_NAME_PREFIX: &str = "CN=";

/// Turns group DNs into friendly group names.
///
/// Each DN contributes the value of its first `CN=` component. DNs without
/// one are skipped. Order and duplicates are kept.
pub fn extract_groups<S: AsRef<str>>(memberships: &[S]) -> Vec<String> {
    memberships
        .iter()
        .filter_map(|dn| common_name(dn.as_ref()))
        .map(str::to_string)
        .collect()
}

fn common_name(dn: &str) -> Option<&str> {
    dn.split(',')
        .find_map(|part| part.strip_prefix(COMMON_NAME_PREFIX))
}

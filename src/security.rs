use subtle::ConstantTimeEq;

/// Constant-time string comparison to prevent timing attacks
/// Use this for comparing API keys and other sensitive values
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Check a presented API key against the configured one.
///
/// With no key configured every request is allowed.
pub fn api_key_matches(expected: Option<&str>, presented: Option<&str>) -> bool {
    match (expected, presented) {
        (None, _) => true,
        (Some(expected), Some(presented)) => constant_time_compare(expected, presented),
        (Some(_), None) => false,
    }
}

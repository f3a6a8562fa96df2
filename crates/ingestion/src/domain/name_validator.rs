/// Longest database or collection name accepted from a message
pub const MAX_NAME_LEN: usize = 64;

/// Returns true iff `name` is 1 to 64 characters drawn from `[A-Za-z0-9_-]`.
///
/// Used on routing fields supplied by producers, so a message cannot point
/// writes at an arbitrary or injection-bearing storage location.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

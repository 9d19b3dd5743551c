//! Pluralization helper for log messages.

/// Return `"s"` when `count != 1`.
#[inline]
pub fn s(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralizes() {
        assert_eq!(s(0), "s");
        assert_eq!(s(1), "");
        assert_eq!(s(2), "s");
    }
}

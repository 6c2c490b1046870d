/// Replaces every character that is not printable ASCII with `.`. Newlines
/// and tabs are kept.
pub fn sanitize_ascii(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\t' => c,
            ' '..='~' => c,
            _ => '.',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_ascii() {
        assert_eq!(sanitize_ascii("plain text"), "plain text");
        assert_eq!(sanitize_ascii("a\u{0}b\u{7f}c"), "a.b.c");
        assert_eq!(sanitize_ascii("caf\u{e9}"), "caf.");
        assert_eq!(sanitize_ascii("line\n\tnext"), "line\n\tnext");
        assert_eq!(sanitize_ascii("\u{fffd}\u{fffd}"), "..");
    }
}

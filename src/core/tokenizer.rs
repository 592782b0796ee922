use crate::constants::TOKEN_DELIMITERS;

/// Split a raw line on `; , \n : space \t` (and a stray `\r`), trimming and
/// dropping empty tokens while keeping their relative order.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split(TOKEN_DELIMITERS)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_delimiters() {
        assert_eq!(
            tokenize("alice@bayern.de, secret123, 2023-01-01"),
            vec!["alice@bayern.de", "secret123", "2023-01-01"]
        );
        assert_eq!(
            tokenize("bob@example.com:hunter2;10.0.0.1\t+4915112345678\r\n"),
            vec!["bob@example.com", "hunter2", "10.0.0.1", "+4915112345678"]
        );
    }

    #[test]
    fn test_empty_tokens_are_dropped() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" ;;,, : \t").is_empty());
        assert_eq!(tokenize(",,a,,b,,"), vec!["a", "b"]);
    }

    #[test]
    fn test_locators_are_cut_at_the_scheme_colon() {
        assert_eq!(tokenize("https://example.com"), vec!["https", "//example.com"]);
    }
}

pub const DEFAULT_FILE_STEM: &str = "comic";

/// File stem for an exported comic: lower-cased, with everything outside
/// `[a-z0-9]` replaced by `_`. Titles without a single letter or digit get
/// [`DEFAULT_FILE_STEM`].
pub fn safe_file_name(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if stem.chars().any(|c| c.is_ascii_alphanumeric()) {
        stem
    } else {
        DEFAULT_FILE_STEM.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_safe(name: &str) -> bool {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    #[test]
    fn test_title_with_punctuation() {
        let name = safe_file_name("Captain Comet: Rise!");
        assert_eq!(name, "captain_comet__rise_");
        assert!(is_safe(&name));
    }

    #[test]
    fn test_symbols_only_falls_back() {
        assert_eq!(safe_file_name("!!! ???"), DEFAULT_FILE_STEM);
        assert_eq!(safe_file_name(""), DEFAULT_FILE_STEM);
    }

    #[test]
    fn test_non_ascii_letters_are_replaced() {
        let name = safe_file_name("Café 2");
        assert_eq!(name, "caf__2");
        assert!(is_safe(&name));
    }
}

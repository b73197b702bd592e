//! Display-name sanitization for downloaded videos.
//!
//! Titles come from remote metadata and end up in file names offered for
//! download, so anything a common filesystem rejects is replaced.

/// Characters that are invalid in Windows filenames.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Longest basename kept, in characters.
const MAX_BASENAME_CHARS: usize = 120;

/// Turn a title into a basename (no extension).
///
/// Invalid and control characters become `_` (runs collapse to one), runs of
/// whitespace become one space, leading/trailing spaces, dots and underscores
/// are trimmed and the result is capped in length. Returns `fallback` if
/// nothing usable remains.
pub fn sanitize_basename(title: &str, fallback: &str) -> String {
    let mut result = String::with_capacity(title.len());
    let mut last = None;

    for c in title.chars() {
        let mapped = if c.is_control() || INVALID_CHARS.contains(&c) {
            '_'
        } else if c.is_whitespace() {
            ' '
        } else {
            c
        };
        if (mapped == '_' || mapped == ' ') && last == Some(mapped) {
            continue;
        }
        result.push(mapped);
        last = Some(mapped);
    }

    let capped: String = result.chars().take(MAX_BASENAME_CHARS).collect();
    let trimmed = capped.trim_matches(|c| c == ' ' || c == '.' || c == '_');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalize an extension to carry exactly one leading dot.
pub fn dotted_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.');
    if ext.is_empty() {
        String::new()
    } else {
        format!(".{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_title_unchanged() {
        assert_eq!(sanitize_basename("Clip", "video"), "Clip");
        assert_eq!(sanitize_basename("观看一只青蛙", "video"), "观看一只青蛙");
    }

    #[test]
    fn test_invalid_characters_replaced() {
        assert_eq!(sanitize_basename("What? Why: How", "video"), "What_ Why_ How");
        assert_eq!(sanitize_basename("a<>|b", "video"), "a_b");
        assert_eq!(sanitize_basename("AC/DC", "video"), "AC_DC");
    }

    #[test]
    fn test_whitespace_collapsed_and_trimmed() {
        assert_eq!(sanitize_basename("  hello \t\n world  ", "video"), "hello world");
        assert_eq!(sanitize_basename("...dots...", "video"), "dots");
    }

    #[test]
    fn test_fallback_when_empty() {
        assert_eq!(sanitize_basename("", "video"), "video");
        assert_eq!(sanitize_basename("???", "video"), "video");
    }

    #[test]
    fn test_length_is_capped() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_basename(&long, "video").chars().count(), MAX_BASENAME_CHARS);
    }

    #[test]
    fn test_dotted_extension() {
        assert_eq!(dotted_extension(".mp4"), ".mp4");
        assert_eq!(dotted_extension("webm"), ".webm");
        assert_eq!(dotted_extension(""), "");
    }
}

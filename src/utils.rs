//! Small text and filesystem helpers used across stages.
//!
//! - Hangul counting for the language-quality checks
//! - Log-friendly truncation that respects UTF-8 boundaries
//! - Safe local filenames for episode artifacts
//! - Output directory validation

use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Whether `c` is a precomposed Hangul syllable (`가`..=`힣`).
pub fn is_hangul(c: char) -> bool {
    ('가'..='힣').contains(&c)
}

/// Count of Hangul syllables in `s`.
pub fn hangul_count(s: &str) -> usize {
    s.chars().filter(|&c| is_hangul(c)).count()
}

/// Ratio of Hangul syllables to non-whitespace characters.
///
/// Returns `0.0` for strings with no non-whitespace characters.
pub fn hangul_ratio(s: &str) -> f64 {
    let visible = s.chars().filter(|c| !c.is_whitespace()).count();
    if visible == 0 {
        return 0.0;
    }
    hangul_count(s) as f64 / visible as f64
}

/// Truncate a string for logging purposes.
///
/// Keeps at most `max` bytes, backing off to the previous character
/// boundary, and appends `"…(+N bytes)"`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// First `n` characters of `s`.
pub fn prefix_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Build a filesystem-safe stem from an article title.
///
/// Keeps alphanumerics (any script), spaces, `-` and `_`, trims, and caps
/// the result at 30 characters.
pub fn safe_file_stem(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    prefix_chars(kept.trim(), 30).trim_end().to_string()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let scratch_path = format!("{}/..__write_check__", path.trim_end_matches('/'));
    match stdfs::File::create(&scratch_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&scratch_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        // Each syllable is three bytes; cutting at 4 must back off to 3.
        let result = truncate_for_log("가나다", 4);
        assert_eq!(result, "가…(+6 bytes)");
    }

    #[test]
    fn test_hangul_ratio() {
        assert_eq!(hangul_ratio("   "), 0.0);
        assert_eq!(hangul_ratio("가나 다라"), 1.0);
        assert!((hangul_ratio("가 a") - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_safe_file_stem() {
        assert_eq!(safe_file_stem("[속보] AI, 의료 진단 혁신!"), "속보 AI 의료 진단 혁신");
        assert_eq!(safe_file_stem(&"가".repeat(40)).chars().count(), 30);
    }

    #[test]
    fn test_prefix_chars() {
        assert_eq!(prefix_chars("안녕하세요", 2), "안녕");
        assert_eq!(prefix_chars("ab", 5), "ab");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("MP3/nested");
        let path = nested.to_str().unwrap().to_string();
        ensure_writable_dir(&path).await.unwrap();
        assert!(nested.is_dir());
    }
}

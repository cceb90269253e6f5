//! Content budgeting, output cleanup and script validation.

use super::speaker::is_marked;
use crate::utils::hangul_ratio;
use std::fmt;

/// Characters the speech backend reads aloud literally.
pub const FORBIDDEN_CHARS: &[char] = &['*', '#', '^', '~', '`'];
pub const MIN_SCRIPT_CHARS: usize = 100;
pub const MIN_NAMED_LINES: usize = 6;
pub const MIN_SCRIPT_HANGUL_RATIO: f64 = 0.3;

const SENTENCE_ENDERS: &[&str] = &["다.", "요.", "습니다.", "까요.", "세요."];
/// A sentence-boundary cut must keep at least this share of the budget.
const MIN_KEPT_SHARE: f64 = 0.7;

/// Why a script was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptIssue {
    TooShort { chars: usize },
    TooFewLines { count: usize },
    ForbiddenChar(char),
    LowHangulRatio(f64),
}

impl fmt::Display for ScriptIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptIssue::TooShort { chars } => {
                write!(f, "script too short ({chars} chars, at least {MIN_SCRIPT_CHARS} required)")
            }
            ScriptIssue::TooFewLines { count } => write!(
                f,
                "too few speaker lines ({count}, at least {MIN_NAMED_LINES} required)"
            ),
            ScriptIssue::ForbiddenChar(c) => write!(f, "forbidden character found: {c}"),
            ScriptIssue::LowHangulRatio(r) => write!(f, "hangul ratio {r:.2} below {MIN_SCRIPT_HANGUL_RATIO}"),
        }
    }
}

/// Cut `content` to at most `max_chars` characters.
///
/// Prefers ending on the last sentence ender inside the budget when that
/// keeps more than 70% of it; otherwise cuts at the last space and appends
/// `...`.
pub fn truncate_content_smart(content: &str, max_chars: usize) -> String {
    let Some((cut, _)) = content.char_indices().nth(max_chars) else {
        return content.to_string();
    };
    let truncated = &content[..cut];

    let sentence_end = SENTENCE_ENDERS
        .iter()
        .filter_map(|e| truncated.rfind(e).map(|pos| pos + e.len()))
        .max();
    if let Some(end) = sentence_end {
        let kept = truncated[..end].chars().count();
        if kept as f64 > max_chars as f64 * MIN_KEPT_SHARE {
            return truncated[..end].to_string();
        }
    }

    match truncated.rfind(' ') {
        Some(space) if space > 0 => format!("{}...", &truncated[..space]),
        _ => format!("{truncated}..."),
    }
}

/// Strip forbidden characters and keep only speaker-marked lines.
///
/// When fewer than two marked lines survive the output is probably not a
/// dialogue at all, and the character-stripped text is returned whole.
pub fn clean_script_output(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect();
    let kept: Vec<&str> = stripped
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && is_marked(l))
        .collect();
    if kept.len() < 2 {
        return stripped;
    }
    kept.join("\n")
}

/// Number of lines opening with a speaker marker.
pub fn named_line_count(script: &str) -> usize {
    script.lines().filter(|l| is_marked(l)).count()
}

/// Check a cleaned script. Checks run cheapest first and the first failure
/// is reported.
pub fn validate_script(script: &str) -> Result<(), ScriptIssue> {
    let chars = script.trim().chars().count();
    if chars < MIN_SCRIPT_CHARS {
        return Err(ScriptIssue::TooShort { chars });
    }
    let count = named_line_count(script);
    if count < MIN_NAMED_LINES {
        return Err(ScriptIssue::TooFewLines { count });
    }
    if let Some(c) = script.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(ScriptIssue::ForbiddenChar(c));
    }
    let ratio = hangul_ratio(script);
    if ratio < MIN_SCRIPT_HANGUL_RATIO {
        return Err(ScriptIssue::LowHangulRatio(ratio));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialogue(pairs: usize) -> String {
        (0..pairs)
            .flat_map(|i| {
                [
                    format!("상현: 오늘 {i}번째 소식은 인공지능 진단 기술에 관한 이야기예요."),
                    "지민: 정말 흥미롭네요. 조금 더 자세히 설명해 주실래요?".to_string(),
                ]
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_truncate_short_content_untouched() {
        assert_eq!(truncate_content_smart("짧은 글이다.", 100), "짧은 글이다.");
    }

    #[test]
    fn test_truncate_at_sentence_boundary() {
        let content = format!("{}나머지 내용은 잘린다", "가나다라마바사아자차카다. ");
        // the sentence ends at char 13, above 70% of an 18-char budget
        let out = truncate_content_smart(&content, 18);
        assert_eq!(out, "가나다라마바사아자차카다.");
    }

    #[test]
    fn test_truncate_falls_back_to_word_boundary() {
        let content = "문장. 끝이 없는 아주 긴 문장이 계속 이어지고 또 이어진다";
        let out = truncate_content_smart(content, 20);
        assert!(out.ends_with("..."));
        assert!(!out.contains("이어진다"));
        assert!(out.chars().count() <= 23);
    }

    #[test]
    fn test_clean_keeps_only_marked_lines() {
        let raw = "## 대본\n**상현**: 안녕하세요~\n(웃음)\n지민: 반가워요^^\n\n끝";
        assert_eq!(clean_script_output(raw), "상현: 안녕하세요\n지민: 반가워요");
    }

    #[test]
    fn test_clean_returns_unfiltered_when_not_a_dialogue() {
        let raw = "그냥 요약문입니다.\n상현: 한 줄";
        assert_eq!(clean_script_output(raw), raw);
    }

    #[test]
    fn test_validate_accepts_dialogue() {
        assert_eq!(validate_script(&dialogue(3)), Ok(()));
    }

    #[test]
    fn test_validate_too_short() {
        assert_eq!(
            validate_script("상현: 네"),
            Err(ScriptIssue::TooShort { chars: 5 })
        );
    }

    #[test]
    fn test_validate_names_exact_line_count() {
        let script = format!("{}\n상현: 마지막 한마디입니다.", dialogue(2));
        let err = validate_script(&script).unwrap_err();
        assert_eq!(err, ScriptIssue::TooFewLines { count: 5 });
        assert!(err.to_string().contains("(5,"));
    }

    #[test]
    fn test_validate_forbidden_char() {
        let script = format!("{}\n지민: 좋아요~", dialogue(3));
        assert_eq!(validate_script(&script), Err(ScriptIssue::ForbiddenChar('~')));
    }

    #[test]
    fn test_validate_language_ratio() {
        let script = (0..6)
            .map(|i| format!("A: this is english line number {i} of the script"))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(matches!(validate_script(&script), Err(ScriptIssue::LowHangulRatio(_))));
    }
}

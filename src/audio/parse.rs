//! Script text to ordered dialogue turns.

use crate::models::{DialogueTurn, Script, Speaker};
use crate::script::speaker::recognize;

/// Section labels that models sometimes emit as standalone lines.
const SECTION_LABELS: &[&str] = &["오프닝 멘트", "클로징 멘트", "본격적인 대화", "본멘트"];

fn is_skipped(line: &str) -> bool {
    line.starts_with(['#', '[', '('])
        || SECTION_LABELS.iter().any(|label| line.contains(label))
}

/// Remove markdown emphasis the speech backend would read aloud.
pub fn clean_utterance(text: &str) -> String {
    text.replace("###", "").replace("**", "").replace('*', "").trim().to_string()
}

/// Parse a script into turns.
///
/// The current speaker starts as host A. A marked line switches speaker
/// and loses its marker; an unmarked line continues the current speaker.
/// Headers, bracketed stage directions and section labels are dropped.
/// Ordinals count emitted turns from zero.
pub fn parse_dialogue(script: &str) -> Script {
    let mut current = Speaker::HostA;
    let mut turns = Vec::new();

    for line in script.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_skipped(line) {
            continue;
        }
        let (marker, rest) = recognize(line);
        if let Some(speaker) = marker {
            current = speaker;
        }
        let text = clean_utterance(rest);
        if text.is_empty() {
            continue;
        }
        turns.push(DialogueTurn {
            speaker: current,
            text,
            ordinal: turns.len(),
        });
    }
    Script { turns }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(script: &Script) -> Vec<(usize, Speaker, &str)> {
        script
            .turns
            .iter()
            .map(|t| (t.ordinal, t.speaker, t.text.as_str()))
            .collect()
    }

    #[test]
    fn test_continuation_inherits_speaker() {
        let script = parse_dialogue("상현: a\nb\n지민: c");
        assert_eq!(
            summary(&script),
            [(0, Speaker::HostA, "a"), (1, Speaker::HostA, "b"), (2, Speaker::HostB, "c")]
        );
    }

    #[test]
    fn test_unmarked_first_line_defaults_to_host_a() {
        let script = parse_dialogue("안녕하세요\nB: 네");
        assert_eq!(summary(&script), [(0, Speaker::HostA, "안녕하세요"), (1, Speaker::HostB, "네")]);
    }

    #[test]
    fn test_skips_headers_directions_and_labels() {
        let raw = "# 팟캐스트 대본\n[배경음악]\n(웃음)\n오프닝 멘트\n\n**상현**: ### 본론입니다\n본격적인 대화 시작\n지민: *정말요*";
        let script = parse_dialogue(raw);
        assert_eq!(
            summary(&script),
            [(0, Speaker::HostA, "본론입니다"), (1, Speaker::HostB, "정말요")]
        );
    }

    #[test]
    fn test_marker_only_line_switches_speaker_without_turn() {
        let script = parse_dialogue("지민:\n이어지는 말");
        assert_eq!(summary(&script), [(0, Speaker::HostB, "이어지는 말")]);
    }

    #[test]
    fn test_empty_script() {
        assert!(parse_dialogue("\n\n").turns.is_empty());
    }
}

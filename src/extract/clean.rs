//! Document pruning, text cleaning and the content-quality validator.

use crate::utils::{hangul_ratio, prefix_chars};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Minimum cleaned length, in characters.
pub const MIN_CONTENT_CHARS: usize = 200;
/// Minimum share of Hangul among non-whitespace characters.
pub const MIN_HANGUL_RATIO: f64 = 0.3;

static NOISE_TAGS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "script, style, header, footer, nav, iframe, noscript, aside, figure, figcaption",
    )
    .unwrap()
});
static ANY_ELEMENT: Lazy<Selector> = Lazy::new(|| Selector::parse("*").unwrap());
static CONTAINERS: Lazy<Selector> = Lazy::new(|| Selector::parse("div, section, aside, ul").unwrap());

/// Class/id segments that must match exactly (too short for substring tests).
const NOISE_SEGMENTS: &[&str] = &["ad", "ads", "sns"];
/// Class/id fragments matched anywhere in the name.
const NOISE_FRAGMENTS: &[&str] = &[
    "advert",
    "banner",
    "sidebar",
    "related",
    "recommend",
    "comment",
    "share",
    "copyright",
    "journalist",
    "byline",
    "photo_org",
    "sponsor",
    "modal",
    "popup",
];
/// Leading-text markers of related/popular article blocks.
const RELATED_MARKERS: &[&str] = &[
    "관련기사",
    "함께 보면",
    "이전 기사",
    "다음 기사",
    "추천 기사",
    "인기기사",
    "많이 본",
];

fn is_noise_name(name: &str) -> bool {
    let name = name.to_lowercase();
    if NOISE_FRAGMENTS.iter().any(|f| name.contains(f)) {
        return true;
    }
    name.split(['-', '_'])
        .any(|segment| NOISE_SEGMENTS.contains(&segment))
}

fn is_structural_root(el: &ElementRef<'_>) -> bool {
    matches!(el.value().name(), "html" | "body")
}

fn has_noise_attr(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    value.classes().any(is_noise_name) || value.id().is_some_and(is_noise_name)
}

fn detach_matching<F>(document: &mut Html, selector: &Selector, pred: F) -> usize
where
    F: Fn(&ElementRef<'_>) -> bool,
{
    let ids: Vec<_> = document
        .select(selector)
        .filter(|el| pred(el))
        .map(|el| el.id())
        .collect();
    let mut removed = 0;
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
            removed += 1;
        }
    }
    removed
}

/// Remove non-content nodes from `document` in place. Returns how many
/// subtrees were detached.
///
/// Runs three passes: noise tags, elements whose class or id names a
/// widget (ads, share buttons, bylines...), then containers whose leading
/// text announces a related-articles block. Each pass sees the tree as
/// pruned by the previous one.
pub fn strip_noise(document: &mut Html) -> usize {
    let mut removed = detach_matching(document, &NOISE_TAGS, |_| true);
    removed += detach_matching(document, &ANY_ELEMENT, |el| {
        !is_structural_root(el) && has_noise_attr(el)
    });
    removed += detach_matching(document, &CONTAINERS, |el| {
        let text: String = el.text().collect();
        let sample = prefix_chars(text.trim_start(), 100);
        RELATED_MARKERS.iter().any(|m| sample.contains(m))
    });
    removed
}

/// Text of `el`: each text node trimmed, empty ones dropped, joined by
/// newlines.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of `el` with text nodes trimmed and concatenated without separator.
pub fn inline_text(el: &ElementRef<'_>) -> String {
    el.text().map(str::trim).collect()
}

macro_rules! regexes {
    ($($pattern:expr),+ $(,)?) => {
        Lazy::new(|| vec![$(Regex::new($pattern).unwrap()),+])
    };
}

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+").unwrap());

static BYLINES: Lazy<Vec<Regex>> = regexes![
    r".*?기자\s*=\s*",
    r".*?특파원\s*=\s*",
    r"\[[^\]\n]*?기자\]",
    r"기자\s+\w+",
];

static COPYRIGHT: Lazy<Vec<Regex>> = regexes![
    r"(?i)Copyright\s*(?:©|ⓒ|\(c\)).*",
    r"저작권자.*",
    r"무단\s*전재.*",
    r"배포\s*금지.*",
    r"[ⓒ©].*",
];

static SHARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:카카오톡|페이스북|트위터|공유하기).*").unwrap());

static PORTAL_NOISE: Lazy<Vec<Regex>> = regexes![
    r"(?s)기사 섹션 분류 안내.*?있습니다\.",
    r"(?s)이 기사는 언론사에서.*?분류했습니다\.",
    r"섹션으로 분류했습니다",
    r"[^\n]*바로가기\n?",
    r"(?s)기사의 섹션 정보는.*",
    r"(?s)언론사는 개별 기사를.*",
    r"\[[^\]\n]*?뉴스\]",
    r"【[^】]*】",
    r"[▶◆■☞▷][^\n]*\n?",
    r"사진=[^\n]*\n?",
    r"\(사진[^)]*\)",
    r"영상=[^\n]*\n?",
];

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strip reporter signatures, copyright and syndication notices, share
/// prompts and portal boilerplate; collapse blank-line runs.
pub fn clean_article_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut out = EMAIL.replace_all(text, "").into_owned();
    for re in BYLINES.iter().chain(COPYRIGHT.iter()) {
        out = re.replace_all(&out, "").into_owned();
    }
    out = SHARE.replace_all(&out, "").into_owned();
    for re in PORTAL_NOISE.iter() {
        out = re.replace_all(&out, "").into_owned();
    }
    BLANK_RUNS.replace_all(&out, "\n\n").trim().to_string()
}

/// Accept `content` when it is long enough and mostly Hangul.
pub fn validate_content(content: &str) -> bool {
    if content.chars().count() < MIN_CONTENT_CHARS {
        return false;
    }
    hangul_ratio(content) >= MIN_HANGUL_RATIO
}

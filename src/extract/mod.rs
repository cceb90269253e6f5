//! Multi-strategy article text extraction.
//!
//! Publisher markup varies wildly and changes without notice, so extraction
//! is an ordered cascade. Each tier proposes candidate text, the candidate is
//! cleaned, and the first one that passes [`clean::validate_content`] wins:
//!
//! | Tier | Strategy | Source |
//! |------|----------|--------|
//! | 1 | Site selectors | [`sites::SITES`], matched on the final URL's host |
//! | 2 | Generic selectors | [`sites::GENERIC`] |
//! | 3 | Paragraph heuristic | sentence-like `<p>` elements |
//! | 4 | Largest block | best-scoring block element |
//! | 5 | Metadata | `og:description` and friends, low confidence |
//!
//! Non-content nodes are stripped once, before tier 1.

pub mod clean;
pub mod sites;

use crate::error::ExtractionFailure;
use crate::models::{ExtractionResult, Strategy};
use crate::utils::hangul_count;
use clean::{clean_article_text, element_text, inline_text, strip_noise, validate_content};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Prefix marking metadata-only text so downstream stages can tell it apart.
pub const LOW_CONFIDENCE_PREFIX: &str = "[요약] ";

/// Paragraphs shorter than this (in characters) are ignored by tier 3.
const MIN_PARAGRAPH_CHARS: usize = 50;
/// Blocks shorter than this are not scored by tier 4.
const MIN_BLOCK_CHARS: usize = 200;
/// Metadata descriptions shorter than this are not worth a fallback.
const MIN_META_CHARS: usize = 50;

const SENTENCE_ENDINGS: &[&str] = &["다.", "요.", "죠."];

static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static BLOCKS: Lazy<Selector> = Lazy::new(|| Selector::parse("div, section, main").unwrap());
static META_DESCRIPTIONS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        r#"meta[property="og:description"]"#,
        r#"meta[name="description"]"#,
        r#"meta[name="twitter:description"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

/// Extract article text from `html`, fetched from `final_url`.
#[instrument(level = "info", skip(html), fields(bytes = html.len()))]
pub fn extract(final_url: &str, html: &str) -> ExtractionResult {
    let mut document = Html::parse_document(html);
    let removed = strip_noise(&mut document);
    debug!(removed, "Stripped non-content nodes");

    let host = Url::parse(final_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase));

    let found = host
        .as_deref()
        .and_then(|h| site_selectors(&document, h))
        .or_else(|| generic_selectors(&document))
        .or_else(|| paragraphs(&document))
        .or_else(|| largest_block(&document));

    if let Some((text, strategy)) = found {
        info!(%strategy, chars = text.chars().count(), "Extracted article text");
        return ExtractionResult::Ok { text, strategy };
    }

    if let Some(text) = meta_description(&document) {
        warn!("Body extraction failed; falling back to metadata description");
        return ExtractionResult::LowConfidence {
            text: format!("{LOW_CONFIDENCE_PREFIX}{text}"),
        };
    }

    warn!("All extraction strategies failed");
    ExtractionResult::Failed(ExtractionFailure {
        reason: "no strategy matched".to_string(),
    })
}

/// Clean `raw` and return it if it passes validation.
fn accept(raw: &str) -> Option<String> {
    let text = clean_article_text(raw);
    validate_content(&text).then_some(text)
}

fn site_selectors(document: &Html, host: &str) -> Option<(String, Strategy)> {
    let site = sites::site_for_host(host)?;
    for named in &site.selectors {
        let Some(el) = document.select(&named.selector).next() else {
            continue;
        };
        match accept(&element_text(&el)) {
            Some(text) => {
                return Some((
                    text,
                    Strategy::SiteSelector {
                        domain: site.domain,
                        selector: named.source,
                    },
                ));
            }
            None => debug!(domain = site.domain, selector = named.source, "Site selector rejected"),
        }
    }
    None
}

fn generic_selectors(document: &Html) -> Option<(String, Strategy)> {
    for named in sites::GENERIC.iter() {
        let Some(el) = document.select(&named.selector).next() else {
            continue;
        };
        match accept(&element_text(&el)) {
            Some(text) => return Some((text, Strategy::GenericSelector(named.source))),
            None => debug!(selector = named.source, "Generic selector rejected"),
        }
    }
    None
}

fn is_sentence_like(text: &str) -> bool {
    text.chars().count() > MIN_PARAGRAPH_CHARS
        && SENTENCE_ENDINGS.iter().any(|e| text.contains(e))
}

fn paragraphs(document: &Html) -> Option<(String, Strategy)> {
    let kept: Vec<String> = document
        .select(&PARAGRAPHS)
        .map(|p| inline_text(&p))
        .filter(|t| is_sentence_like(t))
        .collect();
    if kept.is_empty() {
        return None;
    }
    let count = kept.len();
    match accept(&kept.join("\n")) {
        Some(text) => Some((text, Strategy::Paragraphs { count })),
        None => {
            debug!(count, "Paragraph heuristic rejected");
            None
        }
    }
}

/// Block score: `0.3 * length + 0.5 * hangul + 10 * sentence enders`.
///
/// Sentence enders are every `.` plus every `다.`, so declarative Korean
/// sentences weigh double.
pub fn block_score(text: &str) -> f64 {
    let length = text.chars().count() as f64;
    let enders = (text.matches('.').count() + text.matches("다.").count()) as f64;
    length * 0.3 + hangul_count(text) as f64 * 0.5 + enders * 10.0
}

fn largest_block(document: &Html) -> Option<(String, Strategy)> {
    let mut best: Option<(f64, String)> = None;
    for el in document.select(&BLOCKS) {
        let text = element_text(&el);
        if text.chars().count() <= MIN_BLOCK_CHARS {
            continue;
        }
        let score = block_score(&text);
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((score, text));
        }
    }
    let (score, text) = best?;
    match accept(&text) {
        Some(text) => {
            debug!(score, "Largest block accepted");
            Some((text, Strategy::LargestBlock))
        }
        None => {
            debug!(score, "Largest block rejected");
            None
        }
    }
}

fn meta_description(document: &Html) -> Option<String> {
    META_DESCRIPTIONS.iter().find_map(|sel| {
        let content = document.select(sel).next()?.value().attr("content")?.trim();
        (content.chars().count() > MIN_META_CHARS).then(|| content.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOISE: &[&str] = &["홍길동", "기자 =", "@", "Copyright", "무단 전재", "공유하기", "관련기사"];

    fn body(n: usize) -> String {
        "인공지능 기술이 의료 현장의 진단 정확도를 크게 높였다. ".repeat(n)
    }

    fn assert_no_noise(text: &str) {
        for noise in NOISE {
            assert!(!text.contains(noise), "noise {noise:?} leaked into {text:?}");
        }
    }

    fn expect_ok(result: ExtractionResult) -> (String, Strategy) {
        match result {
            ExtractionResult::Ok { text, strategy } => (text, strategy),
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[test]
    fn test_portal_page_uses_site_selector() {
        let html = format!(
            r#"<html><body>
            <div class="media_end_head_journalist">홍길동 기자</div>
            <div id="newsct_article"><div id="dic_area">
              (서울=연합뉴스) 홍길동 기자 = {}
              <br>hong@yna.co.kr
              <br>Copyright © 연합뉴스. 무단 전재 및 재배포 금지
            </div></div>
            <div class="share_area">카카오톡 공유하기</div>
            </body></html>"#,
            body(10)
        );
        let (text, strategy) = expect_ok(extract("https://n.news.naver.com/mnews/article/001/0014", &html));
        assert_eq!(strategy.tier(), "site-selector");
        assert_eq!(
            strategy,
            Strategy::SiteSelector {
                domain: "naver.com",
                selector: "#dic_area"
            }
        );
        assert!(text.starts_with("인공지능"));
        assert_no_noise(&text);
    }

    #[test]
    fn test_unknown_site_uses_generic_selector() {
        let html = format!(
            r#"<html><body><nav>홈 | 정치 | 경제</nav>
            <article><h1>제목</h1><p>{}</p></article>
            <div class="related_news">관련기사 더보기</div>
            </body></html>"#,
            body(10)
        );
        let (text, strategy) = expect_ok(extract("https://www.example-news.kr/view/1", &html));
        assert_eq!(strategy, Strategy::GenericSelector("article"));
        assert!(!text.contains("홈 | 정치"));
        assert_no_noise(&text);
    }

    #[test]
    fn test_known_site_falls_through_to_generic_when_selectors_miss() {
        let html = format!(r#"<html><body><div class="article-content">{}</div></body></html>"#, body(10));
        let (_, strategy) = expect_ok(extract("https://www.chosun.com/x", &html));
        assert_eq!(strategy, Strategy::GenericSelector(".article-content"));
    }

    #[test]
    fn test_paragraph_heuristic() {
        let para = "연구팀은 새로운 진단 시스템이 기존 방식보다 정확도가 높다고 밝혔다. 시범 운영은 내년부터 확대된다.";
        let html = format!(
            r#"<html><body><div class="wrap"><p>짧은 문단.</p><p>{para}</p><p>{para}</p><p>{para}</p><p>{para}</p></div></body></html>"#
        );
        let (text, strategy) = expect_ok(extract("https://blog.example.org/p/9", &html));
        assert_eq!(strategy, Strategy::Paragraphs { count: 4 });
        assert!(!text.contains("짧은 문단"));
    }

    #[test]
    fn test_largest_block_heuristic() {
        let html = format!(
            r#"<html><body>
            <div class="menu">메뉴 하나 둘 셋</div>
            <div class="txt">{}<br>{}</div>
            </body></html>"#,
            body(5),
            body(5)
        );
        let (text, strategy) = expect_ok(extract("https://example.org/a", &html));
        assert_eq!(strategy, Strategy::LargestBlock);
        assert!(!text.contains("메뉴"));
    }

    #[test]
    fn test_meta_fallback_is_low_confidence() {
        let html = r#"<html><head>
            <meta property="og:description" content="정부가 인공지능 산업 육성을 위한 대규모 투자 계획을 발표했다. 세부 내용은 다음 달 공개된다.">
            </head><body><div>짧은 본문</div></body></html>"#;
        match extract("https://example.org/b", html) {
            ExtractionResult::LowConfidence { text } => {
                assert!(text.starts_with(LOW_CONFIDENCE_PREFIX));
                assert!(text.contains("대규모 투자"));
            }
            other => panic!("expected LowConfidence, got {other:?}"),
        }
    }

    #[test]
    fn test_everything_fails() {
        let html = "<html><body><div>Hello</div></body></html>";
        assert_eq!(
            extract("https://example.org/c", html),
            ExtractionResult::Failed(ExtractionFailure {
                reason: "no strategy matched".to_string()
            })
        );
    }

    #[test]
    fn test_english_body_is_rejected_by_language_check() {
        let html = format!(
            "<html><body><article>{}</article></body></html>",
            "Artificial intelligence improves diagnosis accuracy. ".repeat(20)
        );
        assert!(matches!(
            extract("https://example.com/en", &html),
            ExtractionResult::Failed(_)
        ));
    }

    #[test]
    fn test_block_score_weights() {
        // 4 chars, 3 hangul, one '.' and one "다." -> 1.2 + 1.5 + 20
        assert!((block_score("가나다.") - 22.7).abs() < 1e-9);
    }
}

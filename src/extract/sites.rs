//! Selector tables for the first two extraction tiers.
//!
//! The site table is ordered: the news portal comes first because most
//! search results link to (or canonicalize onto) its article viewer, then
//! one entry per known publisher. Selectors inside an entry are ordered from
//! the current layout to older ones.

use once_cell::sync::Lazy;
use scraper::Selector;

const SITE_SELECTORS: &[(&str, &[&str])] = &[
    (
        "naver.com",
        &[
            "#dic_area",
            "#newsct_article",
            "#articeBody",
            "#articleBodyContents",
            ".newsct_article",
            "._article_body",
            "#content",
        ],
    ),
    ("chosun.com", &["#article-view-content-div", ".article-body", "#articleBody"]),
    ("joongang.co.kr", &["#article_body", ".article_body", "#article-content"]),
    ("donga.com", &["#article_body", ".article_body", ".article_txt"]),
    ("hani.co.kr", &[".article-body", ".article-text", "#article-body"]),
    ("khan.co.kr", &[".art_body", ".article_body", "#articleBody"]),
    ("hankyung.com", &["#articletxt", ".article-body", "#article-body-view"]),
    ("mk.co.kr", &["#article_body", ".art_txt", ".article_body"]),
    ("yna.co.kr", &[".article-txt", ".story-news", "#articleWrap"]),
    ("sbs.co.kr", &[".article_cont_area", ".text_area", "#news_content"]),
    ("kbs.co.kr", &[".detail-body", ".article-body", "#cont_newstext"]),
    ("mbc.co.kr", &[".news_txt", ".article_body", ".article-body"]),
    ("jtbc.co.kr", &[".article_content", ".article-content", "#article-body"]),
    ("ytn.co.kr", &[".paragraph", ".article-body", "#CmAdContent"]),
    ("newsis.com", &[".article_body", ".viewer", "#articleBody"]),
    ("news1.kr", &[".article", ".article_body", "#news-body"]),
    ("edaily.co.kr", &[".news_body", ".article_body", "#articleBody"]),
    ("mt.co.kr", &["#textBody", ".article-body", ".textBody"]),
    ("sedaily.com", &["#v-article-content", ".article_view", ".article_body"]),
    ("ohmynews.com", &[".article_body", ".at_contents", "#articleBody"]),
    ("pressian.com", &[".article_body", ".article-body", "#news_body"]),
];

const GENERIC_SELECTORS: &[&str] = &[
    "article",
    r#"[itemprop="articleBody"]"#,
    ".article-body",
    ".article_body",
    ".article-content",
    ".article_content",
    ".news-body",
    ".news_body",
    ".post-content",
    ".entry-content",
    "#article-body",
    "#article_body",
    "#articleBody",
    "#content-body",
    ".story-body",
    ".text-body",
];

/// A parsed selector that remembers its source text for logging.
pub struct NamedSelector {
    pub source: &'static str,
    pub selector: Selector,
}

/// Selectors for one publisher domain.
pub struct SiteEntry {
    pub domain: &'static str,
    pub selectors: Vec<NamedSelector>,
}

impl SiteEntry {
    /// Whether `host` is this domain or one of its subdomains.
    pub fn matches_host(&self, host: &str) -> bool {
        host == self.domain
            || host
                .strip_suffix(self.domain)
                .is_some_and(|rest| rest.ends_with('.'))
    }
}

fn parse_all(sources: &[&'static str]) -> Vec<NamedSelector> {
    sources
        .iter()
        .map(|&source| NamedSelector {
            source,
            selector: Selector::parse(source).unwrap(),
        })
        .collect()
}

pub static SITES: Lazy<Vec<SiteEntry>> = Lazy::new(|| {
    SITE_SELECTORS
        .iter()
        .map(|&(domain, selectors)| SiteEntry {
            domain,
            selectors: parse_all(selectors),
        })
        .collect()
});

pub static GENERIC: Lazy<Vec<NamedSelector>> = Lazy::new(|| parse_all(GENERIC_SELECTORS));

/// First site entry matching `host`.
pub fn site_for_host(host: &str) -> Option<&'static SiteEntry> {
    SITES.iter().find(|entry| entry.matches_host(host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_selectors_parse() {
        assert_eq!(SITES.len(), SITE_SELECTORS.len());
        assert_eq!(GENERIC.len(), GENERIC_SELECTORS.len());
    }

    #[test]
    fn test_site_for_host_matches_subdomains_only() {
        assert_eq!(site_for_host("n.news.naver.com").unwrap().domain, "naver.com");
        assert_eq!(site_for_host("www.mt.co.kr").unwrap().domain, "mt.co.kr");
        assert_eq!(site_for_host("mt.co.kr").unwrap().domain, "mt.co.kr");
        assert!(site_for_host("kmt.co.kr").is_none());
        assert!(site_for_host("example.com").is_none());
    }
}

//! News search result scraper.
//!
//! Fetches the portal's newest-first news search page for a query and turns
//! each result entry into a [`CandidateArticle`].
//!
//! # Markup
//!
//! Results live under `ul.list_news`. The portal reshuffles its class names
//! often, so headlines and press names are both located through ordered
//! fallback lists of class predicates, tried until one matches:
//!
//! - headline: `sds-comps-text-type-headline1`, then `news_tit`, then any
//!   class naming both "title" and "news"
//! - press: `sds-comps-profile-info-title-text`, then any class containing
//!   "press", then `info_group`
//!
//! The press name of a result is the closest matching element *before* its
//! headline in document order.

use crate::error::FetchError;
use crate::fetch::PageFetcher;
use crate::models::CandidateArticle;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Press placeholder when no press element precedes a headline.
pub const UNKNOWN_PRESS: &str = "언론사 정보 없음";

/// Host of the portal's own article viewer.
const PORTAL_ARTICLE_HOST: &str = "n.news.naver.com";

static RESULT_LIST: Lazy<Selector> = Lazy::new(|| Selector::parse("ul.list_news").unwrap());
static LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

type ClassPredicate = fn(&str) -> bool;

fn headline_current(c: &str) -> bool {
    c.contains("sds-comps-text-type-headline1")
}

fn headline_legacy(c: &str) -> bool {
    c.contains("news_tit")
}

fn headline_generic(c: &str) -> bool {
    let c = c.to_lowercase();
    c.contains("title") && c.contains("news")
}

fn press_current(c: &str) -> bool {
    c.contains("sds-comps-profile-info-title-text")
}

fn press_generic(c: &str) -> bool {
    c.to_lowercase().contains("press")
}

fn press_info_group(c: &str) -> bool {
    c.contains("info_group")
}

const HEADLINE_CLASSES: &[ClassPredicate] = &[headline_current, headline_legacy, headline_generic];
const PRESS_CLASSES: &[ClassPredicate] = &[press_current, press_generic, press_info_group];

fn has_class(el: &ElementRef<'_>, pred: ClassPredicate) -> bool {
    el.value().classes().any(pred)
}

/// Build the search URL for `query`.
pub fn search_url(base: &str, query: &str) -> String {
    format!("{}{}", base, urlencoding::encode(query))
}

/// Fetch and parse the results page for `query`.
#[instrument(level = "info", skip(fetcher, base_url))]
pub async fn search(
    fetcher: &dyn PageFetcher,
    base_url: &str,
    query: &str,
    max: usize,
) -> Result<Vec<CandidateArticle>, FetchError> {
    let url = search_url(base_url, query);
    let page = fetcher.fetch(&url).await?;
    let candidates = parse_results(&page.final_url, &page.body, max);
    info!(count = candidates.len(), "Parsed search results");
    Ok(candidates)
}

/// Parse a results page into at most `max` candidates, in page order, with
/// repeated links collapsed.
pub fn parse_results(page_url: &str, html: &str, max: usize) -> Vec<CandidateArticle> {
    let document = Html::parse_document(html);
    let Some(list) = document.select(&RESULT_LIST).next() else {
        warn!("Result list not found on search page");
        return Vec::new();
    };

    let Some((tier, headlines)) = HEADLINE_CLASSES.iter().enumerate().find_map(|(i, pred)| {
        let found: Vec<ElementRef<'_>> = list
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| has_class(el, *pred))
            .collect();
        (!found.is_empty()).then_some((i, found))
    }) else {
        warn!("No headlines matched any selector");
        return Vec::new();
    };
    debug!(tier, count = headlines.len(), "Headlines found");

    let base = Url::parse(page_url).ok();
    let presses = preceding_presses(list, &headlines);

    headlines
        .iter()
        .zip(presses)
        .filter_map(|(headline, press)| {
            let title = headline.text().map(str::trim).collect::<String>();
            let Some(link) = headline_link(headline, base.as_ref()) else {
                debug!(%title, "Headline without link skipped");
                return None;
            };
            let canonical_link = portal_link(headline, base.as_ref()).filter(|c| *c != link);
            Some(CandidateArticle {
                title,
                link,
                canonical_link,
                press,
            })
        })
        .unique_by(|c| c.link.clone())
        .take(max)
        .collect()
}

fn resolve(href: &str, base: Option<&Url>) -> Option<String> {
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}

/// Link of the headline itself or its nearest enclosing anchor.
fn headline_link(headline: &ElementRef<'_>, base: Option<&Url>) -> Option<String> {
    std::iter::once(**headline)
        .chain(headline.ancestors())
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| resolve(href, base))
}

/// Portal-hosted copy linked from the same result entry.
///
/// Walks up from the headline to the enclosing `li`, never past the list.
fn portal_link(headline: &ElementRef<'_>, base: Option<&Url>) -> Option<String> {
    for ancestor in headline.ancestors().filter_map(ElementRef::wrap) {
        let name = ancestor.value().name();
        if name == "ul" {
            break;
        }
        let found = ancestor
            .select(&LINKS)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve(href, base))
            .find(|url| {
                Url::parse(url)
                    .ok()
                    .and_then(|u| u.host_str().map(|h| h == PORTAL_ARTICLE_HOST))
                    .unwrap_or(false)
            });
        if found.is_some() || name == "li" {
            return found;
        }
    }
    None
}

/// For each headline, the text of the closest preceding press element.
///
/// Walks the list once in document order remembering the latest match of
/// every press tier; at each headline the best tier seen so far wins.
fn preceding_presses(list: ElementRef<'_>, headlines: &[ElementRef<'_>]) -> Vec<String> {
    let mut latest: Vec<Option<String>> = vec![None; PRESS_CLASSES.len()];
    let mut out = Vec::with_capacity(headlines.len());
    let mut next = 0;

    for el in list.descendants().filter_map(ElementRef::wrap) {
        if next >= headlines.len() {
            break;
        }
        if el.id() == headlines[next].id() {
            let press = latest
                .iter()
                .flatten()
                .next()
                .cloned()
                .unwrap_or_else(|| UNKNOWN_PRESS.to_string());
            out.push(press);
            next += 1;
            continue;
        }
        for (slot, pred) in latest.iter_mut().zip(PRESS_CLASSES) {
            if has_class(&el, *pred) {
                *slot = Some(el.text().map(str::trim).collect());
            }
        }
    }
    out.resize(headlines.len(), UNKNOWN_PRESS.to_string());
    out
}

//! Article extraction from a rendered front page
//!
//! Two-phase anchor scan (targeted selector groups, then every anchor if the
//! targeted phase found nothing), classifier filtering, URL dedup, and
//! enrichment from the nearest container element.

use crate::classify::{is_article_title, is_article_url, normalize_text};
use crate::schema::Article;
use crate::site::SiteProfile;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Extract at most `limit` articles from `doc`, in scan order.
///
/// Relative hrefs resolve against the origin of `page_url`. Never fails; an
/// empty vector is a valid answer.
pub fn extract_articles(
    doc: &Html,
    page_url: &Url,
    limit: usize,
    site: &SiteProfile,
) -> Vec<Article> {
    let Some(root) = scan_root(doc, site) else {
        return Vec::new();
    };
    let base = origin_of(page_url);

    let anchors = collect_anchors(root, site);
    debug!(anchors = anchors.len(), "Collected candidate anchors");

    let mut seen = HashSet::new();
    let mut articles = Vec::new();

    for anchor in anchors {
        if articles.len() >= limit {
            break;
        }

        let Some(url) = resolve_href(anchor, &base) else {
            continue;
        };
        let abs_url = url.to_string();
        if seen.contains(&abs_url) || !is_article_url(&url, site) {
            continue;
        }

        let title = normalize_text(&anchor.text().collect::<String>());
        if !is_article_title(&title, site) {
            continue;
        }

        let container = nearest_container(anchor, site);
        let published_at = container.and_then(|c| find_published(c, site));
        let category = container.and_then(|c| find_category(c, site));

        seen.insert(abs_url.clone());
        articles.push(Article {
            title,
            url: abs_url,
            published_at,
            category,
        });
    }

    articles
}

/// First main-content region, else `<body>`, else the document element
fn scan_root<'a>(doc: &'a Html, site: &SiteProfile) -> Option<ElementRef<'a>> {
    let first = move |sel: &str| {
        Selector::parse(sel)
            .ok()
            .and_then(|s| doc.select(&s).next())
    };
    first(site.scan_root)
        .or_else(|| first("body"))
        .or_else(|| Some(doc.root_element()))
}

fn collect_anchors<'a>(root: ElementRef<'a>, site: &SiteProfile) -> Vec<ElementRef<'a>> {
    let mut anchors = Vec::new();
    for group in site.selector_groups {
        if let Ok(sel) = Selector::parse(group) {
            anchors.extend(root.select(&sel));
        }
    }

    if anchors.is_empty() {
        debug!("No anchors in targeted groups, scanning every anchor");
        if let Ok(sel) = Selector::parse(site.fallback_anchors) {
            anchors.extend(root.select(&sel));
        }
    }

    anchors
}

fn origin_of(page_url: &Url) -> Url {
    let origin = page_url.origin().ascii_serialization();
    Url::parse(&origin).unwrap_or_else(|_| page_url.clone())
}

fn resolve_href(anchor: ElementRef<'_>, base: &Url) -> Option<Url> {
    let href = anchor.value().attr("href")?.trim();
    let lowered = href.to_ascii_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lowered.starts_with("mailto:")
        || lowered.starts_with("javascript:")
    {
        return None;
    }
    base.join(href).ok()
}

fn nearest_container<'a>(anchor: ElementRef<'a>, site: &SiteProfile) -> Option<ElementRef<'a>> {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| site.container_tags.contains(&el.value().name()))
}

fn find_published(container: ElementRef<'_>, site: &SiteProfile) -> Option<String> {
    let sel = Selector::parse(site.time_selector).ok()?;
    let node = container.select(&sel).next()?;

    let raw = node
        .value()
        .attr("datetime")
        .filter(|v| !v.is_empty())
        .or_else(|| node.value().attr("content").filter(|v| !v.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| node.text().collect::<String>());

    parse_published(&raw).map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn find_category(container: ElementRef<'_>, site: &SiteProfile) -> Option<String> {
    let sel = Selector::parse(site.category_selector).ok()?;
    let node = container.select(&sel).next()?;
    Some(normalize_text(&node.text().collect::<String>())).filter(|s| !s.is_empty())
}

/// Parse a timestamp as found in markup. Offset-less values are read as UTC.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

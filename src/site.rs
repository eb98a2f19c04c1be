//! Site profile for the ANSA front page
//!
//! All keyword lists and selectors the classifiers and the extractor use.
//! Tuning the heuristics means editing this table, not the control flow.

/// Heuristic configuration for one news source
#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    /// Identifier reported as `source` in the envelope
    pub source: &'static str,
    /// Front page that gets rendered
    pub home_url: &'static str,
    /// Registrable domain; the host must equal it or be a subdomain of it
    pub domain: &'static str,
    /// Path fragments that mark boilerplate pages (matched on the lowercased path)
    pub blocked_path_fragments: &'static [&'static str],
    /// Path fragments that mark article or section pages
    pub article_path_prefixes: &'static [&'static str],
    /// Phrases that disqualify anchor text as a headline (matched lowercased)
    pub blocked_title_terms: &'static [&'static str],
    /// Minimum headline length, in characters
    pub min_title_chars: usize,
    /// Candidate regions for the scan root, first match wins
    pub scan_root: &'static str,
    /// Targeted anchor queries, in priority order
    pub selector_groups: &'static [&'static str],
    /// Anchor query used when no targeted group matches anything
    pub fallback_anchors: &'static str,
    /// Ancestor element names that delimit an article container
    pub container_tags: &'static [&'static str],
    /// Time-like element inside a container
    pub time_selector: &'static str,
    /// Category-like element inside a container
    pub category_selector: &'static str,
    /// Selector that signals initial content readiness in the browser
    pub ready_selector: &'static str,
}

impl SiteProfile {
    pub const ANSA: SiteProfile = SiteProfile {
        source: "ansa",
        home_url: "https://www.ansa.it",
        domain: "ansa.it",
        blocked_path_fragments: &[
            "/sito/static/",
            "cookie",
            "privacy",
            "faq",
            "abbonamenti",
            "newsletter",
            "consent",
            "pubblicita",
            "/contatti",
        ],
        article_path_prefixes: &[
            "/sito/notizie/",
            "/canali/",
            "/mondo/",
            "/politica/",
            "/economia/",
            "/sport/",
        ],
        blocked_title_terms: &[
            "cookie",
            "privacy",
            "condizioni generali",
            "abbonamento",
            "acconsenti",
            "continua",
            "register@ansa.it",
        ],
        min_title_chars: 20,
        scan_root: r#"main, [role="main"]"#,
        selector_groups: &[
            "article a[href]",
            r#"[class*="article"] a[href]"#,
            r#"[class*="news"] a[href]"#,
            r#"[class*="card"] a[href]"#,
            "h1 a[href], h2 a[href], h3 a[href]",
        ],
        fallback_anchors: "a[href]",
        container_tags: &["article", "li", "div", "section"],
        time_selector: "time, [datetime]",
        category_selector: r#"[class*="category"], [data-category], .tag, .kicker, .section"#,
        ready_selector: r#"main, [role="main"], body"#,
    };
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::ANSA
    }
}

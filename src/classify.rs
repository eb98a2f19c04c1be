//! Link and title classifiers
//!
//! Pure predicates that decide whether an anchor looks like a headline
//! pointing at an article. They never fail: anything malformed is a `false`.

use crate::site::SiteProfile;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static DATE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d{4}/\d{2}/\d{2}/").expect("date segment pattern"));

/// Collapse runs of whitespace into single spaces and trim
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Does `url` look like an article (or article section) of the site?
pub fn is_article_url(url: &Url, site: &SiteProfile) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    let in_domain = url.host_str().is_some_and(|host| {
        let host = host.to_ascii_lowercase();
        host == site.domain
            || host
                .strip_suffix(site.domain)
                .is_some_and(|sub| sub.ends_with('.'))
    });
    if !in_domain {
        return false;
    }

    let path = url.path().to_lowercase();
    if path.is_empty() || path == "/" || path == "/#" {
        return false;
    }

    if site
        .blocked_path_fragments
        .iter()
        .any(|fragment| path.contains(fragment))
    {
        return false;
    }

    site.article_path_prefixes
        .iter()
        .any(|prefix| path.contains(prefix))
        || DATE_SEGMENT.is_match(&path)
}

/// Does already-normalized anchor text look like a headline?
pub fn is_article_title(text: &str, site: &SiteProfile) -> bool {
    if text.chars().count() < site.min_title_chars {
        return false;
    }

    let lowered = text.to_lowercase();
    !site
        .blocked_title_terms
        .iter()
        .any(|term| lowered.contains(term))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url_ok(s: &str) -> bool {
        is_article_url(&Url::parse(s).unwrap(), &SiteProfile::ANSA)
    }

    fn title_ok(s: &str) -> bool {
        is_article_title(s, &SiteProfile::ANSA)
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Roma,\n\t  oggi   sciopero "), "Roma, oggi sciopero");
        assert_eq!(normalize_text("\n \t"), "");
    }

    #[test]
    fn test_accepts_article_paths() {
        assert!(url_ok("https://www.ansa.it/sito/notizie/cronaca/2024/05/01/fatto.html"));
        assert!(url_ok("https://www.ansa.it/mondo/2024/05/01/titolo.html"));
        assert!(url_ok("https://www.ansa.it/canali/ambiente/index.html"));
        assert!(url_ok("https://www.ansa.it/politica/"));
        assert!(url_ok("https://www.ansa.it/economia/notizia.html"));
        assert!(url_ok("http://ansa.it/sport/calcio/partita.html"));
        assert!(url_ok("https://www.ansa.it/lombardia/2024/05/01/fatto.html"));
    }

    #[test]
    fn test_rejects_other_hosts_and_schemes() {
        assert!(!url_ok("https://www.repubblica.it/mondo/2024/05/01/x.html"));
        assert!(!url_ok("https://ansa.it.example.com/mondo/x.html"));
        assert!(!url_ok("https://notansa.it/mondo/x.html"));
        assert!(!url_ok("ftp://www.ansa.it/mondo/x.html"));
    }

    #[test]
    fn test_rejects_root_and_boilerplate() {
        assert!(!url_ok("https://www.ansa.it/"));
        assert!(!url_ok("https://www.ansa.it/#top"));
        assert!(!url_ok("https://www.ansa.it/cookie-policy"));
        assert!(!url_ok("https://www.ansa.it/contatti"));
        assert!(!url_ok("https://www.ansa.it/sito/static/mondo/info.html"));
        assert!(!url_ok("https://www.ansa.it/mondo/newsletter/iscriviti.html"));
        assert!(!url_ok("https://www.ansa.it/economia/PRIVACY.html"));
    }

    #[test]
    fn test_rejects_unstructured_paths() {
        assert!(!url_ok("https://www.ansa.it/about.html"));
        assert!(!url_ok("https://www.ansa.it/2024/05/01"));
    }

    #[test]
    fn test_title_length() {
        assert!(!title_ok("Troppo breve"));
        assert!(!title_ok("Diciannove caratter"));
        assert!(title_ok("Venti caratteri esat"));
        // counted in characters, not bytes
        assert!(!title_ok("àààààààààààààààààà"));
    }

    #[test]
    fn test_title_blocked_terms() {
        assert!(!title_ok("Accetta i Cookie per continuare la lettura"));
        assert!(!title_ok("Scrivi a REGISTER@ANSA.IT per informazioni"));
        assert!(!title_ok("Scopri le condizioni generali del servizio"));
        assert!(title_ok("Il governo approva la manovra economica"));
    }

    #[test]
    fn test_classifiers_are_pure() {
        let url = Url::parse("https://www.ansa.it/mondo/2024/05/01/x.html").unwrap();
        let first = is_article_url(&url, &SiteProfile::ANSA);
        assert_eq!(first, is_article_url(&url, &SiteProfile::ANSA));

        let title = "Il governo approva la manovra economica";
        assert_eq!(title_ok(title), title_ok(title));
    }
}

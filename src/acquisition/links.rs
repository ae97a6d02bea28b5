//! Download-link extraction from email bodies.
//!
//! Vendors that refuse attachments email a download link instead. Both
//! HTML `href` targets and bare URLs in plain text are harvested; only
//! links that plausibly point at a feed file (extension or download-ish
//! path) are kept.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HREF: Regex = Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).unwrap();
    static ref BARE_URL: Regex = Regex::new(r#"https?://[^\s"'<>]+"#).unwrap();
    static ref FEED_HINT: Regex =
        Regex::new(r"(?i)\.(xlsx|xls|csv|tsv)(\?|$)|/download\b|[?&]format=(csv|xlsx?)").unwrap();
}

fn is_feed_link(url: &str) -> bool {
    FEED_HINT.is_match(url)
}

/// Pull candidate feed URLs out of an HTML and/or text body, in order of
/// appearance, deduplicated.
pub fn extract_download_links(html: Option<&str>, text: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |url: &str| {
        let url = url.trim().trim_end_matches(&['.', ',', ';', ')'][..]);
        if url.starts_with("http") && is_feed_link(url) && !out.iter().any(|u| u == url) {
            out.push(url.to_string());
        }
    };

    if let Some(html) = html {
        for caps in HREF.captures_iter(html) {
            push(&caps[1]);
        }
    }
    if let Some(text) = text {
        for m in BARE_URL.find_iter(text) {
            push(m.as_str());
        }
    }
    out
}

/// Best-effort file name from a download URL.
pub fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = without_query.rsplit('/').next().unwrap_or("download");
    if name.is_empty() {
        "download.xlsx".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harvests_href_and_bare_urls() {
        let html = r#"<p>Stock: <a href="https://cdn.example.com/feeds/stock.xlsx">here</a></p>
                      <a href="https://example.com/about">ignore</a>"#;
        let text = "backup: https://cdn.example.com/feeds/stock.csv please";
        let links = extract_download_links(Some(html), Some(text));
        assert_eq!(
            links,
            vec![
                "https://cdn.example.com/feeds/stock.xlsx",
                "https://cdn.example.com/feeds/stock.csv",
            ]
        );
    }

    #[test]
    fn download_paths_without_extension_count() {
        let links = extract_download_links(None, Some("https://vendor.example.com/export/download?id=9"));
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn duplicates_collapse() {
        let html = r#"<a href="https://x.example.com/a.csv">a</a><a href="https://x.example.com/a.csv">b</a>"#;
        assert_eq!(extract_download_links(Some(html), None).len(), 1);
    }

    #[test]
    fn file_names() {
        assert_eq!(
            file_name_from_url("https://cdn.example.com/feeds/stock.xlsx?sig=abc"),
            "stock.xlsx"
        );
        assert_eq!(file_name_from_url("https://x.example.com/"), "download.xlsx");
    }
}

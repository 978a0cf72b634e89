//! HTML parser for extracting anchor hrefs
//!
//! Hrefs are returned verbatim; resolving them against the page URL is the
//! crawl policy's job.

use scraper::{Html, Selector};

/// Extracts the `href` attribute of every `<a>` element in document order
///
/// # Example
///
/// ```
/// use pantopod::crawler::extract_hrefs;
///
/// let html = br#"<html><body><a href="/a">A</a><a>no href</a></body></html>"#;
/// assert_eq!(extract_hrefs(html), vec!["/a".to_string()]);
/// ```
pub fn extract_hrefs(body: &[u8]) -> Vec<String> {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect()
}

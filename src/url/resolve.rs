use crate::{UrlError, UrlResult};
use url::{ParseError, Url};

/// Schemes whose hrefs are not navigable links
const IGNORED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Spellings of a parent segment, percent-encoded dots included
const PARENT_SEGMENTS: &[&str] = &["..", "%2e%2e", ".%2e", "%2e."];

/// Resolves an href found on `base` into an absolute URL
///
/// Resolution is component-wise: scheme, host and port are each taken from
/// the href when it has them and inherited from `base` otherwise. A port
/// written out in the href wins even when it is the scheme default. When the
/// href carries a path, its path, query and fragment replace the base ones
/// wholesale; when it does not, the base path is kept and only the query (if
/// given) and fragment are replaced.
///
/// # Returns
///
/// * `Ok(Some(Url))` - The resolved link
/// * `Ok(None)` - The href is not a link (empty, `javascript:`, `mailto:`, ...)
/// * `Err(UrlError::ParentTraversal)` - The href contains `..`, plain or
///   percent-encoded
///
/// # Examples
///
/// ```
/// use url::Url;
/// use pantopod::url::resolve_href;
///
/// let base = Url::parse("http://a.com/x/y?q=1#f").unwrap();
/// let next = resolve_href(&base, "/z").unwrap().unwrap();
/// assert_eq!(next.as_str(), "http://a.com/z");
/// ```
pub fn resolve_href(base: &Url, href: &str) -> UrlResult<Option<Url>> {
    if is_parent_traversal(href) {
        return Err(UrlError::ParentTraversal(href.to_string()));
    }

    let href = href.trim().replace(' ', "+");
    if href.is_empty() || is_ignored_scheme(&href) {
        return Ok(None);
    }

    match Url::parse(&href) {
        Ok(absolute) => merge_absolute(base, &absolute, has_explicit_port(&href)),
        Err(ParseError::RelativeUrlWithoutBase) if href.starts_with("//") => {
            let absolute = Url::parse(&format!("{}:{}", base.scheme(), href))
                .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;
            merge_absolute(base, &absolute, has_explicit_port(&href))
        }
        Err(ParseError::RelativeUrlWithoutBase) => Ok(Some(merge_relative(base, &href))),
        Err(e) => Err(UrlError::Parse(format!("{}: {}", href, e))),
    }
}

fn is_ignored_scheme(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    IGNORED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

fn is_parent_traversal(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    PARENT_SEGMENTS.iter().any(|segment| lower.contains(segment))
}

/// Whether the authority of an href spells out a port
///
/// `Url` drops a port equal to the scheme default, so this reads the raw text.
fn has_explicit_port(href: &str) -> bool {
    let Some((_, rest)) = href.split_once("//") else {
        return false;
    };
    let authority = rest
        .split(|c: char| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or_default();
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);
    let after_host = match host_port.rfind(']') {
        Some(end) => &host_port[end + 1..],
        None => host_port,
    };
    after_host.contains(':')
}

/// Overlays the components of an absolute href onto the base URL
fn merge_absolute(base: &Url, href: &Url, explicit_port: bool) -> UrlResult<Option<Url>> {
    if href.scheme() != "http" && href.scheme() != "https" {
        return Ok(None);
    }

    let mut next = base.clone();
    next.set_scheme(href.scheme())
        .map_err(|_| UrlError::InvalidScheme(href.scheme().to_string()))?;

    if let Some(host) = href.host_str() {
        next.set_host(Some(host))
            .map_err(|e| UrlError::Parse(format!("{}: {}", host, e)))?;
    }

    let port = if explicit_port {
        href.port_or_known_default()
    } else {
        base.port()
    };
    next.set_port(port).map_err(|_| UrlError::MissingDomain)?;

    next.set_path(href.path());
    next.set_query(href.query());
    next.set_fragment(href.fragment());

    Ok(Some(next))
}

/// Applies a scheme-less, host-less href to the base URL
fn merge_relative(base: &Url, href: &str) -> Url {
    let (rest, fragment) = match href.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (href, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let mut next = base.clone();
    if path.is_empty() {
        if query.is_some() {
            next.set_query(query);
        }
    } else {
        next.set_path(path);
        next.set_query(query);
    }
    next.set_fragment(fragment);

    next
}

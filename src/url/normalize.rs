use crate::UrlError;
use url::Url;

/// Schemes a task can be fetched with
const SUPPORTED_SCHEMES: &[&str] = &["http", "https"];

/// Normalizes a URL into the form used as a task registry key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or relative
/// 2. Reject schemes other than http/https
/// 3. Reject URLs without a host
/// 4. Lowercase the host and resolve dot segments (done by the parser)
/// 5. Empty path becomes /
/// 6. Remove fragment (everything after #)
///
/// The query string is kept as is: different queries address different
/// resources on the mirrored site.
///
/// # Examples
///
/// ```
/// use webmirror::url::normalize_url;
///
/// let url = normalize_url("http://EXAMPLE.COM/a/../b.html#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/b.html");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    if url.path().is_empty() {
        url.set_path("/");
    }

    url.set_fragment(None);

    Ok(url)
}

/// Returns true if the scheme of `url` can be fetched
pub fn is_supported_scheme(url: &Url) -> bool {
    SUPPORTED_SCHEMES.contains(&url.scheme())
}

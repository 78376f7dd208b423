use url::Url;

/// Returns the site key of a URL: host plus explicit port
///
/// Two URLs are on the same site when their site keys are equal. The scheme
/// is not part of the key.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use webmirror::url::site_key;
///
/// let url = Url::parse("http://Example.com:8080/a/b").unwrap();
/// assert_eq!(site_key(&url), "example.com:8080");
/// ```
pub fn site_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Returns the directory part of a URL path, always ending with `/`
///
/// `/a/b/c.html` and `/a/b/` both give `/a/b/`, `/a` gives `/`.
pub fn base_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "/",
    }
}

/// Returns the longest common directory prefix of two directory paths
///
/// Both inputs are expected to be directories (ending with `/`); the result
/// always ends with `/`.
pub fn root_dir<'a>(a: &'a str, b: &str) -> &'a str {
    let mut end = 0;
    for (i, (ca, cb)) in a.bytes().zip(b.bytes()).enumerate() {
        if ca != cb {
            break;
        }
        if ca == b'/' {
            end = i + 1;
        }
    }
    if end == 0 {
        "/"
    } else {
        &a[..end]
    }
}

/// Counts how many directory levels `dir` lies below its ancestor `root`
pub fn levels_below(dir: &str, root: &str) -> u32 {
    dir.strip_prefix(root)
        .unwrap_or(dir)
        .bytes()
        .filter(|&b| b == b'/')
        .count() as u32
}

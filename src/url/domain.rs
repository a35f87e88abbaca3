use url::Url;

/// Second-level labels that act as part of a public suffix (`example.com.vn`)
const SECOND_LEVEL_SUFFIXES: &[&str] = &["com", "net", "org", "edu", "gov", "co", "ac"];

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host, it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use novel_trail::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts the registrable name of a URL's host, without subdomains or suffix
///
/// This is the key site adapters are registered under: `truyen.example.vn`,
/// `www.example.com` and `example.com.vn` all map to `example`. IP hosts and
/// single-label hosts (such as `localhost`) are returned whole.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use novel_trail::url::site_key;
///
/// let url = Url::parse("https://www.ptwxz.com/html/1/1/1.html").unwrap();
/// assert_eq!(site_key(&url), Some("ptwxz".to_string()));
/// ```
pub fn site_key(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;

    if url.host().is_some_and(|h| !matches!(h, url::Host::Domain(_))) {
        return Some(host);
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let key = match labels.len() {
        0 => return None,
        1 => labels[0],
        2 => labels[0],
        n => {
            let second = labels[n - 2];
            if SECOND_LEVEL_SUFFIXES.contains(&second) && labels[n - 1].len() == 2 {
                labels[n - 3]
            } else {
                second
            }
        }
    };

    Some(key.to_string())
}

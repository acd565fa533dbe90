use url::Url;

const DEFAULT_BASE: &str = "http://localhost";

/// Make `url` absolute against `base` (the transport URL).
///
/// Absolute inputs are returned normalized. Relative ones are appended to the
/// base path (trailing slashes trimmed); their query string is kept.
pub fn to_absolute_url(base: Option<&str>, url: &str) -> String {
    if let Ok(abs) = Url::parse(url) {
        return abs.into();
    }

    let base = base
        .and_then(|b| Url::parse(b).ok())
        .or_else(|| Url::parse(DEFAULT_BASE).ok());
    let Some(mut base) = base else {
        return url.to_owned();
    };

    let (path, query) = match url.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (url, None),
    };
    let joined = format!("{}{}", base.path().trim_end_matches('/'), path);
    base.set_path(&joined);
    base.set_query(query);
    base.set_fragment(None);
    base.into()
}

/// Append percent-encoded `key=value` pairs to a URL that may be relative
/// and may already carry a query string.
pub fn append_query(base: &str, pairs: &[(&str, &str)]) -> String {
    let mut url = base.to_string();
    for (key, value) in pairs {
        push_separator(&mut url);
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}

/// Append a pre-encoded query fragment.
pub fn append_raw(base: &str, fragment: &str) -> String {
    let mut url = base.to_string();
    push_separator(&mut url);
    url.push_str(fragment);
    url
}

fn push_separator(url: &mut String) {
    if !url.contains('?') {
        url.push('?');
    } else if !url.ends_with('?') && !url.ends_with('&') {
        url.push('&');
    }
}

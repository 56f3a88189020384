//! Query string helpers
//!
//! Keys given to [`with_query_values`] replace any parameter of the same name
//! already present on the URI; everything else is kept in order.

/// Build an encoded query string from key/value pairs
pub fn build_query_string(query: &[(&str, &str)]) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Merge query values into a URI
pub fn with_query_values(uri: &str, query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return uri.to_string();
    }

    let (path, existing) = match uri.split_once('?') {
        Some((path, existing)) => (path, existing),
        None => (uri, ""),
    };

    let mut pairs: Vec<String> = existing
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(k, _)| k);
            let key = urlencoding::decode(key).map_or_else(|_| key.to_string(), |k| k.into_owned());
            !query.iter().any(|(k, _)| *k == key)
        })
        .map(str::to_string)
        .collect();
    pairs.push(build_query_string(query));

    format!("{}?{}", path, pairs.join("&"))
}

use tracing::warn;

/// Pulls `session_id` out of the fragment of a redirect URL such as
/// `winterarc://callback#session_id=abc&state=x`.
pub fn extract_session_id(url: &str) -> Option<String> {
    let (_, fragment) = url.split_once('#')?;
    fragment
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "session_id")
        .and_then(|(_, value)| match urlencoding::decode(value) {
            Ok(decoded) => Some(decoded.into_owned()),
            Err(err) => {
                warn!("session_id is not valid UTF-8 after decoding: {err}");
                None
            }
        })
        .filter(|value| !value.is_empty())
}

pub fn strip_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(base, _)| base)
}

pub fn login_url(auth_url: &str, redirect: &str) -> String {
    format!("{auth_url}?redirect={}", urlencoding::encode(redirect))
}

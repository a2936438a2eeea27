//! Redirect-target validation and encoding.
//!
//! A redirect target is only trusted when it is a same-origin absolute path:
//! it starts with `/` and is not protocol-relative (`//host`, `/\host`).

/// Query parameter carrying the post-sign-in destination.
pub const REDIRECT_PARAM: &str = "redirectTo";

/// Destination used when no valid target survives.
pub const DEFAULT_REDIRECT: &str = "/dashboard";

/// Returns `true` if `value` is safe to use as a same-origin redirect.
#[must_use]
pub fn is_valid_redirect(value: &str) -> bool {
    value.starts_with('/') && !value.starts_with("//") && !value.starts_with("/\\")
}

/// `candidate` if it is a valid redirect, otherwise `fallback`.
#[must_use]
pub fn resolve_redirect_path<'a>(candidate: Option<&'a str>, fallback: &'a str) -> &'a str {
    match candidate {
        Some(c) if is_valid_redirect(c) => c,
        _ => fallback,
    }
}

/// Attach `redirectTo` to a relative `path`, replacing any existing value.
///
/// Returns `path` unchanged when `redirect_to` is missing or invalid.
#[must_use]
pub fn with_redirect_param(path: &str, redirect_to: Option<&str>) -> String {
    let Some(target) = redirect_to.filter(|t| is_valid_redirect(t)) else {
        return path.to_string();
    };

    let (base, query) = path.split_once('?').unwrap_or((path, ""));
    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some(REDIRECT_PARAM))
        .map(str::to_string)
        .collect();
    pairs.push(format!("{REDIRECT_PARAM}={}", urlencoding::encode(target)));

    format!("{base}?{}", pairs.join("&"))
}

/// Sign-in location carrying `target` as the redirect parameter.
#[must_use]
pub fn sign_in_location(sign_in_path: &str, target: &str) -> String {
    format!("{sign_in_path}?{REDIRECT_PARAM}={}", urlencoding::encode(target))
}

/// Percent-encode a target for storage in the fallback cookie.
#[must_use]
pub fn encode_fallback(target: &str) -> String {
    urlencoding::encode(target).into_owned()
}

/// Decode a fallback cookie value, trusting it only if it is a valid redirect.
#[must_use]
pub fn decode_fallback(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    is_valid_redirect(&decoded).then(|| decoded.into_owned())
}

use std::collections::BTreeMap;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::Cookie;

use super::config::GateConfig;
use super::traits::CookieJar;
use crate::redirect;
use crate::types::CookieSpec;

/// Parse every `Cookie` header into a name → raw value map.
///
/// The first occurrence of a name wins. Values are not percent-decoded.
pub(crate) fn parse_cookie_header(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for value in headers.get_all(COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse(value).filter_map(Result::ok) {
            cookies
                .entry(cookie.name().to_string())
                .or_insert_with(|| cookie.value().to_string());
        }
    }
    cookies
}

/// [`CookieJar`] over one request's cookies.
///
/// Collects everything the identity provider sets so the gate can copy it
/// onto the final response.
#[derive(Debug, Default, Clone)]
pub struct RequestCookies {
    incoming: BTreeMap<String, String>,
    pending: Vec<CookieSpec>,
}

impl RequestCookies {
    #[must_use]
    pub fn new(incoming: BTreeMap<String, String>) -> Self {
        Self {
            incoming,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::new(parse_cookie_header(headers))
    }

    /// Cookies queued through [`CookieJar::set_all`], in order.
    #[must_use]
    pub fn pending(&self) -> &[CookieSpec] {
        &self.pending
    }

    #[must_use]
    pub fn into_pending(self) -> Vec<CookieSpec> {
        self.pending
    }
}

impl CookieJar for RequestCookies {
    fn get(&self, name: &str) -> Option<&str> {
        match self.pending.iter().rev().find(|c| c.name == name) {
            Some(set) if set.is_removal() => None,
            Some(set) => Some(set.value.as_str()),
            None => self.incoming.get(name).map(String::as_str),
        }
    }

    fn set_all(&mut self, cookies: Vec<CookieSpec>) {
        self.pending.extend(cookies);
    }
}

/// Signed fallback cookie remembering the post-sign-in destination.
pub(super) fn redirect_cookie(config: &GateConfig, target: &str) -> CookieSpec {
    let value = config
        .cookie_signer
        .sign(&redirect::encode_fallback(target));
    CookieSpec::new(&config.redirect_cookie_name, value)
        .with_http_only(true)
        .with_max_age(config.redirect_cookie_max_age)
}

/// Destination carried by a fallback cookie value, if it is signed by us
/// and decodes to a local path.
pub(super) fn read_redirect_cookie(config: &GateConfig, raw: &str) -> Option<String> {
    config
        .cookie_signer
        .verify(raw)
        .and_then(redirect::decode_fallback)
}

/// Removal instruction for the fallback cookie.
pub(super) fn clear_redirect_cookie(name: &str) -> CookieSpec {
    CookieSpec::removal(name).with_http_only(true)
}

/// Append one `Set-Cookie` header per cookie.
pub(super) fn append_set_cookies(headers: &mut HeaderMap, cookies: &[CookieSpec]) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.header_value()) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(e) => {
                tracing::warn!(cookie = %cookie.name, error = %e, "Dropping unrepresentable cookie");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn parses_raw_values() {
        let cookies = parse_cookie_header(&headers("bb_redirect_to=%2Fdashboard; theme=dark"));
        assert_eq!(cookies.get("bb_redirect_to").map(String::as_str), Some("%2Fdashboard"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn first_duplicate_wins() {
        let cookies = parse_cookie_header(&headers("a=1; a=2"));
        assert_eq!(cookies.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn jar_reads_through_pending_writes() {
        let mut jar = RequestCookies::from_headers(&headers("sb-x-auth-token=old; keep=1"));
        jar.set_all(vec![CookieSpec::new("sb-x-auth-token", "new")]);
        assert_eq!(jar.get("sb-x-auth-token"), Some("new"));
        assert_eq!(jar.get("keep"), Some("1"));

        jar.set_all(vec![CookieSpec::removal("keep")]);
        assert_eq!(jar.get("keep"), None);
        assert_eq!(jar.pending().len(), 2);
    }

    #[test]
    fn redirect_cookie_attributes() {
        let config = GateConfig::new();
        let cookie = redirect_cookie(&config, "/collections?x=1");
        assert_eq!(cookie.name, "bb_redirect_to");
        assert!(cookie.value.starts_with("%2Fcollections%3Fx%3D1."));
        assert!(cookie.http_only);
        assert_eq!(cookie.max_age, Some(time::Duration::seconds(300)));
        assert_eq!(cookie.path, "/");
    }

    #[test]
    fn redirect_cookie_reads_back_only_when_signed() {
        let config = GateConfig::new();
        let cookie = redirect_cookie(&config, "/collections?x=1");
        assert_eq!(
            read_redirect_cookie(&config, &cookie.value).as_deref(),
            Some("/collections?x=1")
        );

        assert_eq!(read_redirect_cookie(&config, "%2Fcollections%3Fx%3D1"), None);
        assert_eq!(read_redirect_cookie(&GateConfig::new(), &cookie.value), None);

        let offsite = config.cookie_signer.sign("https%3A%2F%2Fevil.example");
        assert_eq!(read_redirect_cookie(&config, &offsite), None);
    }

    #[test]
    fn appends_one_header_per_cookie() {
        let mut headers = HeaderMap::new();
        append_set_cookies(
            &mut headers,
            &[CookieSpec::new("a", "1"), clear_redirect_cookie("bb_redirect_to")],
        );
        let values: Vec<_> = headers.get_all(SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 2);
        assert!(values[1].to_str().unwrap().contains("Max-Age=0"));
    }
}

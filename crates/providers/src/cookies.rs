//! Cookie accumulation for multi-step sign-in flows.
//!
//! The jar keeps a flat `name -> value` set per session. Domains, paths and
//! expiry attributes are ignored: every cookie seen is replayed on every
//! subsequent request of the same session.

use reqwest::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use tracing::{debug, trace};

#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    // Insertion ordered so the replayed header is stable.
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Record a single cookie. An empty value removes it.
    pub fn set(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            self.cookies.retain(|(key, _)| key != name);
            return;
        }

        match self.cookies.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.cookies.push((name.to_string(), value.to_string())),
        }
    }

    /// Merge every `set-cookie` directive found in `headers`.
    pub fn absorb(&mut self, headers: &HeaderMap) {
        for header in headers.get_all(SET_COOKIE) {
            let Ok(line) = header.to_str() else {
                debug!("Skipping non-ASCII set-cookie header");
                continue;
            };

            for directive in split_set_cookie(line) {
                let Some((name, value)) = parse_set_cookie(directive) else {
                    continue;
                };
                trace!(cookie = name, removed = value.is_empty(), "Absorbed cookie");
                self.set(name, value);
            }
        }
    }

    /// Serialize the set as one `cookie` header. Nothing is added when empty.
    pub fn apply(&self, headers: &mut HeaderMap) {
        let Some(serialized) = self.header_value() else {
            return;
        };

        match HeaderValue::from_str(&serialized) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(e) => debug!(error = %e, "Cookie header is not a valid header value"),
        }
    }

    /// The `name=value; name=value` form, or `None` when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }

        Some(
            self.cookies
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Split a header line that may carry several cookies joined by commas.
///
/// A comma only separates cookies when the text after it looks like the
/// start of a new `name=` pair, so commas inside `Expires=` dates survive.
pub fn split_set_cookie(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b',' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let token_start = j;
            while j < bytes.len() && !matches!(bytes[j], b'=' | b';' | b',') {
                j += 1;
            }

            if j < bytes.len() && bytes[j] == b'=' && j > token_start {
                parts.push(line[start..i].trim());
                start = token_start;
                i = token_start;
                continue;
            }
        }
        i += 1;
    }

    parts.push(line[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

/// Extract `(name, value)` from one set-cookie directive, ignoring attributes.
pub fn parse_set_cookie(directive: &str) -> Option<(&str, &str)> {
    let pair = directive.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(lines: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for line in lines {
            headers.append(SET_COOKIE, HeaderValue::from_str(line).unwrap());
        }
        headers
    }

    #[test]
    fn test_empty_value_removes_cookie() {
        let mut jar = CookieJar::new();
        jar.absorb(&headers(&["a=1"]));
        assert_eq!(jar.get("a"), Some("1"));

        jar.absorb(&headers(&["a="]));
        assert_eq!(jar.get("a"), None);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_non_empty_value_overwrites() {
        let mut jar = CookieJar::new();
        jar.absorb(&headers(&["a=1"]));
        jar.absorb(&headers(&["a=2; Path=/; HttpOnly"]));
        assert_eq!(jar.get("a"), Some("2"));
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn test_combined_header_is_split() {
        let mut jar = CookieJar::new();
        jar.absorb(&headers(&[
            "SESSION=abc; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Path=/, __cflb=xyz; Secure",
        ]));
        assert_eq!(jar.get("SESSION"), Some("abc"));
        assert_eq!(jar.get("__cflb"), Some("xyz"));
        assert_eq!(jar.len(), 2);
    }

    #[test]
    fn test_split_keeps_expires_dates() {
        let parts = split_set_cookie("a=1; Expires=Thu, 01 Jan 1970 00:00:00 GMT, b=2");
        assert_eq!(
            parts,
            vec!["a=1; Expires=Thu, 01 Jan 1970 00:00:00 GMT", "b=2"]
        );
    }

    #[test]
    fn test_nameless_directive_skipped() {
        let mut jar = CookieJar::new();
        jar.absorb(&headers(&["=orphan", "novalue"]));
        assert!(jar.is_empty());
    }

    #[test]
    fn test_apply_serializes_in_order() {
        let mut jar = CookieJar::new();
        jar.absorb(&headers(&["b=2", "a=1", "c=\"quoted\""]));

        let mut out = HeaderMap::new();
        jar.apply(&mut out);
        assert_eq!(out.get(COOKIE).unwrap(), "b=2; a=1; c=quoted");
    }

    #[test]
    fn test_apply_skips_empty_jar() {
        let jar = CookieJar::new();
        let mut out = HeaderMap::new();
        jar.apply(&mut out);
        assert!(out.get(COOKIE).is_none());
    }
}

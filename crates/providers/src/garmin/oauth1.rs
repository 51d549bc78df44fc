//! One-legged OAuth1 (HMAC-SHA1) request signing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use reqwest::Method;
use sha1::Sha1;
use url::Url;

use super::tokens::{OAuth1Token, OAuthConsumer};
use crate::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// RFC 3986 percent-encoding (unreserved characters kept).
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Signed `oauth_*` parameters for a single request.
#[derive(Debug, Clone)]
pub struct OAuthParams {
    params: Vec<(String, String)>,
}

impl OAuthParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The parameters as pairs, e.g. for query-string signing.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.params
    }

    /// `Authorization` header value.
    pub fn header(&self) -> String {
        let fields = self
            .params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {}", fields)
    }
}

/// Signs requests with a consumer key pair and an optional token.
#[derive(Debug, Clone, Copy)]
pub struct OAuth1Signer<'a> {
    consumer: &'a OAuthConsumer,
}

impl<'a> OAuth1Signer<'a> {
    pub fn new(consumer: &'a OAuthConsumer) -> Self {
        Self { consumer }
    }

    /// Sign with a fresh nonce and the current timestamp.
    pub fn sign(&self, method: &Method, url: &Url, token: Option<&OAuth1Token>) -> Result<OAuthParams> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.sign_with(method, url, token, &[], &nonce, &timestamp)
    }

    /// Deterministic signing; `form` holds url-encoded body parameters, if any.
    pub fn sign_with(
        &self,
        method: &Method,
        url: &Url,
        token: Option<&OAuth1Token>,
        form: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<OAuthParams> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.consumer.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];
        if let Some(token) = token {
            params.push(("oauth_token".to_string(), token.oauth_token.clone()));
        }

        let base = signature_base_string(method, url, &params, form);
        let key = format!(
            "{}&{}",
            encode(&self.consumer.consumer_secret),
            encode(token.map(|t| t.oauth_token_secret.as_str()).unwrap_or_default())
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| Error::internal(format!("Unable to initialise OAuth1 signer: {}", e)))?;
        mac.update(base.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        params.push(("oauth_signature".to_string(), signature));
        params.sort();
        Ok(OAuthParams { params })
    }
}

/// `METHOD&enc(base_url)&enc(sorted params)`, query and form parameters included.
pub fn signature_base_string(
    method: &Method,
    url: &Url,
    oauth_params: &[(String, String)],
    form: &[(&str, &str)],
) -> String {
    let mut all: Vec<(String, String)> = oauth_params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    all.extend(url.query_pairs().map(|(k, v)| (encode(&k), encode(&v))));
    all.extend(form.iter().map(|(k, v)| (encode(k), encode(v))));
    all.sort();

    let param_string = all
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.as_str().to_ascii_uppercase(),
        encode(&base_url(url)),
        encode(&param_string)
    )
}

/// Scheme, host, non-default port and path; no query or fragment.
fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

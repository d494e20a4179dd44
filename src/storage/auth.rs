//! Shared Key request signing for the Blob REST API.
//!
//! The signature is HMAC-SHA256 (keyed with the base64-decoded account key) over:
//!
//! ```text
//! VERB\nContent-Encoding\nContent-Language\nContent-Length\nContent-MD5\nContent-Type\n
//! Date\nIf-Modified-Since\nIf-Match\nIf-None-Match\nIf-Unmodified-Since\nRange\n
//! CanonicalizedHeaders CanonicalizedResource
//! ```
//!
//! `Date` stays empty because `x-ms-date` is always sent.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use url::Url;

use super::error::Result;

type HmacSha256 = Hmac<Sha256>;

/// RFC 1123 timestamp for `x-ms-date`.
pub fn rfc1123_now() -> String {
    jiff::Timestamp::now()
        .strftime("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// The parts of a request that go into the signature.
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    pub content_length: usize,
    pub content_type: Option<&'a str>,
    /// `x-ms-*` headers, keys lowercase.
    pub ms_headers: &'a BTreeMap<String, String>,
}

/// Account name plus decoded key.
#[derive(Clone)]
pub struct SharedKeyCredential {
    account: String,
    key: Vec<u8>,
}

impl std::fmt::Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

impl SharedKeyCredential {
    /// Decode `key_b64` (as shown in the portal). Fails on invalid base64.
    pub fn new(account: impl Into<String>, key_b64: &str) -> Result<Self> {
        let key = STANDARD.decode(key_b64.trim())?;
        Ok(Self {
            account: account.into(),
            key,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Base64 HMAC-SHA256 of `string_to_sign`.
    pub fn sign(&self, string_to_sign: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self, req: &SignableRequest<'_>) -> String {
        let signature = self.sign(&string_to_sign(req, &self.account));
        format!("SharedKey {}:{}", self.account, signature)
    }
}

pub fn string_to_sign(req: &SignableRequest<'_>, account: &str) -> String {
    let content_length = if req.content_length > 0 {
        req.content_length.to_string()
    } else {
        String::new()
    };
    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
        req.method,
        content_length,
        req.content_type.unwrap_or(""),
        canonicalized_headers(req.ms_headers),
        canonicalized_resource(req.url, account),
    )
}

/// `name:value\n` per `x-ms-*` header, sorted by name.
pub fn canonicalized_headers(ms_headers: &BTreeMap<String, String>) -> String {
    ms_headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k.to_ascii_lowercase(), v.trim()))
        .collect()
}

/// `/account/encoded-path` followed by `\nname:v1,v2` per query parameter (names lowercase, sorted; values decoded, sorted).
pub fn canonicalized_resource(url: &Url, account: &str) -> String {
    let mut resource = format!("/{}{}", account, url.path());
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in url.query_pairs() {
        params
            .entry(k.to_ascii_lowercase())
            .or_default()
            .push(v.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        resource.push('\n');
        resource.push_str(&name);
        resource.push(':');
        resource.push_str(&values.join(","));
    }
    resource
}

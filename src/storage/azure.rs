//! Blocking Blob REST client: Find Blobs by Tags and Set Blob Tags with Shared Key auth.

use log::debug;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use super::auth::{SharedKeyCredential, SignableRequest, rfc1123_now};
use super::error::{Error, Result};
use super::{FindPage, TagQuery, TagStore, xml};
use crate::utils::config::{PackagePaths, StorageConsts};
use crate::{BlobRef, Tags};

const TAGS_CONTENT_TYPE: &str = "application/xml; charset=UTF-8";

/// Connection settings for [`AzureBlobClient`].
#[derive(Clone)]
pub struct AzureBlobConfig {
    pub account: String,
    /// Base64 account key.
    pub key: String,
    /// Service endpoint. None means `https://{account}.blob.core.windows.net/`.
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for AzureBlobConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBlobConfig")
            .field("account", &self.account)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct AzureBlobClient {
    http: Client,
    credential: SharedKeyCredential,
    endpoint: Url,
}

impl AzureBlobClient {
    /// Build the client. Fails on an invalid key or endpoint; makes no network call.
    pub fn new(config: AzureBlobConfig) -> Result<Self> {
        let credential = SharedKeyCredential::new(&config.account, &config.key)?;
        let endpoint = match config.endpoint.as_deref() {
            Some(e) => Url::parse(e)?,
            None => Url::parse(&format!(
                "https://{}.blob.core.windows.net/",
                config.account
            ))?,
        };
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(PackagePaths::get().user_agent())
            .build()?;
        debug!(
            "Blob client for account {} at {} (timeout {:?})",
            credential.account(),
            endpoint,
            config.timeout
        );
        Ok(Self {
            http,
            credential,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Endpoint with `segments` appended as percent-encoded path segments.
    pub fn url_for<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Result<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::Other(format!("endpoint {} cannot be a base URL", self.endpoint)))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    pub fn find_url(&self, query: &TagQuery, marker: Option<&str>) -> Result<Url> {
        let mut url = match query.container.as_deref() {
            Some(container) => {
                let mut url = self.url_for([container])?;
                url.query_pairs_mut().append_pair("restype", "container");
                url
            }
            None => self.endpoint.clone(),
        };
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("comp", "blobs")
                .append_pair("where", &query.filter)
                .append_pair("maxresults", &query.page_size.to_string());
            if let Some(m) = marker {
                pairs.append_pair("marker", m);
            }
        }
        Ok(url)
    }

    pub fn tags_url(&self, blob: &BlobRef) -> Result<Url> {
        let segments = std::iter::once(blob.container.as_str()).chain(blob.name.split('/'));
        let mut url = self.url_for(segments)?;
        url.query_pairs_mut().append_pair("comp", "tags");
        Ok(url)
    }

    /// Sign and send one request; returns the body on 2xx.
    fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Result<String> {
        let mut ms_headers = BTreeMap::new();
        ms_headers.insert("x-ms-date".to_string(), rfc1123_now());
        ms_headers.insert(
            "x-ms-version".to_string(),
            StorageConsts::API_VERSION.to_string(),
        );
        let authorization = self.credential.authorization(&SignableRequest {
            method: method.as_str(),
            url: &url,
            content_length: body.as_ref().map_or(0, Vec::len),
            content_type,
            ms_headers: &ms_headers,
        });

        let mut request = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, authorization);
        for (name, value) in &ms_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(ct) = content_type {
            request = request.header(CONTENT_TYPE, ct);
        }
        if let Some(b) = body {
            request = request.body(b);
        }

        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: text.chars().take(StorageConsts::ERROR_BODY_LIMIT).collect(),
            });
        }
        Ok(text)
    }
}

impl TagStore for AzureBlobClient {
    fn find_page(&self, query: &TagQuery, marker: Option<&str>) -> Result<FindPage> {
        let url = self.find_url(query, marker)?;
        let body = self.execute(Method::GET, url, None, None)?;
        xml::parse_find_page(&body, query.container.as_deref())
    }

    fn set_tags(&self, blob: &BlobRef, tags: &Tags) -> Result<()> {
        let url = self.tags_url(blob)?;
        let body = xml::tags_body(tags).into_bytes();
        self.execute(Method::PUT, url, Some(body), Some(TAGS_CONTENT_TYPE))?;
        Ok(())
    }
}

//! # Resource Fetch Module
//!
//! Accesso ai byte degli asset, sia via rete che da payload `data:` inline.
//!
//! ## Responsabilità:
//! - `Fetcher` trait: seam tra la pipeline e il trasporto (mockabile nei test)
//! - `HttpFetcher`: implementazione `reqwest` senza cookie né credenziali
//! - Decodifica dei data URI (base64 e percent-encoding) senza traffico di rete
//! - Richiesta solo-metadati (HEAD) per il `Content-Length`
//!
//! ## Cross-origin:
//! Ogni risposta riporta se il server ha dichiarato `Access-Control-Allow-Origin`.
//! I data URI sono sempre condivisibili.

use crate::asset::is_data_uri;
use crate::config::Config;
use crate::error::AssetError;
use async_trait::async_trait;
use base64::Engine;
use percent_encoding::percent_decode_str;
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE};
use tracing::debug;

/// Bytes of a fetched asset plus the metadata the pipeline consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    /// Declared media type without parameters, lower-cased
    pub content_type: Option<String>,
    /// Whether the origin allowed cross-origin reads of this resource
    pub shareable: bool,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Full GET of a network resource
    async fn get(&self, url: &str) -> Result<FetchedResource, AssetError>;

    /// Metadata-only request; returns the declared content length if any
    async fn content_length(&self, url: &str) -> Result<Option<u64>, AssetError>;
}

/// Resolves any identity to its bytes, decoding `data:` payloads in place.
pub async fn fetch_resource(
    fetcher: &dyn Fetcher,
    identity: &str,
) -> Result<FetchedResource, AssetError> {
    if is_data_uri(identity) {
        decode_data_uri(identity)
    } else {
        fetcher.get(identity).await
    }
}

/// Fetcher backed by a shared `reqwest` client
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, AssetError> {
        // reqwest keeps no cookie store unless asked to, so requests carry no credentials
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AssetError::Validation(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchedResource, AssetError> {
        let fetch_error = |reason: String| AssetError::Fetch {
            identity: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fetch_error(e.to_string()))?;

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(normalize_media_type);
        let shareable = headers.contains_key(ACCESS_CONTROL_ALLOW_ORIGIN);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
            .to_vec();

        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(FetchedResource {
            bytes,
            content_type,
            shareable,
        })
    }

    async fn content_length(&self, url: &str) -> Result<Option<u64>, AssetError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| AssetError::SizeProbe {
                identity: url.to_string(),
                reason: e.to_string(),
            })?;

        // Read the header itself: the body size hint of a HEAD response is always empty
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok()))
    }
}

/// `image/PNG; charset=x` -> `image/png`
pub fn normalize_media_type(raw: &str) -> Option<String> {
    let media_type = raw.split(';').next()?.trim().to_ascii_lowercase();
    if media_type.is_empty() {
        None
    } else {
        Some(media_type)
    }
}

/// Decodes `data:[<mediatype>][;base64],<payload>`
pub fn decode_data_uri(identity: &str) -> Result<FetchedResource, AssetError> {
    let invalid = |reason: &str| AssetError::Fetch {
        identity: abbreviate(identity),
        reason: reason.to_string(),
    };

    let rest = identity
        .get(5..)
        .filter(|_| is_data_uri(identity))
        .ok_or_else(|| invalid("not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("data URI has no payload separator"))?;

    let is_base64 = header
        .rsplit(';')
        .next()
        .map(|p| p.trim().eq_ignore_ascii_case("base64"))
        .unwrap_or(false);

    let bytes = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| invalid(&format!("invalid base64 payload: {}", e)))?
    } else {
        percent_decode_str(payload).collect()
    };

    Ok(FetchedResource {
        bytes,
        content_type: normalize_media_type(header),
        shareable: true,
    })
}

/// Keeps log lines readable when the identity is a large inline payload
pub fn abbreviate(identity: &str) -> String {
    const MAX: usize = 64;
    if identity.len() <= MAX {
        return identity.to_string();
    }
    let mut cut = MAX;
    while !identity.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &identity[..cut])
}

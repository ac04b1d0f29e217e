//! # Size Probe Module
//!
//! Calcola la dimensione in byte di un asset per l'ordinamento per dimensione.
//!
//! ## Strategia:
//! - **Data URI**: calcolo analitico dalla lunghezza del payload codificato,
//!   `floor(L * 0.75) - padding` (padding = numero di `=` finali, max 2)
//! - **URL di rete**: richiesta HEAD, si legge solo `Content-Length`
//!
//! ## Fallback:
//! Header mancante o richiesta fallita → dimensione `0`. È un'approssimazione
//! documentata, non un errore: l'asset partecipa all'ordinamento come zero.

use crate::asset::is_data_uri;
use crate::error::AssetError;
use crate::fetch::{abbreviate, Fetcher};
use std::sync::Arc;
use tracing::debug;

/// Decoded byte length of a base64 data URI payload
pub fn data_uri_size(identity: &str) -> u64 {
    let payload_start = identity.find(',').map(|i| i + 1).unwrap_or(0);
    let payload = &identity[payload_start..];
    let encoded_len = payload.len() as u64;

    let padding = if payload.ends_with("==") {
        2
    } else if payload.ends_with('=') {
        1
    } else {
        0
    };

    // floor(L * 0.75) without going through floats
    (encoded_len * 3 / 4).saturating_sub(padding)
}

#[derive(Clone)]
pub struct SizeProber {
    fetcher: Arc<dyn Fetcher>,
}

impl SizeProber {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Size of the asset, zero when it cannot be determined
    pub async fn probe(&self, identity: &str) -> u64 {
        match self.try_probe(identity).await {
            Ok(size) => size,
            Err(e) => {
                debug!("{}; treating size as 0", e);
                0
            }
        }
    }

    async fn try_probe(&self, identity: &str) -> Result<u64, AssetError> {
        if is_data_uri(identity) {
            return Ok(data_uri_size(identity));
        }

        self.fetcher
            .content_length(identity)
            .await?
            .ok_or_else(|| AssetError::SizeProbe {
                identity: abbreviate(identity),
                reason: "no Content-Length declared".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StaticFetcher;

    #[test]
    fn test_data_uri_size_without_padding() {
        let uri = format!("data:image/png;base64,{}", "A".repeat(100));
        assert_eq!(data_uri_size(&uri), 75);
    }

    #[test]
    fn test_data_uri_size_with_padding() {
        // "hello" -> "aGVsbG8=" (8 chars, 1 pad) -> 5 bytes
        assert_eq!(data_uri_size("data:text/plain;base64,aGVsbG8="), 5);
        // "hi" -> "aGk=" ; "h" -> "aA==" (4 chars, 2 pad) -> 1 byte
        assert_eq!(data_uri_size("data:text/plain;base64,aA=="), 1);
    }

    #[test]
    fn test_data_uri_size_floors_fractional_lengths() {
        // L = 10 -> 7.5 -> 7
        assert_eq!(data_uri_size("data:,AAAAAAAAAA"), 7);
    }

    #[tokio::test]
    async fn test_network_probe_reads_content_length() {
        let fetcher = StaticFetcher::new().with_length("https://a.test/big.jpg", Some(4096));
        let prober = SizeProber::new(Arc::new(fetcher));
        assert_eq!(prober.probe("https://a.test/big.jpg").await, 4096);
    }

    #[tokio::test]
    async fn test_missing_length_and_failures_fall_back_to_zero() {
        let fetcher = StaticFetcher::new()
            .with_length("https://a.test/chunked.jpg", None)
            .with_failing_probe("https://a.test/down.jpg");
        let prober = SizeProber::new(Arc::new(fetcher));

        assert_eq!(prober.probe("https://a.test/chunked.jpg").await, 0);
        assert_eq!(prober.probe("https://a.test/down.jpg").await, 0);
        assert_eq!(prober.probe("https://unknown.test/x.png").await, 0);
    }

    #[tokio::test]
    async fn test_data_uri_probe_does_not_touch_network() {
        let fetcher = Arc::new(StaticFetcher::new());
        let prober = SizeProber::new(fetcher.clone());
        assert_eq!(prober.probe("data:image/gif;base64,R0lGODlh").await, 6);
        assert_eq!(fetcher.probe_count(), 0);
    }
}

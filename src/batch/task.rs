//! # Target Worker Module
//!
//! Worker per l'elaborazione di un singolo target del batch.
//! Separato dall'orchestratore principale per maggiore modularità.
//!
//! ## Percorsi:
//! - `download` senza resize: byte originali, estensione derivata
//! - `download` con resize, oppure `convert`: pipeline raster del `ConversionEngine`

use crate::archive::ArchiveEntry;
use crate::batch::job::{BatchOperation, BatchOptions};
use crate::batch::naming::{derive_extension, entry_name};
use crate::convert::ConversionEngine;
use crate::error::AssetError;
use crate::fetch::{fetch_resource, Fetcher};
use std::sync::Arc;
use tracing::debug;

/// Cheap to clone; one clone is moved into each spawned task
#[derive(Clone)]
pub struct TargetWorker {
    fetcher: Arc<dyn Fetcher>,
    engine: Arc<ConversionEngine>,
    operation: BatchOperation,
    options: Arc<BatchOptions>,
}

impl TargetWorker {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        engine: Arc<ConversionEngine>,
        operation: BatchOperation,
        options: BatchOptions,
    ) -> Self {
        Self {
            fetcher,
            engine,
            operation,
            options: Arc::new(options),
        }
    }

    /// Produces the named archive entry for the target at `index`
    pub async fn process(&self, index: usize, identity: &str) -> Result<ArchiveEntry, AssetError> {
        let (bytes, extension) = if self.uses_raw_bytes() {
            let resource = fetch_resource(self.fetcher.as_ref(), identity).await?;
            let extension = derive_extension(resource.content_type.as_deref(), identity);
            (resource.bytes, extension)
        } else {
            let request = self.options.conversion_request();
            let bytes = self.engine.convert(identity, &request).await?;
            (bytes, self.options.extension.clone())
        };

        let name = entry_name(self.options.prefix(), index, &extension);
        debug!("Target {} ready as {} ({} bytes)", index + 1, name, bytes.len());
        Ok(ArchiveEntry { name, bytes })
    }

    fn uses_raw_bytes(&self) -> bool {
        self.operation == BatchOperation::Download && !self.options.resize_requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::convert::TargetFormat;
    use crate::fetch::testing::{png_bytes, StaticFetcher};

    fn worker(fetcher: StaticFetcher, operation: BatchOperation, options: BatchOptions) -> TargetWorker {
        let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);
        let engine = Arc::new(ConversionEngine::new(fetcher.clone(), &Config::default()));
        TargetWorker::new(fetcher, engine, operation, options)
    }

    #[tokio::test]
    async fn test_raw_download_keeps_bytes() {
        let fetcher = StaticFetcher::new().with_resource(
            "https://a.test/clip",
            b"not really a video".to_vec(),
            Some("video/mp4"),
        );
        let entry = worker(fetcher, BatchOperation::Download, BatchOptions::for_download("clip", None))
            .process(4, "https://a.test/clip")
            .await
            .unwrap();
        assert_eq!(entry.name, "clip_5.mp4");
        assert_eq!(entry.bytes, b"not really a video".to_vec());
    }

    #[tokio::test]
    async fn test_resized_download_is_png() {
        let fetcher = StaticFetcher::new().with_resource(
            "https://a.test/big.jpg",
            png_bytes(40, 20),
            Some("image/jpeg"),
        );
        let entry = worker(fetcher, BatchOperation::Download, BatchOptions::for_download("", Some(10)))
            .process(0, "https://a.test/big.jpg")
            .await
            .unwrap();
        assert_eq!(entry.name, "image_1.png");

        let decoded = image::load_from_memory(&entry.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 5));
    }

    #[tokio::test]
    async fn test_convert_uses_job_extension() {
        let fetcher = StaticFetcher::new().with_resource(
            "https://a.test/a.png",
            png_bytes(8, 8),
            Some("image/png"),
        );
        let options = BatchOptions::for_convert(TargetFormat::Jpeg, "out", None);
        let entry = worker(fetcher, BatchOperation::Convert, options)
            .process(1, "https://a.test/a.png")
            .await
            .unwrap();
        assert_eq!(entry.name, "out_2.jpg");
        assert_eq!(image::guess_format(&entry.bytes).unwrap(), image::ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_undecodable_target_fails() {
        let fetcher = StaticFetcher::new().with_resource(
            "https://a.test/broken.png",
            b"garbage".to_vec(),
            Some("image/png"),
        );
        let err = worker(
            fetcher,
            BatchOperation::Convert,
            BatchOptions::for_convert(TargetFormat::Png, "", None),
        )
        .process(0, "https://a.test/broken.png")
        .await
        .unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }
}

//! # Conversion Engine Module
//!
//! Pipeline raster in memoria: decode → resize opzionale → re-encode.
//!
//! ## Pipeline:
//! 1. **Fetch**: byte della risorsa senza credenziali (o payload `data:`)
//! 2. **Capability check**: content type immagine, header CORS se richiesto
//! 3. **Decode**: `image::load_from_memory`, errori → `AssetError::Decode`
//! 4. **Resize**: larghezza esatta, altezza proporzionale (mai crop o padding)
//! 5. **Encode**: formato target con qualità fissa 0.9 (ignorata dai lossless)
//!
//! ## Formati di output
//!
//! | Formato | Encoder | Qualità |
//! |---------|---------|---------|
//! | PNG     | `PngEncoder` | lossless |
//! | JPEG    | `JpegEncoder` | 90 (alpha rimosso) |
//! | WebP    | `WebPEncoder` | lossless |
//! | BMP     | `BmpEncoder` | lossless |
//!
//! ## Purezza:
//! La conversione produce solo un nuovo payload. Nessun download o
//! archiviazione avviene qui. Il lavoro CPU gira su `spawn_blocking`.

use crate::config::{Config, ENCODE_QUALITY, MAX_OUTPUT_PIXELS};
use crate::error::AssetError;
use crate::fetch::{abbreviate, fetch_resource, Fetcher};
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Raster formats the engine can encode to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Png,
    Jpeg,
    Webp,
    Bmp,
}

impl TargetFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Png => "image/png",
            TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::Webp => "image/webp",
            TargetFormat::Bmp => "image/bmp",
        }
    }

    /// Default file extension for the format
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Png => "png",
            TargetFormat::Jpeg => "jpg",
            TargetFormat::Webp => "webp",
            TargetFormat::Bmp => "bmp",
        }
    }

    pub fn is_lossless(&self) -> bool {
        !matches!(self, TargetFormat::Jpeg)
    }
}

impl FromStr for TargetFormat {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" | "image/png" => Ok(TargetFormat::Png),
            "jpg" | "jpeg" | "image/jpeg" => Ok(TargetFormat::Jpeg),
            "webp" | "image/webp" => Ok(TargetFormat::Webp),
            "bmp" | "image/bmp" => Ok(TargetFormat::Bmp),
            other => Err(AssetError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Output format plus optional resize width for one conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRequest {
    pub format: TargetFormat,
    /// Target width in pixels; `None` or `Some(0)` keeps the natural size
    pub resize_width: Option<u32>,
}

impl ConversionRequest {
    pub fn new(format: TargetFormat) -> Self {
        Self {
            format,
            resize_width: None,
        }
    }

    pub fn with_resize(mut self, width: Option<u32>) -> Self {
        self.resize_width = width;
        self
    }
}

/// Output dimensions for a `(width, height)` source.
///
/// A positive target width is applied exactly; height follows the source
/// aspect ratio, rounded to the nearest pixel and never below 1.
pub fn resolve_dimensions(width: u32, height: u32, resize_width: Option<u32>) -> (u32, u32) {
    match resize_width {
        Some(target) if target > 0 && width > 0 => {
            let scaled = (target as f64 * (height as f64 / width as f64)).round();
            (target, (scaled as u32).max(1))
        }
        _ => (width, height),
    }
}

/// Decodes, resizes and re-encodes raster bytes. CPU bound.
pub fn raster_pipeline(
    identity: &str,
    bytes: &[u8],
    request: &ConversionRequest,
) -> Result<Vec<u8>, AssetError> {
    let source = image::load_from_memory(bytes).map_err(|e| AssetError::Decode {
        identity: abbreviate(identity),
        reason: e.to_string(),
    })?;

    let (width, height) = source.dimensions();
    let (out_w, out_h) = resolve_dimensions(width, height, request.resize_width);
    let raster = if (out_w, out_h) == (width, height) {
        source
    } else {
        if out_w as u64 * out_h as u64 > MAX_OUTPUT_PIXELS {
            debug!(
                "Refusing {}x{} output for {}: over {} pixels",
                out_w,
                out_h,
                abbreviate(identity),
                MAX_OUTPUT_PIXELS
            );
            return Err(conversion_error(identity, request.format));
        }
        debug!("Resizing {}x{} -> {}x{}", width, height, out_w, out_h);
        source.resize_exact(out_w, out_h, FilterType::CatmullRom)
    };

    let encoded = encode(&raster, request.format).map_err(|e| {
        debug!("Encoder error for {}: {}", abbreviate(identity), e);
        conversion_error(identity, request.format)
    })?;

    if encoded.is_empty() {
        return Err(conversion_error(identity, request.format));
    }
    Ok(encoded)
}

fn conversion_error(identity: &str, format: TargetFormat) -> AssetError {
    AssetError::Conversion {
        identity: abbreviate(identity),
        format: format.to_string(),
    }
}

fn encode(raster: &DynamicImage, format: TargetFormat) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        TargetFormat::Png => raster.write_with_encoder(PngEncoder::new(&mut buf))?,
        TargetFormat::Jpeg => {
            let quality = (ENCODE_QUALITY * 100.0).round() as u8;
            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(raster.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?
        }
        TargetFormat::Webp => DynamicImage::ImageRgba8(raster.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut buf))?,
        TargetFormat::Bmp => DynamicImage::ImageRgba8(raster.to_rgba8())
            .write_with_encoder(BmpEncoder::new(&mut buf))?,
    }
    Ok(buf)
}

/// Turns asset identities into re-encoded raster payloads
pub struct ConversionEngine {
    fetcher: Arc<dyn Fetcher>,
    enforce_cross_origin: bool,
}

impl ConversionEngine {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &Config) -> Self {
        Self {
            fetcher,
            enforce_cross_origin: config.enforce_cross_origin,
        }
    }

    /// Fetches, decodes and re-encodes one asset
    ///
    /// # Errors
    /// - `AssetError::Decode` if the resource cannot be loaded as an image
    /// - `AssetError::Conversion` if the requested size is too large or the
    ///   encoder yields no payload
    pub async fn convert(
        &self,
        identity: &str,
        request: &ConversionRequest,
    ) -> Result<Vec<u8>, AssetError> {
        let decode_error = |reason: String| AssetError::Decode {
            identity: abbreviate(identity),
            reason,
        };

        let resource = fetch_resource(self.fetcher.as_ref(), identity)
            .await
            .map_err(|e| decode_error(e.to_string()))?;

        if self.enforce_cross_origin && !resource.shareable {
            return Err(decode_error(
                "cross-origin response without sharing headers cannot be re-encoded".to_string(),
            ));
        }

        if let Some(ref content_type) = resource.content_type {
            if !is_raster_candidate(content_type) {
                return Err(decode_error(format!("resource is not an image ({})", content_type)));
            }
        }

        let owned_identity = identity.to_string();
        let request = *request;
        tokio::task::spawn_blocking(move || {
            raster_pipeline(&owned_identity, &resource.bytes, &request)
        })
        .await
        .map_err(|e| decode_error(format!("conversion task failed: {}", e)))?
    }
}

fn is_raster_candidate(content_type: &str) -> bool {
    content_type.starts_with("image/")
        || content_type == "application/octet-stream"
        || content_type == "binary/octet-stream"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{png_bytes, StaticFetcher};

    fn engine(fetcher: StaticFetcher, enforce_cross_origin: bool) -> ConversionEngine {
        let config = Config {
            enforce_cross_origin,
            ..Default::default()
        };
        ConversionEngine::new(Arc::new(fetcher), &config)
    }

    #[test]
    fn test_resolve_dimensions() {
        assert_eq!(resolve_dimensions(800, 600, Some(400)), (400, 300));
        assert_eq!(resolve_dimensions(640, 480, None), (640, 480));
        assert_eq!(resolve_dimensions(640, 480, Some(0)), (640, 480));
        // 333 * 100 / 300 = 111
        assert_eq!(resolve_dimensions(300, 100, Some(333)), (333, 111));
        assert_eq!(resolve_dimensions(1000, 1, Some(10)), (10, 1));
    }

    #[test]
    fn test_resize_keeps_aspect_ratio_within_a_pixel() {
        for (w, h, target) in [(800, 600, 123), (37, 91, 50), (1920, 1080, 640), (7, 3, 1000)] {
            let (out_w, out_h) = resolve_dimensions(w, h, Some(target));
            assert_eq!(out_w, target);
            let exact = target as f64 * h as f64 / w as f64;
            assert!((out_h as f64 - exact).abs() <= 0.5, "{}x{} -> {}", w, h, target);
        }
    }

    #[test]
    fn test_pipeline_reencodes_to_every_format() {
        let source = png_bytes(40, 20);
        for format in [TargetFormat::Png, TargetFormat::Jpeg, TargetFormat::Webp, TargetFormat::Bmp] {
            let out = raster_pipeline("fixture", &source, &ConversionRequest::new(format)).unwrap();
            let decoded = image::load_from_memory(&out).unwrap();
            assert_eq!(decoded.dimensions(), (40, 20), "{}", format);
        }
    }

    #[test]
    fn test_pipeline_rejects_non_images() {
        let err = raster_pipeline("fixture", b"<html></html>", &ConversionRequest::new(TargetFormat::Png))
            .unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }

    #[test]
    fn test_oversized_resize_is_a_conversion_failure() {
        let source = png_bytes(1, 2);
        for width in [u32::MAX, 20_000] {
            let request = ConversionRequest::new(TargetFormat::Png).with_resize(Some(width));
            let err = raster_pipeline("fixture", &source, &request).unwrap_err();
            assert!(matches!(err, AssetError::Conversion { .. }), "{}: {}", width, err);
        }

        // 64 x 128 stays well under the cap
        let request = ConversionRequest::new(TargetFormat::Png).with_resize(Some(64));
        assert!(raster_pipeline("fixture", &source, &request).is_ok());
    }

    #[tokio::test]
    async fn test_convert_with_resize() {
        let fetcher = StaticFetcher::new().with_resource(
            "https://a.test/wide.png",
            png_bytes(200, 50),
            Some("image/png"),
        );
        let out = engine(fetcher, false)
            .convert(
                "https://a.test/wide.png",
                &ConversionRequest::new(TargetFormat::Jpeg).with_resize(Some(80)),
            )
            .await
            .unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (80, 20));
        assert_eq!(image::guess_format(&out).unwrap(), image::ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_convert_data_uri() {
        use base64::Engine;
        let payload = base64::engine::general_purpose::STANDARD.encode(png_bytes(4, 4));
        let identity = format!("data:image/png;base64,{}", payload);

        let out = engine(StaticFetcher::new(), true)
            .convert(&identity, &ConversionRequest::new(TargetFormat::Webp))
            .await
            .unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), image::ImageFormat::WebP);
    }

    #[tokio::test]
    async fn test_decode_failures() {
        let fetcher = StaticFetcher::new()
            .with_resource("https://a.test/page.png", b"<html/>".to_vec(), Some("text/html"))
            .with_resource("https://a.test/clip.mp4", vec![0, 0, 0, 24], Some("video/mp4"))
            .with_resource("https://a.test/garbage", vec![1, 2, 3], None);
        let engine = engine(fetcher, false);
        let request = ConversionRequest::new(TargetFormat::Png);

        for identity in [
            "https://a.test/page.png",
            "https://a.test/clip.mp4",
            "https://a.test/garbage",
            "https://a.test/missing.png",
        ] {
            let err = engine.convert(identity, &request).await.unwrap_err();
            assert!(matches!(err, AssetError::Decode { .. }), "{}: {}", identity, err);
        }
    }

    #[tokio::test]
    async fn test_cross_origin_capability_check() {
        let fetcher = StaticFetcher::new()
            .with_resource("https://other.test/private.png", png_bytes(2, 2), Some("image/png"))
            .with_shared_resource("https://other.test/public.png", png_bytes(2, 2), Some("image/png"));
        let engine = engine(fetcher, true);
        let request = ConversionRequest::new(TargetFormat::Png);

        let err = engine
            .convert("https://other.test/private.png", &request)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cross-origin"));
        assert!(engine.convert("https://other.test/public.png", &request).await.is_ok());
    }

    #[test]
    fn test_target_format_parsing() {
        assert_eq!("image/jpeg".parse::<TargetFormat>().unwrap(), TargetFormat::Jpeg);
        assert_eq!("WEBP".parse::<TargetFormat>().unwrap().extension(), "webp");
        assert!(matches!(
            "gif".parse::<TargetFormat>(),
            Err(AssetError::UnsupportedFormat(_))
        ));
        assert!(TargetFormat::Png.is_lossless());
        assert!(!TargetFormat::Jpeg.is_lossless());
    }
}

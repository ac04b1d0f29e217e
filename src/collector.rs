//! # Asset Collector Module
//!
//! Adattatori che trasformano i risultati eterogenei della scansione di una
//! pagina in `AssetRecord` normalizzati e deduplicati.
//!
//! ## Contratto:
//! - Sequenza ordinata di tuple `(identity, kind, source)`
//! - Deduplicazione first-seen-wins: la prima sorgente registrata vince,
//!   i duplicati successivi vengono scartati interamente
//! - Esclusi identificatori vuoti e schemi parziali non ammessi
//!   (`blob:`, `javascript:`, `about:`, `#fragment`)
//!
//! ## Adattatori disponibili:
//! - `ManifestCollector`: file JSON prodotto da uno scanner esterno
//! - `HtmlCollector`: scansione statica di un documento HTML

use crate::asset::{is_data_uri, AssetKind, AssetRecord, DiscoverySource};
use anyhow::{Context, Result};
use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// One raw discovery as emitted by a page scanner
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawDiscovery {
    #[serde(alias = "src")]
    pub identity: String,
    #[serde(alias = "type")]
    pub kind: AssetKind,
    #[serde(alias = "source", rename = "discoverySource")]
    pub source: DiscoverySource,
}

impl RawDiscovery {
    pub fn new(identity: impl Into<String>, kind: AssetKind, source: DiscoverySource) -> Self {
        Self {
            identity: identity.into(),
            kind,
            source,
        }
    }
}

/// Produces the canonical record set for a working session
pub trait AssetCollector {
    fn collect(&self) -> Result<Vec<AssetRecord>>;
}

/// First-seen-wins deduplication; drops empty identities
pub fn dedupe_discoveries<I>(discoveries: I) -> Vec<AssetRecord>
where
    I: IntoIterator<Item = RawDiscovery>,
{
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for discovery in discoveries {
        let identity = discovery.identity.trim();
        if identity.is_empty() || !seen.insert(identity.to_string()) {
            continue;
        }
        records.push(AssetRecord::new(identity, discovery.kind, discovery.source));
    }

    records
}

/// Reads a JSON array of raw discoveries from disk
pub struct ManifestCollector {
    path: PathBuf,
}

impl ManifestCollector {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn parse(content: &str) -> Result<Vec<AssetRecord>> {
        let raw: Vec<RawDiscovery> =
            serde_json::from_str(content).context("Invalid asset manifest")?;
        let total = raw.len();
        let accepted = raw
            .into_iter()
            .filter(|d| is_allowed_identity(d.identity.trim()));
        let records = dedupe_discoveries(accepted);
        debug!("Manifest listed {} discoveries, {} unique", total, records.len());
        Ok(records)
    }
}

impl AssetCollector for ManifestCollector {
    fn collect(&self) -> Result<Vec<AssetRecord>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read manifest {}", self.path.display()))?;
        let records = Self::parse(&content)?;
        info!("Loaded {} assets from {}", records.len(), self.path.display());
        Ok(records)
    }
}

/// Static scanner over an HTML document
pub struct HtmlCollector {
    html: String,
    base_url: Option<Url>,
}

impl HtmlCollector {
    pub fn new(html: impl Into<String>, base_url: Option<Url>) -> Self {
        Self {
            html: html.into(),
            base_url,
        }
    }

    pub fn from_file(path: &Path, base_url: Option<Url>) -> Result<Self> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document {}", path.display()))?;
        Ok(Self::new(html, base_url))
    }

    fn scan(&self) -> Result<Vec<RawDiscovery>> {
        let document = Html::parse_document(&self.html);
        let mut found = Vec::new();

        let mut push = |raw: &str, kind: AssetKind, source: DiscoverySource| {
            if let Some(identity) = normalize_identity(raw, self.base_url.as_ref()) {
                found.push(RawDiscovery::new(identity, kind, source));
            }
        };

        // 1. Embedded images
        for img in document.select(&selector("img[src]")?) {
            if let Some(src) = img.value().attr("src") {
                push(src, AssetKind::Image, DiscoverySource::DocumentEmbeddedElement);
            }
        }

        // 2. Background images declared in inline styles
        for el in document.select(&selector("[style]")?) {
            if let Some(url) = el.value().attr("style").and_then(background_image_url) {
                push(&url, AssetKind::Image, DiscoverySource::ComputedStyleBackground);
            }
        }

        // 3. Social and microdata meta tags
        for css in [
            r#"meta[property="og:image"]"#,
            r#"meta[name="twitter:image"]"#,
            r#"meta[itemprop="image"]"#,
        ] {
            for meta in document.select(&selector(css)?) {
                if let Some(content) = meta.value().attr("content") {
                    push(content, AssetKind::Image, DiscoverySource::MetadataTag);
                }
            }
        }

        // 4. Favicons
        for css in [r#"link[rel~="icon"]"#, r#"link[rel~="apple-touch-icon"]"#] {
            for link in document.select(&selector(css)?) {
                if let Some(href) = link.value().attr("href") {
                    push(href, AssetKind::Image, DiscoverySource::LinkIcon);
                }
            }
        }

        // 5. Video tracks
        for video in document.select(&selector("video[src], video source[src]")?) {
            if let Some(src) = video.value().attr("src") {
                push(src, AssetKind::Video, DiscoverySource::VideoTrack);
            }
        }

        Ok(found)
    }
}

impl AssetCollector for HtmlCollector {
    fn collect(&self) -> Result<Vec<AssetRecord>> {
        let discoveries = self.scan()?;
        let total = discoveries.len();
        let records = dedupe_discoveries(discoveries);
        info!("Scanned document: {} discoveries, {} unique assets", total, records.len());
        Ok(records)
    }
}

fn selector(css: &'static str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid selector {}: {:?}", css, e))
}

/// First `url(...)` of a background declaration in an inline style
fn background_image_url(style: &str) -> Option<String> {
    let lower = style.to_ascii_lowercase();
    let declaration = lower.find("background")?;
    let open = declaration + lower[declaration..].find("url(")? + "url(".len();
    let close = open + style[open..].find(')')?;
    let url = style[open..close]
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

fn is_allowed_identity(identity: &str) -> bool {
    if identity.is_empty() || identity.starts_with('#') {
        return false;
    }
    let lower = identity.to_ascii_lowercase();
    !["blob:", "javascript:", "about:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Resolves a raw locator to an absolute identity, or rejects it
pub fn normalize_identity(raw: &str, base_url: Option<&Url>) -> Option<String> {
    let cleaned = raw.trim().to_string();
    if !is_allowed_identity(&cleaned) {
        return None;
    }
    if is_data_uri(&cleaned) {
        return Some(cleaned);
    }

    let parsed = if let Some(rest) = cleaned.strip_prefix("//") {
        let scheme = base_url.map(|b| b.scheme()).unwrap_or("https");
        Url::parse(&format!("{}://{}", scheme, rest)).ok()?
    } else if let Ok(url) = Url::parse(&cleaned) {
        url
    } else {
        base_url?.join(&cleaned).ok()?
    };

    match parsed.scheme() {
        "http" | "https" => Some(parsed.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head>
            <meta property="og:image" content="https://cdn.test/og.jpg">
            <meta name="twitter:image" content="/hero.png">
            <link rel="shortcut icon" href="/favicon.ico">
            <link rel="apple-touch-icon" href="/touch.png">
          </head>
          <body>
            <img src="/hero.png">
            <img src="">
            <img src="blob:https://site.test/123">
            <img src="data:image/gif;base64,R0lGODlhAQABAAAAACw=">
            <div style="color: red; background-image: url('//cdn.test/bg.webp')"></div>
            <section style="background: #000 url(&quot;/tile.svg&quot;) repeat"></section>
            <video src="/clip.mp4"><source src="/clip.webm"></video>
            <img src="https://cdn.test/og.jpg">
          </body>
        </html>
    "#;

    fn base() -> Url {
        Url::parse("https://site.test/gallery/index.html").unwrap()
    }

    #[test]
    fn test_attribute_entities_are_decoded_once() {
        let page = r#"<img src="https://a.test/x.png?a=1&amp;b=2">
                      <img src="https://a.test/y.png?q=&amp;amp;">"#;
        let records = HtmlCollector::new(page, None).collect().unwrap();
        let identities: Vec<&str> = records.iter().map(|r| r.identity.as_str()).collect();

        assert_eq!(
            identities,
            vec!["https://a.test/x.png?a=1&b=2", "https://a.test/y.png?q=&amp;"]
        );
    }

    #[test]
    fn test_dedupe_keeps_first_source() {
        let records = dedupe_discoveries(vec![
            RawDiscovery::new("https://a.test/1.png", AssetKind::Image, DiscoverySource::MetadataTag),
            RawDiscovery::new("https://a.test/2.png", AssetKind::Image, DiscoverySource::DocumentEmbeddedElement),
            RawDiscovery::new("https://a.test/1.png", AssetKind::Image, DiscoverySource::DocumentEmbeddedElement),
            RawDiscovery::new("  ", AssetKind::Image, DiscoverySource::DocumentEmbeddedElement),
        ]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].identity, "https://a.test/1.png");
        assert_eq!(records[0].source, DiscoverySource::MetadataTag);
    }

    #[test]
    fn test_html_scan_order_and_sources() {
        let records = HtmlCollector::new(PAGE, Some(base())).collect().unwrap();
        let summary: Vec<(&str, DiscoverySource)> = records
            .iter()
            .map(|r| (r.identity.as_str(), r.source))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("https://site.test/hero.png", DiscoverySource::DocumentEmbeddedElement),
                ("data:image/gif;base64,R0lGODlhAQABAAAAACw=", DiscoverySource::DocumentEmbeddedElement),
                ("https://cdn.test/og.jpg", DiscoverySource::DocumentEmbeddedElement),
                ("https://cdn.test/bg.webp", DiscoverySource::ComputedStyleBackground),
                ("https://site.test/tile.svg", DiscoverySource::ComputedStyleBackground),
                ("https://site.test/favicon.ico", DiscoverySource::LinkIcon),
                ("https://site.test/touch.png", DiscoverySource::LinkIcon),
                ("https://site.test/clip.mp4", DiscoverySource::VideoTrack),
                ("https://site.test/clip.webm", DiscoverySource::VideoTrack),
            ]
        );
        assert!(records
            .iter()
            .filter(|r| r.source == DiscoverySource::VideoTrack)
            .all(|r| r.kind == AssetKind::Video));
    }

    #[test]
    fn test_relative_locators_need_a_base() {
        assert_eq!(normalize_identity("/x.png", None), None);
        assert_eq!(
            normalize_identity("//cdn.test/x.png", None).as_deref(),
            Some("https://cdn.test/x.png")
        );
        assert_eq!(
            normalize_identity("img/x.png", Some(&base())).as_deref(),
            Some("https://site.test/gallery/img/x.png")
        );
    }

    #[test]
    fn test_disallowed_schemes_are_excluded() {
        for raw in ["", "#top", "javascript:void(0)", "blob:https://a/1", "about:blank", "ftp://a.test/x.png"] {
            assert_eq!(normalize_identity(raw, Some(&base())), None, "{}", raw);
        }
    }

    #[test]
    fn test_background_url_extraction() {
        assert_eq!(
            background_image_url("background-image: url(\"a.png\")").as_deref(),
            Some("a.png")
        );
        assert_eq!(background_image_url("color: red"), None);
        assert_eq!(background_image_url("background: url()"), None);
    }

    #[test]
    fn test_manifest_accepts_scanner_field_names() {
        let manifest = r#"[
            {"src": "https://a.test/1.png", "type": "image", "source": "img"},
            {"identity": "https://a.test/1.png", "kind": "image", "discoverySource": "meta"},
            {"identity": "blob:https://a.test/9", "kind": "image", "discoverySource": "img"},
            {"identity": "https://a.test/v.mp4", "kind": "video", "discoverySource": "video-track"}
        ]"#;
        let records = ManifestCollector::parse(manifest).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source, DiscoverySource::DocumentEmbeddedElement);
        assert_eq!(records[1].kind, AssetKind::Video);
    }

    #[test]
    fn test_manifest_collect_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets.json");
        std::fs::write(&path, r#"[{"src": "https://a.test/x.gif", "type": "image", "source": "css"}]"#).unwrap();

        let records = ManifestCollector::new(&path).collect().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, DiscoverySource::ComputedStyleBackground);

        assert!(ManifestCollector::new(dir.path().join("missing.json")).collect().is_err());
    }
}

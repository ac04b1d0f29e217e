//! # Entry Naming Module
//!
//! Centralizza il calcolo dei nomi delle entry e degli archivi.
//! Evita duplicazione tra orchestratore, worker e download singolo.

use crate::asset::extension_token;
use crate::batch::job::BatchOperation;
use tracing::debug;

/// Prefix used when the job supplies an empty one
pub const DEFAULT_PREFIX: &str = "image";
/// Extension used when neither content type nor identity yields a usable one
pub const FALLBACK_EXTENSION: &str = "jpg";
/// Stem of the single-target conversion download
pub const SINGLE_CONVERSION_STEM: &str = "converted_image";

/// Trimmed prefix, or `image` when nothing is left
pub fn effective_prefix(prefix: &str) -> &str {
    let trimmed = prefix.trim();
    if trimmed.is_empty() {
        DEFAULT_PREFIX
    } else {
        trimmed
    }
}

/// `{prefix}_{index + 1}.{ext}`; the index is the target's position in the job
pub fn entry_name(prefix: &str, index: usize, extension: &str) -> String {
    format!("{}_{}.{}", effective_prefix(prefix), index + 1, extension)
}

/// Archive file name for a finished job
pub fn archive_file_name(operation: BatchOperation, extension: &str) -> String {
    match operation {
        BatchOperation::Download => "images.zip".to_string(),
        BatchOperation::Convert => format!("converted_{}.zip", extension),
    }
}

pub fn single_conversion_name(extension: &str) -> String {
    format!("{}.{}", SINGLE_CONVERSION_STEM, extension)
}

/// Extension for a raw download.
///
/// The declared content type wins; otherwise the identity's extension token
/// is used, falling back to `jpg` when it is empty, longer than 4 chars or
/// not purely ASCII alphanumeric (a path tail such as `co/x`).
pub fn derive_extension(content_type: Option<&str>, identity: &str) -> String {
    if let Some(ext) = content_type.and_then(extension_for_media_type) {
        return ext.to_string();
    }

    let token = extension_token(identity);
    let usable = !token.is_empty()
        && token.chars().count() <= 4
        && token.chars().all(|c| c.is_ascii_alphanumeric());
    if !usable {
        debug!("No usable extension in {}, using {}", identity, FALLBACK_EXTENSION);
        FALLBACK_EXTENSION.to_string()
    } else {
        token
    }
}

fn extension_for_media_type(media_type: &str) -> Option<&'static str> {
    let ext = match media_type {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" | "image/apng" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/bmp" | "image/x-ms-bmp" => "bmp",
        "image/svg+xml" => "svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "image/tiff" => "tiff",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/ogg" => "ogv",
        "video/quicktime" => "mov",
        _ => return None,
    };
    Some(ext)
}

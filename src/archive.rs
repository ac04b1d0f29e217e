//! # Archive Sink Module
//!
//! Riceve payload nominati e produce un unico archivio scaricabile.
//!
//! ## Contratto:
//! - Input: `ArchiveRequest` (nome file di default + entry ordinate)
//! - Output: `Archive` (byte dell'archivio + nome suggerito)
//! - Errori del sink → `AssetError::ArchiveGeneration`, fatali per il job
//!
//! ## Determinismo:
//! Le entry vengono scritte nell'ordine ricevuto, con timestamp fisso,
//! quindi lo stesso input produce sempre gli stessi byte.

use crate::error::AssetError;
use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// One named payload destined for the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRequest {
    pub file_name: String,
    pub entries: Vec<ArchiveEntry>,
}

/// A finished, downloadable archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub trait ArchiveSink: Send + Sync {
    fn finalize(&self, request: ArchiveRequest) -> Result<Archive, AssetError>;
}

/// Zip implementation of the archive sink
#[derive(Debug, Clone, Default)]
pub struct ZipArchiveSink {
    folder: Option<String>,
}

impl ZipArchiveSink {
    /// Entries are placed under `folder/` when given
    pub fn new(folder: Option<String>) -> Self {
        Self {
            folder: folder.map(|f| f.trim_matches('/').to_string()).filter(|f| !f.is_empty()),
        }
    }

    fn entry_path(&self, name: &str) -> String {
        match self.folder {
            Some(ref folder) => format!("{}/{}", folder, name),
            None => name.to_string(),
        }
    }

    /// Writes the entries into `inner` and hands it back finished.
    /// Every failure, I/O included, is an archive generation failure.
    fn write_zip<W: Write + Seek>(&self, inner: W, entries: &[ArchiveEntry]) -> Result<W, AssetError> {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        let mut writer = ZipWriter::new(inner);
        if let Some(ref folder) = self.folder {
            writer.add_directory(folder.as_str(), options)?;
        }

        let mut names = HashSet::new();
        for entry in entries {
            let path = self.entry_path(&entry.name);
            if !names.insert(path.clone()) {
                return Err(AssetError::ArchiveGeneration(format!("duplicate entry {}", path)));
            }
            writer.start_file(path.as_str(), options)?;
            writer
                .write_all(&entry.bytes)
                .map_err(|e| AssetError::ArchiveGeneration(format!("writing {}: {}", path, e)))?;
        }

        Ok(writer.finish()?)
    }
}

impl ArchiveSink for ZipArchiveSink {
    fn finalize(&self, request: ArchiveRequest) -> Result<Archive, AssetError> {
        let bytes = self
            .write_zip(Cursor::new(Vec::new()), &request.entries)?
            .into_inner();
        Ok(Archive {
            file_name: request.file_name,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read, SeekFrom};
    use zip::ZipArchive;

    /// In-memory target that runs out of space after `limit` bytes
    #[derive(Debug)]
    struct FullDisk {
        inner: Cursor<Vec<u8>>,
        limit: u64,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.inner.position() + buf.len() as u64 > self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FullDisk {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    /// Incompressible filler so the deflater has to flush while writing
    fn noise(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x2545_f491;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect()
    }

    fn entry(name: &str, bytes: &[u8]) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    fn request(entries: Vec<ArchiveEntry>) -> ArchiveRequest {
        ArchiveRequest {
            file_name: "images.zip".to_string(),
            entries,
        }
    }

    #[test]
    fn test_entries_land_in_folder() {
        let sink = ZipArchiveSink::new(Some("images".to_string()));
        let archive = sink
            .finalize(request(vec![entry("image_1.png", b"one"), entry("image_3.png", b"three")]))
            .unwrap();
        assert_eq!(archive.file_name, "images.zip");

        let mut zip = ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["images/", "images/image_1.png", "images/image_3.png"]);

        let mut content = String::new();
        zip.by_name("images/image_3.png")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "three");
    }

    #[test]
    fn test_empty_archive_is_still_produced() {
        let archive = ZipArchiveSink::new(None).finalize(request(Vec::new())).unwrap();
        let zip = ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
        assert_eq!(zip.len(), 0);
    }

    #[test]
    fn test_output_is_deterministic() {
        let sink = ZipArchiveSink::new(Some("/images/".to_string()));
        let make = || request(vec![entry("a.jpg", b"aaaa"), entry("b.jpg", b"bbbb")]);
        assert_eq!(sink.finalize(make()).unwrap(), sink.finalize(make()).unwrap());
    }

    #[test]
    fn test_write_failures_are_fatal_archive_errors() {
        let sink = ZipArchiveSink::new(Some("images".to_string()));
        let target = FullDisk {
            inner: Cursor::new(Vec::new()),
            limit: 4096,
        };

        let err = sink
            .write_zip(target, &[entry("image_1.png", &noise(256 * 1024))])
            .unwrap_err();
        assert!(matches!(err, AssetError::ArchiveGeneration(_)), "{}", err);
        assert!(err.is_fatal_to_job());
    }

    #[test]
    fn test_duplicate_names_fail() {
        let err = ZipArchiveSink::new(None)
            .finalize(request(vec![entry("x.png", b"1"), entry("x.png", b"2")]))
            .unwrap_err();
        assert!(matches!(err, AssetError::ArchiveGeneration(_)));
    }
}

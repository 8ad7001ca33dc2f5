//! Extraction of the PGN record file from a downloaded archive.
//!
//! Player archives are normally ZIP files holding a single `.pgn` entry.
//! A zstd-compressed PGN file and an already-plain PGN payload are
//! accepted as well, detected by their leading bytes.

use std::io::{Cursor, Read};

use crate::ArchiveFailure;

/// File-name suffix of the record file inside an archive.
pub const DEFAULT_RECORD_SUFFIX: &str = ".pgn";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Container format of a downloaded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Zstd,
    PlainText,
}

/// Detects the payload format from its leading bytes.
#[must_use]
pub fn detect_format(bytes: &[u8]) -> Option<ArchiveFormat> {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(ZIP_EMPTY_MAGIC) {
        return Some(ArchiveFormat::Zip);
    }
    if bytes.starts_with(ZSTD_MAGIC) {
        return Some(ArchiveFormat::Zstd);
    }

    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    body.iter()
        .find(|b| !b.is_ascii_whitespace())
        .filter(|&&b| b == b'[')
        .map(|_| ArchiveFormat::PlainText)
}

/// Returns the PGN text contained in `bytes`.
///
/// For ZIP payloads the first entry whose name ends with `suffix`
/// (case-insensitive) is read in full. Nothing is returned unless the
/// whole entry was read and decoded.
///
/// # Errors
///
/// Returns [`ArchiveFailure`] if the payload is not a recognized format,
/// the archive cannot be opened, no entry matches `suffix`, or the entry
/// cannot be read.
pub fn extract(bytes: &[u8], suffix: &str) -> Result<String, ArchiveFailure> {
    let raw = match detect_format(bytes) {
        Some(ArchiveFormat::Zip) => extract_zip_entry(bytes, suffix)?,
        Some(ArchiveFormat::Zstd) => {
            zstd::decode_all(bytes).map_err(|e| ArchiveFailure::EntryRead {
                entry: "<zstd stream>".to_string(),
                message: e.to_string(),
            })?
        }
        Some(ArchiveFormat::PlainText) => bytes.to_vec(),
        None => {
            return Err(ArchiveFailure::Unreadable(format!(
                "unrecognized payload ({} bytes)",
                bytes.len()
            )));
        }
    };

    Ok(decode_text(raw))
}

fn extract_zip_entry(bytes: &[u8], suffix: &str) -> Result<Vec<u8>, ArchiveFailure> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ArchiveFailure::Unreadable(e.to_string()))?;

    let suffix_lower = suffix.to_ascii_lowercase();
    let mut entries = Vec::with_capacity(archive.len());
    let mut matched: Option<usize> = None;

    for i in 0..archive.len() {
        let name = match archive.by_index(i) {
            Ok(entry) => entry.name().to_string(),
            Err(e) => {
                log::warn!("  skipping corrupt zip entry {i}: {e}");
                continue;
            }
        };

        if name.to_ascii_lowercase().ends_with(&suffix_lower) {
            if matched.is_some() {
                log::warn!("  ignoring extra record file '{name}'");
            } else {
                matched = Some(i);
            }
        }
        entries.push(name);
    }

    let Some(i) = matched else {
        return Err(ArchiveFailure::MissingEntry {
            suffix: suffix.to_string(),
            entries,
        });
    };

    let mut entry = archive
        .by_index(i)
        .map_err(|e| ArchiveFailure::Unreadable(e.to_string()))?;
    let name = entry.name().to_string();
    let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry
        .read_to_end(&mut buf)
        .map_err(|e| ArchiveFailure::EntryRead {
            entry: name.clone(),
            message: e.to_string(),
        })?;

    log::debug!("  extracted '{name}' ({} bytes)", buf.len());
    Ok(buf)
}

/// Decodes record bytes as UTF-8, falling back to Latin-1 for archives
/// produced by older tooling.
fn decode_text(mut raw: Vec<u8>) -> String {
    if raw.starts_with(UTF8_BOM) {
        raw.drain(..UTF8_BOM.len());
    }
    match String::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&b| char::from(b)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const PGN: &str = "[Event \"Test\"]\n[White \"A\"]\n[Black \"B\"]\n\n1. e4 e5 1-0\n";

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_pgn_entry_from_zip() {
        let bytes = zip_with(&[("readme.txt", b"hello"), ("Carlsen.PGN", PGN.as_bytes())]);
        let text = extract(&bytes, DEFAULT_RECORD_SUFFIX).unwrap();
        assert_eq!(text, PGN);
    }

    #[test]
    fn missing_entry_is_a_failure() {
        let bytes = zip_with(&[("readme.txt", b"hello")]);
        let err = extract(&bytes, DEFAULT_RECORD_SUFFIX).unwrap_err();
        assert_eq!(
            err,
            ArchiveFailure::MissingEntry {
                suffix: ".pgn".to_string(),
                entries: vec!["readme.txt".to_string()],
            }
        );
    }

    #[test]
    fn truncated_zip_is_unreadable() {
        let bytes = zip_with(&[("a.pgn", PGN.as_bytes())]);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(extract(truncated, DEFAULT_RECORD_SUFFIX).is_err());
    }

    #[test]
    fn garbage_is_unreadable() {
        let err = extract(b"<html>404</html>", DEFAULT_RECORD_SUFFIX).unwrap_err();
        assert!(matches!(err, ArchiveFailure::Unreadable(_)));
    }

    #[test]
    fn decodes_zstd_payload() {
        let compressed = zstd::encode_all(PGN.as_bytes(), 3).unwrap();
        assert_eq!(detect_format(&compressed), Some(ArchiveFormat::Zstd));
        assert_eq!(extract(&compressed, DEFAULT_RECORD_SUFFIX).unwrap(), PGN);
    }

    #[test]
    fn accepts_plain_pgn_with_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(PGN.as_bytes());
        assert_eq!(extract(&bytes, DEFAULT_RECORD_SUFFIX).unwrap(), PGN);
    }

    #[test]
    fn falls_back_to_latin1() {
        let bytes = zip_with(&[("a.pgn", b"[White \"Tal, Mikha\xefl\"]\n\n1. e4 *\n")]);
        let text = extract(&bytes, DEFAULT_RECORD_SUFFIX).unwrap();
        assert!(text.contains("Tal, Mikhaïl"));
    }
}

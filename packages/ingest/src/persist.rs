//! Corpus persistence.
//!
//! The corpus is written to `<path>.json.tmp` and renamed into place, so a
//! crash mid-write never leaves a truncated file at `path`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write as _};
use std::path::{Path, PathBuf};

use masters_game_models::Corpus;
use serde::Serialize;

/// Errors from reading or writing the corpus file.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("corpus JSON error in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("corpus writer task failed: {0}")]
    Interrupted(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Writes `corpus` as JSON to `path`, creating parent directories.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`PersistenceError`] if any directory, write, or rename step
/// fails. On failure the previous file at `path`, if any, is untouched.
pub fn write_corpus(path: &Path, corpus: &Corpus) -> Result<u64, PersistenceError> {
    let size = write_json_atomic(path, corpus)?;

    #[allow(clippy::cast_precision_loss)]
    let size_mb = size as f64 / (1024.0 * 1024.0);
    log::info!(
        "Wrote {} records to {} ({size_mb:.1} MB)",
        corpus.records.len(),
        path.display()
    );

    Ok(size)
}

/// Serializes `value` into `<path>.json.tmp` and renames it over `path`.
///
/// The temp file is removed again if serialization or flushing fails.
fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<u64, PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let file = File::create(&tmp_path).map_err(io_error(&tmp_path))?;

    let written = {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)
            .map_err(|source| PersistenceError::Json {
                path: tmp_path.display().to_string(),
                source,
            })
            .and_then(|()| writer.flush().map_err(io_error(&tmp_path)))
    };
    if let Err(e) = written {
        if let Err(rm) = std::fs::remove_file(&tmp_path) {
            log::warn!("could not remove {}: {rm}", tmp_path.display());
        }
        return Err(e);
    }

    let size = std::fs::metadata(&tmp_path)
        .map_err(io_error(&tmp_path))?
        .len();
    std::fs::rename(&tmp_path, path).map_err(io_error(path))?;

    Ok(size)
}

/// Reads a corpus previously written by [`write_corpus`].
///
/// # Errors
///
/// Returns [`PersistenceError`] if the file cannot be opened or is not a
/// valid corpus document.
pub fn read_corpus(path: &Path) -> Result<Corpus, PersistenceError> {
    let file = File::open(path).map_err(io_error(path))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| PersistenceError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Writes `corpus` on a blocking thread and hands it back.
///
/// # Errors
///
/// Returns [`PersistenceError`] if the write fails or the blocking task
/// panics.
pub async fn write_corpus_async(
    path: PathBuf,
    corpus: Corpus,
) -> Result<(Corpus, u64), PersistenceError> {
    tokio::task::spawn_blocking(move || write_corpus(&path, &corpus).map(|size| (corpus, size)))
        .await
        .map_err(|e| PersistenceError::Interrupted(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use masters_game_models::{DeduplicationIndex, GameRecord, GameResult};

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("masters-persist-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn sample_corpus() -> Corpus {
        let mut index = DeduplicationIndex::new();
        index.check_and_insert("abc", 0);
        Corpus {
            generated_at: Utc::now(),
            records: vec![GameRecord {
                index: 0,
                white: "Carlsen, Magnus".to_string(),
                black: "Caruana, Fabiano".to_string(),
                white_rating: Some(2835),
                black_rating: None,
                result: GameResult::Draw,
                date: "2018.11.28".to_string(),
                event: "World Championship".to_string(),
                site: "London".to_string(),
                eco_code: Some("B33".to_string()),
                opening_name: None,
                move_text: "1. e4 c5".to_string(),
                ply_count: 2,
                source_tag: "Carlsen".to_string(),
                source_file: "Carlsen.zip".to_string(),
                fingerprint: "abc".to_string(),
            }],
            index,
        }
    }

    #[test]
    fn writes_and_reads_back() {
        let dir = temp_dir("roundtrip");
        let path = dir.join("nested").join("masters.json");
        let corpus = sample_corpus();

        let size = write_corpus(&path, &corpus).unwrap();
        assert!(size > 0);
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(read_corpus(&path).unwrap(), corpus);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn uses_camel_case_field_names() {
        let dir = temp_dir("fields");
        let path = dir.join("masters.json");
        write_corpus(&path, &sample_corpus()).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"generatedAt\""));
        assert!(json.contains("\"plyCount\":2"));
        assert!(json.contains("\"sourceTag\":\"Carlsen\""));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn failed_write_keeps_previous_file() {
        let dir = temp_dir("keep");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("masters.json");
        write_corpus(&path, &sample_corpus()).unwrap();
        let before = std::fs::read(&path).unwrap();

        // A directory squatting on the temp path makes the write fail.
        std::fs::create_dir_all(path.with_extension("json.tmp")).unwrap();
        assert!(write_corpus(&path, &sample_corpus()).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn failed_serialization_removes_temp_file() {
        let dir = temp_dir("cleanup");
        let path = dir.join("masters.json");
        // JSON object keys must be strings.
        let unserializable = std::collections::BTreeMap::from([((1u8, 2u8), 0u8)]);

        let err = write_json_atomic(&path, &unserializable).unwrap_err();
        assert!(matches!(err, PersistenceError::Json { .. }));
        assert!(!path.with_extension("json.tmp").exists());
        assert!(!path.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn error_message_names_the_path() {
        let err = read_corpus(Path::new("/nonexistent/masters.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/masters.json"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_corpus(Path::new("/nonexistent/masters.json")).unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
    }
}

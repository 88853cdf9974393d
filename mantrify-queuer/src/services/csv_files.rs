//! Delimited files exchanged with callers and engines
//!
//! - Job snapshot: full element sequence, `<queuer_dir>/<YYYYMMDD>/job_user<uid>_<stamp>.csv`
//! - TTS input: speech subsequence, `<tts_csv_dir>/elevenlabs_job<id>_<stamp>.csv`
//! - Concatenation input: reassembled sequence, `<concat_csv_dir>/audio_concatenator_job<id>_<stamp>.csv`

use chrono::{DateTime, Utc};
use mantrify_common::time::{date_partition, file_stamp};
use mantrify_common::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::models::Element;

const TTS_HEADER: [&str; 4] = ["id", "text", "voice_id", "speed"];
const CONCAT_HEADER: [&str; 3] = ["id", "audio_file_name_and_path", "pause_duration"];

pub const SNAPSHOT_HEADER: [&str; 6] = [
    "id",
    "text",
    "voice_id",
    "speed",
    "pause_duration",
    "sound_file",
];

/// One row of the TTS engine input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtsRow {
    pub id: String,
    pub text: String,
    pub voice_id: String,
    pub speed: String,
}

/// One row of the concatenation engine input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcatRow {
    pub id: String,
    pub audio_file_name_and_path: String,
    pub pause_duration: String,
}

/// Write the immutable job snapshot, returning its full path
///
/// A name already taken (two submissions in the same second) gets a
/// `_<n>` suffix; existing files are never overwritten.
pub fn write_job_snapshot(
    queuer_dir: &Path,
    user_id: i64,
    at: &DateTime<Utc>,
    elements: &[Element],
) -> Result<PathBuf> {
    let dir = queuer_dir.join(date_partition(at));
    std::fs::create_dir_all(&dir)?;

    let stem = format!("job_user{}_{}", user_id, file_stamp(at));
    let (path, file) = create_unique(&dir, &stem)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(SNAPSHOT_HEADER)?;
    for element in elements {
        writer.write_record([
            element.id.as_str(),
            element.text.as_deref().unwrap_or(""),
            element.voice_id.as_deref().unwrap_or(""),
            element.speed.as_ref().map(|n| n.raw.as_str()).unwrap_or(""),
            element
                .pause_duration
                .as_ref()
                .map(|n| n.raw.as_str())
                .unwrap_or(""),
            element.sound_file.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush()?;

    tracing::info!(
        path = %path.display(),
        elements = elements.len(),
        "Job snapshot written"
    );
    Ok(path)
}

/// Full path of a snapshot given its file name
///
/// The date partition is the third `_`-separated part of the name
/// (`job_user<uid>_<YYYYMMDD>_<HHMMSS>.csv`).
pub fn snapshot_path(queuer_dir: &Path, job_filename: &str) -> Result<PathBuf> {
    let date = job_filename
        .split('_')
        .nth(2)
        .filter(|part| part.len() == 8 && part.chars().all(|c| c.is_ascii_digit()))
        .ok_or_else(|| {
            Error::Internal(format!("Malformed job snapshot name: {}", job_filename))
        })?;
    Ok(queuer_dir.join(date).join(job_filename))
}

/// Read a file with the snapshot header into raw JSON-like rows
///
/// Values are trimmed and blank lines skipped. Missing columns are simply
/// absent from the row; validation happens in the normalizer.
pub fn read_element_rows(path: &Path) -> Result<Vec<Value>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::NotFound(format!("CSV file not found: {}", path.display())));
        }
        Err(e) => return Err(e.into()),
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let mut row = Map::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            if !field.is_empty() {
                row.insert(header.to_string(), Value::String(field.to_string()));
            }
        }
        rows.push(Value::Object(row));
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "Parsed element CSV");
    Ok(rows)
}

/// Write the TTS engine input file, returning its full path
pub fn write_tts_csv(
    dir: &Path,
    job_id: i64,
    at: &DateTime<Utc>,
    rows: &[TtsRow],
) -> Result<PathBuf> {
    let stem = format!("elevenlabs_job{}_{}", job_id, file_stamp(at));
    write_rows(dir, &stem, &TTS_HEADER, rows)
}

/// Write the concatenation engine input file, returning its full path
pub fn write_concat_csv(
    dir: &Path,
    job_id: i64,
    at: &DateTime<Utc>,
    rows: &[ConcatRow],
) -> Result<PathBuf> {
    let stem = format!("audio_concatenator_job{}_{}", job_id, file_stamp(at));
    write_rows(dir, &stem, &CONCAT_HEADER, rows)
}

fn write_rows<T: Serialize>(
    dir: &Path,
    stem: &str,
    header: &[&str],
    rows: &[T],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let (path, file) = create_unique(dir, stem)?;

    // Header written explicitly so an empty file still carries it
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), rows = rows.len(), "Engine input written");
    Ok(path)
}

/// Create `<stem>.csv`, or `<stem>_<n>.csv` for the first free `n`
fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, File)> {
    let mut suffix = 0u32;
    loop {
        let name = if suffix == 0 {
            format!("{}.csv", stem)
        } else {
            format!("{}_{}.csv", stem, suffix)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

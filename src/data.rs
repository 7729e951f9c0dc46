use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A single labeled parliamentary speech.
///
/// Immutable once loaded. Label semantics differ per task:
/// orientation uses 0 = left, 1 = right; governing-power uses
/// 0 = governing, 1 = opposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub speaker: String,
    pub sex: String,
    /// Speech in the source language
    pub text: String,
    /// English machine translation of the speech
    pub text_en: String,
    pub label: u8,
}

/// Selects which text field of a [`Record`] feeds a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextField {
    /// The source-language `text` field
    Original,
    /// The translated `text_en` field
    Translated,
}

impl TextField {
    pub fn select<'a>(&self, record: &'a Record) -> &'a str {
        match self {
            TextField::Original => &record.text,
            TextField::Translated => &record.text_en,
        }
    }
}

/// An ordered sequence of records with no missing fields.
pub type Dataset = Vec<Record>;

const HEADER: [&str; 6] = ["id", "speaker", "sex", "text", "text_en", "label"];

/// Loads a tab-separated dataset file.
///
/// Rows with any empty field are dropped (they violate the "no missing
/// fields" invariant) and counted in the log. A malformed header, a row
/// with the wrong column count, or a label outside {0, 1} is fatal.
///
/// # Errors
/// - `DataIntegrity` if the file cannot be read or any surviving row is malformed
pub fn load_tsv(path: &Path) -> Result<Dataset, PipelineError> {
    let file = File::open(path)
        .map_err(|e| PipelineError::DataIntegrity(format!("cannot open {}: {}", path.display(), e)))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::DataIntegrity(format!("cannot read header: {}", e)))?;
    if headers.iter().collect::<Vec<_>>() != HEADER {
        return Err(PipelineError::DataIntegrity(format!(
            "unexpected header in {}: expected {:?}, found {:?}",
            path.display(),
            HEADER,
            headers
        )));
    }

    let mut records = Vec::new();
    let mut dropped = 0usize;

    for (idx, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            PipelineError::DataIntegrity(format!("row {} in {}: {}", idx, path.display(), e))
        })?;

        if row.len() != HEADER.len() {
            return Err(PipelineError::DataIntegrity(format!(
                "row {} in {}: expected {} fields, found {}",
                idx,
                path.display(),
                HEADER.len(),
                row.len()
            )));
        }

        if row.iter().any(|field| field.trim().is_empty()) {
            dropped += 1;
            continue;
        }

        let label: u8 = row[5].trim().parse().map_err(|_| {
            PipelineError::DataIntegrity(format!(
                "row {} in {}: label '{}' is not an integer",
                idx,
                path.display(),
                &row[5]
            ))
        })?;
        if label > 1 {
            return Err(PipelineError::DataIntegrity(format!(
                "row {} in {}: label {} is outside {{0, 1}}",
                idx,
                path.display(),
                label
            )));
        }

        records.push(Record {
            id: row[0].to_string(),
            speaker: row[1].to_string(),
            sex: row[2].to_string(),
            text: row[3].to_string(),
            text_en: row[4].to_string(),
            label,
        });
    }

    if dropped > 0 {
        warn!(
            "Dropped {} record(s) with missing fields from {}",
            dropped,
            path.display()
        );
    }
    info!("Loaded {} records from {}", records.len(), path.display());

    Ok(records)
}

/// Writes a dataset partition as a comma-separated file with the original schema.
pub fn write_split_csv(records: &[Record], path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| PipelineError::Persistence(format!("cannot create {}: {}", path.display(), e)))?;

    writer
        .write_record(HEADER)
        .map_err(|e| PipelineError::Persistence(e.to_string()))?;
    for record in records {
        writer
            .write_record([
                record.id.as_str(),
                record.speaker.as_str(),
                record.sex.as_str(),
                record.text.as_str(),
                record.text_en.as_str(),
                &record.label.to_string(),
            ])
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::Persistence(e.to_string()))?;
    Ok(())
}

/// Writes zero-shot results as a comma-separated file: the original schema
/// plus the raw generated text and the extracted binary label (empty when the
/// extraction produced no label).
pub fn write_zero_shot_csv(
    records: &[Record],
    raw_outputs: &[String],
    extracted: &[Option<u8>],
    path: &Path,
) -> Result<(), PipelineError> {
    if records.len() != raw_outputs.len() || records.len() != extracted.len() {
        return Err(PipelineError::Validation(format!(
            "zero-shot column lengths disagree: {} records, {} outputs, {} labels",
            records.len(),
            raw_outputs.len(),
            extracted.len()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| PipelineError::Persistence(format!("cannot create {}: {}", path.display(), e)))?;

    let mut header: Vec<&str> = HEADER.to_vec();
    header.push("predictions");
    header.push("binary_predictions");
    writer
        .write_record(&header)
        .map_err(|e| PipelineError::Persistence(e.to_string()))?;

    for ((record, raw), label) in records.iter().zip(raw_outputs).zip(extracted) {
        let binary = label.map(|l| l.to_string()).unwrap_or_default();
        writer
            .write_record([
                record.id.as_str(),
                record.speaker.as_str(),
                record.sex.as_str(),
                record.text.as_str(),
                record.text_en.as_str(),
                &record.label.to_string(),
                raw.as_str(),
                &binary,
            ])
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::Persistence(e.to_string()))?;
    Ok(())
}

/// Per-label record counts for a dataset.
pub fn label_distribution(records: &[Record]) -> HashMap<u8, usize> {
    let mut dist = HashMap::new();
    for record in records {
        *dist.entry(record.label).or_insert(0) += 1;
    }
    dist
}

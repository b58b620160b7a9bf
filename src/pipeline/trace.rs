// Transcription tracing
// Append-only JSONL trace of every stage of a transcription request

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Stages of a transcription, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Features,
    SparseFrames,
    Contour,
    Segmentation,
    TempoSearch,
    Notation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Features => "features",
            Stage::SparseFrames => "sparse_frames",
            Stage::Contour => "contour",
            Stage::Segmentation => "segmentation",
            Stage::TempoSearch => "tempo_search",
            Stage::Notation => "notation",
        };
        f.write_str(name)
    }
}

/// A single trace entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp of when this entry was created
    pub timestamp: String,

    /// Request this entry belongs to
    pub request_id: Uuid,

    pub stage: Stage,

    /// Progress through the stage [0.0, 1.0]
    pub progress: f32,

    /// Human-readable message describing current operation
    pub message: String,

    /// Optional structured data (e.g., frame counts, chosen tempo)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Create a new trace entry with current timestamp
    pub fn new(request_id: Uuid, stage: Stage, progress: f32, message: String) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            request_id,
            stage,
            progress: progress.clamp(0.0, 1.0),
            message,
            data: None,
        }
    }

    /// Attach structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Trace writer
/// Appends entries to a JSONL file, creating it on first write
#[derive(Debug, Clone)]
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append a trace entry to the file
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        self.write_batch(std::slice::from_ref(entry))
    }

    /// Write multiple entries at once
    pub fn write_batch(&self, entries: &[TraceEntry]) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        for entry in entries {
            file.write_all(entry.to_json_line()?.as_bytes())?;
        }

        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Helper builder for creating trace entries
pub struct TraceBuilder {
    request_id: Uuid,
    stage: Stage,
}

impl TraceBuilder {
    pub fn stage(request_id: Uuid, stage: Stage) -> Self {
        TraceBuilder { request_id, stage }
    }

    /// Create a complete entry (progress = 1.0)
    pub fn complete(self, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.request_id, self.stage, 1.0, message.into())
    }
}

/// Trace of one transcription request: a writer plus the request id
#[derive(Debug, Clone)]
pub struct TranscriptionTrace {
    writer: TraceWriter,
    request_id: Uuid,
}

impl TranscriptionTrace {
    /// Start tracing a new request into `path`
    pub fn new(path: PathBuf) -> Self {
        TranscriptionTrace {
            writer: TraceWriter::new(path),
            request_id: Uuid::new_v4(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn writer(&self) -> &TraceWriter {
        &self.writer
    }

    pub fn builder(&self, stage: Stage) -> TraceBuilder {
        TraceBuilder::stage(self.request_id, stage)
    }

    /// Record a finished stage with its structured data
    pub fn complete(
        &self,
        stage: Stage,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Result<(), TraceError> {
        self.writer
            .write(&self.builder(stage).complete(message).with_data(data))
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(TraceError::from))
        .collect()
}

/// Run Log
///
/// Tamper-evident audit trail of a simulation run. Every processed command
/// becomes one JSONL entry carrying the SHA-256 hash of the previous entry,
/// so modified, deleted or reordered entries are detected by
/// [`verify_run_log`].
use crate::error::LogError;
use crate::pipeline::SimulationStepRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Destination for pipeline records
pub trait RecordSink {
    fn append(&mut self, record: &SimulationStepRecord) -> Result<(), LogError>;

    fn flush(&mut self) -> Result<(), LogError> {
        Ok(())
    }
}

/// Keeps records in memory (tests, batch runs)
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Vec<SimulationStepRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[SimulationStepRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SimulationStepRecord> {
        self.records
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &SimulationStepRecord) -> Result<(), LogError> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn append(&mut self, _record: &SimulationStepRecord) -> Result<(), LogError> {
        Ok(())
    }
}

/// A single chained entry of the run log
///
/// The record is stored as a JSON value: non-finite command fields of
/// malformed commands are written as `null` and must survive verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub record: Value,
    /// Empty for the first entry
    pub prev_hash: String,
    pub entry_hash: String,
}

impl RunLogEntry {
    fn new(
        sequence: u64,
        run_id: String,
        record: &SimulationStepRecord,
        prev_hash: String,
    ) -> Result<Self, LogError> {
        let timestamp = Utc::now();
        let record = serde_json::to_value(record)?;
        let entry_hash = compute_hash(sequence, &timestamp, &run_id, &record.to_string(), &prev_hash);

        Ok(Self {
            sequence,
            timestamp,
            run_id,
            record,
            prev_hash,
            entry_hash,
        })
    }

    /// Recompute the hash and compare with the stored one
    pub fn verify_hash(&self) -> bool {
        compute_hash(
            self.sequence,
            &self.timestamp,
            &self.run_id,
            &self.record.to_string(),
            &self.prev_hash,
        ) == self.entry_hash
    }

    /// Step number of the logged record
    pub fn step(&self) -> Option<u64> {
        self.record.get("step").and_then(Value::as_u64)
    }

    /// Source of the logged command
    pub fn source_id(&self) -> Option<&str> {
        self.record
            .get("command")
            .and_then(|command| command.get("source_id"))
            .and_then(Value::as_str)
    }

    /// Gateway disposition of the logged record
    pub fn disposition(&self) -> Option<&str> {
        self.record.get("disposition").and_then(Value::as_str)
    }

    /// Check the link to the preceding entry
    pub fn verify_chain(&self, prev_entry: &RunLogEntry) -> bool {
        self.prev_hash == prev_entry.entry_hash && self.sequence == prev_entry.sequence + 1
    }
}

fn compute_hash(
    sequence: u64,
    timestamp: &DateTime<Utc>,
    run_id: &str,
    record_json: &str,
    prev_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(timestamp.to_rfc3339().as_bytes());
    hasher.update(run_id.as_bytes());
    hasher.update(record_json.as_bytes());
    hasher.update(prev_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Append-only JSONL writer with hash chaining
pub struct RunLogger {
    run_id: String,
    log_path: PathBuf,
    writer: BufWriter<File>,
    sequence: u64,
    last_hash: String,
}

impl RunLogger {
    /// Create `<log_dir>/<run_id>_<timestamp>.jsonl` (default dir: `run_logs/`)
    pub fn new(run_id: impl Into<String>, log_dir: Option<PathBuf>) -> Result<Self, LogError> {
        let run_id = run_id.into();
        let log_dir = log_dir.unwrap_or_else(|| PathBuf::from("run_logs"));
        std::fs::create_dir_all(&log_dir)?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("{}_{}.jsonl", run_id, timestamp));

        let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

        Ok(Self {
            run_id,
            log_path,
            writer: BufWriter::new(file),
            sequence: 0,
            last_hash: String::new(),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Number of entries written so far
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl RecordSink for RunLogger {
    fn append(&mut self, record: &SimulationStepRecord) -> Result<(), LogError> {
        let entry = RunLogEntry::new(self.sequence, self.run_id.clone(), record, self.last_hash.clone())?;

        let json = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{}", json)?;

        self.sequence += 1;
        self.last_hash = entry.entry_hash;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LogError> {
        self.writer.flush()?;
        Ok(())
    }
}

impl fmt::Debug for RunLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLogger")
            .field("run_id", &self.run_id)
            .field("log_path", &self.log_path)
            .field("sequence", &self.sequence)
            .finish()
    }
}

enum LogMessage {
    Record(Box<SimulationStepRecord>),
    Flush(oneshot::Sender<Result<(), LogError>>),
}

/// Forwards records to a [`RecordSink`] running on a tokio task.
/// The channel preserves record order.
pub struct AsyncRunLogger {
    sender: mpsc::UnboundedSender<LogMessage>,
    task: JoinHandle<Result<u64, LogError>>,
}

impl AsyncRunLogger {
    /// Spawn the writer task. Must be called from within a tokio runtime.
    pub fn spawn<S>(mut sink: S) -> Self
    where
        S: RecordSink + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<LogMessage>();

        let task = tokio::spawn(async move {
            let mut written = 0u64;
            while let Some(message) = receiver.recv().await {
                match message {
                    LogMessage::Record(record) => {
                        sink.append(&record)?;
                        written += 1;
                    }
                    LogMessage::Flush(reply) => {
                        let _ = reply.send(sink.flush());
                    }
                }
            }
            sink.flush()?;
            Ok(written)
        });

        Self { sender, task }
    }

    /// Flush everything queued so far
    pub async fn flush_async(&self) -> Result<(), LogError> {
        let (reply, done) = oneshot::channel();
        self.sender
            .send(LogMessage::Flush(reply))
            .map_err(|_| LogError::WriterClosed)?;
        done.await.map_err(|_| LogError::WriterClosed)?
    }

    /// Close the channel and wait for the writer; returns the number of records written
    pub async fn finish(self) -> Result<u64, LogError> {
        drop(self.sender);
        self.task.await.map_err(|_| LogError::WriterClosed)?
    }
}

impl RecordSink for AsyncRunLogger {
    fn append(&mut self, record: &SimulationStepRecord) -> Result<(), LogError> {
        self.sender
            .send(LogMessage::Record(Box::new(record.clone())))
            .map_err(|_| LogError::WriterClosed)
    }
}

/// Result of log verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub total_entries: usize,
    pub verified: bool,
    pub issues: Vec<String>,
}

/// Parse a run log file
pub fn read_run_log(log_path: impl AsRef<Path>) -> Result<Vec<RunLogEntry>, LogError> {
    let reader = BufReader::new(File::open(log_path)?);

    let mut entries = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|e| LogError::Malformed {
            line: index + 1,
            message: e.to_string(),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Verify hashes, chain links and sequence numbers of a run log
pub fn verify_run_log(log_path: impl AsRef<Path>) -> Result<VerificationResult, LogError> {
    let entries = read_run_log(log_path)?;
    Ok(verify_entries(&entries))
}

pub fn verify_entries(entries: &[RunLogEntry]) -> VerificationResult {
    let mut issues = Vec::new();

    if let Some(first) = entries.first()
        && !first.prev_hash.is_empty()
    {
        issues.push(format!(
            "Entry 0: First entry should have empty prev_hash, got '{}'",
            first.prev_hash
        ));
    }

    for (i, entry) in entries.iter().enumerate() {
        if !entry.verify_hash() {
            issues.push(format!("Entry {}: Hash verification failed (tampered)", i));
        }
        if entry.sequence != i as u64 {
            issues.push(format!("Entry {}: Expected sequence {}, got {}", i, i, entry.sequence));
        }
    }

    for (i, pair) in entries.windows(2).enumerate() {
        if !pair[1].verify_chain(&pair[0]) {
            issues.push(format!(
                "Entry {}: Chain verification failed (missing or reordered entry)",
                i + 1
            ));
        }
    }

    VerificationResult {
        total_entries: entries.len(),
        verified: issues.is_empty(),
        issues,
    }
}

// src/data.rs - Executed-action log
use crate::classifier::Gesture;
use chrono::{DateTime, FixedOffset, Local};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("action log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("action log CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: u64,
    pub gesture: Gesture,
    /// Description of the executed action, as shown to the user.
    pub action: String,
    pub confidence: f64,
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GestureStats {
    pub gesture: Gesture,
    pub total_uses: usize,
    pub avg_confidence: f64,
    pub last_used: DateTime<FixedOffset>,
}

/// Append-only store of executed actions. Shared between the pipeline
/// thread (writer) and the dashboard (reader).
pub trait ActionLog: Send + Sync {
    fn append(&self, gesture: Gesture, action: &str, confidence: f64)
        -> Result<ActionRecord, LogError>;

    /// Most recent first.
    fn recent(&self, limit: usize) -> Result<Vec<ActionRecord>, LogError>;

    /// Ordered by total uses, most used first.
    fn stats(&self) -> Result<Vec<GestureStats>, LogError>;
}

fn local_now() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(now.offset())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn newest_first(records: &[ActionRecord], limit: usize) -> Vec<ActionRecord> {
    records.iter().rev().take(limit).cloned().collect()
}

pub fn compute_stats(records: &[ActionRecord]) -> Vec<GestureStats> {
    let mut by_gesture: BTreeMap<Gesture, (usize, f64, DateTime<FixedOffset>)> = BTreeMap::new();
    for record in records {
        let entry = by_gesture
            .entry(record.gesture)
            .or_insert((0, 0.0, record.timestamp));
        entry.0 += 1;
        entry.1 += record.confidence;
        if record.timestamp > entry.2 {
            entry.2 = record.timestamp;
        }
    }

    let mut stats: Vec<GestureStats> = by_gesture
        .into_iter()
        .map(|(gesture, (total_uses, sum, last_used))| GestureStats {
            gesture,
            total_uses,
            avg_confidence: sum / total_uses as f64,
            last_used,
        })
        .collect();
    // Stable sort keeps the label order among ties
    stats.sort_by(|a, b| b.total_uses.cmp(&a.total_uses));
    stats
}

/// CSV file with one row per executed action. The header is written when
/// the file is created and ids continue from the rows already present.
pub struct CsvActionLog {
    path: PathBuf,
    next_id: Mutex<u64>,
}

impl CsvActionLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let existing = read_records(&path)?;
        let next_id = existing.iter().map(|r| r.id).max().map_or(1, |id| id + 1);
        info!(path = %path.display(), entries = existing.len(), "action log opened");

        Ok(Self {
            path,
            next_id: Mutex::new(next_id),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_records(path: &Path) -> Result<Vec<ActionRecord>, LogError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: ActionRecord = row?;
        records.push(record);
    }
    Ok(records)
}

impl ActionLog for CsvActionLog {
    fn append(
        &self,
        gesture: Gesture,
        action: &str,
        confidence: f64,
    ) -> Result<ActionRecord, LogError> {
        // Held across the write so concurrent appends never interleave rows
        let mut next_id = lock(&self.next_id);

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        let record = ActionRecord {
            id: *next_id,
            gesture,
            action: action.to_string(),
            confidence,
            timestamp: local_now(),
        };
        writer.serialize(&record)?;
        writer.flush()?;
        *next_id += 1;

        debug!(id = record.id, %gesture, action, "action logged");
        Ok(record)
    }

    fn recent(&self, limit: usize) -> Result<Vec<ActionRecord>, LogError> {
        let _guard = lock(&self.next_id);
        Ok(newest_first(&read_records(&self.path)?, limit))
    }

    fn stats(&self) -> Result<Vec<GestureStats>, LogError> {
        let _guard = lock(&self.next_id);
        Ok(compute_stats(&read_records(&self.path)?))
    }
}

#[derive(Debug, Default)]
pub struct MemoryActionLog {
    records: Mutex<Vec<ActionRecord>>,
}

impl MemoryActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ActionLog for MemoryActionLog {
    fn append(
        &self,
        gesture: Gesture,
        action: &str,
        confidence: f64,
    ) -> Result<ActionRecord, LogError> {
        let mut records = lock(&self.records);
        let record = ActionRecord {
            id: records.len() as u64 + 1,
            gesture,
            action: action.to_string(),
            confidence,
            timestamp: local_now(),
        };
        records.push(record.clone());
        Ok(record)
    }

    fn recent(&self, limit: usize) -> Result<Vec<ActionRecord>, LogError> {
        Ok(newest_first(&lock(&self.records), limit))
    }

    fn stats(&self) -> Result<Vec<GestureStats>, LogError> {
        Ok(compute_stats(&lock(&self.records)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("gesture_control_test_{}", uuid::Uuid::new_v4()))
            .join("actions.csv")
    }

    #[test]
    fn csv_log_round_trips_and_orders_newest_first() {
        let path = temp_log_path();
        let log = CsvActionLog::open(&path).unwrap();

        log.append(Gesture::OpenHand, "Open web browser", 0.95).unwrap();
        log.append(Gesture::ThumbsUp, "Raise system volume", 0.85).unwrap();
        log.append(Gesture::RockSign, "Refresh page (F5)", 0.82).unwrap();

        let recent = log.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, 3);
        assert_eq!(recent[0].gesture, Gesture::RockSign);
        assert_eq!(recent[1].id, 2);
        assert_eq!(recent[1].action, "Raise system volume");

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn csv_ids_continue_after_reopen() {
        let path = temp_log_path();
        {
            let log = CsvActionLog::open(&path).unwrap();
            log.append(Gesture::ClosedFist, "Close active window", 0.9).unwrap();
            log.append(Gesture::ClosedFist, "Close active window", 0.9).unwrap();
        }

        let log = CsvActionLog::open(&path).unwrap();
        let record = log.append(Gesture::TwoFingers, "Take screenshot", 0.88).unwrap();
        assert_eq!(record.id, 3);
        assert_eq!(log.recent(10).unwrap().len(), 3);

        let header = std::fs::read_to_string(&path).unwrap();
        assert_eq!(header.matches("id,gesture").count(), 1);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn timestamps_carry_an_offset() {
        let path = temp_log_path();
        let log = CsvActionLog::open(&path).unwrap();
        log.append(Gesture::OpenHand, "Open web browser", 0.95).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let row = contents.lines().nth(1).unwrap();
        let stamp = row.rsplit(',').next().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok(), "{stamp}");

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn stats_sorted_by_usage() {
        let log = MemoryActionLog::new();
        log.append(Gesture::ThumbsUp, "Raise system volume", 0.8).unwrap();
        log.append(Gesture::OpenHand, "Open web browser", 0.95).unwrap();
        log.append(Gesture::ThumbsUp, "Raise system volume", 0.9).unwrap();

        let stats = log.stats().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].gesture, Gesture::ThumbsUp);
        assert_eq!(stats[0].total_uses, 2);
        assert!((stats[0].avg_confidence - 0.85).abs() < 1e-9);
        assert_eq!(stats[1].gesture, Gesture::OpenHand);
    }

    #[test]
    fn empty_log_has_no_stats() {
        let path = temp_log_path();
        let log = CsvActionLog::open(&path).unwrap();
        assert!(log.recent(5).unwrap().is_empty());
        assert!(log.stats().unwrap().is_empty());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}

/*!
 * Benchmark Case Results
 * Finalized per-case allocation tables owned by the controller
 */

use crate::core::errors::DiagnoserError;
use crate::diagnoser::signals::BenchmarkCaseId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// One reported line: type name, sample count, total bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub name: String,
    pub count: u64,
    pub total_bytes: u64,
}

impl AllocationRow {
    pub fn new(name: impl Into<String>, count: u64, total_bytes: u64) -> Self {
        Self {
            name: name.into(),
            count,
            total_bytes,
        }
    }
}

/// Why a case has no allocation table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "details", rename_all = "snake_case")]
pub enum UnavailableReason {
    SessionCreation(String),
    ProviderConfiguration(String),
    StreamFault(String),
    ReleaseFailed(String),
    /// Closed by an external interrupt
    Cancelled,
    /// Run ended before the case stopped
    Abandoned,
}

impl From<&DiagnoserError> for UnavailableReason {
    fn from(err: &DiagnoserError) -> Self {
        match err {
            DiagnoserError::SessionCreation { .. } => {
                UnavailableReason::SessionCreation(err.to_string())
            }
            DiagnoserError::ProviderConfiguration { .. } => {
                UnavailableReason::ProviderConfiguration(err.to_string())
            }
            DiagnoserError::ResourceRelease { .. } => {
                UnavailableReason::ReleaseFailed(err.to_string())
            }
            DiagnoserError::StreamProcessingFault(_)
            | DiagnoserError::Configuration(_)
            | DiagnoserError::Io(_) => UnavailableReason::StreamFault(err.to_string()),
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::SessionCreation(msg)
            | UnavailableReason::ProviderConfiguration(msg)
            | UnavailableReason::StreamFault(msg)
            | UnavailableReason::ReleaseFailed(msg) => f.write_str(msg),
            UnavailableReason::Cancelled => f.write_str("cancelled by interrupt"),
            UnavailableReason::Abandoned => f.write_str("run ended before the case stopped"),
        }
    }
}

/// Finalized outcome of one benchmark case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum CaseResult {
    Available(Vec<AllocationRow>),
    Unavailable(UnavailableReason),
}

impl CaseResult {
    #[inline]
    pub fn is_available(&self) -> bool {
        matches!(self, CaseResult::Available(_))
    }

    /// Rows if available
    #[inline]
    pub fn rows(&self) -> Option<&[AllocationRow]> {
        match self {
            CaseResult::Available(rows) => Some(rows),
            CaseResult::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CaseEntry {
    id: BenchmarkCaseId,
    display_info: String,
    result: CaseResult,
}

/// Results of one run, in case completion order
#[derive(Debug, Clone, Default)]
pub struct ResultsTable {
    entries: Vec<CaseEntry>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the result for a case
    pub fn insert(&mut self, id: BenchmarkCaseId, display_info: String, result: CaseResult) {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.display_info = display_info;
                entry.result = result;
            }
            None => self.entries.push(CaseEntry {
                id,
                display_info,
                result,
            }),
        }
    }

    pub fn get(&self, id: &BenchmarkCaseId) -> Option<&CaseResult> {
        self.entries
            .iter()
            .find(|entry| &entry.id == id)
            .map(|entry| &entry.result)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(id, display info, result)` in completion order
    pub fn iter(&self) -> impl Iterator<Item = (&BenchmarkCaseId, &str, &CaseResult)> {
        self.entries
            .iter()
            .map(|entry| (&entry.id, entry.display_info.as_str(), &entry.result))
    }

    /// Log every case's table: header, then `name, size, count` per type
    pub fn display_results(&self) {
        info!("DetailedMemoryDiagnoser results:");
        for (_, display_info, result) in self.iter() {
            match result {
                CaseResult::Available(rows) => {
                    info!("{} allocations:", display_info);
                    for row in rows {
                        info!("{}, {}, {}", row.name, row.total_bytes, row.count);
                    }
                }
                CaseResult::Unavailable(reason) => {
                    info!("{} allocations unavailable: {}", display_info, reason);
                }
            }
        }
    }
}

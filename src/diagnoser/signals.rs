/*!
 * Host Signals
 * Harness-to-diagnoser notifications and the case/process descriptors they carry
 */

use crate::core::types::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle notification delivered by the benchmark harness
///
/// Per case the harness delivers them in declaration order; `SeparateLogic`
/// and `AfterProcessExit` are accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostSignal {
    BeforeProcessStart,
    BeforeAnythingElse,
    BeforeActualRun,
    AfterActualRun,
    AfterAll,
    SeparateLogic,
    AfterProcessExit,
}

impl fmt::Display for HostSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostSignal::BeforeProcessStart => "before_process_start",
            HostSignal::BeforeAnythingElse => "before_anything_else",
            HostSignal::BeforeActualRun => "before_actual_run",
            HostSignal::AfterActualRun => "after_actual_run",
            HostSignal::AfterAll => "after_all",
            HostSignal::SeparateLogic => "separate_logic",
            HostSignal::AfterProcessExit => "after_process_exit",
        };
        f.write_str(name)
    }
}

/// How often the harness must run the benchmark for this diagnoser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    None,
    NoOverhead,
    /// Needs one extra run dedicated to diagnostics
    ExtraRun,
}

/// Target process description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub executable: PathBuf,
    pub pid: Pid,
}

impl ProcessInfo {
    pub fn new(executable: impl Into<PathBuf>, pid: Pid) -> Self {
        Self {
            executable: executable.into(),
            pid,
        }
    }

    /// File name of the executable, used as the provider process filter
    pub fn executable_name(&self) -> Option<String> {
        self.executable
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Stable identifier of a benchmark case within one run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BenchmarkCaseId(String);

impl BenchmarkCaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BenchmarkCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One benchmark case as described by the harness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkCase {
    /// File-system safe case name
    pub folder_info: String,
    /// Human readable case name used in reports
    pub display_info: String,
    /// File-system safe parameter set, if the case is parameterized
    pub parameters_folder_info: Option<String>,
}

impl BenchmarkCase {
    pub fn new(folder_info: impl Into<String>, display_info: impl Into<String>) -> Self {
        Self {
            folder_info: folder_info.into(),
            display_info: display_info.into(),
            parameters_folder_info: None,
        }
    }

    pub fn with_parameters(mut self, parameters_folder_info: impl Into<String>) -> Self {
        let parameters = parameters_folder_info.into();
        self.parameters_folder_info = if parameters.is_empty() {
            None
        } else {
            Some(parameters)
        };
        self
    }

    pub fn id(&self) -> BenchmarkCaseId {
        match &self.parameters_folder_info {
            Some(parameters) => BenchmarkCaseId(format!("{}-{}", self.folder_info, parameters)),
            None => BenchmarkCaseId(self.folder_info.clone()),
        }
    }

    /// `<prefix>-<folder>[-<parameters>]`
    pub fn session_name(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.id())
    }
}

/// Arguments accompanying every host signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnoserActionParameters {
    pub case: BenchmarkCase,
    pub process: ProcessInfo,
}

impl DiagnoserActionParameters {
    pub fn new(case: BenchmarkCase, process: ProcessInfo) -> Self {
        Self { case, process }
    }
}

/*!
 * Event Providers
 * Provider identities, verbosity levels and keyword masks
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Named source of event kinds, independently enable/disable-able
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Managed runtime provider (GC allocations, type metadata)
    Runtime,
    /// Benchmark engine marker source (measurement window start/stop)
    Engine,
    /// Kernel image-load provider
    KernelImageLoad,
}

impl ProviderId {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            ProviderId::Runtime => "Microsoft-Windows-DotNETRuntime",
            ProviderId::Engine => "BenchmarkDotNet.EngineEventSource",
            ProviderId::KernelImageLoad => "Windows Kernel/ImageLoad",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Provider verbosity; an event is delivered when its level is at most the enabled level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TraceLevel {
    Critical = 1,
    Error = 2,
    Warning = 3,
    Informational = 4,
    Verbose = 5,
}

/// Event keyword bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keywords(pub u64);

impl Keywords {
    pub const NONE: Keywords = Keywords(0);
    pub const ALL: Keywords = Keywords(u64::MAX);

    // Runtime provider keywords
    pub const GC: Keywords = Keywords(0x1);
    pub const TYPE: Keywords = Keywords(0x8_0000);
    pub const GC_SAMPLED_OBJECT_ALLOCATION_HIGH: Keywords = Keywords(0x20_0000);
    pub const GC_HEAP_AND_TYPE_NAMES: Keywords = Keywords(0x100_0000);
    pub const GC_SAMPLED_OBJECT_ALLOCATION_LOW: Keywords = Keywords(0x200_0000);
    pub const GC_ALL_OBJECT_ALLOCATION: Keywords = Keywords(
        Self::GC_SAMPLED_OBJECT_ALLOCATION_HIGH.0 | Self::GC_SAMPLED_OBJECT_ALLOCATION_LOW.0,
    );

    // Kernel keywords
    pub const IMAGE_LOAD: Keywords = Keywords(0x4);

    /// Keywords requested by the allocation diagnoser
    pub const ALLOCATIONS: Keywords = Keywords(
        Self::GC_ALL_OBJECT_ALLOCATION.0 | Self::GC_HEAP_AND_TYPE_NAMES.0 | Self::TYPE.0,
    );

    #[inline]
    pub const fn bits(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn intersects(&self, other: Keywords) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn contains(&self, other: Keywords) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Keywords {
    type Output = Keywords;

    fn bitor(self, rhs: Keywords) -> Keywords {
        Keywords(self.0 | rhs.0)
    }
}

impl BitOrAssign for Keywords {
    fn bitor_assign(&mut self, rhs: Keywords) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Keywords {
    type Output = Keywords;

    fn bitand(self, rhs: Keywords) -> Keywords {
        Keywords(self.0 & rhs.0)
    }
}

/// Options passed along with a provider enable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOptions {
    /// Collect call stacks with each event
    pub stacks_enabled: bool,
    /// Only deliver events from processes with these executable file names
    pub process_name_filter: Vec<String>,
}

impl ProviderOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_stacks(mut self) -> Self {
        self.stacks_enabled = true;
        self
    }

    #[inline]
    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name_filter.push(name.into());
        self
    }

    /// Check a process name against the filter (empty filter admits all)
    #[inline]
    pub fn admits(&self, process_name: Option<&str>) -> bool {
        if self.process_name_filter.is_empty() {
            return true;
        }
        match process_name {
            Some(name) => self
                .process_name_filter
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(name)),
            // Events without process context (kernel, engine markers) pass
            None => true,
        }
    }
}

/// Complete configuration of one enabled provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ProviderId,
    pub level: TraceLevel,
    pub keywords: Keywords,
    pub options: ProviderOptions,
}

impl ProviderConfig {
    pub fn new(provider: ProviderId, level: TraceLevel, keywords: Keywords) -> Self {
        Self {
            provider,
            level,
            keywords,
            options: ProviderOptions::default(),
        }
    }

    #[inline]
    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }
}

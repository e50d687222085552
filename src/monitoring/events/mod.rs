/*!
 * Event System
 * Strongly-typed trace events delivered by the tracing subsystem
 */

use crate::core::types::{Bytes, Pid, Timestamp, TypeId};
use crate::session::provider::{Keywords, ProviderId, TraceLevel};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Type identifier to name mapping carried by metadata events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRecord {
    pub type_id: TypeId,
    pub name: String,
}

impl TypeRecord {
    pub fn new(type_id: TypeId, name: impl Into<String>) -> Self {
        Self {
            type_id,
            name: name.into(),
        }
    }
}

/// Unified trace event - everything on a session's stream flows through this
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Monotonic timestamp (nanoseconds since first event)
    #[serde(default)]
    pub timestamp_ns: Timestamp,
    /// Emitting process if applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<Pid>,
    /// Executable file name of the emitting process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    /// Event payload
    pub payload: Payload,
}

/// Event payload - one variant per event kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    // Runtime events
    AllocationSample {
        type_id: TypeId,
        total_size: Bytes,
    },
    TypeMetadata {
        type_id: TypeId,
        name: String,
    },
    TypeBulk {
        types: Vec<TypeRecord>,
    },

    // Engine markers
    WindowStart,
    WindowStop,

    // Kernel events
    ImageLoad {
        path: String,
        base_address: u64,
    },
}

impl Payload {
    /// Provider that emits this kind of event
    #[inline]
    pub fn provider(&self) -> ProviderId {
        match self {
            Payload::AllocationSample { .. }
            | Payload::TypeMetadata { .. }
            | Payload::TypeBulk { .. } => ProviderId::Runtime,
            Payload::WindowStart | Payload::WindowStop => ProviderId::Engine,
            Payload::ImageLoad { .. } => ProviderId::KernelImageLoad,
        }
    }

    /// Level at which the provider emits this event
    #[inline]
    pub fn level(&self) -> TraceLevel {
        match self {
            Payload::AllocationSample { .. } => TraceLevel::Verbose,
            _ => TraceLevel::Informational,
        }
    }

    /// Keywords that must be enabled for delivery (`NONE` means unconditional)
    #[inline]
    pub fn keywords(&self) -> Keywords {
        match self {
            Payload::AllocationSample { .. } => Keywords::GC_ALL_OBJECT_ALLOCATION,
            Payload::TypeMetadata { .. } | Payload::TypeBulk { .. } => {
                Keywords::TYPE | Keywords::GC_HEAP_AND_TYPE_NAMES
            }
            Payload::WindowStart | Payload::WindowStop => Keywords::NONE,
            Payload::ImageLoad { .. } => Keywords::IMAGE_LOAD,
        }
    }

    /// Short kind name for logging
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::AllocationSample { .. } => "allocation_sample",
            Payload::TypeMetadata { .. } => "type_metadata",
            Payload::TypeBulk { .. } => "type_bulk",
            Payload::WindowStart => "window_start",
            Payload::WindowStop => "window_stop",
            Payload::ImageLoad { .. } => "image_load",
        }
    }
}

impl TraceEvent {
    /// Create a new event with current timestamp
    #[inline]
    pub fn new(payload: Payload) -> Self {
        Self {
            timestamp_ns: Self::now_ns(),
            pid: None,
            process_name: None,
            payload,
        }
    }

    #[inline]
    pub fn allocation(type_id: TypeId, total_size: Bytes) -> Self {
        Self::new(Payload::AllocationSample {
            type_id,
            total_size,
        })
    }

    #[inline]
    pub fn type_metadata(type_id: TypeId, name: impl Into<String>) -> Self {
        Self::new(Payload::TypeMetadata {
            type_id,
            name: name.into(),
        })
    }

    #[inline]
    pub fn type_bulk(types: Vec<TypeRecord>) -> Self {
        Self::new(Payload::TypeBulk { types })
    }

    #[inline]
    pub fn window_start() -> Self {
        Self::new(Payload::WindowStart)
    }

    #[inline]
    pub fn window_stop() -> Self {
        Self::new(Payload::WindowStop)
    }

    /// Attach process context
    #[inline]
    pub fn with_process(mut self, pid: Pid, process_name: impl Into<String>) -> Self {
        self.pid = Some(pid);
        self.process_name = Some(process_name.into());
        self
    }

    #[inline]
    pub fn provider(&self) -> ProviderId {
        self.payload.provider()
    }

    /// Get current time in nanoseconds (monotonic)
    #[inline]
    fn now_ns() -> Timestamp {
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let start = START.get_or_init(Instant::now);
        start.elapsed().as_nanos() as u64
    }
}

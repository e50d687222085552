/*!
 * Core Types
 * Common types used across the diagnoser
 */

/// OS process identifier
pub type Pid = u32;

/// Runtime type identifier, opaque and only meaningful within one tracing session
pub type TypeId = u64;

/// Byte count for allocation totals (wide enough for > 2^48 bytes)
pub type Bytes = u64;

/// Monotonic event timestamp in nanoseconds
pub type Timestamp = u64;

/*!
 * Core Module
 * Fundamental diagnoser types, guards and error handling
 */

pub mod errors;
pub mod guard;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use errors::*;
pub use guard::{
    CancellationRegistry, CancellationSubscription, Guard, GuardDrop, GuardError, GuardResult,
    PumpGuard,
};
pub use types::*;

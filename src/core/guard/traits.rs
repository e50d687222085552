/*!
 * Guard Traits
 * Shared contract of the session-scoped guards
 */

use super::{GuardMetadata, GuardResult};

/// Resource held for the lifetime of one tracing session
pub trait Guard: Send {
    /// Short resource name used in logs
    fn resource_type(&self) -> &'static str;

    fn metadata(&self) -> &GuardMetadata;

    /// Whether the resource is still held
    fn is_active(&self) -> bool;

    /// Give the resource back early; a second call returns `AlreadyReleased`
    fn release(&mut self) -> GuardResult<()>;

    /// `type[label]` for log lines
    fn describe(&self) -> String {
        match &self.metadata().label {
            Some(label) => format!("{}[{}]", self.resource_type(), label),
            None => self.resource_type().to_string(),
        }
    }
}

/// Cleanup run from `Drop`; must log instead of panicking
pub trait GuardDrop: Guard {
    fn on_drop(&mut self);
}

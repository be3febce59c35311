//! Event publication port trait.

use crate::domain::error::PaperError;
use crate::domain::events::CoreEvent;

/// A subscriber for core events. Delivery is best effort; an error is logged
/// by the caller and never affects other subscribers or core state.
pub trait EventPort: Send + Sync {
    fn name(&self) -> &str;

    fn publish(&self, event: &CoreEvent) -> Result<(), PaperError>;
}

//! Lifecycle events and listeners.

use std::fmt;

use recordkit_core::Result;

use crate::entity::Entity;
use crate::model::Model;

/// A persistence operation a model goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    Insert,
    Update,
    /// Insert-or-update through the dialect's upsert.
    Replace,
    Delete,
    Load,
}

impl ModelEvent {
    /// Upper-case name, as written to the history type column.
    pub const fn name(self) -> &'static str {
        match self {
            ModelEvent::Insert => "INSERT",
            ModelEvent::Update => "UPDATE",
            ModelEvent::Replace => "REPLACE",
            ModelEvent::Delete => "DELETE",
            ModelEvent::Load => "LOAD",
        }
    }

    /// Whether the event writes to the database.
    pub const fn is_mutation(self) -> bool {
        !matches!(self, ModelEvent::Load)
    }
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hooks around every model operation.
///
/// Both methods default to no-ops, so implementors override only what they
/// need. An error from `before` aborts the operation before any SQL runs; an
/// error from `after` is returned to the caller once the statement has run.
///
/// # Example
///
/// ```ignore
/// struct Audit;
///
/// impl ModelListener<Order> for Audit {
///     fn before(&self, event: ModelEvent, model: &mut Model<Order>) -> Result<()> {
///         if event == ModelEvent::Delete && model.get("locked") == Some(Value::Bool(true)) {
///             return Err(Error::config("order is locked"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait ModelListener<E: Entity>: Send + Sync {
    #[allow(unused_variables)]
    fn before(&self, event: ModelEvent, model: &mut Model<E>) -> Result<()> {
        Ok(())
    }

    /// `result` is the affected row count, or `-1` when a load found nothing.
    #[allow(unused_variables)]
    fn after(&self, event: ModelEvent, model: &mut Model<E>, result: i64) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(ModelEvent::Insert.name(), "INSERT");
        assert_eq!(ModelEvent::Replace.to_string(), "REPLACE");
        assert!(!ModelEvent::Load.is_mutation());
        assert!(ModelEvent::Delete.is_mutation());
    }
}

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::core::Result;
use crate::manager::{CrudManager, Manager, ManagerContext, Operation};
use crate::query::{FilterSpec, ListQuery};

/// Immutable record of one completed mutation, handed to the dispatcher
/// after the storage durability the caller requested has been satisfied.
#[derive(Debug, Clone, Serialize)]
pub struct CrudEvent {
    pub operation: Operation,
    pub entity: String,
    /// Post-mutation wire representation; absent for deletes.
    pub payload: Option<JsonValue>,
}

impl CrudEvent {
    pub fn new(operation: Operation, entity: impl Into<String>, payload: Option<JsonValue>) -> Self {
        Self {
            operation,
            entity: entity.into(),
            payload,
        }
    }

    /// Event name in `<entity>_<verb>` form, e.g. `widget_created`.
    pub fn name(&self) -> String {
        format!(
            "{}_{}",
            self.entity,
            self.operation
                .event_suffix()
                .unwrap_or_else(|| self.operation.as_str())
        )
    }
}

/// Publishes change-notification events. Fire-and-forget: implementations
/// own their failure handling, publication never affects the mutation's
/// result.
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, event: CrudEvent);
}

/// Manager variant that publishes one event after each successful mutating
/// operation. Events are only published when the configured durability
/// commits, so an event never describes state the surrounding transaction
/// can still roll back.
pub struct CrudManagerWithEvents<'a> {
    inner: CrudManager<'a>,
    dispatcher: Arc<dyn EventDispatcher>,
    entity: String,
    durable: bool,
}

impl<'a> CrudManagerWithEvents<'a> {
    pub fn new(ctx: ManagerContext<'a>, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        let entity = ctx.entity_name.to_string();
        let durable = ctx.durability.is_durable();
        Self {
            inner: CrudManager::new(ctx),
            dispatcher,
            entity,
            durable,
        }
    }

    fn publish(&self, operation: Operation, payload: Option<JsonValue>) {
        if !self.durable {
            return;
        }
        let event = CrudEvent::new(operation, self.entity.clone(), payload);
        log::debug!("dispatching {}", event.name());
        self.dispatcher.dispatch(event);
    }
}

impl Manager for CrudManagerWithEvents<'_> {
    fn get(&self, pk: &JsonValue) -> Result<JsonValue> {
        self.inner.get(pk)
    }

    fn list(&self, query: &ListQuery) -> Result<JsonValue> {
        self.inner.list(query)
    }

    fn page(&self, query: &ListQuery) -> Result<JsonValue> {
        self.inner.page(query)
    }

    fn count(&self, filters: Option<&FilterSpec>) -> Result<JsonValue> {
        self.inner.count(filters)
    }

    fn create(&self, data: &JsonValue) -> Result<JsonValue> {
        let result = self.inner.create(data)?;
        self.publish(Operation::Create, Some(result.clone()));
        Ok(result)
    }

    fn update(&self, pk: &JsonValue, data: &JsonValue) -> Result<JsonValue> {
        let result = self.inner.update(pk, data)?;
        self.publish(Operation::Update, Some(result.clone()));
        Ok(result)
    }

    fn delete(&self, pk: &JsonValue) -> Result<JsonValue> {
        let result = self.inner.delete(pk)?;
        self.publish(Operation::Delete, None);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name() {
        let event = CrudEvent::new(Operation::Create, "widget", None);
        assert_eq!(event.name(), "widget_created");
        let event = CrudEvent::new(Operation::Delete, "widget", None);
        assert_eq!(event.name(), "widget_deleted");
    }
}

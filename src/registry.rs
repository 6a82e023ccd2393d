use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::core::{CrudError, Result};
use crate::manager::Operation;
use crate::storage::Storage;

pub type Handler<S> =
    Arc<dyn Fn(&S, &mut dyn Storage, &JsonValue) -> Result<JsonValue> + Send + Sync>;

/// One remote-callable entry point: a resolved name plus the handler the
/// transport dispatches to.
pub struct RemoteMethod<S> {
    pub name: String,
    pub operation: Operation,
    pub entity: String,
    handler: Handler<S>,
}

impl<S> RemoteMethod<S> {
    pub fn new(
        name: impl Into<String>,
        operation: Operation,
        entity: impl Into<String>,
        handler: Handler<S>,
    ) -> Self {
        Self {
            name: name.into(),
            operation,
            entity: entity.into(),
            handler,
        }
    }

    pub fn call(&self, service: &S, storage: &mut dyn Storage, args: &JsonValue) -> Result<JsonValue> {
        (self.handler)(service, storage, args)
    }
}

/// Registration table consulted by the transport layer's dispatch logic.
/// Populated once at service construction; a registered name is never
/// overwritten.
pub struct MethodRegistry<S> {
    methods: BTreeMap<String, RemoteMethod<S>>,
}

impl<S> MethodRegistry<S> {
    pub fn new() -> Self {
        Self {
            methods: BTreeMap::new(),
        }
    }

    /// Register a method under its resolved name. Returns `false` without
    /// touching the table when the name is already taken.
    pub fn register(&mut self, method: RemoteMethod<S>) -> bool {
        if self.methods.contains_key(&method.name) {
            log::debug!("remote method '{}' already registered, skipping", method.name);
            return false;
        }
        log::debug!(
            "registered remote method '{}' ({} {})",
            method.name,
            method.operation,
            method.entity
        );
        self.methods.insert(method.name.clone(), method);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&RemoteMethod<S>> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Invoke the method registered under `name` for one worker invocation.
    pub fn dispatch(
        &self,
        name: &str,
        service: &S,
        storage: &mut dyn Storage,
        args: &JsonValue,
    ) -> Result<JsonValue> {
        let method = self
            .methods
            .get(name)
            .ok_or_else(|| CrudError::UnknownMethod(name.to_string()))?;
        method.call(service, storage, args)
    }
}

impl<S> Default for MethodRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

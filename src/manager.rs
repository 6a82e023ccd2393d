use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::core::{Record, Result, Value};
use crate::model::EntityModel;
use crate::query::{FilterSpec, ListQuery};
use crate::serialize::{self, DeserializeFn, SerializeFn};
use crate::storage::{Durability, Storage};

/// The logical operations a CRUD surface exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Get,
    List,
    Page,
    Count,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::List,
        Self::Page,
        Self::Count,
        Self::Create,
        Self::Update,
        Self::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Page => "page",
            Self::Count => "count",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }

    /// Past-tense verb used in change-notification event names.
    pub fn event_suffix(&self) -> Option<&'static str> {
        match self {
            Self::Create => Some("created"),
            Self::Update => Some("updated"),
            Self::Delete => Some("deleted"),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one manager instance is bound to for a single invocation.
pub struct ManagerContext<'a> {
    pub storage: &'a dyn Storage,
    pub entity_name: &'a str,
    pub serializer: &'a SerializeFn,
    pub deserializer: &'a DeserializeFn,
    pub durability: Durability,
}

/// Capability interface of the operation manager, the `manager` substitution
/// seam. Arguments and results are wire representations.
pub trait Manager {
    fn get(&self, pk: &JsonValue) -> Result<JsonValue>;

    fn list(&self, query: &ListQuery) -> Result<JsonValue>;

    /// Same shape as `list`; the paginated entry point exposed under the
    /// plural page name. Callers distinguish the two only by which remote
    /// method they invoke.
    fn page(&self, query: &ListQuery) -> Result<JsonValue>;

    fn count(&self, filters: Option<&FilterSpec>) -> Result<JsonValue>;

    fn create(&self, data: &JsonValue) -> Result<JsonValue>;

    fn update(&self, pk: &JsonValue, data: &JsonValue) -> Result<JsonValue>;

    fn delete(&self, pk: &JsonValue) -> Result<JsonValue>;
}

/// Default operation manager: deserialize the payload, delegate to the
/// storage facade, serialize the result.
pub struct CrudManager<'a> {
    ctx: ManagerContext<'a>,
}

impl<'a> CrudManager<'a> {
    pub fn new(ctx: ManagerContext<'a>) -> Self {
        Self { ctx }
    }

    fn model(&self) -> &EntityModel {
        self.ctx.storage.model()
    }

    fn pk_value(&self, pk: &JsonValue) -> Result<Value> {
        serialize::convert(pk, &self.model().primary_key_type())
    }

    fn serialize(&self, record: &Record) -> Result<JsonValue> {
        (self.ctx.serializer)(self.model(), record)
    }

    fn deserialize(&self, wire: &JsonValue) -> Result<Record> {
        (self.ctx.deserializer)(self.model(), wire)
    }
}

impl Manager for CrudManager<'_> {
    fn get(&self, pk: &JsonValue) -> Result<JsonValue> {
        let pk = self.pk_value(pk)?;
        let record = self.ctx.storage.get(&pk)?;
        self.serialize(&record)
    }

    fn list(&self, query: &ListQuery) -> Result<JsonValue> {
        let rows = self.ctx.storage.list(query)?;
        let items = rows
            .iter()
            .map(|record| self.serialize(record))
            .collect::<Result<Vec<_>>>()?;
        Ok(JsonValue::Array(items))
    }

    fn page(&self, query: &ListQuery) -> Result<JsonValue> {
        self.list(query)
    }

    fn count(&self, filters: Option<&FilterSpec>) -> Result<JsonValue> {
        Ok(JsonValue::from(self.ctx.storage.count(filters)?))
    }

    fn create(&self, data: &JsonValue) -> Result<JsonValue> {
        let attrs = self.deserialize(data)?;
        let record = self.ctx.storage.create(attrs, self.ctx.durability)?;
        self.serialize(&record)
    }

    fn update(&self, pk: &JsonValue, data: &JsonValue) -> Result<JsonValue> {
        let pk = self.pk_value(pk)?;
        // partial payload: only supplied fields are translated and applied
        let attrs = self.deserialize(data)?;
        let record = self.ctx.storage.update(&pk, attrs, self.ctx.durability)?;
        self.serialize(&record)
    }

    fn delete(&self, pk: &JsonValue) -> Result<JsonValue> {
        let pk = self.pk_value(pk)?;
        self.ctx.storage.delete(&pk, self.ctx.durability)?;
        Ok(JsonValue::Null)
    }
}

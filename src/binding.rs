use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::core::{CrudError, Record, Result};
use crate::events::{CrudManagerWithEvents, EventDispatcher};
use crate::manager::{CrudManager, Manager, ManagerContext, Operation};
use crate::model::EntityModel;
use crate::query::{FilterSpec, ListQuery};
use crate::registry::{Handler, MethodRegistry, RemoteMethod};
use crate::serialize::{self, DeserializeFn, SerializeFn};
use crate::session::SharedSession;
use crate::storage::{DbStorage, Durability, Storage};

/// Implemented by host services so by-name accessors can resolve their
/// dependencies. Both hooks default to `None`; a service only provides what
/// its bindings actually reference.
pub trait ServiceHost {
    fn session_dependency(&self, _name: &str) -> Option<SharedSession> {
        None
    }

    fn dispatcher_dependency(&self, _name: &str) -> Option<Arc<dyn EventDispatcher>> {
        None
    }
}

/// How a binding reaches a dependency on the host service: by dependency
/// name, or through a caller-supplied callable. Resolved once per worker
/// during setup.
pub enum Accessor<S, T> {
    ByName(String),
    ByCallable(Arc<dyn Fn(&S) -> Option<T> + Send + Sync>),
}

impl<S, T> Accessor<S, T> {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self::ByName(name.into())
    }

    pub fn by_callable(f: impl Fn(&S) -> Option<T> + Send + Sync + 'static) -> Self {
        Self::ByCallable(Arc::new(f))
    }

    fn resolve(
        &self,
        service: &S,
        lookup: impl Fn(&S, &str) -> Option<T>,
        what: &str,
    ) -> Result<T> {
        match self {
            Self::ByName(name) => lookup(service, name).ok_or_else(|| {
                CrudError::DependencyMissing(format!(
                    "{what} dependency '{name}' not available on service"
                ))
            }),
            Self::ByCallable(f) => f(service).ok_or_else(|| {
                CrudError::DependencyMissing(format!("{what} accessor returned nothing"))
            }),
        }
    }
}

impl<S, T> Clone for Accessor<S, T> {
    fn clone(&self) -> Self {
        match self {
            Self::ByName(name) => Self::ByName(name.clone()),
            Self::ByCallable(f) => Self::ByCallable(Arc::clone(f)),
        }
    }
}

/// Remote name of one logical operation: derived from the entity name,
/// overridden, or suppressed entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MethodName {
    #[default]
    Derived,
    Custom(String),
    Suppressed,
}

/// Default remote name for one operation. Pure derivation from the resolved
/// entity names; singular operations use the entity name, set-level ones the
/// plural.
pub fn default_method_name(operation: Operation, entity: &str, plural: &str) -> String {
    match operation {
        Operation::Get => format!("get_{entity}"),
        Operation::List => format!("list_{plural}"),
        Operation::Page => format!("page_{plural}"),
        Operation::Count => format!("count_{plural}"),
        Operation::Create => format!("create_{entity}"),
        Operation::Update => format!("update_{entity}"),
        Operation::Delete => format!("delete_{entity}"),
    }
}

pub type StorageFactory = Arc<dyn Fn(&EntityModel) -> Box<dyn Storage> + Send + Sync>;
pub type ManagerFactory =
    Arc<dyn for<'a> Fn(ManagerContext<'a>) -> Box<dyn Manager + 'a> + Send + Sync>;

/// Configuration surface for one entity's CRUD binding.
///
/// Built once at service construction time, then [`bind`](Self::bind)ed into
/// the service's [`MethodRegistry`]. The host's dependency-injection layer
/// drives the per-worker half through the returned [`CrudBinding`].
///
/// # Examples
///
/// ```
/// use autocrud::{Accessor, AutoCrud, DataType, EntityModel, FieldDef};
/// use autocrud::{MemoryDb, MethodRegistry, ServiceHost, SharedSession};
/// use serde_json::json;
///
/// struct OrderService {
///     session: SharedSession,
/// }
///
/// impl ServiceHost for OrderService {
///     fn session_dependency(&self, name: &str) -> Option<SharedSession> {
///         (name == "session").then(|| self.session.clone())
///     }
/// }
///
/// # fn main() -> autocrud::Result<()> {
/// let model = EntityModel::new(
///     "Order",
///     vec![
///         FieldDef::new("id", DataType::Integer).primary_key(),
///         FieldDef::new("total", DataType::Float),
///     ],
/// );
///
/// // once, at service construction
/// let mut registry = MethodRegistry::new();
/// let binding = AutoCrud::new(model, Accessor::by_name("session")).bind(&mut registry);
///
/// // per worker: fresh storage, session attached before work begins
/// let db = MemoryDb::new();
/// let service = OrderService { session: db.shared_session() };
/// let mut storage = binding.get_dependency();
/// binding.worker_setup(&service, storage.as_mut())?;
///
/// let created = registry.dispatch(
///     "create_order",
///     &service,
///     storage.as_mut(),
///     &json!({"data": {"total": 9.5}}),
/// )?;
/// assert_eq!(created["id"], json!(1));
/// # Ok(())
/// # }
/// ```
pub struct AutoCrud<S> {
    model: EntityModel,
    session: Accessor<S, SharedSession>,
    dispatcher: Option<Accessor<S, Arc<dyn EventDispatcher>>>,
    entity_name: Option<String>,
    entity_name_plural: Option<String>,
    names: BTreeMap<Operation, MethodName>,
    serializer: Option<SerializeFn>,
    deserializer: Option<DeserializeFn>,
    storage_factory: Option<StorageFactory>,
    manager_factory: Option<ManagerFactory>,
    durability: Durability,
}

impl<S: ServiceHost + 'static> AutoCrud<S> {
    pub fn new(model: EntityModel, session: Accessor<S, SharedSession>) -> Self {
        Self {
            model,
            session,
            dispatcher: None,
            entity_name: None,
            entity_name_plural: None,
            names: BTreeMap::new(),
            serializer: None,
            deserializer: None,
            storage_factory: None,
            manager_factory: None,
            durability: Durability::default(),
        }
    }

    /// Event-aware variant: publishes a change notification after each
    /// committed mutation, through the dispatcher this accessor resolves.
    pub fn with_events(
        model: EntityModel,
        session: Accessor<S, SharedSession>,
        dispatcher: Accessor<S, Arc<dyn EventDispatcher>>,
    ) -> Self {
        Self::new(model, session).dispatcher(dispatcher)
    }

    pub fn entity_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = Some(name.into());
        self
    }

    pub fn entity_name_plural(mut self, name: impl Into<String>) -> Self {
        self.entity_name_plural = Some(name.into());
        self
    }

    pub fn dispatcher(mut self, accessor: Accessor<S, Arc<dyn EventDispatcher>>) -> Self {
        self.dispatcher = Some(accessor);
        self
    }

    /// Override the remote name of one operation. An empty name suppresses
    /// the method entirely.
    pub fn method_name(mut self, operation: Operation, name: impl Into<String>) -> Self {
        let name = name.into();
        let spec = if name.is_empty() {
            MethodName::Suppressed
        } else {
            MethodName::Custom(name)
        };
        self.names.insert(operation, spec);
        self
    }

    pub fn suppress(mut self, operation: Operation) -> Self {
        self.names.insert(operation, MethodName::Suppressed);
        self
    }

    pub fn serializer(
        mut self,
        f: impl Fn(&EntityModel, &Record) -> Result<JsonValue> + Send + Sync + 'static,
    ) -> Self {
        self.serializer = Some(Arc::new(f));
        self
    }

    pub fn deserializer(
        mut self,
        f: impl Fn(&EntityModel, &JsonValue) -> Result<Record> + Send + Sync + 'static,
    ) -> Self {
        self.deserializer = Some(Arc::new(f));
        self
    }

    /// Swap the storage facade implementation.
    pub fn storage_factory(
        mut self,
        f: impl Fn(&EntityModel) -> Box<dyn Storage> + Send + Sync + 'static,
    ) -> Self {
        self.storage_factory = Some(Arc::new(f));
        self
    }

    /// Swap the operation manager implementation.
    pub fn manager_factory(
        mut self,
        f: impl for<'a> Fn(ManagerContext<'a>) -> Box<dyn Manager + 'a> + Send + Sync + 'static,
    ) -> Self {
        self.manager_factory = Some(Arc::new(f));
        self
    }

    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Resolve the final method names and register one remote method per
    /// non-suppressed operation. Names already present in the registry are
    /// skipped, never overwritten, so binding is idempotent and never
    /// shadows a method the service defined itself.
    pub fn bind(self, registry: &mut MethodRegistry<S>) -> Arc<CrudBinding<S>> {
        let entity = self
            .entity_name
            .unwrap_or_else(|| self.model.entity_name());
        let plural = self
            .entity_name_plural
            .unwrap_or_else(|| format!("{entity}s"));

        let method_names: Vec<(Operation, String)> = Operation::ALL
            .iter()
            .filter_map(|op| {
                match self.names.get(op).cloned().unwrap_or_default() {
                    MethodName::Derived => Some((*op, default_method_name(*op, &entity, &plural))),
                    MethodName::Custom(name) => Some((*op, name)),
                    MethodName::Suppressed => None,
                }
            })
            .collect();

        let binding = Arc::new(CrudBinding {
            model: self.model,
            entity_name: entity,
            entity_name_plural: plural,
            session: self.session,
            dispatcher: self.dispatcher,
            serializer: self.serializer.unwrap_or_else(serialize::default_serializer),
            deserializer: self
                .deserializer
                .unwrap_or_else(serialize::default_deserializer),
            storage_factory: self.storage_factory,
            manager_factory: self.manager_factory,
            durability: self.durability,
            method_names: method_names.clone(),
        });

        for (operation, name) in method_names {
            if registry.contains(&name) {
                log::debug!("'{name}' already present, not binding {operation}");
                continue;
            }
            let bound = Arc::clone(&binding);
            let handler: Handler<S> = Arc::new(move |service, storage, args| {
                bound.invoke(operation, service, storage, args)
            });
            registry.register(RemoteMethod::new(
                name,
                operation,
                binding.entity_name.clone(),
                handler,
            ));
        }

        binding
    }
}

/// The bound provider: resolved configuration plus the per-worker
/// dependency hooks the host container drives.
pub struct CrudBinding<S> {
    model: EntityModel,
    entity_name: String,
    entity_name_plural: String,
    session: Accessor<S, SharedSession>,
    dispatcher: Option<Accessor<S, Arc<dyn EventDispatcher>>>,
    serializer: SerializeFn,
    deserializer: DeserializeFn,
    storage_factory: Option<StorageFactory>,
    manager_factory: Option<ManagerFactory>,
    durability: Durability,
    method_names: Vec<(Operation, String)>,
}

impl<S: ServiceHost + 'static> CrudBinding<S> {
    pub fn model(&self) -> &EntityModel {
        &self.model
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn entity_name_plural(&self) -> &str {
        &self.entity_name_plural
    }

    pub fn durability(&self) -> Durability {
        self.durability
    }

    /// Resolved `(operation, remote name)` pairs, suppressed ones excluded.
    pub fn method_names(&self) -> &[(Operation, String)] {
        &self.method_names
    }

    pub fn method_name(&self, operation: Operation) -> Option<&str> {
        self.method_names
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, name)| name.as_str())
    }

    /// Produce a fresh, session-less storage facade for one worker.
    pub fn get_dependency(&self) -> Box<dyn Storage> {
        match &self.storage_factory {
            Some(factory) => factory(&self.model),
            None => Box::new(DbStorage::new(self.model.clone())),
        }
    }

    /// Resolve the transactional session from the host service and attach it
    /// to the worker's storage. Runs before the worker's business method.
    pub fn worker_setup(&self, service: &S, storage: &mut dyn Storage) -> Result<()> {
        let session = self
            .session
            .resolve(service, S::session_dependency, "session")?;
        storage.attach_session(session);
        Ok(())
    }

    fn manager<'a>(&'a self, service: &S, storage: &'a dyn Storage) -> Result<Box<dyn Manager + 'a>> {
        let ctx = ManagerContext {
            storage,
            entity_name: &self.entity_name,
            serializer: &self.serializer,
            deserializer: &self.deserializer,
            durability: self.durability,
        };
        if let Some(factory) = &self.manager_factory {
            return Ok(factory(ctx));
        }
        match &self.dispatcher {
            Some(accessor) => {
                let dispatcher =
                    accessor.resolve(service, S::dispatcher_dependency, "dispatcher")?;
                Ok(Box::new(CrudManagerWithEvents::new(ctx, dispatcher)))
            }
            None => Ok(Box::new(CrudManager::new(ctx))),
        }
    }

    /// One remote invocation: construct a fresh manager bound to the
    /// worker's storage and delegate to the same-named operation.
    pub fn invoke(
        &self,
        operation: Operation,
        service: &S,
        storage: &mut dyn Storage,
        args: &JsonValue,
    ) -> Result<JsonValue> {
        let manager = self.manager(service, &*storage)?;
        match operation {
            Operation::Get => {
                let params: PkParams = parse_params(args)?;
                manager.get(&params.pk)
            }
            Operation::List => {
                let query: ListQuery = parse_params(args)?;
                manager.list(&query)
            }
            Operation::Page => {
                let query: ListQuery = parse_params(args)?;
                manager.page(&query)
            }
            Operation::Count => {
                let params: CountParams = parse_params(args)?;
                manager.count(params.filters.as_ref())
            }
            Operation::Create => {
                let params: DataParams = parse_params(args)?;
                manager.create(&params.data)
            }
            Operation::Update => {
                let params: UpdateParams = parse_params(args)?;
                manager.update(&params.pk, &params.data)
            }
            Operation::Delete => {
                let params: PkParams = parse_params(args)?;
                manager.delete(&params.pk)
            }
        }
    }
}

#[derive(Deserialize, Debug)]
struct PkParams {
    pk: JsonValue,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CountParams {
    filters: Option<FilterSpec>,
}

#[derive(Deserialize)]
struct DataParams {
    data: JsonValue,
}

#[derive(Deserialize)]
struct UpdateParams {
    pk: JsonValue,
    data: JsonValue,
}

fn parse_params<T: DeserializeOwned>(args: &JsonValue) -> Result<T> {
    let value = if args.is_null() {
        JsonValue::Object(serde_json::Map::new())
    } else {
        args.clone()
    };
    serde_json::from_value(value)
        .map_err(|e| CrudError::Serialization(format!("Invalid call arguments: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_method_names() {
        assert_eq!(
            default_method_name(Operation::Get, "widget", "widgets"),
            "get_widget"
        );
        assert_eq!(
            default_method_name(Operation::List, "widget", "widgets"),
            "list_widgets"
        );
        assert_eq!(
            default_method_name(Operation::Page, "widget", "widgets"),
            "page_widgets"
        );
        assert_eq!(
            default_method_name(Operation::Count, "widget", "widgets"),
            "count_widgets"
        );
        assert_eq!(
            default_method_name(Operation::Delete, "widget", "widgets"),
            "delete_widget"
        );
    }

    #[test]
    fn test_parse_params_null_args() {
        let query: ListQuery = parse_params(&JsonValue::Null).unwrap();
        assert!(query.filters.is_none());

        let err = parse_params::<PkParams>(&JsonValue::Null).unwrap_err();
        assert!(matches!(err, CrudError::Serialization(_)));
    }
}

// ============================================================================
// AutoCrud Library
// ============================================================================
//
// Equips a service with a standard set of remote-callable CRUD operations
// for a persistent entity type, without hand-writing each operation. Binding
// happens once at service construction and populates a registration table;
// each inbound call gets a fresh operation manager wired to that worker's
// transactional session.

pub mod binding;
pub mod core;
pub mod events;
pub mod manager;
pub mod memory;
pub mod model;
pub mod query;
pub mod registry;
pub mod serialize;
pub mod session;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{CrudError, DataType, Record, Result, Value};
pub use binding::{
    default_method_name, Accessor, AutoCrud, CrudBinding, ManagerFactory, MethodName, ServiceHost,
    StorageFactory,
};
pub use events::{CrudEvent, CrudManagerWithEvents, EventDispatcher};
pub use manager::{CrudManager, Manager, ManagerContext, Operation};
pub use memory::{MemoryDb, MemorySession};
pub use model::{EntityModel, FieldDef};
pub use query::{
    FilterClause, FilterOp, FilterSpec, ListQuery, LoadSpec, SortClause, SortDirection, SortSpec,
};
pub use registry::{Handler, MethodRegistry, RemoteMethod};
pub use serialize::{
    default_deserializer, default_serializer, from_serializable, to_serializable, DeserializeFn,
    SerializeFn,
};
pub use session::{share, ObjectId, Session, SharedSession};
pub use storage::{DbStorage, Durability, Storage};

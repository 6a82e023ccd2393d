use std::sync::{Arc, Mutex};

use crate::core::{Record, Result, Value};
use crate::model::EntityModel;
use crate::query::{FilterSpec, ListQuery};

/// Session-local handle for an object registered via [`Session::add`].
/// Stays valid until the session is discarded; generated primary keys are
/// only observable through [`Session::refresh`] after a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Transactional unit of work against the persistent store, exclusive to one
/// worker invocation.
///
/// Every operation is a synchronous blocking call; the core defines no
/// suspension points. Mutations staged through `add`/`assign`/`remove` stay
/// pending until `flush` makes them visible inside the session or `commit`
/// ends the transaction durably.
pub trait Session: Send {
    /// Load one record by primary key. `None` when the key does not resolve.
    fn get(&mut self, model: &EntityModel, pk: &Value) -> Result<Option<Record>>;

    /// Execute a refined query. Implementations must apply the query's parts
    /// in the fixed order filters, loads, order_by, offset, limit.
    fn query(&mut self, model: &EntityModel, query: &ListQuery) -> Result<Vec<Record>>;

    /// Cardinality of the filtered set. Sort, load and pagination specs do
    /// not apply here.
    fn count(&mut self, model: &EntityModel, filters: Option<&FilterSpec>) -> Result<u64>;

    /// Register a new object with the session. Pending until flushed.
    fn add(&mut self, model: &EntityModel, record: Record) -> Result<ObjectId>;

    /// Stage attribute assignments on the object behind `pk`.
    fn assign(&mut self, model: &EntityModel, pk: &Value, attrs: Record) -> Result<()>;

    /// Mark the object behind `pk` for removal.
    fn remove(&mut self, model: &EntityModel, pk: &Value) -> Result<()>;

    /// Apply pending changes inside the transaction, assigning generated
    /// identifiers, without ending it.
    fn flush(&mut self) -> Result<()>;

    /// Flush and durably end the transaction.
    fn commit(&mut self) -> Result<()>;

    /// Discard pending changes and any session-local state.
    fn rollback(&mut self) -> Result<()>;

    /// Current state of an object registered via `add`.
    fn refresh(&mut self, model: &EntityModel, id: ObjectId) -> Result<Record>;
}

/// Shared handle to a session, as handed around by the host's dependency
/// injection. The mutex serializes access; ownership stays with one worker.
pub type SharedSession = Arc<Mutex<dyn Session>>;

pub fn share<S: Session + 'static>(session: S) -> SharedSession {
    Arc::new(Mutex::new(session))
}

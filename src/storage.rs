use std::sync::MutexGuard;

use crate::core::{CrudError, Record, Result, Value};
use crate::model::EntityModel;
use crate::query::{FilterSpec, ListQuery};
use crate::session::{Session, SharedSession};

/// Durability of one mutating operation. `flush` makes the change visible
/// inside the current transaction; `commit` ends the transaction durably and
/// takes precedence over `flush`. Neither set leaves the change pending in
/// the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Durability {
    pub flush: bool,
    pub commit: bool,
}

impl Durability {
    /// Flush and commit, the default.
    pub fn commit() -> Self {
        Self {
            flush: true,
            commit: true,
        }
    }

    /// Visible inside the transaction only.
    pub fn flush_only() -> Self {
        Self {
            flush: true,
            commit: false,
        }
    }

    /// Leave the mutation pending until a later flush or commit.
    pub fn deferred() -> Self {
        Self {
            flush: false,
            commit: false,
        }
    }

    /// Whether changes under this policy survive the session.
    pub fn is_durable(&self) -> bool {
        self.commit
    }

    fn is_applied(&self) -> bool {
        self.flush || self.commit
    }
}

impl Default for Durability {
    fn default() -> Self {
        Self::commit()
    }
}

/// Capability interface of the storage facade, the `db_storage` substitution
/// seam. One instance per worker; the session is attached between
/// construction and first use.
pub trait Storage: Send {
    fn model(&self) -> &EntityModel;

    fn attach_session(&mut self, session: SharedSession);

    fn session_attached(&self) -> bool;

    /// Single record by primary key, `NotFound` if the key does not resolve.
    fn get(&self, pk: &Value) -> Result<Record>;

    /// Filtered, sorted, windowed record set.
    fn list(&self, query: &ListQuery) -> Result<Vec<Record>>;

    /// Cardinality of the filtered set; ignores sort, load and pagination.
    fn count(&self, filters: Option<&FilterSpec>) -> Result<u64>;

    /// Instantiate and register a new record, then flush or commit per
    /// `durability` and return its refreshed state.
    fn create(&self, data: Record, durability: Durability) -> Result<Record>;

    /// Apply `data` as attribute assignments on the record behind `pk`.
    fn update(&self, pk: &Value, data: Record, durability: Durability) -> Result<Record>;

    /// Remove the record behind `pk`. No refresh, the object is gone.
    fn delete(&self, pk: &Value, durability: Durability) -> Result<()>;
}

/// Default storage facade over a [`Session`].
pub struct DbStorage {
    model: EntityModel,
    session: Option<SharedSession>,
}

impl DbStorage {
    /// A facade without a session; `attach_session` completes it before use.
    pub fn new(model: EntityModel) -> Self {
        Self {
            model,
            session: None,
        }
    }

    pub fn with_session(model: EntityModel, session: SharedSession) -> Self {
        Self {
            model,
            session: Some(session),
        }
    }

    fn session(&self) -> Result<MutexGuard<'_, dyn Session + 'static>> {
        let shared = self
            .session
            .as_ref()
            .ok_or_else(|| CrudError::SessionDetached(self.model.name().to_string()))?;
        Ok(shared.lock()?)
    }

    fn not_found(&self, pk: &Value) -> CrudError {
        CrudError::not_found(self.model.name(), pk)
    }

    fn finalize(session: &mut dyn Session, durability: Durability) -> Result<()> {
        if durability.commit {
            session.commit()
        } else if durability.flush {
            session.flush()
        } else {
            Ok(())
        }
    }
}

impl Storage for DbStorage {
    fn model(&self) -> &EntityModel {
        &self.model
    }

    fn attach_session(&mut self, session: SharedSession) {
        self.session = Some(session);
    }

    fn session_attached(&self) -> bool {
        self.session.is_some()
    }

    fn get(&self, pk: &Value) -> Result<Record> {
        let mut session = self.session()?;
        session
            .get(&self.model, pk)?
            .ok_or_else(|| self.not_found(pk))
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<Record>> {
        let mut session = self.session()?;
        session.query(&self.model, query)
    }

    fn count(&self, filters: Option<&FilterSpec>) -> Result<u64> {
        let mut session = self.session()?;
        session.count(&self.model, filters)
    }

    fn create(&self, data: Record, durability: Durability) -> Result<Record> {
        let mut session = self.session()?;
        let id = session.add(&self.model, data)?;
        Self::finalize(&mut *session, durability)?;
        let record = session.refresh(&self.model, id)?;
        log::debug!(
            "created {} {}",
            self.model.entity_name(),
            self.model
                .primary_key_of(&record)
                .cloned()
                .unwrap_or(Value::Null)
        );
        Ok(record)
    }

    fn update(&self, pk: &Value, data: Record, durability: Durability) -> Result<Record> {
        let mut session = self.session()?;
        let mut record = session
            .get(&self.model, pk)?
            .ok_or_else(|| self.not_found(pk))?;
        session.assign(&self.model, pk, data.clone())?;
        Self::finalize(&mut *session, durability)?;
        if durability.is_applied() {
            record = session
                .get(&self.model, pk)?
                .ok_or_else(|| self.not_found(pk))?;
        } else {
            // pending assignments are visible on the in-memory object only
            record.extend(data);
        }
        Ok(record)
    }

    fn delete(&self, pk: &Value, durability: Durability) -> Result<()> {
        let mut session = self.session()?;
        session
            .get(&self.model, pk)?
            .ok_or_else(|| self.not_found(pk))?;
        session.remove(&self.model, pk)?;
        Self::finalize(&mut *session, durability)?;
        log::debug!("deleted {} {}", self.model.entity_name(), pk);
        Ok(())
    }
}

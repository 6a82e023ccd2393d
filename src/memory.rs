//! Reference in-memory engine implementing the [`Session`] contract.
//!
//! `MemoryDb` holds the committed state; each `MemorySession` works on a
//! lazily-cloned snapshot of the tables it touches, so flushed-but-uncommitted
//! changes are visible inside the session only. Commits write touched tables
//! back whole (last writer wins). Good enough for tests and embedding;
//! a relational engine replaces this wholesale behind the `Session` trait.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::core::{CrudError, Record, Result, Value};
use crate::model::EntityModel;
use crate::query::{predicate, FilterSpec, ListQuery};
use crate::session::{share, ObjectId, Session, SharedSession};

#[derive(Debug, Clone, Default)]
struct TableData {
    rows: BTreeMap<Value, Record>,
    // highest integer key handed out so far
    next_id: i64,
}

/// Shared committed store, cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: Arc<Mutex<HashMap<String, TableData>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh unit of work against this store.
    pub fn session(&self) -> MemorySession {
        MemorySession {
            db: self.clone(),
            working: HashMap::new(),
            pending: Vec::new(),
            staged: HashMap::new(),
            next_oid: 0,
        }
    }

    pub fn shared_session(&self) -> SharedSession {
        share(self.session())
    }

    /// Committed rows of one entity, in primary-key order.
    pub fn rows(&self, entity: &str) -> Result<Vec<Record>> {
        let tables = self.tables.lock()?;
        Ok(tables
            .get(entity)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default())
    }

    pub fn row_count(&self, entity: &str) -> Result<usize> {
        let tables = self.tables.lock()?;
        Ok(tables.get(entity).map(|t| t.rows.len()).unwrap_or(0))
    }
}

enum Pending {
    Insert { entity: String, oid: u64 },
    Assign { entity: String, pk: Value, attrs: Record },
    Delete { entity: String, pk: Value },
}

struct Staged {
    entity: String,
    pk_field: String,
    attrs: Record,
    // assigned at flush
    pk: Option<Value>,
}

pub struct MemorySession {
    db: MemoryDb,
    working: HashMap<String, TableData>,
    pending: Vec<Pending>,
    staged: HashMap<u64, Staged>,
    next_oid: u64,
}

impl MemorySession {
    fn table(&mut self, entity: &str) -> Result<&mut TableData> {
        match self.working.entry(entity.to_string()) {
            Entry::Occupied(occupied) => Ok(occupied.into_mut()),
            Entry::Vacant(vacant) => {
                let data = self
                    .db
                    .tables
                    .lock()?
                    .get(entity)
                    .cloned()
                    .unwrap_or_default();
                Ok(vacant.insert(data))
            }
        }
    }

    fn validate(model: &EntityModel, attrs: &Record, insert: bool) -> Result<()> {
        for (key, value) in attrs {
            let field = model.field(key).ok_or_else(|| {
                CrudError::FieldNotFound(key.clone(), model.name().to_string())
            })?;
            if value.is_null() {
                if !field.nullable && !field.primary_key {
                    return Err(CrudError::ConstraintViolation(format!(
                        "Field '{}' is not nullable",
                        key
                    )));
                }
                continue;
            }
            if !field.data_type.is_compatible(value) {
                return Err(CrudError::TypeMismatch(format!(
                    "Field '{}' expects {}, got {}",
                    key,
                    field.data_type,
                    value.type_name()
                )));
            }
        }
        if insert {
            for field in model.fields() {
                if field.nullable || field.primary_key {
                    continue;
                }
                if attrs.get(&field.name).map(Value::is_null).unwrap_or(true) {
                    return Err(CrudError::ConstraintViolation(format!(
                        "Field '{}' is required",
                        field.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn apply_insert(&mut self, entity: &str, oid: u64) -> Result<()> {
        let (pk_field, mut attrs) = {
            let staged = self
                .staged
                .get(&oid)
                .ok_or_else(|| CrudError::Storage(format!("Unknown staged object {oid}")))?;
            (staged.pk_field.clone(), staged.attrs.clone())
        };

        let table = self.table(entity)?;
        let pk = match attrs.get(&pk_field) {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                table.next_id += 1;
                Value::Integer(table.next_id)
            }
        };
        if let Value::Integer(i) = &pk {
            table.next_id = table.next_id.max(*i);
        }
        if table.rows.contains_key(&pk) {
            return Err(CrudError::ConstraintViolation(format!(
                "Duplicate primary key {pk} for {entity}"
            )));
        }
        attrs.insert(pk_field, pk.clone());
        table.rows.insert(pk.clone(), attrs.clone());

        if let Some(staged) = self.staged.get_mut(&oid) {
            staged.pk = Some(pk);
            staged.attrs = attrs;
        }
        Ok(())
    }
}

impl Session for MemorySession {
    fn get(&mut self, model: &EntityModel, pk: &Value) -> Result<Option<Record>> {
        let table = self.table(&model.entity_name())?;
        Ok(table.rows.get(pk).cloned())
    }

    fn query(&mut self, model: &EntityModel, query: &ListQuery) -> Result<Vec<Record>> {
        let table = self.table(&model.entity_name())?;
        let mut rows: Vec<Record> = table.rows.values().cloned().collect();

        if let Some(filters) = &query.filters {
            rows = predicate::apply_filters(model, rows, filters)?;
        }
        // loads are eager-load hints for relational engines; nothing to do here
        if let Some(order_by) = &query.order_by {
            rows = predicate::apply_sort(model, rows, order_by)?;
        }
        if let Some(offset) = query.offset {
            rows = rows.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    fn count(&mut self, model: &EntityModel, filters: Option<&FilterSpec>) -> Result<u64> {
        let table = self.table(&model.entity_name())?;
        let rows: Vec<Record> = table.rows.values().cloned().collect();
        let rows = match filters {
            Some(filters) => predicate::apply_filters(model, rows, filters)?,
            None => rows,
        };
        Ok(rows.len() as u64)
    }

    fn add(&mut self, model: &EntityModel, record: Record) -> Result<ObjectId> {
        Self::validate(model, &record, true)?;
        let oid = self.next_oid;
        self.next_oid += 1;
        self.staged.insert(
            oid,
            Staged {
                entity: model.entity_name(),
                pk_field: model.primary_key().to_string(),
                attrs: record,
                pk: None,
            },
        );
        self.pending.push(Pending::Insert {
            entity: model.entity_name(),
            oid,
        });
        Ok(ObjectId::new(oid))
    }

    fn assign(&mut self, model: &EntityModel, pk: &Value, attrs: Record) -> Result<()> {
        Self::validate(model, &attrs, false)?;
        self.pending.push(Pending::Assign {
            entity: model.entity_name(),
            pk: pk.clone(),
            attrs,
        });
        Ok(())
    }

    fn remove(&mut self, model: &EntityModel, pk: &Value) -> Result<()> {
        self.pending.push(Pending::Delete {
            entity: model.entity_name(),
            pk: pk.clone(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        for change in pending {
            match change {
                Pending::Insert { entity, oid } => self.apply_insert(&entity, oid)?,
                Pending::Assign { entity, pk, attrs } => {
                    let table = self.table(&entity)?;
                    let row = table
                        .rows
                        .get_mut(&pk)
                        .ok_or_else(|| CrudError::not_found(&entity, &pk))?;
                    row.extend(attrs);
                }
                Pending::Delete { entity, pk } => {
                    let table = self.table(&entity)?;
                    table
                        .rows
                        .remove(&pk)
                        .ok_or_else(|| CrudError::not_found(&entity, &pk))?;
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.flush()?;
        let mut tables = self.db.tables.lock()?;
        for (entity, data) in &self.working {
            tables.insert(entity.clone(), data.clone());
        }
        log::debug!("committed {} table(s)", self.working.len());
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        self.staged.clear();
        self.working.clear();
        Ok(())
    }

    fn refresh(&mut self, _model: &EntityModel, id: ObjectId) -> Result<Record> {
        let (entity, pk, attrs) = {
            let staged = self
                .staged
                .get(&id.raw())
                .ok_or_else(|| CrudError::Storage(format!("Refresh of unknown object {}", id.raw())))?;
            (staged.entity.clone(), staged.pk.clone(), staged.attrs.clone())
        };
        match pk {
            Some(pk) => {
                let table = self.table(&entity)?;
                table
                    .rows
                    .get(&pk)
                    .cloned()
                    .ok_or_else(|| CrudError::not_found(&entity, &pk))
            }
            // not flushed yet: pending state as registered
            None => Ok(attrs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::model::FieldDef;

    fn widget_model() -> EntityModel {
        EntityModel::new(
            "Widget",
            vec![
                FieldDef::new("id", DataType::Integer).primary_key(),
                FieldDef::new("name", DataType::Text),
            ],
        )
    }

    fn named(name: &str) -> Record {
        let mut record = Record::new();
        record.insert("name".into(), Value::Text(name.into()));
        record
    }

    #[test]
    fn test_flush_assigns_generated_keys() {
        let db = MemoryDb::new();
        let mut session = db.session();
        let model = widget_model();

        let first = session.add(&model, named("a")).unwrap();
        let second = session.add(&model, named("b")).unwrap();
        session.flush().unwrap();

        let first = session.refresh(&model, first).unwrap();
        let second = session.refresh(&model, second).unwrap();
        assert_eq!(first.get("id"), Some(&Value::Integer(1)));
        assert_eq!(second.get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_flushed_state_is_session_local() {
        let db = MemoryDb::new();
        let mut session = db.session();
        let model = widget_model();

        session.add(&model, named("a")).unwrap();
        session.flush().unwrap();

        assert_eq!(session.get(&model, &Value::Integer(1)).unwrap().is_some(), true);
        assert_eq!(db.row_count("widget").unwrap(), 0);

        session.commit().unwrap();
        assert_eq!(db.row_count("widget").unwrap(), 1);
    }

    #[test]
    fn test_unflushed_changes_stay_pending() {
        let db = MemoryDb::new();
        let mut session = db.session();
        let model = widget_model();

        let id = session.add(&model, named("a")).unwrap();
        assert!(session.get(&model, &Value::Integer(1)).unwrap().is_none());
        // refresh before flush returns the registered state, no key yet
        let staged = session.refresh(&model, id).unwrap();
        assert!(staged.get("id").is_none());
    }

    #[test]
    fn test_rollback_discards_pending_changes() {
        let db = MemoryDb::new();
        let mut session = db.session();
        let model = widget_model();

        session.add(&model, named("a")).unwrap();
        session.flush().unwrap();
        session.rollback().unwrap();

        assert!(session.get(&model, &Value::Integer(1)).unwrap().is_none());
        assert_eq!(db.row_count("widget").unwrap(), 0);
    }

    #[test]
    fn test_explicit_key_bumps_generator() {
        let db = MemoryDb::new();
        let mut session = db.session();
        let model = widget_model();

        let mut record = named("a");
        record.insert("id".into(), Value::Integer(10));
        session.add(&model, record).unwrap();
        session.add(&model, named("b")).unwrap();
        session.flush().unwrap();

        assert!(session.get(&model, &Value::Integer(11)).unwrap().is_some());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let db = MemoryDb::new();
        let mut session = db.session();
        let model = widget_model();

        let mut record = Record::new();
        record.insert("bogus".into(), Value::Integer(1));
        assert!(matches!(
            session.add(&model, record),
            Err(CrudError::FieldNotFound(_, _))
        ));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let db = MemoryDb::new();
        let mut session = db.session();
        let model = widget_model();

        let mut record = named("a");
        record.insert("id".into(), Value::Integer(1));
        session.add(&model, record.clone()).unwrap();
        session.flush().unwrap();

        session.add(&model, record).unwrap();
        assert!(matches!(
            session.flush(),
            Err(CrudError::ConstraintViolation(_))
        ));
    }
}

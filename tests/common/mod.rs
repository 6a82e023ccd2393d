#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use autocrud::{
    CrudEvent, DataType, EntityModel, EventDispatcher, FieldDef, MemoryDb, Record, ServiceHost,
    SharedSession, Value,
};

/// Collects every dispatched event for assertions.
#[derive(Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<CrudEvent>>,
}

impl RecordingDispatcher {
    pub fn events(&self) -> Vec<CrudEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventDispatcher for RecordingDispatcher {
    fn dispatch(&self, event: CrudEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct TestService {
    pub session: SharedSession,
    pub dispatcher: Arc<RecordingDispatcher>,
}

impl ServiceHost for TestService {
    fn session_dependency(&self, name: &str) -> Option<SharedSession> {
        (name == "session").then(|| self.session.clone())
    }

    fn dispatcher_dependency(&self, name: &str) -> Option<Arc<dyn EventDispatcher>> {
        (name == "dispatcher").then(|| self.dispatcher.clone() as Arc<dyn EventDispatcher>)
    }
}

pub fn widget_model() -> EntityModel {
    EntityModel::new(
        "Widget",
        vec![
            FieldDef::new("id", DataType::Integer).primary_key(),
            FieldDef::new("name", DataType::Text),
            FieldDef::new("color", DataType::Text),
        ],
    )
}

pub fn widget_service(db: &MemoryDb) -> TestService {
    TestService {
        session: db.shared_session(),
        dispatcher: Arc::new(RecordingDispatcher::default()),
    }
}

pub fn named(name: &str) -> Record {
    let mut record = Record::new();
    record.insert("name".into(), Value::Text(name.into()));
    record
}

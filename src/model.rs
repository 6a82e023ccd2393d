use crate::core::{DataType, Record, Value};

/// One declared attribute of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Descriptor of the persistent type a CRUD surface manages. Immutable once
/// bound; the core treats instances of the entity as opaque attribute bags
/// shaped by these fields.
#[derive(Debug, Clone)]
pub struct EntityModel {
    name: String,
    fields: Vec<FieldDef>,
}

impl EntityModel {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Declared type name, e.g. `Widget`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default entity name: the lowercased type name.
    pub fn entity_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Default plural: entity name with a trailing `s`.
    pub fn entity_name_plural(&self) -> String {
        format!("{}s", self.entity_name())
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Name of the primary-key field: the first field flagged as such,
    /// falling back to `id`.
    pub fn primary_key(&self) -> &str {
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .map(|f| f.name.as_str())
            .unwrap_or("id")
    }

    pub fn primary_key_type(&self) -> DataType {
        self.field(self.primary_key())
            .map(|f| f.data_type.clone())
            .unwrap_or(DataType::Integer)
    }

    pub fn primary_key_of<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        record.get(self.primary_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> EntityModel {
        EntityModel::new(
            "Widget",
            vec![
                FieldDef::new("id", DataType::Integer).primary_key(),
                FieldDef::new("name", DataType::Text),
            ],
        )
    }

    #[test]
    fn test_name_derivation() {
        let model = widget();
        assert_eq!(model.entity_name(), "widget");
        assert_eq!(model.entity_name_plural(), "widgets");
    }

    #[test]
    fn test_primary_key_resolution() {
        let model = widget();
        assert_eq!(model.primary_key(), "id");
        assert_eq!(model.primary_key_type(), DataType::Integer);

        let keyless = EntityModel::new("Thing", vec![FieldDef::new("name", DataType::Text)]);
        assert_eq!(keyless.primary_key(), "id");
    }

    #[test]
    fn test_field_lookup() {
        let model = widget();
        assert!(model.has_field("name"));
        assert!(!model.has_field("missing"));
        assert_eq!(model.field("id").unwrap().data_type, DataType::Integer);
    }
}

//! Reference predicate engine: applies declarative filter and sort specs to
//! in-memory record sets. External storage engines are free to translate the
//! same specs into their own query language instead.

use std::cmp::Ordering;

use serde_json::Value as JsonValue;

use crate::core::{CrudError, Record, Result, Value};
use crate::model::{EntityModel, FieldDef};
use crate::query::pattern::like_match;
use crate::query::spec::{FilterClause, FilterOp, FilterSpec, SortDirection, SortSpec};

/// Keep the records matching every clause, in their incoming order.
pub fn apply_filters(
    model: &EntityModel,
    rows: Vec<Record>,
    filters: &FilterSpec,
) -> Result<Vec<Record>> {
    for clause in filters {
        require_field(model, &clause.field)?;
    }

    let mut out = Vec::with_capacity(rows.len());
    'rows: for row in rows {
        for clause in filters {
            if !eval_clause(model, &row, clause)? {
                continue 'rows;
            }
        }
        out.push(row);
    }
    Ok(out)
}

/// Evaluate one clause against one record. Missing attributes read as NULL.
pub fn eval_clause(model: &EntityModel, record: &Record, clause: &FilterClause) -> Result<bool> {
    let field = require_field(model, &clause.field)?;
    let attr = record.get(&clause.field).cloned().unwrap_or(Value::Null);

    match clause.op {
        FilterOp::IsNull => Ok(attr.is_null()),
        FilterOp::IsNotNull => Ok(!attr.is_null()),
        FilterOp::In => eval_in(field, &attr, clause),
        FilterOp::Like | FilterOp::Ilike => {
            let text = attr.as_str().ok_or_else(|| {
                CrudError::TypeMismatch(format!(
                    "LIKE requires a text attribute, '{}' is {}",
                    clause.field,
                    attr.type_name()
                ))
            })?;
            let pattern = clause
                .value
                .as_ref()
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    CrudError::TypeMismatch("LIKE requires a text pattern".to_string())
                })?;
            like_match(text, pattern, clause.op == FilterOp::Ilike)
        }
        op => {
            // SQL three-valued logic collapsed: NULL on either side never matches
            let rhs = clause.value.clone().unwrap_or(Value::Null);
            if attr.is_null() || rhs.is_null() {
                return Ok(false);
            }
            let rhs = rhs.coerce_to(&field.data_type)?;
            let ord = attr.compare(&rhs)?;
            Ok(match op {
                FilterOp::Eq => ord == Ordering::Equal,
                FilterOp::Ne => ord != Ordering::Equal,
                FilterOp::Lt => ord == Ordering::Less,
                FilterOp::Le => ord != Ordering::Greater,
                FilterOp::Gt => ord == Ordering::Greater,
                FilterOp::Ge => ord != Ordering::Less,
                _ => unreachable!("non-comparison operators handled above"),
            })
        }
    }
}

fn eval_in(field: &FieldDef, attr: &Value, clause: &FilterClause) -> Result<bool> {
    let items = match &clause.value {
        Some(Value::Json(JsonValue::Array(items))) => items,
        _ => {
            return Err(CrudError::TypeMismatch(
                "IN requires an array value".to_string(),
            ));
        }
    };
    if attr.is_null() {
        return Ok(false);
    }
    for item in items {
        let candidate = Value::from_json(item).coerce_to(&field.data_type)?;
        if attr.compare(&candidate)? == Ordering::Equal {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Stable multi-key sort. NULLs sort last within each key; records that do
/// not compare keep their relative order.
pub fn apply_sort(model: &EntityModel, mut rows: Vec<Record>, order_by: &SortSpec) -> Result<Vec<Record>> {
    for clause in order_by {
        require_field(model, &clause.field)?;
    }
    rows.sort_by(|a, b| compare_records(a, b, order_by));
    Ok(rows)
}

fn compare_records(a: &Record, b: &Record, order_by: &SortSpec) -> Ordering {
    for clause in order_by {
        let left = a.get(&clause.field).cloned().unwrap_or(Value::Null);
        let right = b.get(&clause.field).cloned().unwrap_or(Value::Null);
        let ord = left.compare(&right).unwrap_or_else(|_| left.cmp(&right));
        let ord = match clause.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn require_field<'a>(model: &'a EntityModel, name: &str) -> Result<&'a FieldDef> {
    model
        .field(name)
        .ok_or_else(|| CrudError::FieldNotFound(name.to_string(), model.name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::query::spec::SortClause;
    use serde_json::json;

    fn model() -> EntityModel {
        EntityModel::new(
            "Widget",
            vec![
                FieldDef::new("id", DataType::Integer).primary_key(),
                FieldDef::new("name", DataType::Text),
                FieldDef::new("weight", DataType::Float),
            ],
        )
    }

    fn row(id: i64, name: &str, weight: Option<f64>) -> Record {
        let mut record = Record::new();
        record.insert("id".into(), Value::Integer(id));
        record.insert("name".into(), Value::Text(name.into()));
        record.insert(
            "weight".into(),
            weight.map(Value::Float).unwrap_or(Value::Null),
        );
        record
    }

    fn rows() -> Vec<Record> {
        vec![
            row(1, "anvil", Some(9.5)),
            row(2, "bolt", Some(0.1)),
            row(3, "anchor", None),
        ]
    }

    #[test]
    fn test_eq_filter() {
        let filters = vec![FilterClause::new("name", FilterOp::Eq, "bolt")];
        let matched = apply_filters(&model(), rows(), &filters).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_comparison_filters() {
        let filters = vec![FilterClause::new("id", FilterOp::Gt, 1i64)];
        assert_eq!(apply_filters(&model(), rows(), &filters).unwrap().len(), 2);

        let filters = vec![FilterClause::new("weight", FilterOp::Le, 9.5)];
        // NULL weight never matches
        assert_eq!(apply_filters(&model(), rows(), &filters).unwrap().len(), 2);
    }

    #[test]
    fn test_like_filter() {
        let filters = vec![FilterClause::new("name", FilterOp::Like, "an%")];
        assert_eq!(apply_filters(&model(), rows(), &filters).unwrap().len(), 2);
    }

    #[test]
    fn test_in_filter() {
        let clause = FilterClause {
            field: "id".into(),
            op: FilterOp::In,
            value: Some(Value::Json(json!([1, 3]))),
        };
        assert_eq!(
            apply_filters(&model(), rows(), &vec![clause]).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_null_filters() {
        let matched = apply_filters(&model(), rows(), &vec![FilterClause::is_null("weight")]).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].get("id"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let filters = vec![FilterClause::new("missing", FilterOp::Eq, 1i64)];
        let err = apply_filters(&model(), rows(), &filters).unwrap_err();
        assert!(matches!(err, CrudError::FieldNotFound(_, _)));
    }

    #[test]
    fn test_sort_asc_desc() {
        let sorted = apply_sort(&model(), rows(), &vec![SortClause::asc("name")]).unwrap();
        let names: Vec<_> = sorted
            .iter()
            .map(|r| r.get("name").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["anchor", "anvil", "bolt"]);

        let sorted = apply_sort(&model(), rows(), &vec![SortClause::desc("id")]).unwrap();
        assert_eq!(sorted[0].get("id"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_sort_nulls_last() {
        let sorted = apply_sort(&model(), rows(), &vec![SortClause::asc("weight")]).unwrap();
        assert_eq!(sorted[2].get("id"), Some(&Value::Integer(3)));
    }
}

use serde::{Deserialize, Serialize};

use crate::core::Value;

/// Predicate operators understood by the filter clause format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    Ilike,
    In,
    IsNull,
    IsNotNull,
}

/// One declarative predicate: field, operator, optional comparison value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterClause {
    pub field: String,
    pub op: FilterOp,
    #[serde(default)]
    pub value: Option<Value>,
}

impl FilterClause {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: Some(value.into()),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::IsNull,
            value: None,
        }
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::IsNotNull,
            value: None,
        }
    }
}

pub type FilterSpec = Vec<FilterClause>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortClause {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortClause {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

pub type SortSpec = Vec<SortClause>;

/// Eager-load hints, passed through to the storage engine verbatim.
pub type LoadSpec = Vec<String>;

/// Refinements of one list/page query. Engines must apply the parts in the
/// fixed order filters, loads, order_by, offset, limit, so that pagination
/// always windows the filtered, sorted set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub filters: Option<FilterSpec>,
    pub loads: Option<LoadSpec>,
    pub order_by: Option<SortSpec>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filters(mut self, filters: FilterSpec) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_loads(mut self, loads: LoadSpec) -> Self {
        self.loads = Some(loads);
        self
    }

    pub fn with_order_by(mut self, order_by: SortSpec) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub mod pattern;
pub mod predicate;
pub mod spec;

pub use spec::{
    FilterClause, FilterOp, FilterSpec, ListQuery, LoadSpec, SortClause, SortDirection, SortSpec,
};

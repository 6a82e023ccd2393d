pub mod error;
pub mod value;

pub use error::{CrudError, Result};
pub use value::{DataType, Record, Value};

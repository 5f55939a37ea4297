pub mod common;
pub mod crud;

pub use common::common_routes;
pub use crud::{CrudRouter, Operation, DEFAULT_PAGINATION};

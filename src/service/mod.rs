//! CrudService: entity-aware CRUD over a record store, plus request validation.

mod crud;
mod validation;
pub use crud::{CrudService, DEFAULT_LIMIT, MAX_LIMIT};
pub use validation::RequestValidator;

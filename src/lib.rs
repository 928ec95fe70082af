//! Rental admin: catalog-driven REST backend for rentals, tools, users and outlets, with
//! policy-checked record routes and a headless edit form client.

pub mod authz;
pub mod client;
pub mod config;
pub mod dates;
pub mod error;
pub mod form;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use authz::{AccessOperation, PolicyService, RemotePolicy, RolePolicy, Session};
pub use client::{ClientError, HttpResourceApi, ResourceApi};
pub use config::{builtin_config, load_from_dir, resolve, FullConfig, ResolvedEntity, ResolvedModel, Settings};
pub use error::{AppError, ConfigError};
pub use form::{guard_page, rental_edit_form, EditForm, PageAccess, SubmitOutcome};
pub use response::{record_created, record_ok, success_many};
pub use routes::{build_app, common_routes, resource_routes, API_PREFIX};
pub use service::CrudService;
pub use state::AppState;
pub use store::{apply_migrations, ensure_database_exists, MemoryStore, PgStore, RecordStore};

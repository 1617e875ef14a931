//! Command implementations.

mod routes;
mod run;
mod validate;

pub use routes::run_routes;
pub use run::run_pipeline;
pub use validate::run_validate;

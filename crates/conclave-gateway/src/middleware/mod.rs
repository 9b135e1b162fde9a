//! The ordered security-pipeline stages (§4.7), one module per stage.
//! Wired together by `crate::routes::build_router` in request order
//! trace -> body_limit -> logging -> auth -> rbac -> input_filter ->
//! output_filter -> handler.

pub mod auth;
pub mod body_limit;
pub mod input_filter;
pub mod logging;
pub mod output_filter;
pub mod rbac;
pub mod trace;

pub use auth::auth_stage;
pub use body_limit::body_limit_stage;
pub use input_filter::input_filter_stage;
pub use logging::logging_stage;
pub use output_filter::output_filter_stage;
pub use rbac::rbac_stage;
pub use trace::trace_stage;

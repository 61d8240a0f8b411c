//! HTTP route handlers, one module per resource.

pub mod ad;
pub mod campaign;
pub mod cfg;
pub mod confirm;
pub mod serve;

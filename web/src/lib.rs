pub mod app;
pub mod controllers;
pub mod error;
pub mod middlewares;
pub mod readiness;
pub mod reload;
pub mod router;
pub mod runtime;
pub mod server;
pub mod state;
pub mod tracing;

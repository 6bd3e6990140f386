pub mod api;
pub mod config;
pub mod consent;
pub mod core;
pub mod logging;

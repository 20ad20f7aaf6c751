pub mod catalog_loader;
pub mod config;
pub mod session_store;

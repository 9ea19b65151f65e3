pub mod config;
pub mod domain;
pub mod error;
pub mod loader;
pub mod locator;
pub mod output;
pub mod remote;
pub mod snapshot;
pub mod store;
pub mod table;

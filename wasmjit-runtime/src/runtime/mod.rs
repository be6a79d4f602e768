pub mod config;
pub mod error;
pub mod exec;
pub mod instance;
pub mod instantiate;
pub mod namespace;
pub mod store;
pub mod typecheck;
pub mod values;
pub mod vector;

pub use {config::Config, exec::execute, store::Store};

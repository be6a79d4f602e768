//! The store and linkage core of a WebAssembly runtime: typed addresses into
//! growable instance tables, module instantiation against a shared
//! namespace, and a single entry point for running guest code.

pub mod log_tag;
pub mod runtime;
pub mod syntax;

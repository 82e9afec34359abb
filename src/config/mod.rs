//! Configuration for the relay server and the headless peer
//!
//! Values are resolved from CLI arguments and environment variables in
//! `main.rs`; the structs here only carry defaults and validation.

mod schema;

pub use schema::*;

//! tmxscripter library.
//!
//! Loads a TMX tile map, runs a Lua script against it and writes the
//! (possibly edited) map back out. Exposed as a library for the binary and
//! for integration tests.

pub mod config;
pub mod error;
pub mod filesystem;
pub mod luarc_generator;
pub mod scripter;
pub mod scripting;
pub mod stub_generator;
pub mod tmx;

pub use error::ScripterError;
pub use scripter::{RunStage, TmxScripter};

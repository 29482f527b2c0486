//! Error taxonomy for a scripted map run.
//!
//! Every stage of [`TmxScripter::run`](crate::scripter::TmxScripter::run)
//! returns the first error it meets, wrapped with the stage it happened in.
//! Nothing is retried; the binary prints the error and exits non-zero.

use crate::tmx::MapError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a scripted map run.
#[derive(Debug, Error)]
pub enum ScripterError {
    /// The input map does not exist.
    #[error("Input file {} does not exist", .0.display())]
    MissingInput(PathBuf),

    /// The script does not exist.
    #[error("Script file {} does not exist", .0.display())]
    MissingScript(PathBuf),

    /// Open, read or write failure on one of the run's files.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The input could not be parsed as a map.
    #[error("Could not parse map file: {0}")]
    Parse(#[source] MapError),

    /// The script has a syntax error.
    #[error("Could not compile script: {0}")]
    ScriptCompile(#[source] mlua::Error),

    /// The script raised an error while loading or inside a listener,
    /// including Host API misuse.
    #[error("{context}: {source}")]
    ScriptRuntime {
        context: String,
        #[source]
        source: mlua::Error,
    },

    /// The (possibly mutated) map could not be re-encoded.
    #[error("Could not reserialize map: {0}")]
    Serialization(#[source] MapError),

    /// Missing required options or an unreadable configuration file.
    #[error("{0}")]
    Config(String),
}

impl ScripterError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn script_runtime(context: impl Into<String>, source: mlua::Error) -> Self {
        Self::ScriptRuntime {
            context: context.into(),
            source,
        }
    }
}

//! Per-run listener table.

use mlua::prelude::*;
use rustc_hash::FxHashMap;

/// Ordered callback lists keyed by event name.
///
/// Lives inside one [`ScriptRuntime`](super::ScriptRuntime) and is dropped
/// with it, so listeners never leak between runs.
#[derive(Debug, Default)]
pub struct EventRegistry {
    listeners: FxHashMap<String, Vec<LuaFunction>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `callback` to the listeners of `name`.
    pub fn add_listener(&mut self, name: impl Into<String>, callback: LuaFunction) {
        self.listeners.entry(name.into()).or_default().push(callback);
    }

    /// Listeners of `name` in registration order.
    pub fn listeners(&self, name: &str) -> &[LuaFunction] {
        self.listeners.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners(name).len()
    }
}

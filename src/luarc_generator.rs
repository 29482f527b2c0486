//! Generator for `.luarc.json`, the Lua Language Server configuration.
//!
//! Points the language server at the generated stub file and disables the
//! standard libraries the sandbox does not load.

use crate::scripting::ScriptRuntime;
use mlua::prelude::*;
use std::path::Path;

/// Standard libraries missing from the sandbox.
const DISABLED_BUILTINS: &[&str] = &["io", "os", "package", "debug", "ffi", "jit"];

/// Generate `.luarc.json` content for scripts run by `runtime`.
///
/// Validates that the `__meta` table exists, then builds the JSON
/// configuration string.
pub fn generate_luarc(runtime: &ScriptRuntime, stubs_filename: &str) -> Result<String, String> {
    let _meta: LuaTable = runtime
        .lua()
        .globals()
        .get("__meta")
        .map_err(|e| format!("Failed to get __meta: {e}"))?;

    let builtins: serde_json::Map<String, serde_json::Value> = DISABLED_BUILTINS
        .iter()
        .map(|lib| (lib.to_string(), serde_json::Value::from("disable")))
        .collect();

    let content = serde_json::json!({
        "$schema": "https://raw.githubusercontent.com/LuaLS/vscode-lua/master/setting/schema.json",
        "runtime.version": "LuaJIT",
        "runtime.builtin": builtins,
        "workspace.library": [stubs_filename],
        "completion.autoRequire": false
    });

    serde_json::to_string_pretty(&content)
        .map_err(|e| format!("Failed to serialize .luarc.json: {e}"))
}

/// Write the generated `.luarc.json` content to a file.
pub fn write_luarc(path: &Path, content: &str) -> Result<(), String> {
    std::fs::write(path, content).map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

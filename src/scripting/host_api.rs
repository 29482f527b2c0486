//! Global functions registered into the sandbox.
//!
//! Every function checks its arguments before doing any work and raises
//! `Usage: <signature>` on misuse. File paths are resolved against the
//! directory of the running script.

use super::marshal::{bytes_arg, expect_arity, function_arg, string_arg, usage};
use super::runtime::{ScriptRuntime, script_data};
use crate::error::ScripterError;
use crate::filesystem::{read_all, resolve_script_path, write_all};
use log::{debug, info, warn};
use mlua::prelude::*;

pub(super) const ADD_EVENT_LISTENER: &str = "addEventListener(string, func)";
pub(super) const READ_FILE: &str = "readFile(path)";
pub(super) const WRITE_FILE: &str = "writeFile(path, data)";
pub(super) const JSON_DECODE: &str = "json.decode(text)";
pub(super) const JSON_ENCODE: &str = "json.encode(value)";

impl ScriptRuntime {
    /// Registers `addEventListener(name, callback)`.
    pub(super) fn register_event_api(&self) -> LuaResult<()> {
        self.lua().globals().set(
            "addEventListener",
            self.lua()
                .create_function(|lua, args: LuaVariadic<LuaValue>| {
                    expect_arity(&args, 2, ADD_EVENT_LISTENER)?;
                    let name = string_arg(&args, 0, ADD_EVENT_LISTENER)?;
                    let callback = function_arg(&args, 1, ADD_EVENT_LISTENER)?;
                    if name.is_empty() {
                        return Err(usage(ADD_EVENT_LISTENER));
                    }
                    debug!("listener registered for event {name:?}");
                    script_data(lua)?
                        .registry
                        .borrow_mut()
                        .add_listener(name, callback);
                    Ok(())
                })?,
        )
    }

    /// Registers `readFile(path)` and `writeFile(path, data)`.
    pub(super) fn register_file_api(&self) -> LuaResult<()> {
        let globals = self.lua().globals();

        globals.set(
            "readFile",
            self.lua()
                .create_function(|lua, args: LuaVariadic<LuaValue>| {
                    expect_arity(&args, 1, READ_FILE)?;
                    let path = string_arg(&args, 0, READ_FILE)?;
                    let data = script_data(lua)?;
                    let resolved = resolve_script_path(&data.script_path, &path);
                    debug!("readFile {}", resolved.display());
                    let contents = read_all(data.fs.as_ref(), &resolved).map_err(|e| {
                        warn!("readFile({path:?}) failed: {e}");
                        LuaError::external(ScripterError::io(
                            format!("Could not read file {}", resolved.display()),
                            e,
                        ))
                    })?;
                    lua.create_string(contents)
                })?,
        )?;

        globals.set(
            "writeFile",
            self.lua()
                .create_function(|lua, args: LuaVariadic<LuaValue>| {
                    expect_arity(&args, 2, WRITE_FILE)?;
                    let path = string_arg(&args, 0, WRITE_FILE)?;
                    let contents = bytes_arg(&args, 1, WRITE_FILE)?;
                    let data = script_data(lua)?;
                    let resolved = resolve_script_path(&data.script_path, &path);
                    debug!("writeFile {} ({} bytes)", resolved.display(), contents.len());
                    write_all(data.fs.as_ref(), &resolved, &contents).map_err(|e| {
                        warn!("writeFile({path:?}) failed: {e}");
                        LuaError::external(ScripterError::io(
                            format!("Could not write file {}", resolved.display()),
                            e,
                        ))
                    })
                })?,
        )
    }

    /// Registers `log(...)`, printed on the `script` target.
    pub(super) fn register_log_api(&self) -> LuaResult<()> {
        self.lua().globals().set(
            "log",
            self.lua()
                .create_function(|lua, args: LuaVariadic<LuaValue>| {
                    let tostring: LuaFunction = lua.globals().get("tostring")?;
                    let mut parts = Vec::with_capacity(args.len());
                    for value in args.iter() {
                        parts.push(tostring.call::<String>(value.clone())?);
                    }
                    info!(target: "script", "{}", parts.join(" "));
                    Ok(())
                })?,
        )
    }

    /// Registers the `json` table.
    pub(super) fn register_json_api(&self) -> LuaResult<()> {
        let json = self.lua().create_table()?;

        // json.decode(text) -> value
        json.set(
            "decode",
            self.lua()
                .create_function(|lua, args: LuaVariadic<LuaValue>| {
                    expect_arity(&args, 1, JSON_DECODE)?;
                    let text = string_arg(&args, 0, JSON_DECODE)?;
                    let value: serde_json::Value = serde_json::from_str(&text)
                        .map_err(|e| LuaError::runtime(format!("json.decode: {e}")))?;
                    lua.to_value(&value)
                })?,
        )?;

        // json.encode(value) -> string
        json.set(
            "encode",
            self.lua()
                .create_function(|_, args: LuaVariadic<LuaValue>| {
                    expect_arity(&args, 1, JSON_ENCODE)?;
                    serde_json::to_string(&args[0])
                        .map_err(|e| LuaError::runtime(format!("json.encode: {e}")))
                })?,
        )?;

        self.lua().globals().set("json", json)
    }
}

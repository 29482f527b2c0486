//! EmmyLua stub output for the scripting sandbox.
//!
//! Reads `__meta` from a script runtime and emits a deterministic stub file
//! with `---@class`, `---@field`, `---@param` and `---@return` annotations
//! for the sandbox globals and the Map / Layer / Grid / Tile classes.

use crate::scripting::ScriptRuntime;
use mlua::prelude::*;
use std::fmt::{self, Write as FmtWrite};
use std::path::Path;

/// Order in which function categories appear in the stub file.
const CATEGORY_ORDER: &[&str] = &["event", "file", "log", "json"];

/// Class display order.
const CLASS_ORDER: &[&str] = &["Map", "Layer", "Grid", "Tile"];

/// Section heading for a function category.
fn category_title(cat: &str) -> &str {
    match cat {
        "event" => "Events",
        "file" => "File Access",
        "log" => "Logging",
        "json" => "JSON",
        _ => cat,
    }
}

/// Converts a `__meta` type name into an EmmyLua type.
fn lua_type_annotation(meta_type: &str) -> String {
    match meta_type.strip_suffix('?') {
        Some(inner) => format!("{inner}|nil"),
        None => meta_type.to_string(),
    }
}

struct FnMeta {
    name: String,
    description: String,
    category: String,
    params: Vec<(String, String)>,
    returns: Option<String>,
}

struct FieldMeta {
    name: String,
    type_name: String,
    description: String,
}

struct MethodMeta {
    name: String,
    description: String,
    params: Vec<(String, String)>,
    returns: Option<String>,
}

struct ClassMeta {
    name: String,
    description: String,
    fields: Vec<FieldMeta>,
    methods: Vec<MethodMeta>,
}

struct EventMeta {
    name: String,
    description: String,
    params: Vec<(String, String)>,
}

/// Extract all metadata from `__meta` and generate the stub file content.
pub fn generate_stubs(runtime: &ScriptRuntime) -> Result<String, String> {
    let meta: LuaTable = runtime
        .lua()
        .globals()
        .get("__meta")
        .map_err(|e| format!("Failed to get __meta: {e}"))?;

    let functions = extract_functions(&meta).map_err(|e| format!("Functions: {e}"))?;
    let classes = extract_classes(&meta).map_err(|e| format!("Classes: {e}"))?;
    let events = extract_events(&meta).map_err(|e| format!("Events: {e}"))?;

    render_stubs(&functions, &classes, &events).map_err(|e| format!("Failed to render stubs: {e}"))
}

/// Saves rendered stubs to `path`.
pub fn write_stubs(path: &Path, content: &str) -> Result<(), String> {
    std::fs::write(path, content).map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

// __meta reading

fn extract_params(tbl: &LuaTable) -> Result<Vec<(String, String)>, LuaError> {
    let params_tbl: LuaTable = tbl.get("params")?;
    let mut params = Vec::new();
    for p in params_tbl.sequence_values::<LuaTable>() {
        let p = p?;
        params.push((p.get::<String>("name")?, p.get::<String>("type")?));
    }
    Ok(params)
}

fn extract_returns(tbl: &LuaTable) -> Option<String> {
    tbl.get::<LuaTable>("returns")
        .ok()
        .and_then(|r| r.get::<String>("type").ok())
}

fn extract_functions(meta: &LuaTable) -> Result<Vec<FnMeta>, LuaError> {
    let fns_tbl: LuaTable = meta.get("functions")?;
    let mut result = Vec::new();
    for pair in fns_tbl.pairs::<String, LuaTable>() {
        let (name, tbl) = pair?;
        result.push(FnMeta {
            name,
            description: tbl.get("description")?,
            category: tbl.get("category")?,
            params: extract_params(&tbl)?,
            returns: extract_returns(&tbl),
        });
    }
    // category order first, then by name
    let rank = |cat: &str| CATEGORY_ORDER.iter().position(|c| *c == cat).unwrap_or(99);
    result.sort_by(|a, b| {
        rank(&a.category)
            .cmp(&rank(&b.category))
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(result)
}

fn extract_classes(meta: &LuaTable) -> Result<Vec<ClassMeta>, LuaError> {
    let classes_tbl: LuaTable = meta.get("classes")?;
    let mut result = Vec::new();
    for pair in classes_tbl.pairs::<String, LuaTable>() {
        let (name, tbl) = pair?;

        let fields_tbl: LuaTable = tbl.get("fields")?;
        let mut fields = Vec::new();
        for f in fields_tbl.sequence_values::<LuaTable>() {
            let f = f?;
            fields.push(FieldMeta {
                name: f.get("name")?,
                type_name: f.get("type")?,
                description: f.get("description")?,
            });
        }

        // Methods keep their registration order.
        let methods_tbl: LuaTable = tbl.get("methods")?;
        let mut methods = Vec::new();
        for m in methods_tbl.sequence_values::<LuaTable>() {
            let m = m?;
            methods.push(MethodMeta {
                name: m.get("name")?,
                description: m.get("description")?,
                params: extract_params(&m)?,
                returns: extract_returns(&m),
            });
        }

        result.push(ClassMeta {
            name,
            description: tbl.get("description")?,
            fields,
            methods,
        });
    }
    result.sort_by_key(|c| {
        CLASS_ORDER
            .iter()
            .position(|n| *n == c.name)
            .unwrap_or(99)
    });
    Ok(result)
}

fn extract_events(meta: &LuaTable) -> Result<Vec<EventMeta>, LuaError> {
    let events_tbl: LuaTable = meta.get("events")?;
    let mut result = Vec::new();
    for pair in events_tbl.pairs::<String, LuaTable>() {
        let (name, tbl) = pair?;
        result.push(EventMeta {
            name,
            description: tbl.get("description")?,
            params: extract_params(&tbl)?,
        });
    }
    result.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(result)
}

// output

fn render_stubs(
    functions: &[FnMeta],
    classes: &[ClassMeta],
    events: &[EventMeta],
) -> Result<String, fmt::Error> {
    let mut out = String::with_capacity(8 * 1024);

    writeln!(out, "---@meta")?;
    writeln!(out)?;
    writeln!(
        out,
        "-- THIS FILE IS AUTO-GENERATED by `tmxscripter --create-lua-stubs`."
    )?;
    writeln!(out, "-- DO NOT EDIT MANUALLY. Regenerate from __meta instead.")?;
    writeln!(out)?;

    let tables = table_names(functions);
    for table in &tables {
        writeln!(out, "---@class {table}")?;
        writeln!(out, "{table} = {{}}")?;
        writeln!(out)?;
    }

    render_events(&mut out, events)?;
    render_functions(&mut out, functions)?;
    for class in classes {
        render_class(&mut out, class)?;
    }

    Ok(out)
}

/// Tables that hold functions, e.g. `json` for `json.decode`.
fn table_names(functions: &[FnMeta]) -> Vec<&str> {
    let mut tables: Vec<&str> = functions
        .iter()
        .filter_map(|f| f.name.split_once('.').map(|(table, _)| table))
        .collect();
    tables.sort_unstable();
    tables.dedup();
    tables
}

fn render_events(out: &mut String, events: &[EventMeta]) -> fmt::Result {
    writeln!(out, "-- Event Listeners --")?;
    writeln!(out, "-- Register these with addEventListener(event, callback).")?;
    writeln!(out)?;

    for event in events {
        write_description(out, &event.description)?;
        let params: Vec<String> = event
            .params
            .iter()
            .map(|(name, ty)| format!("{name}: {}", lua_type_annotation(ty)))
            .collect();
        writeln!(
            out,
            "---@alias {}Listener fun({})",
            listener_alias(&event.name),
            params.join(", ")
        )?;
        writeln!(out)?;
    }
    Ok(())
}

/// `map` -> `Map`, used for listener alias names.
fn listener_alias(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn render_functions(out: &mut String, functions: &[FnMeta]) -> fmt::Result {
    let mut current_category = "";

    for f in functions {
        if f.category != current_category {
            current_category = &f.category;
            writeln!(out, "-- {} --", category_title(current_category))?;
            writeln!(out)?;
        }
        write_description(out, &f.description)?;
        for (pname, ptype) in &f.params {
            writeln!(out, "---@param {pname} {}", lua_type_annotation(ptype))?;
        }
        if let Some(ref ret) = f.returns {
            writeln!(out, "---@return {}", lua_type_annotation(ret))?;
        }
        let param_names: Vec<&str> = f.params.iter().map(|(n, _)| n.as_str()).collect();
        writeln!(out, "function {}({}) end", f.name, param_names.join(", "))?;
        writeln!(out)?;
    }
    Ok(())
}

/// Emits each line of `description` as a `---` comment.
fn write_description(out: &mut String, description: &str) -> fmt::Result {
    for line in description.lines() {
        writeln!(out, "---{line}")?;
    }
    Ok(())
}

fn render_class(out: &mut String, class: &ClassMeta) -> fmt::Result {
    writeln!(out, "-- {} --", class.name)?;
    writeln!(out)?;
    writeln!(out, "---@class {}", class.name)?;
    writeln!(out, "---{}", class.description)?;
    for field in &class.fields {
        writeln!(
            out,
            "---@field {} {} {}",
            field.name,
            lua_type_annotation(&field.type_name),
            field.description
        )?;
    }
    writeln!(out, "local {} = {{}}", class.name)?;
    writeln!(out)?;

    for m in &class.methods {
        write_description(out, &m.description)?;
        for (pname, ptype) in &m.params {
            writeln!(out, "---@param {pname} {}", lua_type_annotation(ptype))?;
        }
        if let Some(ref ret) = m.returns {
            writeln!(out, "---@return {}", lua_type_annotation(ret))?;
        }
        let param_names: Vec<&str> = m.params.iter().map(|(n, _)| n.as_str()).collect();
        writeln!(
            out,
            "function {}:{}({}) end",
            class.name,
            m.name,
            param_names.join(", ")
        )?;
        writeln!(out)?;
    }
    Ok(())
}

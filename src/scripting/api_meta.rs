//! Description of the sandbox API, published to Lua as `__meta` in tooling
//! runtimes only.
//!
//! The stub generator reads `__meta` back out of a live runtime, so the
//! tables below must list exactly what the runtime registers.

use super::runtime::ScriptRuntime;
use mlua::prelude::*;

pub struct ParamDoc {
    pub name: &'static str,
    pub type_name: &'static str,
}

pub struct FunctionDoc {
    /// Global name, or `table.name` for functions inside a table.
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamDoc],
    pub returns: Option<&'static str>,
}

pub struct FieldDoc {
    pub name: &'static str,
    pub type_name: &'static str,
    pub description: &'static str,
}

pub struct MethodDoc {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamDoc],
    pub returns: Option<&'static str>,
}

pub struct ClassDoc {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [FieldDoc],
    pub methods: &'static [MethodDoc],
}

pub struct EventDoc {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamDoc],
}

const fn param(name: &'static str, type_name: &'static str) -> ParamDoc {
    ParamDoc { name, type_name }
}

pub const FUNCTIONS: &[FunctionDoc] = &[
    FunctionDoc {
        name: "addEventListener",
        category: "event",
        description: "Registers `callback` for `event`. Listeners run in registration order.",
        params: &[param("event", "string"), param("callback", "function")],
        returns: None,
    },
    FunctionDoc {
        name: "readFile",
        category: "file",
        description: "Reads a whole file, relative to the script's directory.",
        params: &[param("path", "string")],
        returns: Some("string"),
    },
    FunctionDoc {
        name: "writeFile",
        category: "file",
        description: "Creates or truncates a file relative to the script's directory\nand writes `data` to it.",
        params: &[param("path", "string"), param("data", "string")],
        returns: None,
    },
    FunctionDoc {
        name: "log",
        category: "log",
        description: "Logs the arguments, separated by spaces, at info level.",
        params: &[param("...", "any")],
        returns: None,
    },
    FunctionDoc {
        name: "json.decode",
        category: "json",
        description: "Parses a JSON document.",
        params: &[param("text", "string")],
        returns: Some("any"),
    },
    FunctionDoc {
        name: "json.encode",
        category: "json",
        description: "Serializes a Lua value as JSON.",
        params: &[param("value", "any")],
        returns: Some("string"),
    },
];

pub const CLASSES: &[ClassDoc] = &[
    ClassDoc {
        name: "Map",
        description: "The loaded tile map.",
        fields: &[],
        methods: &[
            MethodDoc {
                name: "GetLayer",
                description: "First layer called `name`, or nil.",
                params: &[param("name", "string")],
                returns: Some("Layer?"),
            },
            MethodDoc {
                name: "AddLayer",
                description: "Appends an empty layer the size of the map.",
                params: &[param("name", "string")],
                returns: Some("Layer"),
            },
        ],
    },
    ClassDoc {
        name: "Layer",
        description: "A tile layer of the map.",
        fields: &[],
        methods: &[MethodDoc {
            name: "GetGrid",
            description: "Decodes the layer into a new, independent grid snapshot.",
            params: &[],
            returns: Some("Grid"),
        }],
    },
    ClassDoc {
        name: "Grid",
        description: "Editable snapshot of a layer. Edits are lost unless `Save` is called.",
        fields: &[],
        methods: &[
            MethodDoc {
                name: "Width",
                description: "Width in tiles.",
                params: &[],
                returns: Some("integer"),
            },
            MethodDoc {
                name: "Height",
                description: "Height in tiles.",
                params: &[],
                returns: Some("integer"),
            },
            MethodDoc {
                name: "TileAt",
                description: "Cell at zero-based `(x, y)`.",
                params: &[param("x", "integer"), param("y", "integer")],
                returns: Some("Tile"),
            },
            MethodDoc {
                name: "TileList",
                description: "Every cell in row-major order.",
                params: &[],
                returns: Some("Tile[]"),
            },
            MethodDoc {
                name: "Save",
                description: "Writes the snapshot back into its layer.",
                params: &[],
                returns: None,
            },
        ],
    },
    ClassDoc {
        name: "Tile",
        description: "One cell of a grid snapshot.",
        fields: &[
            FieldDoc {
                name: "Id",
                type_name: "integer",
                description: "Tile identifier, 0 for empty.",
            },
            FieldDoc {
                name: "FlipX",
                type_name: "boolean",
                description: "Horizontal flip.",
            },
            FieldDoc {
                name: "FlipY",
                type_name: "boolean",
                description: "Vertical flip.",
            },
            FieldDoc {
                name: "FlipD",
                type_name: "boolean",
                description: "Diagonal flip.",
            },
        ],
        methods: &[],
    },
];

pub const EVENTS: &[EventDoc] = &[EventDoc {
    name: "map",
    description: "Fired once after the script has loaded, with the loaded map.",
    params: &[param("m", "Map")],
}];

fn params_table(lua: &Lua, params: &[ParamDoc]) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;
    for p in params {
        let entry = lua.create_table()?;
        entry.set("name", p.name)?;
        entry.set("type", p.type_name)?;
        table.push(entry)?;
    }
    Ok(table)
}

fn returns_table(lua: &Lua, returns: Option<&str>) -> LuaResult<Option<LuaTable>> {
    returns
        .map(|type_name| {
            let table = lua.create_table()?;
            table.set("type", type_name)?;
            Ok(table)
        })
        .transpose()
}

impl ScriptRuntime {
    /// Publishes [`FUNCTIONS`], [`CLASSES`] and [`EVENTS`] as `__meta`.
    pub(super) fn register_meta_api(&self) -> LuaResult<()> {
        let lua = self.lua();
        let meta = lua.create_table()?;

        let functions = lua.create_table()?;
        for f in FUNCTIONS {
            let entry = lua.create_table()?;
            entry.set("description", f.description)?;
            entry.set("category", f.category)?;
            entry.set("params", params_table(lua, f.params)?)?;
            entry.set("returns", returns_table(lua, f.returns)?)?;
            functions.set(f.name, entry)?;
        }
        meta.set("functions", functions)?;

        let classes = lua.create_table()?;
        for class in CLASSES {
            let entry = lua.create_table()?;
            entry.set("description", class.description)?;

            let fields = lua.create_table()?;
            for field in class.fields {
                let f = lua.create_table()?;
                f.set("name", field.name)?;
                f.set("type", field.type_name)?;
                f.set("description", field.description)?;
                fields.push(f)?;
            }
            entry.set("fields", fields)?;

            let methods = lua.create_table()?;
            for method in class.methods {
                let m = lua.create_table()?;
                m.set("name", method.name)?;
                m.set("description", method.description)?;
                m.set("params", params_table(lua, method.params)?)?;
                m.set("returns", returns_table(lua, method.returns)?)?;
                methods.push(m)?;
            }
            entry.set("methods", methods)?;
            classes.set(class.name, entry)?;
        }
        meta.set("classes", classes)?;

        let events = lua.create_table()?;
        for event in EVENTS {
            let entry = lua.create_table()?;
            entry.set("description", event.description)?;
            entry.set("params", params_table(lua, event.params)?)?;
            events.set(event.name, entry)?;
        }
        meta.set("events", events)?;

        lua.globals().set("__meta", meta)
    }
}

use std::rc::Rc;
use tmxscripter::filesystem::{Filesystem, MockFilesystem};
use tmxscripter::scripting::ScriptRuntime;
use tmxscripter::scripting::api_meta::{CLASSES, FUNCTIONS};
use tmxscripter::{luarc_generator, stub_generator};

fn runtime() -> ScriptRuntime {
    let fs: Rc<dyn Filesystem> = Rc::new(MockFilesystem::new());
    ScriptRuntime::with_api_meta(fs, "script.lua").unwrap()
}

#[test]
fn generate_stubs_produces_valid_output() {
    let rt = runtime();
    let content = stub_generator::generate_stubs(&rt).unwrap();

    assert!(content.starts_with("---@meta"), "Should start with ---@meta");
    assert!(content.contains("json = {}"), "Should declare json table");
}

#[test]
fn generated_stubs_contain_representative_signatures() {
    let rt = runtime();
    let content = stub_generator::generate_stubs(&rt).unwrap();

    // Globals
    assert!(content.contains("function addEventListener(event, callback) end"));
    assert!(content.contains("---@return string\nfunction readFile(path) end"));
    assert!(content.contains("function writeFile(path, data) end"));
    assert!(content.contains("function log(...) end"));
    assert!(content.contains("function json.decode(text) end"));
    assert!(content.contains("function json.encode(value) end"));

    // Classes
    for class in ["Map", "Layer", "Grid", "Tile"] {
        assert!(content.contains(&format!("---@class {class}\n")), "Missing {class}");
    }
    assert!(content.contains("---@return Layer|nil\nfunction Map:GetLayer(name) end"));
    assert!(content.contains("---@return Layer\nfunction Map:AddLayer(name) end"));
    assert!(content.contains("---@return Grid\nfunction Layer:GetGrid() end"));
    assert!(content.contains("---@return Tile\nfunction Grid:TileAt(x, y) end"));
    assert!(content.contains("---@return Tile[]\nfunction Grid:TileList() end"));
    assert!(content.contains("function Grid:Save() end"));
    assert!(content.contains("---@field Id integer"));
    assert!(content.contains("---@field FlipD boolean"));

    // Events
    assert!(content.contains("---@alias MapListener fun(m: Map)"));
}

#[test]
fn classes_are_in_a_stable_order() {
    let rt = runtime();
    let content = stub_generator::generate_stubs(&rt).unwrap();
    let positions: Vec<usize> = ["---@class Map\n", "---@class Layer\n", "---@class Grid\n", "---@class Tile\n"]
        .iter()
        .map(|needle| content.find(needle).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(content, stub_generator::generate_stubs(&rt).unwrap());
}

#[test]
fn documented_functions_exist_in_the_runtime() {
    let rt = runtime();
    let lua = rt.lua();
    for f in FUNCTIONS {
        let kind: String = lua
            .load(format!("return type({})", f.name))
            .eval()
            .unwrap();
        assert_eq!(kind, "function", "{} is documented but not registered", f.name);
    }
    assert_eq!(CLASSES.len(), 4);
}

#[test]
fn plain_runtime_has_no_api_description() {
    let fs: Rc<dyn Filesystem> = Rc::new(MockFilesystem::new());
    let rt = ScriptRuntime::new(fs, "script.lua").unwrap();
    assert!(stub_generator::generate_stubs(&rt).is_err());
    let meta: mlua::Value = rt.lua().globals().get("__meta").unwrap();
    assert!(meta.is_nil());
}

#[test]
fn luarc_disables_sandboxed_libraries() {
    let rt = runtime();
    let content = luarc_generator::generate_luarc(&rt, "tmxscripter.lua").unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(json["runtime.version"], "LuaJIT");
    assert_eq!(json["runtime.builtin"]["io"], "disable");
    assert_eq!(json["workspace.library"][0], "tmxscripter.lua");
}

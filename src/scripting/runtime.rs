//! Lua interpreter owned by one scripted run.

use super::events::EventRegistry;
use super::marshal::{HostValue, convert_args};
use crate::filesystem::Filesystem;
use log::debug;
use mlua::AppDataRef;
use mlua::prelude::*;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// State reachable from the host function closures through Lua's app data.
pub(super) struct ScriptAppData {
    pub(super) registry: RefCell<EventRegistry>,
    pub(super) fs: Rc<dyn Filesystem>,
    /// Path of the running script; Host API paths resolve against its
    /// directory.
    pub(super) script_path: PathBuf,
}

pub(super) fn script_data(lua: &Lua) -> LuaResult<AppDataRef<'_, ScriptAppData>> {
    lua.app_data_ref::<ScriptAppData>()
        .ok_or_else(|| LuaError::runtime("ScriptAppData not found"))
}

/// Sandboxed interpreter plus the listener table of a single run.
///
/// Only the base, `table`, `string`, `math` and `bit` libraries are loaded;
/// files are reachable through `readFile` and `writeFile` alone.
pub struct ScriptRuntime {
    lua: Lua,
}

impl ScriptRuntime {
    /// Creates the interpreter and registers the Host API.
    ///
    /// # Errors
    ///
    /// Returns an error if Lua initialization or API registration fails.
    pub fn new(fs: Rc<dyn Filesystem>, script_path: impl Into<PathBuf>) -> LuaResult<Self> {
        let lua = Lua::new_with(
            LuaStdLib::TABLE | LuaStdLib::STRING | LuaStdLib::MATH | LuaStdLib::BIT,
            LuaOptions::default(),
        )?;

        lua.set_app_data(ScriptAppData {
            registry: RefCell::new(EventRegistry::new()),
            fs,
            script_path: script_path.into(),
        });

        let runtime = Self { lua };
        runtime.register_event_api()?;
        runtime.register_file_api()?;
        runtime.register_log_api()?;
        runtime.register_json_api()?;
        debug!("script runtime ready");
        Ok(runtime)
    }

    /// A runtime that also carries the `__meta` API description, for the
    /// stub and `.luarc.json` generators. User scripts never run in it.
    pub fn with_api_meta(fs: Rc<dyn Filesystem>, script_path: impl Into<PathBuf>) -> LuaResult<Self> {
        let runtime = Self::new(fs, script_path)?;
        runtime.register_meta_api()?;
        Ok(runtime)
    }

    /// Compiles `source` without running it.
    pub fn compile(&self, name: &str, source: &[u8]) -> LuaResult<LuaFunction> {
        self.lua.load(source).set_name(name).into_function()
    }

    /// Runs a compiled chunk's top-level code.
    pub fn execute(&self, chunk: &LuaFunction) -> LuaResult<()> {
        chunk.call::<()>(())
    }

    /// Calls every listener of `name` in registration order.
    ///
    /// Having no listeners is not an error. The first listener error stops
    /// the remaining listeners and is returned. Listeners added while the
    /// event is firing only see later firings.
    ///
    /// Returns the number of listeners called.
    pub fn trigger_event(&self, name: &str, args: Vec<HostValue>) -> LuaResult<usize> {
        let listeners = script_data(&self.lua)?
            .registry
            .borrow()
            .listeners(name)
            .to_vec();
        if listeners.is_empty() {
            return Ok(0);
        }

        let args = convert_args(&self.lua, args)?;
        for (index, listener) in listeners.iter().enumerate() {
            debug!("calling listener {} of {} for event {name:?}", index + 1, listeners.len());
            listener.call::<()>(args.clone())?;
        }
        Ok(listeners.len())
    }

    pub fn listener_count(&self, name: &str) -> usize {
        script_data(&self.lua).map_or(0, |data| data.registry.borrow().listener_count(name))
    }

    /// Returns a reference to the underlying Lua state.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MockFilesystem;

    fn runtime(fs: &Rc<MockFilesystem>, script_path: &str) -> ScriptRuntime {
        let fs: Rc<dyn Filesystem> = fs.clone();
        ScriptRuntime::new(fs, script_path).unwrap()
    }

    fn run(rt: &ScriptRuntime, source: &str) -> LuaResult<()> {
        let chunk = rt.compile("test.lua", source.as_bytes())?;
        rt.execute(&chunk)
    }

    #[test]
    fn unsafe_libraries_are_not_loaded() {
        let fs = Rc::new(MockFilesystem::new());
        let rt = runtime(&fs, "script.lua");
        run(
            &rt,
            r#"
            assert(io == nil and os == nil and package == nil and debug == nil)
            assert(__meta == nil)
            assert(type(string.format) == "function" and type(bit.band) == "function")
            "#,
        )
        .unwrap();
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let fs = Rc::new(MockFilesystem::new());
        let rt = runtime(&fs, "script.lua");
        run(
            &rt,
            r#"
            calls = {}
            addEventListener("map", function(v) table.insert(calls, "a" .. v) end)
            addEventListener("other", function() table.insert(calls, "x") end)
            addEventListener("map", function(v) table.insert(calls, "b" .. v) end)
            "#,
        )
        .unwrap();
        assert_eq!(rt.listener_count("map"), 2);

        let called = rt.trigger_event("map", vec![HostValue::from(1i64)]).unwrap();
        assert_eq!(called, 2);
        let calls: Vec<String> = rt.lua().globals().get("calls").unwrap();
        assert_eq!(calls, vec!["a1", "b1"]);
    }

    #[test]
    fn trigger_without_listeners_is_a_no_op() {
        let fs = Rc::new(MockFilesystem::new());
        let rt = runtime(&fs, "script.lua");
        assert_eq!(rt.trigger_event("map", Vec::new()).unwrap(), 0);
    }

    #[test]
    fn first_listener_error_stops_the_rest() {
        let fs = Rc::new(MockFilesystem::new());
        let rt = runtime(&fs, "script.lua");
        run(
            &rt,
            r#"
            reached = false
            addEventListener("map", function() error("boom") end)
            addEventListener("map", function() reached = true end)
            "#,
        )
        .unwrap();
        let err = rt.trigger_event("map", Vec::new()).unwrap_err();
        assert!(err.to_string().contains("boom"), "{err}");
        assert!(!rt.lua().globals().get::<bool>("reached").unwrap());
    }

    #[test]
    fn listeners_added_while_firing_wait_for_next_firing() {
        let fs = Rc::new(MockFilesystem::new());
        let rt = runtime(&fs, "script.lua");
        run(
            &rt,
            r#"
            late = 0
            addEventListener("map", function()
                addEventListener("map", function() late = late + 1 end)
            end)
            "#,
        )
        .unwrap();
        assert_eq!(rt.trigger_event("map", Vec::new()).unwrap(), 1);
        assert_eq!(rt.lua().globals().get::<i64>("late").unwrap(), 0);
        assert_eq!(rt.listener_count("map"), 2);
    }

    #[test]
    fn add_event_listener_checks_arguments() {
        let fs = Rc::new(MockFilesystem::new());
        let rt = runtime(&fs, "script.lua");
        for source in [
            r#"addEventListener("map")"#,
            r#"addEventListener(1, function() end)"#,
            r#"addEventListener("", function() end)"#,
            r#"addEventListener("map", "not a function")"#,
        ] {
            let err = run(&rt, source).unwrap_err();
            assert!(
                err.to_string().contains("Usage: addEventListener(string, func)"),
                "{source}: {err}"
            );
        }
        assert_eq!(rt.listener_count("map"), 0);
    }

    #[test]
    fn file_access_is_relative_to_script_directory() {
        let fs = Rc::new(MockFilesystem::new());
        fs.insert("scripts/data.json", r#"{"aNumber":20}"#);
        fs.insert("data.json", r#"{"aNumber":1}"#);
        let rt = runtime(&fs, "scripts/run.lua");
        run(
            &rt,
            r#"
            local data = json.decode(readFile("data.json"))
            assert(data.aNumber == 20)
            writeFile("out/report.txt", "n=" .. data.aNumber)
            "#,
        )
        .unwrap();
        assert_eq!(fs.contents_string("scripts/out/report.txt").unwrap(), "n=20");
        assert!(!fs.exists("out/report.txt"));
    }

    #[test]
    fn file_errors_abort_the_script() {
        let fs = Rc::new(MockFilesystem::new());
        fs.deny_writes("locked.txt");
        let rt = runtime(&fs, "script.lua");

        let err = run(&rt, r#"readFile("missing.txt")"#).unwrap_err();
        assert!(err.to_string().contains("Could not read file missing.txt"), "{err}");

        let err = run(&rt, r#"writeFile("locked.txt", "x")"#).unwrap_err();
        assert!(err.to_string().contains("Could not write file locked.txt"), "{err}");

        let err = run(&rt, r#"readFile()"#).unwrap_err();
        assert!(err.to_string().contains("Usage: readFile(path)"), "{err}");
        let err = run(&rt, r#"writeFile("a.txt")"#).unwrap_err();
        assert!(err.to_string().contains("Usage: writeFile(path, data)"), "{err}");
    }

    #[test]
    fn json_round_trip() {
        let fs = Rc::new(MockFilesystem::new());
        let rt = runtime(&fs, "script.lua");
        run(
            &rt,
            r#"
            local text = json.encode({ name = "ground", size = 3 })
            local back = json.decode(text)
            assert(back.name == "ground" and back.size == 3)
            local ok = pcall(json.decode, "{not json")
            assert(not ok)
            log("encoded", text, 3, true)
            "#,
        )
        .unwrap();
    }
}

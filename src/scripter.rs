//! Run orchestration.
//!
//! A run is strictly sequential and stops at the first error:
//!
//! ```text
//! Init -> Validated -> MapLoaded -> ScriptExecuted -> EventFired -> MapSaved -> Done
//! ```
//!
//! The map is loaded before the script so a parse failure aborts before any
//! script code runs. The `map` event fires only after the script's
//! top-level code has finished, so every listener is registered by then.

use crate::error::ScripterError;
use crate::filesystem::Filesystem;
use crate::scripting::{ScriptRuntime, ScriptableMap};
use crate::tmx::{DataEncoding, Map, parse_map_bytes};
use log::{debug, info};
use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Name of the lifecycle event fired with the loaded map.
pub const MAP_EVENT: &str = "map";

/// Last completed stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStage {
    Init,
    Validated,
    MapLoaded,
    ScriptExecuted,
    EventFired,
    MapSaved,
    Done,
}

/// Applies a script to a map file and writes the result.
pub struct TmxScripter {
    fs: Rc<dyn Filesystem>,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub script_path: PathBuf,
    /// Encoding used for layers created with `AddLayer`.
    pub new_layer_encoding: DataEncoding,
    stage: RunStage,
}

impl TmxScripter {
    pub fn new(
        fs: Rc<dyn Filesystem>,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        script_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fs,
            input_path: input_path.into(),
            output_path: output_path.into(),
            script_path: script_path.into(),
            new_layer_encoding: DataEncoding::default(),
            stage: RunStage::Init,
        }
    }

    pub fn with_new_layer_encoding(mut self, encoding: DataEncoding) -> Self {
        self.new_layer_encoding = encoding;
        self
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    /// Checks that both the input map and the script exist.
    pub fn validate(&mut self) -> Result<(), ScripterError> {
        self.stage = RunStage::Init;
        self.require_file(&self.input_path, "input")
            .map_err(|e| missing_or(e, ScripterError::MissingInput(self.input_path.clone())))?;
        self.require_file(&self.script_path, "script")
            .map_err(|e| missing_or(e, ScripterError::MissingScript(self.script_path.clone())))?;
        self.stage = RunStage::Validated;
        Ok(())
    }

    /// Runs every stage in order.
    ///
    /// A fresh interpreter and listener table are created for each call.
    pub fn run(&mut self) -> Result<(), ScripterError> {
        self.validate()?;
        info!("validated {} and {}", self.input_path.display(), self.script_path.display());

        let map = Rc::new(RefCell::new(self.load_map()?));
        self.stage = RunStage::MapLoaded;
        info!("loaded map {}", self.input_path.display());

        let runtime = self.load_script()?;
        self.stage = RunStage::ScriptExecuted;
        info!("executed script {}", self.script_path.display());

        self.fire_map_event(&runtime, &map)?;
        self.stage = RunStage::EventFired;

        self.save_map(&map.borrow())?;
        self.stage = RunStage::MapSaved;
        info!("wrote map {}", self.output_path.display());

        self.stage = RunStage::Done;
        Ok(())
    }

    fn require_file(&self, path: &Path, what: &str) -> io::Result<()> {
        let info = self.fs.stat(path)?;
        debug!("{what} {} is {} bytes", path.display(), info.len);
        if info.is_dir {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is a directory", path.display()),
            ));
        }
        Ok(())
    }

    fn read(&self, path: &Path, what: &str) -> Result<Vec<u8>, ScripterError> {
        let mut file = self
            .fs
            .open(path)
            .map_err(|e| ScripterError::io(format!("Could not open {what} file"), e))?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| ScripterError::io(format!("Could not read {what} file"), e))?;
        debug!("read {} bytes from {}", contents.len(), path.display());
        Ok(contents)
    }

    fn load_map(&self) -> Result<Map, ScripterError> {
        let contents = self.read(&self.input_path, "input")?;
        parse_map_bytes(contents).map_err(ScripterError::Parse)
    }

    fn load_script(&self) -> Result<ScriptRuntime, ScripterError> {
        let source = self.read(&self.script_path, "script")?;
        let runtime = ScriptRuntime::new(Rc::clone(&self.fs), self.script_path.clone())
            .map_err(|e| ScripterError::script_runtime("Could not initialize script runtime", e))?;
        let name = self.script_path.display().to_string();
        let chunk = runtime
            .compile(&name, &source)
            .map_err(ScripterError::ScriptCompile)?;
        runtime
            .execute(&chunk)
            .map_err(|e| ScripterError::script_runtime("Could not execute script", e))?;
        Ok(runtime)
    }

    fn fire_map_event(
        &self,
        runtime: &ScriptRuntime,
        map: &Rc<RefCell<Map>>,
    ) -> Result<(), ScripterError> {
        let scriptable = ScriptableMap::new(Rc::clone(map), self.new_layer_encoding);
        let called = runtime
            .trigger_event(MAP_EVENT, vec![scriptable.into()])
            .map_err(|e| {
                ScripterError::script_runtime(format!("Listener for event {MAP_EVENT:?} failed"), e)
            })?;
        if called == 0 {
            info!("no listener registered for {MAP_EVENT:?}, map is written unchanged");
        } else {
            info!("fired {MAP_EVENT:?} to {called} listener(s)");
        }
        Ok(())
    }

    fn save_map(&self, map: &Map) -> Result<(), ScripterError> {
        let output = map.serialize().map_err(ScripterError::Serialization)?;

        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                self.fs
                    .mkdir_all(parent)
                    .map_err(|e| ScripterError::io("Could not create output directory", e))?;
            }
        }
        let mut file = self
            .fs
            .create(&self.output_path)
            .map_err(|e| ScripterError::io("Could not open output file", e))?;
        file.write_all(output.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| ScripterError::io("Could not write output file", e))?;
        debug!("wrote {} bytes to {}", output.len(), self.output_path.display());
        Ok(())
    }
}

fn missing_or(err: io::Error, missing: ScripterError) -> ScripterError {
    match err.kind() {
        io::ErrorKind::NotFound => missing,
        _ => ScripterError::io("Could not stat file", err),
    }
}

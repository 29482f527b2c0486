//! tmxscripter entry point.
//!
//! Applies a Lua script to a Tiled TMX map:
//!
//! ```sh
//! tmxscripter --input maps/level1.tmx --output build/level1.tmx --script scripts/level1.lua
//! ```
//!
//! Options may also come from an INI file (`--config`, or `./tmxscripter.ini`
//! when present); command line values win. Any failure prints
//! `Error: <detail>` and exits with status 1.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tmxscripter::config::{DEFAULT_CONFIG_PATH, ScripterConfig};
use tmxscripter::filesystem::{Filesystem, RealFilesystem};
use tmxscripter::scripting::ScriptRuntime;
use tmxscripter::{TmxScripter, luarc_generator, stub_generator};

/// Script-driven TMX map transformer
#[derive(Parser)]
#[command(version, about = "Runs a Lua script against a Tiled TMX map and writes the result.")]
struct Cli {
    /// Input map file.
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output map file.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Lua script to run against the map.
    #[arg(short, long, value_name = "PATH")]
    script: Option<PathBuf>,

    /// INI configuration file (default: ./tmxscripter.ini if present).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Generate Lua LSP stubs for the script API and exit.
    /// Optionally provide a path (default: tmxscripter.lua).
    #[arg(long, value_name = "PATH")]
    create_lua_stubs: Option<Option<PathBuf>>,

    /// Generate .luarc.json for Lua Language Server and exit.
    /// Optionally provide a path (default: .luarc.json).
    #[arg(long, value_name = "PATH")]
    create_luarc: Option<Option<PathBuf>>,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn load_config(path: Option<&Path>) -> Result<ScripterConfig, String> {
    let mut config = ScripterConfig::new();
    match path {
        Some(path) => config.load_from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).is_file() => {
            config.load_from_file(Path::new(DEFAULT_CONFIG_PATH))?
        }
        None => {}
    }
    Ok(config)
}

fn api_runtime(fs: &Rc<dyn Filesystem>) -> ScriptRuntime {
    ScriptRuntime::with_api_meta(Rc::clone(fs), "stubs.lua")
        .unwrap_or_else(|e| fail(format!("Could not initialize script runtime: {e}")))
}

fn main() {
    let cli = Cli::parse();

    // Logging is configured from the file, so the file is read first.
    let config = load_config(cli.config.as_deref());
    let log_level = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
    let mut config = config.unwrap_or_else(|e| fail(e));

    let fs: Rc<dyn Filesystem> = Rc::new(RealFilesystem);

    // Early-exit: generate Lua stubs and quit
    if let Some(maybe_path) = cli.create_lua_stubs {
        let path = maybe_path.unwrap_or_else(|| PathBuf::from("tmxscripter.lua"));
        let runtime = api_runtime(&fs);
        let content = stub_generator::generate_stubs(&runtime).unwrap_or_else(|e| fail(e));
        stub_generator::write_stubs(&path, &content).unwrap_or_else(|e| fail(e));
        println!("Lua stubs written to {}", path.display());
        return;
    }

    // Early-exit: generate .luarc.json and quit
    if let Some(maybe_path) = cli.create_luarc {
        let path = maybe_path.unwrap_or_else(|| PathBuf::from(".luarc.json"));
        let runtime = api_runtime(&fs);
        let content =
            luarc_generator::generate_luarc(&runtime, "tmxscripter.lua").unwrap_or_else(|e| fail(e));
        luarc_generator::write_luarc(&path, &content).unwrap_or_else(|e| fail(e));
        println!(".luarc.json written to {}", path.display());
        return;
    }

    config.override_paths(cli.input, cli.output, cli.script);
    let paths = config.run_paths().unwrap_or_else(|e| fail(e));

    let mut scripter = TmxScripter::new(fs, paths.input, paths.output, paths.script)
        .with_new_layer_encoding(config.new_layer_encoding);
    if let Err(e) = scripter.run() {
        log::debug!("run stopped after stage {:?}", scripter.stage());
        fail(e);
    }
}

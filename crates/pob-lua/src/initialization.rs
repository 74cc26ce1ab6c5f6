//! Lua runtime bootstrap
//!
//! This module creates the LuaJIT state, points its module search paths at
//! the engine checkout, redirects the engine's console output away from
//! standard output, and runs the headless wrapper that brings the engine up
//! without a UI.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::errors::LuaEngineError;
use crate::utils::{field, value_string, HEADLESS_SCRIPT, LUA_PATH, SRC_DIR};
use mlua::{Lua, Table, Value, Variadic};
use pob_logger as logger;

/// The embedded calculation engine
pub struct LuaEngine {
    pub(crate) lua: Lua,
    root: PathBuf,
    startup_message: Option<String>,
}

impl LuaEngine {
    /// Boot the engine found at `root`.
    ///
    /// This performs:
    /// - Check the checkout layout and enter its `src` directory
    /// - Configure `package.path` for the bundled runtime modules
    /// - Route `print` and `io.write` to the diagnostic log
    /// - Run the headless wrapper and read its startup prompt
    ///
    /// The working directory stays inside `src` afterwards because the
    /// engine resolves its data files relative to it.
    pub fn bootstrap(root: &Path) -> Result<LuaEngine, LuaEngineError> {
        let start_time = Instant::now();
        if !root.is_dir() {
            return Err(LuaEngineError::RootNotFound(root.to_path_buf()));
        }
        let root = root.canonicalize()?;
        let src_dir = root.join(SRC_DIR);
        let script = src_dir.join(HEADLESS_SCRIPT);
        if !script.is_file() {
            return Err(LuaEngineError::MissingScript(script));
        }

        std::env::set_current_dir(&src_dir)?;
        logger::debug(&format!("Entered engine directory {}", src_dir.display()));

        let lua = Lua::new();
        configure_package_paths(&lua)?;
        redirect_output(&lua)?;

        let source = std::fs::read_to_string(&script)?;
        let load_start = Instant::now();
        lua.load(source.as_str())
            .set_name(format!("@{}", HEADLESS_SCRIPT))
            .exec()
            .map_err(|e| LuaEngineError::Initialization(e.to_string()))?;
        logger::debug(&format!(
            "Headless wrapper loaded in {:?}",
            load_start.elapsed()
        ));

        let startup_message = read_startup_message(&lua);
        if let Some(ref message) = startup_message {
            logger::warn(&format!("Engine reported a startup error: {}", message));
        }

        logger::debug(&format!(
            "Total engine initialization took: {:?}",
            start_time.elapsed()
        ));
        Ok(LuaEngine {
            lua,
            root,
            startup_message,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn startup_prompt(&self) -> Option<String> {
        self.startup_message.clone()
    }

    pub(crate) fn global_table(&self, name: &str) -> Result<Table, LuaEngineError> {
        self.lua
            .globals()
            .get::<Option<Table>>(name)?
            .ok_or_else(|| LuaEngineError::MissingGlobal(name.to_string()))
    }
}

fn configure_package_paths(lua: &Lua) -> Result<(), LuaEngineError> {
    let package: Table = lua.globals().get("package")?;
    let existing: String = package.get::<Option<String>>("path")?.unwrap_or_default();
    package.set("path", format!("{}{}", LUA_PATH, existing))?;

    #[cfg(windows)]
    {
        let existing: String = package.get::<Option<String>>("cpath")?.unwrap_or_default();
        package.set("cpath", format!("{}{}", crate::utils::LUA_CPATH, existing))?;
    }
    Ok(())
}

/// Standard output carries the protocol; the engine must never write to it
fn redirect_output(lua: &Lua) -> Result<(), LuaEngineError> {
    let print = lua.create_function(|_, args: Variadic<Value>| {
        let line = args
            .iter()
            .map(|v| value_string(v).unwrap_or_else(|| render(v)))
            .collect::<Vec<_>>()
            .join("\t");
        logger::engine_output(&line);
        Ok(())
    })?;
    lua.globals().set("print", print)?;
    lua.load("io.output(io.stderr)")
        .set_name("=redirect_output")
        .exec()?;
    Ok(())
}

fn render(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        other => other.type_name().to_string(),
    }
}

fn read_startup_message(lua: &Lua) -> Option<String> {
    let main = lua.globals().get::<Option<Table>>("mainObject").ok().flatten()?;
    value_string(&field(&main, "promptMsg")).filter(|m| !m.trim().is_empty())
}

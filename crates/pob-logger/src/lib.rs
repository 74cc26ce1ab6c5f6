//! Diagnostic logging for pob-bridge
//!
//! Standard output carries the wire protocol, so every message here goes to
//! standard error and to a per-run log file. Console output is filtered by
//! verbosity; the log file records everything.

use colored::Colorize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LOG_FILE_NAME: &str = "pob-bridge.log";

static LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);
static VERBOSITY: Mutex<u8> = Mutex::new(0);
static QUIET: Mutex<bool> = Mutex::new(false);
static LOG_ENGINE: Mutex<bool> = Mutex::new(false);

/// Get the current verbosity level
pub fn get_verbosity() -> u8 {
    VERBOSITY.lock().ok().map(|v| *v).unwrap_or(0)
}

pub fn get_quiet() -> bool {
    QUIET.lock().ok().map(|v| *v).unwrap_or(false)
}

/// Get whether engine output is echoed to the console
pub fn get_log_engine() -> bool {
    LOG_ENGINE.lock().ok().map(|v| *v).unwrap_or(false)
}

pub fn set_log_engine(enabled: bool) {
    if let Ok(mut v) = LOG_ENGINE.lock() {
        *v = enabled;
    }
}

/// Tracing filter directive matching the verbosity level
/// 0 = warn, 1 = debug (-v), 2 = trace (-vv), quiet = error
pub fn verbosity_filter() -> &'static str {
    if get_quiet() {
        return "error";
    }
    match get_verbosity() {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize the logger with a verbosity level, writing the log file into
/// the per-user config directory
pub fn init_with_verbosity(verbosity: u8, quiet: bool) -> Result<(), String> {
    let dir = get_config_dir()?;
    init_in(&dir, verbosity, quiet)
}

/// Initialize the logger with the log file inside `dir`
pub fn init_in(dir: &Path, verbosity: u8, quiet: bool) -> Result<(), String> {
    if let Ok(mut v) = VERBOSITY.lock() {
        *v = verbosity;
    }
    if let Ok(mut q) = QUIET.lock() {
        *q = quiet;
    }
    set_log_engine(verbosity >= 2);

    fs::create_dir_all(dir).map_err(|e| format!("Failed to create config directory: {}", e))?;
    let log_file = dir.join(LOG_FILE_NAME);

    // One log per run
    if log_file.exists() {
        let _ = fs::remove_file(&log_file);
    }

    let mut guard = LOG_FILE
        .lock()
        .map_err(|_| "Log file lock poisoned".to_string())?;
    *guard = Some(log_file);
    Ok(())
}

fn get_config_dir() -> Result<PathBuf, String> {
    #[cfg(not(target_os = "windows"))]
    let config_dir = dirs::home_dir()
        .ok_or("Could not determine home directory")?
        .join(".config")
        .join("pob-bridge");

    #[cfg(target_os = "windows")]
    let config_dir = dirs::config_dir()
        .ok_or("Could not determine config directory")?
        .join("pob-bridge");

    Ok(config_dir)
}

fn write_to_log(message: &str) {
    write_to_log_with_source(message, "BRIDGE");
}

fn write_to_log_with_source(message: &str, source: &str) {
    if let Ok(guard) = LOG_FILE.lock() {
        if let Some(ref log_path) = *guard {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path) {
                let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(file, "[{}] [{}] {}", timestamp, source, message);
            }
        }
    }
}

/// Log an informational message (to console if verbose >= 1, always to file)
pub fn info(message: &str) {
    write_to_log(&format!("INFO {}", message));
    if get_verbosity() >= 1 {
        eprintln!("{}", message);
    }
}

pub fn debug(message: &str) {
    write_to_log(&format!("DEBUG {}", message));
    if get_verbosity() >= 1 {
        eprintln!("{} {}", "DEBUG:".blue().bold(), message);
    }
}

/// Log a warning message (to file, and to console unless quiet)
pub fn warn(message: &str) {
    write_to_log(&format!("WARN {}", message));
    if !get_quiet() {
        eprintln!("{} {}", "warning:".yellow().bold(), message);
    }
}

/// Log an error message (to both file and console)
pub fn error(message: &str) {
    write_to_log(&format!("ERROR {}", message));
    eprintln!("{} {}", "Error:".red().bold(), message);
}

pub fn success(message: &str) {
    write_to_log(&format!("SUCCESS {}", message));
    if get_verbosity() >= 1 {
        let check = "\u{2714}".green().bold();
        eprintln!("{} {}", check, message);
    }
}

/// Log a startup step
pub fn step(message: &str) {
    if get_verbosity() >= 2 {
        eprintln!("TRACE: {}", message);
    }
    write_to_log(&format!("STEP: {}", message));
}

/// Record a line printed by the embedded engine
pub fn engine_output(message: &str) {
    write_to_log_with_source(message, "LUA");
    if get_log_engine() {
        eprintln!("{} {}", "lua:".cyan(), message);
    }
}

/// Get the log file path for display
pub fn get_log_path() -> Option<PathBuf> {
    LOG_FILE.lock().ok().and_then(|guard| guard.clone())
}

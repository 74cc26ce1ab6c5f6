//! Embedded LuaJIT calculation engine
//!
//! [`LuaEngine`] boots the engine's headless wrapper inside an `mlua` state
//! and implements [`pob_engine::Engine`] by calling the globals the wrapper
//! defines. [`LuaBuild`] wraps the global `build` object and implements
//! [`pob_engine::Build`].
//!
//! The Lua state is `!Send`; the engine and its builds stay on the thread
//! that created them.

mod build;
mod catalog;
pub mod convert;
pub mod errors;
mod initialization;
mod utils;

pub use build::LuaBuild;
pub use errors::LuaEngineError;
pub use initialization::LuaEngine;
pub use utils::{HEADLESS_SCRIPT, SRC_DIR};

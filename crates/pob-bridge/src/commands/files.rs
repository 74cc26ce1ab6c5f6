//! Build file commands, confined to the builds directory
//!
//! Paths in requests are relative to the builds directory. Every path is
//! checked by the session's [`PathResolver`](crate::paths::PathResolver)
//! before the filesystem is touched.

use std::fs;

use pob_engine::{Build, Engine};
use serde_json::{json, Value};

use super::{success, to_json};
use crate::build_files::{list_directory, with_extension};
use crate::errors::CommandError;
use crate::params::Params;
use crate::registry::CommandRegistry;
use crate::session::BridgeState;

pub fn register<E: Engine>(registry: &mut CommandRegistry<E>) {
    registry.register("get_builds_path", get_builds_path);
    registry.register("list_builds", list_builds);
    registry.register("load_build_file", load_build_file);
    registry.register("save_build", save_build);
    registry.register("save_build_as", save_build_as);
    registry.register("delete_build_file", delete_build_file);
    registry.register("create_folder", create_folder);
    registry.register("rename_build_file", rename_build_file);
}

/// `name` inside the relative directory `sub_path`
fn join_relative(sub_path: &str, name: &str) -> String {
    let sub_path = sub_path.trim_end_matches(['/', '\\']);
    if sub_path.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", sub_path, name)
    }
}

fn build_file_not_found(path: &str) -> CommandError {
    CommandError::NotFound(format!("Build file not found: {}", path))
}

fn get_builds_path<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    Ok(json!({ "builds_path": state.paths.root() }))
}

fn list_builds<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let sub_path = params.str_or("sub_path", "")?;
    let dir = state.paths.validate_dir(sub_path)?;
    if !dir.is_dir() {
        return Err(CommandError::NotFound(format!(
            "Directory not found: {}",
            sub_path
        )));
    }
    let (builds, folders) = list_directory(&state.paths, &dir)?;
    Ok(json!({ "builds": to_json(&builds)?, "folders": to_json(&folders)? }))
}

fn load_build_file<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let input = params.required_text("path")?;
    let path = state.paths.validate_file(input)?;
    if !path.is_file() {
        return Err(build_file_not_found(input));
    }
    let mut build = state.engine.load_build_file(&path)?;
    build.recalculate()?;
    state.replace_build(build);
    Ok(json!({ "success": true, "path": state.paths.display(&path) }))
}

fn save_build<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    let current = state.build()?.file_path().ok_or_else(|| {
        CommandError::Precondition(
            "Build has no file path; use save_build_as to choose one".to_string(),
        )
    })?;
    let path = state.paths.validate_file(&current.to_string_lossy())?;
    state.build_mut()?.save_to_file(&path)?;
    Ok(json!({ "success": true, "path": state.paths.display(&path) }))
}

fn save_build_as<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let name = params.required_text("name")?;
    let sub_path = params.str_or("sub_path", "")?;
    state.paths.validate_dir(sub_path)?;
    let path = state
        .paths
        .validate_file(&join_relative(sub_path, &with_extension(name.trim())))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    state.build_mut()?.save_to_file(&path)?;
    Ok(json!({ "success": true, "path": state.paths.display(&path) }))
}

fn delete_build_file<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let input = params.required_text("path")?;
    let path = state.paths.validate_file(input)?;
    if !path.is_file() {
        return Err(build_file_not_found(input));
    }
    fs::remove_file(&path)?;
    Ok(success())
}

fn create_folder<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let name = params.required_text("name")?;
    let sub_path = params.str_or("sub_path", "")?;
    state.paths.validate_dir(sub_path)?;
    let path = state.paths.validate_file(&join_relative(sub_path, name.trim()))?;
    if path.exists() {
        return Err(CommandError::Precondition(format!(
            "A folder named '{}' already exists",
            name
        )));
    }
    fs::create_dir_all(&path)?;
    Ok(json!({ "success": true, "path": state.paths.display(&path) }))
}

fn rename_build_file<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let old_input = params.required_text("old_path")?;
    let new_name = params.required_text("new_name")?;
    let source = state.paths.validate_file(old_input)?;
    if !source.is_file() {
        return Err(build_file_not_found(old_input));
    }
    let parent = source
        .parent()
        .map(|p| state.paths.relative(p))
        .unwrap_or_default();
    let destination = state
        .paths
        .validate_file(&join_relative(&parent, &with_extension(new_name.trim())))?;
    if destination.exists() {
        return Err(CommandError::Precondition(format!(
            "A build named '{}' already exists",
            new_name
        )));
    }
    fs::rename(&source, &destination)?;

    let source_display = state.paths.display(&source);
    let follows = state.has_build()
        && state
            .build()?
            .file_path()
            .is_some_and(|p| state.paths.display(&p) == source_display);
    if follows {
        state.build_mut()?.set_file_path(&destination);
    }
    Ok(json!({
        "success": true,
        "old_path": source_display,
        "new_path": state.paths.display(&destination),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{error_of, params};
    use crate::paths::PathResolver;
    use crate::registry::Handler;
    use pob_engine::memory::MemoryEngine;
    use std::path::Path;
    use tempfile::TempDir;

    fn sandbox(root: &Path) -> BridgeState<MemoryEngine> {
        let mut state = BridgeState::new(
            MemoryEngine::new(),
            PathResolver::new(&root.to_string_lossy(), "/"),
        );
        if let Ok(build) = state.engine.new_build() {
            state.replace_build(build);
        }
        state
    }

    #[test]
    fn test_save_as_then_save() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let mut state = sandbox(temp_dir.path());
        assert!(error_of(save_build(&mut state, &Params::default())).starts_with("Build has no file path"));

        let p = params(json!({ "name": "Deadeye", "sub_path": "League" }));
        let Ok(saved) = save_build_as(&mut state, &p) else {
            panic!("save_build_as should succeed");
        };
        assert!(temp_dir.path().join("League/Deadeye.xml").is_file());
        assert!(saved["path"].as_str().is_some_and(|p| p.ends_with("League/Deadeye.xml")));
        assert!(save_build(&mut state, &Params::default()).is_ok());
    }

    #[test]
    fn test_sandbox_rejections() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let mut state = sandbox(temp_dir.path());
        let cases: [(Handler<MemoryEngine>, Value, &str); 5] = [
            (load_build_file, json!({ "path": "../../etc/passwd" }), "Path traversal detected: ../../etc/passwd"),
            (delete_build_file, json!({ "path": "/etc/passwd" }), "Path is outside the builds directory: /etc/passwd"),
            (save_build_as, json!({ "name": "x", "sub_path": "../.." }), "Path traversal detected: ../.."),
            (create_folder, json!({ "name": "..\\..\\evil" }), "Path traversal detected: ..\\..\\evil"),
            (list_builds, json!({ "sub_path": "C:\\Windows" }), "Path is outside the builds directory: C:\\Windows"),
        ];
        for (handler, p, expected) in cases {
            assert_eq!(error_of(handler(&mut state, &params(p))), expected);
        }
    }

    #[test]
    fn test_list_and_load() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let mut state = sandbox(temp_dir.path());
        assert!(save_build_as(&mut state, &params(json!({ "name": "Alpha" }))).is_ok());
        assert!(create_folder(&mut state, &params(json!({ "name": "Archive" }))).is_ok());
        assert!(error_of(create_folder(&mut state, &params(json!({ "name": "Archive" })))).contains("already exists"));

        let Ok(listed) = list_builds(&mut state, &Params::default()) else {
            panic!("builds should list");
        };
        assert_eq!(listed["builds"][0]["id"], "Alpha.xml");
        assert_eq!(listed["builds"][0]["className"], "Ranger");
        assert_eq!(listed["folders"][0]["name"], "Archive");

        assert!(load_build_file(&mut state, &params(json!({ "path": "Alpha.xml" }))).is_ok());
        let name = state.build().ok().and_then(|b| b.info().ok()).and_then(|i| i.build_name);
        assert_eq!(name.as_deref(), Some("Alpha"));

        assert_eq!(
            error_of(load_build_file(&mut state, &params(json!({ "path": "Missing.xml" })))),
            "Build file not found: Missing.xml"
        );
        assert_eq!(
            error_of(list_builds(&mut state, &params(json!({ "sub_path": "Nope" })))),
            "Directory not found: Nope"
        );
    }

    #[test]
    fn test_rename_validates_both_paths_and_follows_build() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let mut state = sandbox(temp_dir.path());
        assert!(save_build_as(&mut state, &params(json!({ "name": "Old", "sub_path": "Sub" }))).is_ok());
        assert!(save_build_as(&mut state, &params(json!({ "name": "Taken", "sub_path": "Sub" }))).is_ok());
        assert!(load_build_file(&mut state, &params(json!({ "path": "Sub/Old.xml" }))).is_ok());

        let escape = params(json!({ "old_path": "Sub/Old.xml", "new_name": "../../Escaped" }));
        assert!(error_of(rename_build_file(&mut state, &escape)).starts_with("Path traversal detected"));
        let outside = params(json!({ "old_path": "../Old.xml", "new_name": "New" }));
        assert!(error_of(rename_build_file(&mut state, &outside)).starts_with("Path traversal detected"));
        let taken = params(json!({ "old_path": "Sub/Old.xml", "new_name": "Taken" }));
        assert_eq!(
            error_of(rename_build_file(&mut state, &taken)),
            "A build named 'Taken' already exists"
        );

        let p = params(json!({ "old_path": "Sub/Old.xml", "new_name": "New" }));
        let Ok(renamed) = rename_build_file(&mut state, &p) else {
            panic!("rename should succeed");
        };
        assert!(renamed["new_path"].as_str().is_some_and(|p| p.ends_with("Sub/New.xml")));
        assert!(temp_dir.path().join("Sub/New.xml").is_file());
        assert!(!temp_dir.path().join("Sub/Old.xml").exists());
        let follows = state
            .build()
            .ok()
            .and_then(|b| b.file_path())
            .is_some_and(|p| p.ends_with("Sub/New.xml"));
        assert!(follows);
    }

    #[test]
    fn test_delete_requires_existing_file() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let mut state = sandbox(temp_dir.path());
        assert!(save_build_as(&mut state, &params(json!({ "name": "Gone" }))).is_ok());
        assert!(delete_build_file(&mut state, &params(json!({ "path": "Gone.xml" }))).is_ok());
        assert_eq!(
            error_of(delete_build_file(&mut state, &params(json!({ "path": "Gone.xml" })))),
            "Build file not found: Gone.xml"
        );
        assert!(create_folder(&mut state, &params(json!({ "name": "Dir" }))).is_ok());
        assert_eq!(
            error_of(delete_build_file(&mut state, &params(json!({ "path": "Dir" })))),
            "Build file not found: Dir"
        );
    }
}

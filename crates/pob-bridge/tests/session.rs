//! Full protocol sessions against the in-memory engine

use std::fs;
use std::path::Path;

use pob_bridge::errors::BridgeError;
use pob_bridge::{start, BuildsCandidates};
use pob_engine::memory::MemoryEngine;
use serde_json::{json, Value};
use tempfile::TempDir;

fn candidates(builds: &Path) -> BuildsCandidates {
    BuildsCandidates {
        override_dir: Some(builds.to_path_buf()),
        base: builds.to_path_buf(),
        ..Default::default()
    }
}

/// Run a session over `input` and return every response line as JSON
fn run_session(builds: &Path, input: &str) -> Vec<Value> {
    let mut output = Vec::new();
    if let Err(e) = start(MemoryEngine::new(), &candidates(builds), input.as_bytes(), &mut output) {
        panic!("session failed: {}", e);
    }
    String::from_utf8_lossy(&output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap_or(Value::Null))
        .collect()
}

fn requests(lines: &[Value]) -> String {
    lines.iter().map(|l| format!("{}\n", l)).collect()
}

#[test]
fn test_ready_then_one_response_per_request() {
    let Ok(temp_dir) = TempDir::new() else {
        return;
    };
    let input = "{\"command\":\"ping\"}\n\n\t\n{\"command\":\"ping\",\"params\":null}\n";
    let responses = run_session(temp_dir.path(), input);
    assert_eq!(
        responses,
        vec![
            json!({ "ready": true }),
            json!({ "ok": true, "result": { "pong": true } }),
            json!({ "ok": true, "result": { "pong": true } }),
        ]
    );
}

#[test]
fn test_malformed_lines_do_not_stop_the_loop() {
    let Ok(temp_dir) = TempDir::new() else {
        return;
    };
    let input = [
        "{oops",
        "42",
        "\"ping\"",
        "{\"params\":{}}",
        "{\"command\":\"teleport\"}",
        "{\"command\":\"ping\",\"params\":\"x\"}",
        "{\"command\":\"ping\"}",
    ]
    .join("\n");
    let responses = run_session(temp_dir.path(), &input);
    assert_eq!(responses.len(), 8);
    let errors: Vec<&str> = responses[1..7]
        .iter()
        .map(|r| r["error"].as_str().unwrap_or_default())
        .collect();
    assert!(errors[0].starts_with("Invalid JSON: "));
    assert_eq!(errors[1], "Request must be a JSON object");
    assert_eq!(errors[2], "Request must be a JSON object");
    assert_eq!(errors[3], "Missing 'command' field");
    assert_eq!(errors[4], "Unknown command: teleport");
    assert_eq!(errors[5], "'params' must be a JSON object");
    assert!(responses[1..7].iter().all(|r| r["ok"] == false));
    assert_eq!(responses[7], json!({ "ok": true, "result": { "pong": true } }));
}

#[test]
fn test_new_build_skill_and_output() {
    let Ok(temp_dir) = TempDir::new() else {
        return;
    };
    let input = requests(&[
        json!({ "command": "new_build" }),
        json!({ "command": "add_skill", "params": { "skill_text": "Lightning Arrow 20/0 1" } }),
        json!({ "command": "get_output", "params": { "stats": ["Life"] } }),
    ]);
    let responses = run_session(temp_dir.path(), &input);
    assert_eq!(responses[1], json!({ "ok": true, "result": { "success": true } }));
    assert_eq!(responses[2]["ok"], true);
    assert_eq!(responses[2]["result"]["gem_count"], 1);
    assert_eq!(responses[3]["ok"], true);
    assert!(responses[3]["result"]["Life"].is_number());
}

#[test]
fn test_alloc_twice_is_idempotent() {
    let Ok(temp_dir) = TempDir::new() else {
        return;
    };
    let input = requests(&[
        json!({ "command": "new_build" }),
        json!({ "command": "alloc_node", "params": { "node_id": 2 } }),
        json!({ "command": "alloc_node", "params": { "node_id": "2" } }),
        json!({ "command": "list_alloc_nodes" }),
        json!({ "command": "get_stat", "params": { "key": "Life" } }),
    ]);
    let responses = run_session(temp_dir.path(), &input);
    assert_eq!(responses[2]["result"], json!({ "success": true }));
    assert_eq!(
        responses[3]["result"],
        json!({ "success": true, "already_allocated": true })
    );
    assert_eq!(responses[4]["result"]["count"], 2);
    assert_eq!(responses[5]["result"]["value"], 110);
}

#[test]
fn test_item_granted_skill_cannot_be_removed() {
    let Ok(temp_dir) = TempDir::new() else {
        return;
    };
    let ring = "Rarity: UNIQUE\nThe Burden\nIron Ring\nGrants Skill: Summon Skeleton";
    let input = requests(&[
        json!({ "command": "new_build" }),
        json!({ "command": "add_item", "params": { "item_raw": ring, "slot": "Ring 1" } }),
        json!({ "command": "list_skills" }),
        json!({ "command": "remove_skill", "params": { "index": 1 } }),
        json!({ "command": "list_skills" }),
    ]);
    let responses = run_session(temp_dir.path(), &input);
    assert_eq!(responses[2]["result"]["slot"], "Ring 1");
    assert_eq!(responses[3]["result"]["skills"][0]["source"], "Item:1:The Burden");
    assert_eq!(responses[4]["ok"], false);
    assert_eq!(responses[5]["result"]["count"], 1);
}

#[test]
fn test_file_commands_stay_in_sandbox() {
    let Ok(temp_dir) = TempDir::new() else {
        return;
    };
    let builds = temp_dir.path().join("Builds");
    let input = requests(&[
        json!({ "command": "new_build" }),
        json!({ "command": "save_build_as", "params": { "name": "Starter" } }),
        json!({ "command": "load_build_file", "params": { "path": "../../etc/passwd" } }),
        json!({ "command": "rename_build_file", "params": { "old_path": "Starter.xml", "new_name": "..\\Escaped" } }),
        json!({ "command": "list_builds" }),
        json!({ "command": "get_builds_path" }),
        json!({ "command": "shutdown" }),
        json!({ "command": "ping" }),
    ]);
    let responses = run_session(&builds, &input);
    assert_eq!(responses.len(), 8, "nothing is answered after shutdown");
    assert_eq!(responses[2]["ok"], true);
    assert_eq!(
        responses[3]["error"],
        "Path traversal detected: ../../etc/passwd"
    );
    assert_eq!(responses[4]["error"], "Path traversal detected: ..\\Escaped.xml");
    assert!(fs::metadata(builds.join("Starter.xml")).is_ok_and(|m| m.is_file()));
    assert_eq!(responses[5]["result"]["builds"][0]["name"], "Starter");
    let root = responses[6]["result"]["builds_path"].as_str().unwrap_or_default();
    assert!(root.ends_with("Builds/"));
    assert_eq!(responses[7], json!({ "ok": true, "result": { "success": true } }));
}

#[test]
fn test_startup_message_prevents_ready() {
    let Ok(temp_dir) = TempDir::new() else {
        return;
    };
    let mut output = Vec::new();
    let result = start(
        MemoryEngine::with_startup_message("Error loading main script"),
        &candidates(temp_dir.path()),
        "{\"command\":\"ping\"}\n".as_bytes(),
        &mut output,
    );
    assert!(matches!(result, Err(BridgeError::Startup(ref m)) if m == "Error loading main script"));
    assert!(output.is_empty());
}

#[test]
fn test_uncreatable_builds_directory_is_fatal() {
    let Ok(temp_dir) = TempDir::new() else {
        return;
    };
    let blocker = temp_dir.path().join("file");
    assert!(fs::write(&blocker, "not a directory").is_ok());
    let mut output = Vec::new();
    let result = start(
        MemoryEngine::new(),
        &candidates(&blocker.join("Builds")),
        "".as_bytes(),
        &mut output,
    );
    assert!(matches!(result, Err(BridgeError::BuildsDirectory(_))));
    assert!(output.is_empty());
}

//! Skill group text parser
//!
//! Accepts the text form callers paste for a socket group:
//!
//! ```text
//! Label: Main attack
//! Slot: Weapon 1
//! Lightning Arrow 20/0 1
//! Fire Penetration 20/20 DISABLED
//! ```

use once_cell::sync::Lazy;
use pob_engine::{GemSpec, SkillGroup};
use regex::Regex;

use crate::errors::SkillTextError;

/// `None` only if the pattern fails to compile, which the tests rule out
static GEM_LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z' ]+?)\s+(\d+)/(\d+)(?:\s+([A-Za-z]+))?(?:\s+(\d+))?").ok()
});

const DEFAULT_LEVEL: u32 = 20;
const DEFAULT_QUALITY: u32 = 0;
const DEFAULT_COUNT: u32 = 1;

pub fn parse(text: &str) -> Result<SkillGroup, SkillTextError> {
    let mut group = SkillGroup::default();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(label) = header_value(trimmed, "label") {
            group.label = label.to_string();
        } else if let Some(slot) = header_value(trimmed, "slot") {
            group.slot = (!slot.is_empty()).then(|| slot.to_string());
        } else if let Some(gem) = parse_gem(line) {
            group.gems.push(gem);
        }
    }
    if group.gems.is_empty() {
        return Err(SkillTextError::NoGems);
    }
    Ok(group)
}

/// Value of a `Key: value` header, with the key matched case-insensitively
fn header_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (name, value) = line.split_once(':')?;
    name.trim()
        .eq_ignore_ascii_case(key)
        .then(|| value.trim())
}

fn parse_gem(line: &str) -> Option<GemSpec> {
    let captures = GEM_LINE.as_ref()?.captures(line)?;
    let number = |i: usize, default: u32| {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(default)
    };
    let enabled = !captures
        .get(4)
        .is_some_and(|state| state.as_str().eq_ignore_ascii_case("disabled"));
    Some(GemSpec {
        name_spec: captures.get(1)?.as_str().trim().to_string(),
        level: number(2, DEFAULT_LEVEL),
        quality: number(3, DEFAULT_QUALITY),
        enabled,
        count: number(5, DEFAULT_COUNT),
    })
}

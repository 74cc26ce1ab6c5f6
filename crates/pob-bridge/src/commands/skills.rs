//! Skill group commands

use pob_engine::{Build, Engine, SkillGroupInfo};
use serde_json::{json, Value};

use super::{success, to_json};
use crate::errors::CommandError;
use crate::params::Params;
use crate::registry::CommandRegistry;
use crate::session::BridgeState;
use crate::skill_text;

pub fn register<E: Engine>(registry: &mut CommandRegistry<E>) {
    registry.register("list_skills", list_skills);
    registry.register("add_skill", add_skill);
    registry.register("remove_skill", remove_skill);
    registry.register("set_main_skill", set_main_skill);
}

fn find_group(build: &impl Build, index: usize) -> Result<SkillGroupInfo, CommandError> {
    build
        .skill_groups()?
        .into_iter()
        .find(|g| g.index == index)
        .ok_or(CommandError::SkillGroupNotFound(index))
}

fn list_skills<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    let build = state.build()?;
    let skills = build.skill_groups()?;
    let main_group = match skills.iter().find(|g| g.is_main_group) {
        Some(group) => Some(group.index),
        None => build.info()?.main_socket_group.map(|i| i as usize),
    };
    Ok(json!({
        "skills": to_json(&skills)?,
        "count": skills.len(),
        "main_group": main_group,
    }))
}

fn add_skill<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let group = skill_text::parse(params.required_text("skill_text")?)?;
    let build = state.build_mut()?;
    let index = build.add_skill_group(&group)?;
    build.recalculate()?;
    Ok(json!({ "success": true, "index": index, "gem_count": group.gems.len() }))
}

fn remove_skill<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let index = params.required_index("index")?;
    let build = state.build_mut()?;
    let group = find_group(build, index)?;
    if let Some(granted_by) = group.source {
        return Err(CommandError::ItemSkillGroup { index, granted_by });
    }
    build.remove_skill_group(index)?;
    build.recalculate()?;
    Ok(success())
}

fn set_main_skill<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let index = params.required_index("index")?;
    let build = state.build_mut()?;
    find_group(build, index)?;
    build.set_main_skill_group(index)?;
    build.recalculate()?;
    Ok(success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{error_of, params, state};
    use pob_engine::memory::MemoryEngine;

    fn loaded() -> BridgeState<MemoryEngine> {
        let mut state = state();
        if let Ok(build) = state.engine.new_build() {
            state.replace_build(build);
        }
        state
    }

    #[test]
    fn test_add_and_list() {
        let mut state = loaded();
        let p = params(json!({ "skill_text": "Label: Main\nLightning Arrow 20/0 1\nFire Penetration 20/0" }));
        assert_eq!(
            add_skill(&mut state, &p).ok(),
            Some(json!({ "success": true, "index": 1, "gem_count": 2 }))
        );
        let Ok(listed) = list_skills(&mut state, &Params::default()) else {
            panic!("skills should list");
        };
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["main_group"], 1);
        assert_eq!(listed["skills"][0]["label"], "Main");
        assert_eq!(listed["skills"][0]["gems"][1]["nameSpec"], "Fire Penetration");
    }

    #[test]
    fn test_text_without_gems_is_rejected() {
        let mut state = loaded();
        let p = params(json!({ "skill_text": "Label: Empty" }));
        assert!(error_of(add_skill(&mut state, &p)).starts_with("No gems found"));
        let Ok(listed) = list_skills(&mut state, &Params::default()) else {
            panic!("skills should list");
        };
        assert_eq!(listed["count"], 0);
    }

    #[test]
    fn test_remove_and_main_selection() {
        let mut state = loaded();
        for text in ["Fireball 20/0", "Frostbolt 20/0"] {
            assert!(add_skill(&mut state, &params(json!({ "skill_text": text }))).is_ok());
        }
        assert!(set_main_skill(&mut state, &params(json!({ "index": 2 }))).is_ok());
        assert_eq!(
            error_of(set_main_skill(&mut state, &params(json!({ "index": 5 })))),
            "Skill group not found: 5"
        );
        assert!(remove_skill(&mut state, &params(json!({ "index": 1 }))).is_ok());
        let Ok(listed) = list_skills(&mut state, &Params::default()) else {
            panic!("skills should list");
        };
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["skills"][0]["gems"][0]["nameSpec"], "Frostbolt");
    }

    #[test]
    fn test_item_granted_group_cannot_be_removed() {
        let mut state = loaded();
        let raw = "Rarity: UNIQUE\nThe Burden\nIron Ring\nGrants Skill: Summon Skeleton";
        if let Ok(build) = state.build_mut() {
            assert!(build.add_item(raw).is_ok());
        }
        let message = error_of(remove_skill(&mut state, &params(json!({ "index": 1 }))));
        assert!(message.contains("granted by an item"), "{}", message);
        let Ok(listed) = list_skills(&mut state, &Params::default()) else {
            panic!("skills should list");
        };
        assert_eq!(listed["count"], 1);
    }
}

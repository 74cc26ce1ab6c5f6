//! Read-only engine data: modifiers, base items and uniques

use pob_engine::{Engine, ModRecord};
use serde_json::{json, Value};

use super::{contains_ci, to_json};
use crate::errors::CommandError;
use crate::params::Params;
use crate::registry::CommandRegistry;
use crate::session::BridgeState;

const DEFAULT_CATEGORY: &str = "Item";
const DEFAULT_SEARCH_RESULTS: usize = 50;
const DEFAULT_ITEM_TYPE_RESULTS: usize = 100;

pub fn register<E: Engine>(registry: &mut CommandRegistry<E>) {
    registry.register("search_modifiers", search_modifiers);
    registry.register("get_modifier_tiers", get_modifier_tiers);
    registry.register("get_modifiers_for_item_type", get_modifiers_for_item_type);
    registry.register("get_modifier_types", get_modifier_types);
    registry.register("search_base_items", search_base_items);
    registry.register("get_base_item_types", get_base_item_types);
    registry.register("get_base_item_details", get_base_item_details);
    registry.register("search_unique_items", search_unique_items);
    registry.register("get_unique_item_details", get_unique_item_details);
}

fn search_modifiers<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let query = params.required_text("query")?.trim().to_lowercase();
    let category = params.str_or("category", DEFAULT_CATEGORY)?;
    let affix_type = params.optional_str("affix_type")?.filter(|a| !a.is_empty());
    let max_results = params.max_results(DEFAULT_SEARCH_RESULTS)?;

    let modifiers: Vec<ModRecord> = state
        .engine
        .item_mods(category)?
        .filter(|m| {
            affix_type.map_or(true, |wanted| {
                m.affix_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(wanted))
            })
        })
        .filter(|m| contains_ci(&m.text(), &query) || contains_ci(&m.id, &query))
        .take(max_results)
        .collect();
    Ok(json!({ "modifiers": to_json(&modifiers)?, "count": modifiers.len() }))
}

fn get_modifier_tiers<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let category = params.str_or("category", DEFAULT_CATEGORY)?;
    let mods: Vec<ModRecord> = state.engine.item_mods(category)?.collect();

    let group = match params.optional_str("group")?.filter(|g| !g.is_empty()) {
        Some(group) => group.to_string(),
        None => {
            let mod_id = params
                .optional_str("mod_id")?
                .filter(|id| !id.is_empty())
                .ok_or(CommandError::MissingParam("group"))?;
            let record = mods
                .iter()
                .find(|m| m.id == mod_id)
                .ok_or_else(|| CommandError::NotFound(format!("Modifier not found: {}", mod_id)))?;
            record.group.clone().ok_or_else(|| {
                CommandError::NotFound(format!("Modifier {} has no group", mod_id))
            })?
        }
    };

    let mut tiers: Vec<&ModRecord> = mods
        .iter()
        .filter(|m| m.group.as_deref() == Some(group.as_str()))
        .collect();
    if tiers.is_empty() {
        return Err(CommandError::NotFound(format!(
            "Modifier group not found: {}",
            group
        )));
    }
    tiers.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.id.cmp(&b.id)));
    Ok(json!({ "group": group, "tiers": to_json(&tiers)?, "count": tiers.len() }))
}

fn get_modifiers_for_item_type<E: Engine>(
    state: &mut BridgeState<E>,
    params: &Params,
) -> Result<Value, CommandError> {
    let item_type = params.required_text("item_type")?;
    let category = params.str_or("category", DEFAULT_CATEGORY)?;
    let max_results = params.max_results(DEFAULT_ITEM_TYPE_RESULTS)?;

    let mut known = false;
    let mut tags: Vec<String> = Vec::new();
    for base in state
        .engine
        .item_bases()
        .filter(|b| b.item_type.eq_ignore_ascii_case(item_type))
    {
        known = true;
        for tag in base.tags {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    if !known {
        return Err(CommandError::NotFound(format!(
            "Unknown item type: {}",
            item_type
        )));
    }

    let modifiers: Vec<ModRecord> = state
        .engine
        .item_mods(category)?
        .filter(|m| m.applies_to(&tags))
        .take(max_results)
        .collect();
    Ok(json!({
        "item_type": item_type,
        "modifiers": to_json(&modifiers)?,
        "count": modifiers.len(),
    }))
}

fn get_modifier_types<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    Ok(json!({ "types": state.engine.mod_categories() }))
}

fn search_base_items<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let query = params.required_text("query")?.trim().to_lowercase();
    let item_type = params.optional_str("type")?.filter(|t| !t.is_empty());
    let max_results = params.max_results(DEFAULT_SEARCH_RESULTS)?;

    let items: Vec<_> = state
        .engine
        .item_bases()
        .filter(|b| item_type.map_or(true, |t| b.item_type.eq_ignore_ascii_case(t)))
        .filter(|b| contains_ci(&b.name, &query))
        .take(max_results)
        .collect();
    Ok(json!({ "items": to_json(&items)?, "count": items.len() }))
}

fn get_base_item_types<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    let mut types: Vec<String> = state.engine.item_bases().map(|b| b.item_type).collect();
    types.sort();
    types.dedup();
    Ok(json!({ "types": types }))
}

fn get_base_item_details<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let name = params.required_text("name")?;
    let base = state
        .engine
        .item_bases()
        .find(|b| b.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| CommandError::NotFound(format!("Base item not found: {}", name)))?;
    to_json(&base)
}

fn search_unique_items<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let query = params.required_text("query")?.trim().to_lowercase();
    let item_type = params.optional_str("type")?.filter(|t| !t.is_empty());
    let max_results = params.max_results(DEFAULT_SEARCH_RESULTS)?;

    let uniques: Vec<_> = state
        .engine
        .uniques()
        .filter(|u| item_type.map_or(true, |t| u.item_type.eq_ignore_ascii_case(t)))
        .filter(|u| {
            contains_ci(&u.name, &query)
                || u.base_name.as_deref().is_some_and(|b| contains_ci(b, &query))
        })
        .take(max_results)
        .collect();
    Ok(json!({ "uniques": to_json(&uniques)?, "count": uniques.len() }))
}

fn get_unique_item_details<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let name = params.required_text("name")?;
    let unique = state
        .engine
        .uniques()
        .find(|u| u.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| CommandError::NotFound(format!("Unique item not found: {}", name)))?;
    to_json(&unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{error_of, params, state};

    #[test]
    fn test_search_modifiers() {
        let mut state = state();
        let Ok(found) = search_modifiers(&mut state, &params(json!({ "query": "maximum life" }))) else {
            panic!("search should succeed");
        };
        assert_eq!(found["count"], 2);

        let p = params(json!({ "query": "resist", "affix_type": "prefix" }));
        let Ok(none) = search_modifiers(&mut state, &p) else {
            panic!("search should succeed");
        };
        assert_eq!(none["count"], 0);

        let p = params(json!({ "query": "charges", "category": "Flask" }));
        let Ok(flask) = search_modifiers(&mut state, &p) else {
            panic!("search should succeed");
        };
        assert_eq!(flask["modifiers"][0]["id"], "FlaskChargesUsed1");

        let p = params(json!({ "query": "x", "category": "Jewel" }));
        assert_eq!(error_of(search_modifiers(&mut state, &p)), "Unknown modifier category: Jewel");
    }

    #[test]
    fn test_modifier_tiers_sorted_by_level() {
        let mut state = state();
        let Ok(tiers) = get_modifier_tiers(&mut state, &params(json!({ "mod_id": "IncreasedLife2" }))) else {
            panic!("tiers should resolve");
        };
        assert_eq!(tiers["group"], "IncreasedLife");
        assert_eq!(tiers["count"], 2);
        assert_eq!(tiers["tiers"][0]["id"], "IncreasedLife1");
        assert_eq!(tiers["tiers"][1]["level"], 11);

        assert_eq!(
            error_of(get_modifier_tiers(&mut state, &Params::default())),
            "Missing required parameter: group"
        );
        assert_eq!(
            error_of(get_modifier_tiers(&mut state, &params(json!({ "group": "Nope" })))),
            "Modifier group not found: Nope"
        );
    }

    #[test]
    fn test_modifiers_for_item_type() {
        let mut state = state();
        let Ok(ring) = get_modifiers_for_item_type(&mut state, &params(json!({ "item_type": "ring" }))) else {
            panic!("ring mods should resolve");
        };
        // Life mods carry a zero ring weight; fire resistance falls back to default
        assert_eq!(ring["count"], 1);
        assert_eq!(ring["modifiers"][0]["id"], "FireResist1");

        let p = params(json!({ "item_type": "One Hand Sword" }));
        let Ok(sword) = get_modifiers_for_item_type(&mut state, &p) else {
            panic!("sword mods should resolve");
        };
        assert_eq!(sword["count"], 4);

        assert_eq!(
            error_of(get_modifiers_for_item_type(&mut state, &params(json!({ "item_type": "Quiver" })))),
            "Unknown item type: Quiver"
        );
    }

    #[test]
    fn test_base_items() {
        let mut state = state();
        let Ok(types) = get_base_item_types(&mut state, &Params::default()) else {
            panic!("types should list");
        };
        assert_eq!(
            types["types"],
            json!(["Body Armour", "Helmet", "One Hand Sword", "Ring"])
        );
        let p = params(json!({ "query": "iron", "type": "Helmet" }));
        let Ok(found) = search_base_items(&mut state, &p) else {
            panic!("search should succeed");
        };
        assert_eq!(found["count"], 1);
        let Ok(details) = get_base_item_details(&mut state, &params(json!({ "name": "iron ring" }))) else {
            panic!("base should exist");
        };
        assert_eq!(details["implicit"], "Adds 1 to 4 Physical Damage to Attacks");
        assert_eq!(
            error_of(get_base_item_details(&mut state, &params(json!({ "name": "Nothing" })))),
            "Base item not found: Nothing"
        );
    }

    #[test]
    fn test_uniques() {
        let mut state = state();
        let Ok(found) = search_unique_items(&mut state, &params(json!({ "query": "greathelm" }))) else {
            panic!("search should succeed");
        };
        assert_eq!(found["uniques"][0]["name"], "Black Sun Crest");
        let Ok(details) = get_unique_item_details(&mut state, &params(json!({ "name": "Black Sun Crest" }))) else {
            panic!("unique should exist");
        };
        assert_eq!(details["type"], "Helmet");
    }

    #[test]
    fn test_modifier_types() {
        let mut state = state();
        assert_eq!(
            get_modifier_types(&mut state, &Params::default()).ok(),
            Some(json!({ "types": ["Flask", "Item"] }))
        );
    }
}

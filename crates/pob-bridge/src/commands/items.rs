//! Item and equipment slot commands

use pob_engine::{Build, Engine, ItemId};
use serde_json::{json, Value};

use super::{success, to_json};
use crate::errors::CommandError;
use crate::params::Params;
use crate::registry::CommandRegistry;
use crate::session::BridgeState;

pub fn register<E: Engine>(registry: &mut CommandRegistry<E>) {
    registry.register("list_items", list_items);
    registry.register("list_slots", list_slots);
    registry.register("get_item_details", get_item_details);
    registry.register("add_item", add_item);
    registry.register("equip_item", equip_item);
    registry.register("unequip_slot", unequip_slot);
    registry.register("delete_item", delete_item);
}

fn ensure_slot(build: &impl Build, slot: &str) -> Result<(), CommandError> {
    if build.slots()?.iter().any(|s| s.slot_name == slot) {
        Ok(())
    } else {
        Err(CommandError::UnknownSlot(slot.to_string()))
    }
}

fn ensure_item(build: &impl Build, id: ItemId) -> Result<(), CommandError> {
    if build.items()?.iter().any(|item| item.id == id) {
        Ok(())
    } else {
        Err(CommandError::ItemNotFound(id))
    }
}

fn list_items<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    let items = state.build()?.items()?;
    Ok(json!({ "items": to_json(&items)?, "count": items.len() }))
}

fn list_slots<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    Ok(json!({ "slots": to_json(&state.build()?.slots()?)? }))
}

fn get_item_details<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let id = params.required_id("item_id")?;
    let details = state
        .build()?
        .item_details(id)?
        .ok_or(CommandError::ItemNotFound(id))?;
    to_json(&details)
}

fn add_item<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let raw = params.required_text("item_raw")?;
    let slot = params.optional_str("slot")?.filter(|s| !s.trim().is_empty());
    let build = state.build_mut()?;
    if let Some(slot) = slot {
        ensure_slot(build, slot)?;
    }

    let id = build.add_item(raw)?;
    if let Some(slot) = slot {
        build.set_slot_item(slot, Some(id))?;
    }
    build.recalculate()?;

    let mut result = json!({ "success": true, "item_id": id });
    if let Some(slot) = slot {
        result["slot"] = json!(slot);
    }
    Ok(result)
}

fn equip_item<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let id = params.required_id("item_id")?;
    let slot = params.required_text("slot")?;
    let build = state.build_mut()?;
    ensure_item(build, id)?;
    ensure_slot(build, slot)?;
    build.set_slot_item(slot, Some(id))?;
    build.recalculate()?;
    Ok(success())
}

fn unequip_slot<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let slot = params.required_text("slot")?;
    let build = state.build_mut()?;
    ensure_slot(build, slot)?;
    build.set_slot_item(slot, None)?;
    build.recalculate()?;
    Ok(success())
}

fn delete_item<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let id = params.required_id("item_id")?;
    let build = state.build_mut()?;
    ensure_item(build, id)?;
    build.delete_item(id)?;
    build.recalculate()?;
    Ok(success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{error_of, params, state};
    use pob_engine::memory::MemoryEngine;

    const HELMET: &str = "Rarity: RARE\nDread Crown\nIron Hat\n+25 to maximum Life";

    fn loaded() -> BridgeState<MemoryEngine> {
        let mut state = state();
        if let Ok(build) = state.engine.new_build() {
            state.replace_build(build);
        }
        state
    }

    fn life(state: &BridgeState<MemoryEngine>) -> Option<f64> {
        match state.build().ok()?.output().ok()?.get("Life")? {
            pob_engine::HostValue::Number(n) => Some(n),
            _ => None,
        }
    }

    #[test]
    fn test_add_item_into_slot() {
        let mut state = loaded();
        let p = params(json!({ "item_raw": HELMET, "slot": "Helmet" }));
        let Ok(result) = add_item(&mut state, &p) else {
            panic!("item should be added");
        };
        assert_eq!(result, json!({ "success": true, "item_id": 1, "slot": "Helmet" }));
        assert_eq!(life(&state), Some(125.0));

        let Ok(slots) = list_slots(&mut state, &Params::default()) else {
            panic!("slots should list");
        };
        let helmet = slots["slots"]
            .as_array()
            .and_then(|s| s.iter().find(|slot| slot["slotName"] == "Helmet").cloned())
            .unwrap_or_default();
        assert_eq!(helmet["itemId"], 1);
    }

    #[test]
    fn test_slot_is_validated_before_adding() {
        let mut state = loaded();
        let p = params(json!({ "item_raw": HELMET, "slot": "Weapon 3" }));
        assert_eq!(error_of(add_item(&mut state, &p)), "Unknown slot: Weapon 3");
        let Ok(items) = list_items(&mut state, &Params::default()) else {
            panic!("items should list");
        };
        assert_eq!(items["count"], 0);
    }

    #[test]
    fn test_equip_unequip_delete() {
        let mut state = loaded();
        assert!(add_item(&mut state, &params(json!({ "item_raw": HELMET }))).is_ok());
        assert_eq!(life(&state), Some(100.0));

        let equip = params(json!({ "item_id": 1, "slot": "Helmet" }));
        assert!(equip_item(&mut state, &equip).is_ok());
        assert_eq!(life(&state), Some(125.0));

        assert!(unequip_slot(&mut state, &params(json!({ "slot": "Helmet" }))).is_ok());
        assert_eq!(life(&state), Some(100.0));

        let missing = params(json!({ "item_id": 9, "slot": "Helmet" }));
        assert_eq!(error_of(equip_item(&mut state, &missing)), "Item not found: 9");

        assert!(delete_item(&mut state, &params(json!({ "item_id": 1 }))).is_ok());
        assert_eq!(
            error_of(get_item_details(&mut state, &params(json!({ "item_id": 1 })))),
            "Item not found: 1"
        );
    }

    #[test]
    fn test_item_details() {
        let mut state = loaded();
        assert!(add_item(&mut state, &params(json!({ "item_raw": HELMET }))).is_ok());
        let Ok(details) = get_item_details(&mut state, &params(json!({ "item_id": "1" }))) else {
            panic!("details should exist");
        };
        assert_eq!(details["name"], "Dread Crown");
        assert_eq!(details["baseName"], "Iron Hat");
        assert_eq!(details["explicitMods"], json!(["+25 to maximum Life"]));
    }
}

//! `Build` implementation over the engine's global `build` object
//!
//! The build object owns one tab per concern (`spec` for the passive tree,
//! `itemsTab`, `skillsTab`, `configTab`, `calcsTab`). Every mutation here
//! goes through the tab's own methods and ends with an undo snapshot, the
//! same sequence the engine's UI runs.

use std::path::{Path, PathBuf};

use mlua::{Function, Lua, ObjectLike, Table, Value};
use pob_engine::{
    Build, BuildInfo, ConfigValue, EngineError, EngineResult, GemInfo, HostValue, ItemDetails,
    ItemId, ItemSummary, NodeId, PassiveNode, SkillGroup, SkillGroupInfo, SlotInfo,
};
use tracing::debug;

use crate::convert::to_host;
use crate::errors::host_error;
use crate::utils::{
    field, flag, keyed_tables, opt_string, opt_table, opt_u32, sequence, string_list,
    value_number, value_string,
};

pub struct LuaBuild {
    lua: Lua,
    build: Table,
}

impl LuaBuild {
    pub(crate) fn new(lua: Lua, build: Table) -> Self {
        Self { lua, build }
    }

    fn tab(&self, name: &str) -> EngineResult<Table> {
        opt_table(&self.build, name)
            .ok_or_else(|| EngineError::Host(format!("build.{} is missing", name)))
    }

    fn spec(&self) -> EngineResult<Table> {
        self.tab("spec")
    }

    fn node_table(&self, id: NodeId) -> EngineResult<Option<Table>> {
        let nodes = opt_table(&self.spec()?, "nodes")
            .ok_or_else(|| EngineError::Host("build.spec.nodes is missing".to_string()))?;
        match nodes.get::<Value>(id).map_err(host_error)? {
            Value::Table(t) => Ok(Some(t)),
            _ => Ok(None),
        }
    }

    fn item_table(&self, id: ItemId) -> EngineResult<Option<Table>> {
        let items = opt_table(&self.tab("itemsTab")?, "items")
            .ok_or_else(|| EngineError::Host("build.itemsTab.items is missing".to_string()))?;
        match items.get::<Value>(id).map_err(host_error)? {
            Value::Table(t) => Ok(Some(t)),
            _ => Ok(None),
        }
    }

    fn socket_groups(&self) -> EngineResult<Table> {
        opt_table(&self.tab("skillsTab")?, "socketGroupList")
            .ok_or_else(|| EngineError::Host("build.skillsTab.socketGroupList is missing".to_string()))
    }

    fn main_socket_group(&self) -> usize {
        opt_u32(&self.build, "mainSocketGroup").unwrap_or(1) as usize
    }

    fn call_tab(&self, tab: &str, method: &str, args: impl mlua::IntoLuaMulti) -> EngineResult<()> {
        self.tab(tab)?
            .call_method::<()>(method, args)
            .map_err(host_error)
    }

    fn slot_holding(&self, id: ItemId) -> EngineResult<Option<String>> {
        Ok(self
            .slots()?
            .into_iter()
            .find(|s| s.item_id == id)
            .map(|s| s.slot_name))
    }
}

fn passive_node(table: &Table) -> Option<PassiveNode> {
    let id = opt_u32(table, "id")?;
    let linked = opt_table(table, "linked")
        .map(|t| {
            sequence(&t, |v| match v {
                Value::Table(n) => opt_u32(&n, "id"),
                other => value_number(&other).map(|n| n as u32),
            })
        })
        .unwrap_or_default();
    Some(PassiveNode {
        id,
        name: opt_string(table, "dn"),
        node_type: opt_string(table, "type"),
        alloc: flag(table, "alloc"),
        ascendancy_name: opt_string(table, "ascendancyName"),
        mods: string_list(table, "sd"),
        linked,
        class_start_index: opt_u32(table, "classStartIndex"),
        is_multiple_choice: flag(table, "isMultipleChoice"),
        is_multiple_choice_option: flag(table, "isMultipleChoiceOption"),
        passive_points_granted: opt_u32(table, "passivePointsGranted").unwrap_or(0),
    })
}

fn item_summary(id: ItemId, item: &Table) -> ItemSummary {
    ItemSummary {
        id,
        name: opt_string(item, "name").unwrap_or_default(),
        base_name: opt_string(item, "baseName"),
        item_type: opt_string(item, "type"),
        rarity: opt_string(item, "rarity"),
    }
}

/// Mod lines are stored as `{ line = "..." }` records
fn mod_lines(item: &Table, key: &str) -> Vec<String> {
    opt_table(item, key)
        .map(|t| {
            sequence(&t, |v| match v {
                Value::Table(line) => opt_string(&line, "line"),
                other => value_string(&other),
            })
        })
        .unwrap_or_default()
}

fn gem_info(gem: &Table) -> GemInfo {
    GemInfo {
        name_spec: opt_string(gem, "nameSpec"),
        level: opt_u32(gem, "level"),
        quality: opt_u32(gem, "quality"),
        enabled: flag(gem, "enabled"),
        count: opt_u32(gem, "count"),
        skill_id: opt_string(gem, "skillId"),
        gem_id: opt_string(gem, "gemId"),
    }
}

fn index_table(list: &Table, index: usize) -> EngineResult<Table> {
    match list.raw_get::<Value>(index).map_err(host_error)? {
        Value::Table(t) if index >= 1 => Ok(t),
        _ => Err(EngineError::Host(format!("no skill group at index {}", index))),
    }
}

impl Build for LuaBuild {
    fn info(&self) -> EngineResult<BuildInfo> {
        let spec = self.spec()?;
        Ok(BuildInfo {
            class_name: opt_string(&spec, "curClassName"),
            ascend_class_name: opt_string(&spec, "curAscendClassName"),
            level: opt_u32(&self.build, "characterLevel"),
            main_socket_group: opt_u32(&self.build, "mainSocketGroup"),
            view_mode: opt_string(&self.build, "viewMode"),
            build_name: opt_string(&self.build, "buildName"),
        })
    }

    fn to_xml(&self) -> EngineResult<String> {
        self.build
            .call_method::<String>("SaveDB", "code")
            .map_err(host_error)
    }

    fn recalculate(&mut self) -> EngineResult<()> {
        self.build.set("buildFlag", true).map_err(host_error)?;
        let run_callback: Function = self.lua.globals().get("runCallback").map_err(host_error)?;
        run_callback.call::<()>("OnFrame").map_err(host_error)
    }

    fn node(&self, id: NodeId) -> EngineResult<Option<PassiveNode>> {
        Ok(self.node_table(id)?.as_ref().and_then(passive_node))
    }

    fn nodes(&self) -> EngineResult<Box<dyn Iterator<Item = PassiveNode> + '_>> {
        let nodes = opt_table(&self.spec()?, "nodes")
            .ok_or_else(|| EngineError::Host("build.spec.nodes is missing".to_string()))?;
        let mut entries = keyed_tables(&nodes);
        entries.sort_by_key(|(key, _)| key.parse::<u64>().unwrap_or(u64::MAX));
        Ok(Box::new(
            entries.into_iter().filter_map(|(_, t)| passive_node(&t)),
        ))
    }

    fn allocated_nodes(&self) -> EngineResult<Vec<PassiveNode>> {
        let alloc = opt_table(&self.spec()?, "allocNodes").ok_or_else(|| {
            EngineError::Host("build.spec.allocNodes is missing".to_string())
        })?;
        let mut nodes: Vec<PassiveNode> = keyed_tables(&alloc)
            .into_iter()
            .filter_map(|(_, t)| passive_node(&t))
            .collect();
        nodes.sort_by_key(|n| n.id);
        Ok(nodes)
    }

    fn alloc_node(&mut self, id: NodeId) -> EngineResult<()> {
        let node = self
            .node_table(id)?
            .ok_or_else(|| EngineError::Host(format!("no node {}", id)))?;
        let spec = self.spec()?;
        spec.call_method::<()>("AllocNode", node.clone())
            .map_err(host_error)?;
        if !flag(&node, "alloc") {
            return Err(EngineError::Host(format!(
                "node {} could not be allocated: it is not connected to the allocated tree",
                id
            )));
        }
        spec.call_method::<()>("AddUndoState", ()).map_err(host_error)
    }

    fn dealloc_node(&mut self, id: NodeId) -> EngineResult<()> {
        let node = self
            .node_table(id)?
            .ok_or_else(|| EngineError::Host(format!("no node {}", id)))?;
        let spec = self.spec()?;
        spec.call_method::<()>("DeallocNode", node)
            .map_err(host_error)?;
        spec.call_method::<()>("AddUndoState", ()).map_err(host_error)
    }

    fn items(&self) -> EngineResult<Vec<ItemSummary>> {
        let items_tab = self.tab("itemsTab")?;
        let items = opt_table(&items_tab, "items").ok_or_else(|| {
            EngineError::Host("build.itemsTab.items is missing".to_string())
        })?;
        let order = opt_table(&items_tab, "itemOrderList");
        let ids: Vec<ItemId> = match order {
            Some(order) => sequence(&order, |v| value_number(&v).map(|n| n as ItemId)),
            None => {
                let mut ids: Vec<ItemId> = keyed_tables(&items)
                    .into_iter()
                    .filter_map(|(k, _)| k.parse().ok())
                    .collect();
                ids.sort_unstable();
                ids
            }
        };
        Ok(ids
            .into_iter()
            .filter_map(|id| match items.get::<Value>(id) {
                Ok(Value::Table(item)) => Some(item_summary(id, &item)),
                _ => None,
            })
            .collect())
    }

    fn item_details(&self, id: ItemId) -> EngineResult<Option<ItemDetails>> {
        let Some(item) = self.item_table(id)? else {
            return Ok(None);
        };
        let raw = item
            .call_method::<Option<String>>("BuildRaw", ())
            .ok()
            .flatten()
            .or_else(|| opt_string(&item, "raw"))
            .unwrap_or_default();
        Ok(Some(ItemDetails {
            summary: item_summary(id, &item),
            raw,
            quality: opt_u32(&item, "quality"),
            item_level: opt_u32(&item, "itemLevel"),
            corrupted: flag(&item, "corrupted"),
            implicit_mods: mod_lines(&item, "implicitModLines"),
            explicit_mods: mod_lines(&item, "explicitModLines"),
            enchant_mods: mod_lines(&item, "enchantModLines"),
            rune_mods: mod_lines(&item, "runeModLines"),
            slot: self.slot_holding(id)?,
        }))
    }

    fn add_item(&mut self, raw: &str) -> EngineResult<ItemId> {
        let new: Function = self.lua.globals().get("new").map_err(host_error)?;
        let item: Table = new
            .call(("Item", raw))
            .map_err(|e| EngineError::InvalidItem(e.to_string()))?;
        if matches!(field(&item, "base"), Value::Nil) {
            return Err(EngineError::InvalidItem(
                "unrecognized item base type".to_string(),
            ));
        }
        item.call_method::<()>("BuildModList", ()).map_err(host_error)?;
        let items_tab = self.tab("itemsTab")?;
        items_tab
            .call_method::<()>("AddItem", (item.clone(), true))
            .map_err(host_error)?;
        items_tab.call_method::<()>("PopulateSlots", ()).map_err(host_error)?;
        items_tab.call_method::<()>("AddUndoState", ()).map_err(host_error)?;
        let id = opt_u32(&item, "id")
            .ok_or_else(|| EngineError::Host("added item has no id".to_string()))?;
        debug!(item_id = id, "Item added");
        Ok(id)
    }

    fn delete_item(&mut self, id: ItemId) -> EngineResult<()> {
        let item = self
            .item_table(id)?
            .ok_or_else(|| EngineError::Host(format!("no item {}", id)))?;
        self.call_tab("itemsTab", "DeleteItem", item)?;
        self.call_tab("itemsTab", "AddUndoState", ())
    }

    fn slots(&self) -> EngineResult<Vec<SlotInfo>> {
        let items_tab = self.tab("itemsTab")?;
        let items = opt_table(&items_tab, "items");
        let ordered = opt_table(&items_tab, "orderedSlots").ok_or_else(|| {
            EngineError::Host("build.itemsTab.orderedSlots is missing".to_string())
        })?;
        Ok(sequence(&ordered, |v| match v {
            Value::Table(slot) => {
                let slot_name = opt_string(&slot, "slotName")?;
                let item_id = opt_u32(&slot, "selItemId").unwrap_or(0);
                let item_name = items
                    .as_ref()
                    .filter(|_| item_id != 0)
                    .and_then(|items| items.get::<Option<Table>>(item_id).ok().flatten())
                    .and_then(|item| opt_string(&item, "name"));
                Some(SlotInfo {
                    slot_name,
                    item_id,
                    item_name,
                })
            }
            _ => None,
        }))
    }

    fn set_slot_item(&mut self, slot: &str, item: Option<ItemId>) -> EngineResult<()> {
        let items_tab = self.tab("itemsTab")?;
        let slot_table = opt_table(&items_tab, "slots")
            .and_then(|slots| opt_table(&slots, slot))
            .ok_or_else(|| EngineError::UnknownSlot(slot.to_string()))?;
        slot_table
            .call_method::<()>("SetSelItemId", item.unwrap_or(0))
            .map_err(host_error)?;
        items_tab.call_method::<()>("PopulateSlots", ()).map_err(host_error)?;
        items_tab.call_method::<()>("AddUndoState", ()).map_err(host_error)
    }

    fn skill_groups(&self) -> EngineResult<Vec<SkillGroupInfo>> {
        let list = self.socket_groups()?;
        let main = self.main_socket_group();
        let mut groups = Vec::new();
        for index in 1..=list.raw_len() {
            let Ok(Value::Table(group)) = list.raw_get::<Value>(index) else {
                continue;
            };
            let gems = opt_table(&group, "gemList")
                .map(|t| {
                    sequence(&t, |v| match v {
                        Value::Table(gem) => Some(gem_info(&gem)),
                        _ => None,
                    })
                })
                .unwrap_or_default();
            groups.push(SkillGroupInfo {
                index,
                label: opt_string(&group, "label"),
                enabled: flag(&group, "enabled"),
                slot: opt_string(&group, "slot"),
                source: opt_string(&group, "source"),
                main_active_skill: opt_u32(&group, "mainActiveSkill"),
                is_main_group: index == main,
                gems,
            });
        }
        Ok(groups)
    }

    fn add_skill_group(&mut self, group: &SkillGroup) -> EngineResult<usize> {
        let table = self.lua.create_table().map_err(host_error)?;
        table.set("label", group.label.as_str()).map_err(host_error)?;
        table.set("enabled", true).map_err(host_error)?;
        if let Some(ref slot) = group.slot {
            table.set("slot", slot.as_str()).map_err(host_error)?;
        }
        let gems = self.lua.create_table().map_err(host_error)?;
        for (i, gem) in group.gems.iter().enumerate() {
            let entry = self.lua.create_table().map_err(host_error)?;
            entry.set("nameSpec", gem.name_spec.as_str()).map_err(host_error)?;
            entry.set("level", gem.level).map_err(host_error)?;
            entry.set("quality", gem.quality).map_err(host_error)?;
            entry.set("enabled", gem.enabled).map_err(host_error)?;
            entry.set("count", gem.count).map_err(host_error)?;
            gems.raw_set(i + 1, entry).map_err(host_error)?;
        }
        table.set("gemList", gems).map_err(host_error)?;

        let list = self.socket_groups()?;
        let index = list.raw_len() + 1;
        list.raw_set(index, table.clone()).map_err(host_error)?;
        let skills_tab = self.tab("skillsTab")?;
        skills_tab
            .call_method::<()>("ProcessSocketGroup", table)
            .map_err(host_error)?;
        skills_tab.call_method::<()>("AddUndoState", ()).map_err(host_error)?;
        Ok(index)
    }

    fn remove_skill_group(&mut self, index: usize) -> EngineResult<()> {
        let list = self.socket_groups()?;
        index_table(&list, index)?;
        list.raw_remove(index).map_err(host_error)?;
        let remaining = list.raw_len();
        if self.main_socket_group() > remaining {
            self.build
                .set("mainSocketGroup", remaining.max(1))
                .map_err(host_error)?;
        }
        self.call_tab("skillsTab", "AddUndoState", ())
    }

    fn set_main_skill_group(&mut self, index: usize) -> EngineResult<()> {
        index_table(&self.socket_groups()?, index)?;
        self.build.set("mainSocketGroup", index).map_err(host_error)
    }

    fn set_config(&mut self, key: &str, value: &ConfigValue) -> EngineResult<()> {
        let config_tab = self.tab("configTab")?;
        let input = opt_table(&config_tab, "input")
            .ok_or_else(|| EngineError::Host("build.configTab.input is missing".to_string()))?;
        let result = match value {
            ConfigValue::Boolean(b) => input.set(key, *b),
            ConfigValue::Number(n) => input.set(key, *n),
            ConfigValue::String(s) => input.set(key, s.as_str()),
            ConfigValue::Clear => input.set(key, Value::Nil),
        };
        result.map_err(host_error)?;
        config_tab.call_method::<()>("BuildModList", ()).map_err(host_error)
    }

    fn set_custom_mods(&mut self, mods: &str) -> EngineResult<()> {
        self.set_config("customMods", &ConfigValue::String(mods.to_string()))
    }

    fn save_to_file(&mut self, path: &Path) -> EngineResult<()> {
        let previous: Value = self.build.get("dbFileName").map_err(host_error)?;
        self.set_file_path(path);
        let saved = self.build.call_method::<()>("SaveDBFile", ());
        if let Err(e) = saved {
            if let Err(restore) = self.build.set("dbFileName", previous) {
                debug!("Failed to restore build file path: {}", restore);
            }
            return Err(host_error(e));
        }
        Ok(())
    }

    fn file_path(&self) -> Option<PathBuf> {
        opt_string(&self.build, "dbFileName")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    fn set_file_path(&mut self, path: &Path) {
        let path = path.to_string_lossy().to_string();
        if let Err(e) = self.build.set("dbFileName", path) {
            debug!("Failed to set build file path: {}", e);
        }
    }

    fn output(&self) -> EngineResult<HostValue> {
        let calcs = self.tab("calcsTab")?;
        Ok(to_host(field(&calcs, "mainOutput")))
    }
}

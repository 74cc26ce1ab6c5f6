//! `Engine` implementation: build creation and the read-only data catalogs
//!
//! Catalogs live in the engine's global `data` table:
//! - `data.itemMods[category][id]`: modifier definitions, lines at `[1..n]`
//! - `data.itemBases[name]`: base item definitions, tags as a set
//! - `data.uniques[type]`: raw unique item texts

use mlua::{Function, Table, Value};
use pob_engine::{BaseItemRecord, Engine, EngineError, EngineResult, ModRecord, UniqueRecord};

use crate::build::LuaBuild;
use crate::errors::host_error;
use crate::initialization::LuaEngine;
use crate::utils::{
    keyed_tables, opt_string, opt_table, opt_u32, sequence, string_list, value_number,
    value_string,
};

impl LuaEngine {
    fn data_table(&self, name: &str) -> EngineResult<Table> {
        let data = self.global_table("data")?;
        opt_table(&data, name).ok_or_else(|| EngineError::Host(format!("data.{} is missing", name)))
    }

    fn current_build(&self) -> EngineResult<LuaBuild> {
        let build = self.global_table("build")?;
        Ok(LuaBuild::new(self.lua.clone(), build))
    }
}

impl Engine for LuaEngine {
    type Build = LuaBuild;

    fn startup_message(&self) -> Option<String> {
        self.startup_prompt()
    }

    fn new_build(&mut self) -> EngineResult<LuaBuild> {
        let new_build: Function = self.lua.globals().get("newBuild").map_err(host_error)?;
        new_build.call::<()>(()).map_err(host_error)?;
        self.current_build()
    }

    fn load_build_xml(&mut self, xml: &str, name: &str) -> EngineResult<LuaBuild> {
        let load: Function = self
            .lua
            .globals()
            .get("loadBuildFromXML")
            .map_err(host_error)?;
        load.call::<()>((xml, name))
            .map_err(|e| EngineError::InvalidBuild(e.to_string()))?;
        self.current_build()
    }

    fn mod_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .data_table("itemMods")
            .map(|mods| keyed_tables(&mods).into_iter().map(|(k, _)| k).collect())
            .unwrap_or_default();
        categories.sort();
        categories
    }

    fn item_mods(
        &self,
        category: &str,
    ) -> EngineResult<Box<dyn Iterator<Item = ModRecord> + '_>> {
        let mods = self.data_table("itemMods")?;
        let table = opt_table(&mods, category)
            .ok_or_else(|| EngineError::UnknownCategory(category.to_string()))?;
        let category = category.to_string();
        let mut entries = keyed_tables(&table);
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Box::new(
            entries
                .into_iter()
                .map(move |(id, t)| mod_record(id, &category, &t)),
        ))
    }

    fn item_bases(&self) -> Box<dyn Iterator<Item = BaseItemRecord> + '_> {
        let mut entries = self
            .data_table("itemBases")
            .map(|t| keyed_tables(&t))
            .unwrap_or_default();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Box::new(entries.into_iter().map(|(name, t)| base_record(name, &t)))
    }

    fn uniques(&self) -> Box<dyn Iterator<Item = UniqueRecord> + '_> {
        let mut groups = self
            .data_table("uniques")
            .map(|t| keyed_tables(&t))
            .unwrap_or_default();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        Box::new(groups.into_iter().flat_map(|(item_type, list)| {
            sequence(&list, |v| value_string(&v))
                .into_iter()
                .filter_map(move |raw| unique_record(&item_type, raw))
        }))
    }
}

fn mod_record(id: String, category: &str, table: &Table) -> ModRecord {
    let weight_values = opt_table(table, "weightVal")
        .map(|t| sequence(&t, |v| value_number(&v)))
        .unwrap_or_default();
    ModRecord {
        id,
        category: category.to_string(),
        affix_type: opt_string(table, "type"),
        affix: opt_string(table, "affix"),
        level: opt_u32(table, "level"),
        group: opt_string(table, "group"),
        lines: sequence(table, |v| value_string(&v)),
        weight_keys: string_list(table, "weightKey"),
        weight_values,
    }
}

fn base_record(name: String, table: &Table) -> BaseItemRecord {
    let mut tags = Vec::new();
    if let Some(set) = opt_table(table, "tags") {
        let _ = set.for_each(|tag: Value, enabled: Value| {
            if !matches!(enabled, Value::Nil | Value::Boolean(false)) {
                if let Some(tag) = value_string(&tag) {
                    tags.push(tag);
                }
            }
            Ok(())
        });
    }
    tags.sort();
    BaseItemRecord {
        name,
        item_type: opt_string(table, "type").unwrap_or_default(),
        sub_type: opt_string(table, "subType"),
        level_requirement: opt_table(table, "req").and_then(|r| opt_u32(&r, "level")),
        tags,
        implicit: opt_string(table, "implicit"),
    }
}

/// First line of a unique text is its name, the second its base
fn unique_record(item_type: &str, raw: String) -> Option<UniqueRecord> {
    let mut lines = raw.lines().map(str::trim).filter(|l| !l.is_empty());
    let name = lines.next()?.to_string();
    let base_name = lines.next().map(str::to_string);
    Some(UniqueRecord {
        name,
        base_name,
        item_type: item_type.to_string(),
        raw,
    })
}

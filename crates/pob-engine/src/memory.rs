//! Deterministic in-memory engine.
//!
//! `MemoryEngine` models a five-node passive tree, ten equipment slots and a
//! small modifier/base/unique catalog. Its output is a handful of stats
//! derived from the build's contents, plus nested, cyclic and opaque members
//! so consumers can be exercised against awkward host graphs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::engine::{Build, Engine};
use crate::errors::{EngineError, EngineResult};
use crate::host::{HostValue, MemoryTable, OpaqueKind};
use crate::types::{
    BaseItemRecord, BuildInfo, ConfigValue, GemInfo, ItemDetails, ItemId, ItemSummary, ModRecord,
    NodeId, PassiveNode, SkillGroup, SkillGroupInfo, SlotInfo, UniqueRecord,
};

pub const SLOT_NAMES: [&str; 10] = [
    "Weapon 1",
    "Weapon 2",
    "Helmet",
    "Body Armour",
    "Gloves",
    "Boots",
    "Amulet",
    "Ring 1",
    "Ring 2",
    "Belt",
];

const CLASS_START: NodeId = 1;

pub struct MemoryEngine {
    startup_message: Option<String>,
    mods: BTreeMap<String, Vec<ModRecord>>,
    bases: Rc<Vec<BaseItemRecord>>,
    uniques: Vec<UniqueRecord>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            startup_message: None,
            mods: sample_mods(),
            bases: Rc::new(sample_bases()),
            uniques: sample_uniques(),
        }
    }

    /// Engine whose bootstrap reported a fatal message
    pub fn with_startup_message(message: impl Into<String>) -> Self {
        Self {
            startup_message: Some(message.into()),
            ..Self::new()
        }
    }
}

impl Engine for MemoryEngine {
    type Build = MemoryBuild;

    fn startup_message(&self) -> Option<String> {
        self.startup_message.clone()
    }

    fn new_build(&mut self) -> EngineResult<MemoryBuild> {
        Ok(MemoryBuild::new("Unnamed build", Rc::clone(&self.bases)))
    }

    fn load_build_xml(&mut self, xml: &str, name: &str) -> EngineResult<MemoryBuild> {
        let xml = xml.trim();
        if !xml.starts_with('<') {
            return Err(EngineError::InvalidBuild("build text is not XML".to_string()));
        }
        let mut build = MemoryBuild::new(name, Rc::clone(&self.bases));
        if let Some(level) = attribute(xml, "level").and_then(|l| l.parse().ok()) {
            build.level = level;
        }
        if let Some(nodes) = attribute(xml, "nodes") {
            for id in nodes.split(',').filter_map(|n| n.trim().parse::<NodeId>().ok()) {
                if let Some(node) = build.tree.get_mut(&id) {
                    node.alloc = true;
                }
            }
        }
        build.recalculate()?;
        Ok(build)
    }

    fn mod_categories(&self) -> Vec<String> {
        self.mods.keys().cloned().collect()
    }

    fn item_mods(
        &self,
        category: &str,
    ) -> EngineResult<Box<dyn Iterator<Item = ModRecord> + '_>> {
        let mods = self
            .mods
            .get(category)
            .ok_or_else(|| EngineError::UnknownCategory(category.to_string()))?;
        Ok(Box::new(mods.iter().cloned()))
    }

    fn item_bases(&self) -> Box<dyn Iterator<Item = BaseItemRecord> + '_> {
        Box::new(self.bases.iter().cloned())
    }

    fn uniques(&self) -> Box<dyn Iterator<Item = UniqueRecord> + '_> {
        Box::new(self.uniques.iter().cloned())
    }
}

struct MemoryItem {
    details: ItemDetails,
    granted_skill: Option<String>,
}

struct MemoryGroup {
    info: SkillGroupInfo,
    /// Item that grants this group
    item: Option<ItemId>,
}

pub struct MemoryBuild {
    name: String,
    level: u32,
    tree: BTreeMap<NodeId, PassiveNode>,
    bases: Rc<Vec<BaseItemRecord>>,
    items: BTreeMap<ItemId, MemoryItem>,
    next_item_id: ItemId,
    slots: Vec<(String, ItemId)>,
    groups: Vec<MemoryGroup>,
    main_group: usize,
    config: BTreeMap<String, ConfigValue>,
    custom_mods: String,
    file_path: Option<PathBuf>,
    output: Rc<MemoryTable>,
}

impl MemoryBuild {
    fn new(name: &str, bases: Rc<Vec<BaseItemRecord>>) -> Self {
        let mut build = Self {
            name: name.to_string(),
            level: 1,
            tree: sample_tree(),
            bases,
            items: BTreeMap::new(),
            next_item_id: 1,
            slots: SLOT_NAMES.iter().map(|s| ((*s).to_string(), 0)).collect(),
            groups: Vec::new(),
            main_group: 1,
            config: BTreeMap::new(),
            custom_mods: String::new(),
            file_path: None,
            output: MemoryTable::new(),
        };
        build.output = build.compute_output();
        build
    }

    /// Value of a configuration input, if set
    pub fn config_value(&self, key: &str) -> Option<&ConfigValue> {
        self.config.get(key)
    }

    fn slot_of(&self, id: ItemId) -> Option<String> {
        self.slots
            .iter()
            .find(|(_, item)| *item == id)
            .map(|(slot, _)| slot.clone())
    }

    fn compute_output(&self) -> Rc<MemoryTable> {
        let mut stat_lines: Vec<&str> = self
            .tree
            .values()
            .filter(|n| n.alloc)
            .flat_map(|n| n.mods.iter().map(String::as_str))
            .collect();
        for (_, id) in &self.slots {
            if let Some(item) = self.items.get(id) {
                stat_lines.extend(item.details.implicit_mods.iter().map(String::as_str));
                stat_lines.extend(item.details.explicit_mods.iter().map(String::as_str));
            }
        }
        stat_lines.extend(self.custom_mods.lines());

        let life = 100.0 + 12.0 * f64::from(self.level.saturating_sub(1)) + sum_flat(&stat_lines, "to maximum Life");
        let fire = sum_flat(&stat_lines, "to Fire Resistance");

        let main = self
            .groups
            .get(self.main_group.wrapping_sub(1))
            .filter(|g| g.info.enabled);
        let dps = main.map_or(0.0, |group| {
            group
                .info
                .gems
                .iter()
                .filter(|g| g.enabled)
                .map(|g| {
                    f64::from(g.level.unwrap_or(1)) * 12.5
                        + f64::from(g.quality.unwrap_or(0)) * 0.5
                })
                .sum::<f64>()
        });

        let output = MemoryTable::new();
        output.insert("Life", life);
        output.insert("Mana", 50.0 + 4.0 * f64::from(self.level.saturating_sub(1)));
        output.insert("EnergyShield", 0.0);
        output.insert("FireResist", fire);
        output.insert("TotalDPS", dps);
        output.insert("Speed", 1.5);
        output.insert("CritChance", 5.0);
        output.insert("LifeRegen", life * 0.01);
        output.insert("Infinity", f64::INFINITY);
        output.insert("MainSkillName", match main.and_then(|g| g.info.gems.first()) {
            Some(gem) => HostValue::from(gem.name_spec.clone().unwrap_or_default()),
            None => HostValue::Nil,
        });

        let resists = MemoryTable::new();
        resists.insert("Fire", fire);
        resists.insert("Cold", 0.0);
        resists.insert("Lightning", 0.0);
        output.insert("Resists", resists);

        let skills = MemoryTable::sequence(self.groups.iter().map(|g| {
            let entry = MemoryTable::new();
            entry.insert("label", g.info.label.clone().unwrap_or_default());
            entry.insert("enabled", g.info.enabled);
            HostValue::from(entry)
        }));
        output.insert("ActiveSkills", skills);

        let breakdown = MemoryTable::new();
        breakdown.insert("parent", HostValue::Table(output.clone()));
        breakdown.insert("calculate", HostValue::Opaque(OpaqueKind::Function));
        output.insert("Breakdown", breakdown);
        output
    }

    fn group_mut(&mut self, index: usize) -> EngineResult<&mut MemoryGroup> {
        index
            .checked_sub(1)
            .and_then(|i| self.groups.get_mut(i))
            .ok_or_else(|| EngineError::Host(format!("no skill group at index {}", index)))
    }

    fn renumber_groups(&mut self) {
        let main = self.main_group;
        for (i, group) in self.groups.iter_mut().enumerate() {
            group.info.index = i + 1;
            group.info.is_main_group = i + 1 == main;
        }
    }
}

impl Build for MemoryBuild {
    fn info(&self) -> EngineResult<BuildInfo> {
        Ok(BuildInfo {
            class_name: Some("Ranger".to_string()),
            ascend_class_name: self
                .tree
                .values()
                .find(|n| n.alloc && n.ascendancy_name.is_some())
                .and_then(|n| n.ascendancy_name.clone()),
            level: Some(self.level),
            main_socket_group: Some(self.main_group as u32),
            view_mode: Some("TREE".to_string()),
            build_name: Some(self.name.clone()),
        })
    }

    fn to_xml(&self) -> EngineResult<String> {
        let info = self.info()?;
        let nodes: Vec<String> = self
            .tree
            .values()
            .filter(|n| n.alloc)
            .map(|n| n.id.to_string())
            .collect();
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<PathOfBuilding2>\n");
        xml.push_str(&format!(
            "  <Build level=\"{}\" className=\"{}\" ascendClassName=\"{}\" mainSocketGroup=\"{}\" viewMode=\"TREE\"/>\n",
            self.level,
            info.class_name.unwrap_or_default(),
            info.ascend_class_name.unwrap_or_else(|| "None".to_string()),
            self.main_group,
        ));
        xml.push_str(&format!("  <Tree><Spec nodes=\"{}\"/></Tree>\n", nodes.join(",")));
        xml.push_str("  <Items>\n");
        for (id, item) in &self.items {
            xml.push_str(&format!("    <Item id=\"{}\">{}</Item>\n", id, escape(&item.details.raw)));
        }
        xml.push_str("  </Items>\n</PathOfBuilding2>\n");
        Ok(xml)
    }

    fn recalculate(&mut self) -> EngineResult<()> {
        self.renumber_groups();
        self.output = self.compute_output();
        Ok(())
    }

    fn node(&self, id: NodeId) -> EngineResult<Option<PassiveNode>> {
        Ok(self.tree.get(&id).cloned())
    }

    fn nodes(&self) -> EngineResult<Box<dyn Iterator<Item = PassiveNode> + '_>> {
        Ok(Box::new(self.tree.values().cloned()))
    }

    fn allocated_nodes(&self) -> EngineResult<Vec<PassiveNode>> {
        Ok(self.tree.values().filter(|n| n.alloc).cloned().collect())
    }

    fn alloc_node(&mut self, id: NodeId) -> EngineResult<()> {
        let connected = self
            .tree
            .get(&id)
            .ok_or_else(|| EngineError::Host(format!("no node {}", id)))?
            .linked
            .iter()
            .any(|l| self.tree.get(l).is_some_and(|n| n.alloc));
        if !connected {
            return Err(EngineError::Host(format!(
                "node {} is not connected to the allocated tree",
                id
            )));
        }
        if let Some(node) = self.tree.get_mut(&id) {
            node.alloc = true;
        }
        Ok(())
    }

    fn dealloc_node(&mut self, id: NodeId) -> EngineResult<()> {
        if id == CLASS_START {
            return Err(EngineError::Host("the class start node cannot be deallocated".to_string()));
        }
        let node = self
            .tree
            .get_mut(&id)
            .ok_or_else(|| EngineError::Host(format!("no node {}", id)))?;
        node.alloc = false;
        Ok(())
    }

    fn items(&self) -> EngineResult<Vec<ItemSummary>> {
        Ok(self.items.values().map(|i| i.details.summary.clone()).collect())
    }

    fn item_details(&self, id: ItemId) -> EngineResult<Option<ItemDetails>> {
        Ok(self.items.get(&id).map(|item| {
            let mut details = item.details.clone();
            details.slot = self.slot_of(id);
            details
        }))
    }

    fn add_item(&mut self, raw: &str) -> EngineResult<ItemId> {
        let id = self.next_item_id;
        let item = parse_item(id, raw, &self.bases)?;
        self.next_item_id += 1;
        if let Some(skill) = &item.granted_skill {
            let index = self.groups.len() + 1;
            self.groups.push(MemoryGroup {
                info: SkillGroupInfo {
                    index,
                    label: None,
                    enabled: true,
                    slot: None,
                    source: Some(format!("Item:{}:{}", id, item.details.summary.name)),
                    main_active_skill: Some(1),
                    is_main_group: false,
                    gems: vec![GemInfo {
                        name_spec: Some(skill.clone()),
                        level: Some(20),
                        quality: Some(0),
                        enabled: true,
                        count: Some(1),
                        skill_id: Some(skill.replace(' ', "")),
                        gem_id: None,
                    }],
                },
                item: Some(id),
            });
        }
        self.items.insert(id, item);
        Ok(id)
    }

    fn delete_item(&mut self, id: ItemId) -> EngineResult<()> {
        self.items
            .remove(&id)
            .ok_or_else(|| EngineError::Host(format!("no item {}", id)))?;
        for slot in &mut self.slots {
            if slot.1 == id {
                slot.1 = 0;
            }
        }
        self.groups.retain(|g| g.item != Some(id));
        Ok(())
    }

    fn slots(&self) -> EngineResult<Vec<SlotInfo>> {
        Ok(self
            .slots
            .iter()
            .map(|(name, id)| SlotInfo {
                slot_name: name.clone(),
                item_id: *id,
                item_name: self.items.get(id).map(|i| i.details.summary.name.clone()),
            })
            .collect())
    }

    fn set_slot_item(&mut self, slot: &str, item: Option<ItemId>) -> EngineResult<()> {
        if let Some(id) = item {
            if !self.items.contains_key(&id) {
                return Err(EngineError::Host(format!("no item {}", id)));
            }
        }
        let entry = self
            .slots
            .iter_mut()
            .find(|(name, _)| name == slot)
            .ok_or_else(|| EngineError::UnknownSlot(slot.to_string()))?;
        entry.1 = item.unwrap_or(0);
        Ok(())
    }

    fn skill_groups(&self) -> EngineResult<Vec<SkillGroupInfo>> {
        Ok(self.groups.iter().map(|g| g.info.clone()).collect())
    }

    fn add_skill_group(&mut self, group: &SkillGroup) -> EngineResult<usize> {
        let index = self.groups.len() + 1;
        self.groups.push(MemoryGroup {
            info: SkillGroupInfo {
                index,
                label: Some(group.label.clone()),
                enabled: true,
                slot: group.slot.clone(),
                source: None,
                main_active_skill: Some(1),
                is_main_group: index == self.main_group,
                gems: group
                    .gems
                    .iter()
                    .map(|g| GemInfo {
                        name_spec: Some(g.name_spec.clone()),
                        level: Some(g.level),
                        quality: Some(g.quality),
                        enabled: g.enabled,
                        count: Some(g.count),
                        skill_id: Some(g.name_spec.replace(' ', "")),
                        gem_id: None,
                    })
                    .collect(),
            },
            item: None,
        });
        Ok(index)
    }

    fn remove_skill_group(&mut self, index: usize) -> EngineResult<()> {
        if self.group_mut(index)?.item.is_some() {
            return Err(EngineError::Host("item-granted groups cannot be removed".to_string()));
        }
        self.groups.remove(index - 1);
        if self.main_group > self.groups.len() {
            self.main_group = self.groups.len().max(1);
        }
        self.renumber_groups();
        Ok(())
    }

    fn set_main_skill_group(&mut self, index: usize) -> EngineResult<()> {
        self.group_mut(index)?;
        self.main_group = index;
        self.renumber_groups();
        Ok(())
    }

    fn set_config(&mut self, key: &str, value: &ConfigValue) -> EngineResult<()> {
        match value {
            ConfigValue::Clear => {
                self.config.remove(key);
            }
            other => {
                self.config.insert(key.to_string(), other.clone());
            }
        }
        Ok(())
    }

    fn set_custom_mods(&mut self, mods: &str) -> EngineResult<()> {
        self.custom_mods = mods.to_string();
        Ok(())
    }

    fn save_to_file(&mut self, path: &Path) -> EngineResult<()> {
        std::fs::write(path, self.to_xml()?)?;
        self.file_path = Some(path.to_path_buf());
        Ok(())
    }

    fn file_path(&self) -> Option<PathBuf> {
        self.file_path.clone()
    }

    fn set_file_path(&mut self, path: &Path) {
        self.file_path = Some(path.to_path_buf());
    }

    fn output(&self) -> EngineResult<HostValue> {
        Ok(HostValue::Table(self.output.clone()))
    }
}

/// Sum the leading `+N` of every line containing `suffix`
fn sum_flat(lines: &[&str], suffix: &str) -> f64 {
    lines
        .iter()
        .filter(|l| l.contains(suffix))
        .filter_map(|l| {
            let number: String = l
                .trim()
                .trim_start_matches('+')
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            number.parse::<f64>().ok()
        })
        .sum()
}

fn attribute<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(" {}=\"", name);
    let start = xml.find(&needle)? + needle.len();
    let len = xml[start..].find('"')?;
    Some(&xml[start..start + len])
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn parse_item(id: ItemId, raw: &str, bases: &[BaseItemRecord]) -> EngineResult<MemoryItem> {
    let mut lines = raw.lines().map(str::trim).filter(|l| !l.is_empty());
    let rarity = lines
        .next()
        .and_then(|l| l.strip_prefix("Rarity:"))
        .map(|r| r.trim().to_uppercase())
        .ok_or_else(|| EngineError::InvalidItem("missing 'Rarity:' header".to_string()))?;
    let name = lines
        .next()
        .ok_or_else(|| EngineError::InvalidItem("missing item name".to_string()))?
        .to_string();
    let base_name = if rarity == "RARE" || rarity == "UNIQUE" {
        lines
            .next()
            .ok_or_else(|| EngineError::InvalidItem("missing base type".to_string()))?
            .to_string()
    } else {
        name.clone()
    };
    let base = bases
        .iter()
        .find(|b| b.name == base_name)
        .ok_or_else(|| EngineError::InvalidItem(format!("unknown base type '{}'", base_name)))?;

    let mut details = ItemDetails {
        summary: ItemSummary {
            id,
            name,
            base_name: Some(base_name.clone()),
            item_type: Some(base.item_type.clone()),
            rarity: Some(rarity),
        },
        raw: raw.to_string(),
        ..Default::default()
    };
    let mut granted_skill = None;
    for line in lines {
        if line.starts_with("---") {
            continue;
        }
        if let Some(q) = line.strip_prefix("Quality:") {
            details.quality = q.trim().trim_start_matches('+').trim_end_matches('%').parse().ok();
        } else if let Some(l) = line.strip_prefix("Item Level:") {
            details.item_level = l.trim().parse().ok();
        } else if line == "Corrupted" {
            details.corrupted = true;
        } else if let Some(m) = line.strip_suffix("(implicit)") {
            details.implicit_mods.push(m.trim().to_string());
        } else if let Some(m) = line.strip_suffix("(enchant)") {
            details.enchant_mods.push(m.trim().to_string());
        } else if let Some(m) = line.strip_suffix("(rune)") {
            details.rune_mods.push(m.trim().to_string());
        } else {
            if let Some(skill) = line.strip_prefix("Grants Skill:") {
                granted_skill = Some(skill.trim().to_string());
            }
            details.explicit_mods.push(line.to_string());
        }
    }
    Ok(MemoryItem {
        details,
        granted_skill,
    })
}

fn node(id: NodeId, name: &str, node_type: &str, mods: &[&str], linked: &[NodeId]) -> PassiveNode {
    PassiveNode {
        id,
        name: Some(name.to_string()),
        node_type: Some(node_type.to_string()),
        mods: mods.iter().map(|m| (*m).to_string()).collect(),
        linked: linked.to_vec(),
        ..Default::default()
    }
}

fn sample_tree() -> BTreeMap<NodeId, PassiveNode> {
    let mut start = node(CLASS_START, "Ranger", "ClassStart", &[], &[2]);
    start.alloc = true;
    start.class_start_index = Some(2);
    let mut ascendancy = node(5, "Pathfinder", "AscendClassStart", &["+20 to maximum Life"], &[]);
    ascendancy.ascendancy_name = Some("Pathfinder".to_string());
    let mut choice = node(4, "Herbalism", "Notable", &["+30 to maximum Life"], &[3]);
    choice.is_multiple_choice = true;
    choice.passive_points_granted = 1;

    [
        start,
        node(2, "Life", "Normal", &["+10 to maximum Life"], &[1, 3]),
        node(3, "Quick Shot", "Notable", &["10% increased Attack Speed"], &[2, 4]),
        choice,
        ascendancy,
    ]
    .into_iter()
    .map(|n| (n.id, n))
    .collect()
}

fn sample_mod(id: &str, category: &str, affix: &str, level: u32, group: &str, line: &str, weights: &[(&str, f64)]) -> ModRecord {
    ModRecord {
        id: id.to_string(),
        category: category.to_string(),
        affix_type: Some(affix.to_string()),
        affix: Some(id.trim_end_matches(char::is_numeric).to_string()),
        level: Some(level),
        group: Some(group.to_string()),
        lines: vec![line.to_string()],
        weight_keys: weights.iter().map(|(k, _)| (*k).to_string()).collect(),
        weight_values: weights.iter().map(|(_, v)| *v).collect(),
    }
}

fn sample_mods() -> BTreeMap<String, Vec<ModRecord>> {
    let item = vec![
        sample_mod("IncreasedLife2", "Item", "Prefix", 11, "IncreasedLife", "+(20-29) to maximum Life", &[("ring", 0.0), ("default", 1000.0)]),
        sample_mod("IncreasedLife1", "Item", "Prefix", 1, "IncreasedLife", "+(10-19) to maximum Life", &[("ring", 0.0), ("default", 1000.0)]),
        sample_mod("FireResist1", "Item", "Suffix", 1, "FireResistance", "+(6-11)% to Fire Resistance", &[("default", 1000.0)]),
        sample_mod("LocalPhysicalDamage1", "Item", "Prefix", 2, "LocalPhysicalDamagePercent", "(40-49)% increased Physical Damage", &[("weapon", 1000.0), ("default", 0.0)]),
    ];
    let flask = vec![sample_mod("FlaskChargesUsed1", "Flask", "Prefix", 1, "FlaskChargesUsed", "(20-25)% reduced Charges per use", &[("flask", 1000.0)])];
    BTreeMap::from([("Item".to_string(), item), ("Flask".to_string(), flask)])
}

fn sample_base(name: &str, item_type: &str, level: u32, tags: &[&str], implicit: Option<&str>) -> BaseItemRecord {
    BaseItemRecord {
        name: name.to_string(),
        item_type: item_type.to_string(),
        sub_type: None,
        level_requirement: Some(level),
        tags: tags.iter().map(|t| (*t).to_string()).collect(),
        implicit: implicit.map(str::to_string),
    }
}

fn sample_bases() -> Vec<BaseItemRecord> {
    vec![
        sample_base("Iron Hat", "Helmet", 1, &["helmet", "str_armour", "default"], None),
        sample_base("Wrapped Greathelm", "Helmet", 33, &["helmet", "str_armour", "default"], None),
        sample_base("Plate Vest", "Body Armour", 1, &["body_armour", "str_armour", "default"], None),
        sample_base("Rusted Sword", "One Hand Sword", 1, &["sword", "weapon", "one_hand_weapon", "default"], Some("+20% to Accuracy Rating")),
        sample_base("Iron Ring", "Ring", 1, &["ring", "default"], Some("Adds 1 to 4 Physical Damage to Attacks")),
    ]
}

fn sample_uniques() -> Vec<UniqueRecord> {
    let raw = "Black Sun Crest\nWrapped Greathelm\nLevel: 33\n(20-30)% increased Armour\n+(20-30) to maximum Life";
    vec![UniqueRecord {
        name: "Black Sun Crest".to_string(),
        base_name: Some("Wrapped Greathelm".to_string()),
        item_type: "Helmet".to_string(),
        raw: raw.to_string(),
    }]
}

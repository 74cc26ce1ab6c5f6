//! Records exchanged between the bridge and an engine.
//!
//! Engines fill these from their own structures; the bridge returns them to
//! callers as-is, so field names follow the wire convention (camelCase).

use serde::Serialize;

/// Passive tree node identifier
pub type NodeId = u32;

/// Item identifier within a build; `0` is never a valid item
pub type ItemId = u32;

/// Summary of the current build
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub class_name: Option<String>,
    pub ascend_class_name: Option<String>,
    pub level: Option<u32>,
    pub main_socket_group: Option<u32>,
    pub view_mode: Option<String>,
    pub build_name: Option<String>,
}

/// Full view of a passive tree node
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassiveNode {
    pub id: NodeId,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub alloc: bool,
    pub ascendancy_name: Option<String>,
    pub mods: Vec<String>,
    pub linked: Vec<NodeId>,
    pub class_start_index: Option<u32>,
    pub is_multiple_choice: bool,
    pub is_multiple_choice_option: bool,
    pub passive_points_granted: u32,
}

/// Compact node view used by list and search results
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub id: NodeId,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub alloc: bool,
    pub ascendancy_name: Option<String>,
}

impl From<&PassiveNode> for NodeSummary {
    fn from(node: &PassiveNode) -> Self {
        Self {
            id: node.id,
            name: node.name.clone(),
            node_type: node.node_type.clone(),
            alloc: node.alloc,
            ascendancy_name: node.ascendancy_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: ItemId,
    pub name: String,
    pub base_name: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub rarity: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetails {
    #[serde(flatten)]
    pub summary: ItemSummary,
    pub raw: String,
    pub quality: Option<u32>,
    pub item_level: Option<u32>,
    pub corrupted: bool,
    pub implicit_mods: Vec<String>,
    pub explicit_mods: Vec<String>,
    pub enchant_mods: Vec<String>,
    pub rune_mods: Vec<String>,
    /// Slot the item is currently equipped in
    pub slot: Option<String>,
}

/// Equipment slot and its selection; `item_id` is `0` when empty
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlotInfo {
    pub slot_name: String,
    pub item_id: ItemId,
    pub item_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GemInfo {
    pub name_spec: Option<String>,
    pub level: Option<u32>,
    pub quality: Option<u32>,
    pub enabled: bool,
    pub count: Option<u32>,
    pub skill_id: Option<String>,
    pub gem_id: Option<String>,
}

/// Skill group as reported by the engine; `index` is 1-based
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkillGroupInfo {
    pub index: usize,
    pub label: Option<String>,
    pub enabled: bool,
    pub slot: Option<String>,
    /// Set when the group is granted by an item
    pub source: Option<String>,
    pub main_active_skill: Option<u32>,
    pub is_main_group: bool,
    pub gems: Vec<GemInfo>,
}

/// One gem of a skill group to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GemSpec {
    pub name_spec: String,
    pub level: u32,
    pub quality: u32,
    pub enabled: bool,
    pub count: u32,
}

/// A skill group to insert; never empty once validated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillGroup {
    pub label: String,
    pub slot: Option<String>,
    pub gems: Vec<GemSpec>,
}

/// Value written to a configuration input
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Boolean(bool),
    Number(f64),
    String(String),
    /// Remove the input
    Clear,
}

/// Entry of an item modifier catalog
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModRecord {
    pub id: String,
    pub category: String,
    pub affix_type: Option<String>,
    pub affix: Option<String>,
    pub level: Option<u32>,
    pub group: Option<String>,
    pub lines: Vec<String>,
    pub weight_keys: Vec<String>,
    pub weight_values: Vec<f64>,
}

impl ModRecord {
    /// Modifier display text
    pub fn text(&self) -> String {
        self.lines.join(" / ")
    }

    /// Whether this modifier can roll on an item carrying `tags`.
    ///
    /// The first weight key present in `tags` (or `default`) decides.
    pub fn applies_to(&self, tags: &[String]) -> bool {
        self.weight_keys
            .iter()
            .zip(&self.weight_values)
            .find(|(key, _)| *key == "default" || tags.iter().any(|t| t == *key))
            .is_some_and(|(_, weight)| *weight > 0.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaseItemRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub sub_type: Option<String>,
    pub level_requirement: Option<u32>,
    pub tags: Vec<String>,
    pub implicit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UniqueRecord {
    pub name: String,
    pub base_name: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
    pub raw: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn life_mod(keys: &[&str], values: &[f64]) -> ModRecord {
        ModRecord {
            id: "IncreasedLife1".to_string(),
            category: "Item".to_string(),
            lines: vec!["+(10-19) to maximum Life".to_string()],
            weight_keys: keys.iter().map(|k| (*k).to_string()).collect(),
            weight_values: values.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_applies_to_first_matching_key_wins() {
        let tags = vec!["helmet".to_string(), "armour".to_string()];
        let m = life_mod(&["helmet", "default"], &[0.0, 1000.0]);
        assert!(!m.applies_to(&tags));

        let m = life_mod(&["ring", "default"], &[0.0, 1000.0]);
        assert!(m.applies_to(&tags));

        let m = life_mod(&["ring"], &[1000.0]);
        assert!(!m.applies_to(&tags));
    }

    #[test]
    fn test_item_details_serializes_flat() {
        let details = ItemDetails {
            summary: ItemSummary {
                id: 3,
                name: "Dread Crown".to_string(),
                base_name: Some("Iron Hat".to_string()),
                item_type: Some("Helmet".to_string()),
                rarity: Some("RARE".to_string()),
            },
            raw: "Rarity: RARE".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&details).unwrap_or_default();
        assert_eq!(json["id"], 3);
        assert_eq!(json["baseName"], "Iron Hat");
        assert_eq!(json["type"], "Helmet");
        assert_eq!(json["implicitMods"], serde_json::json!([]));
    }
}

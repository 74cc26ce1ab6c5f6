//! Command name to handler mapping

use std::collections::HashMap;

use pob_engine::Engine;
use serde_json::Value;

use crate::commands;
use crate::errors::CommandError;
use crate::params::Params;
use crate::session::BridgeState;

/// A command implementation
pub type Handler<E> = fn(&mut BridgeState<E>, &Params) -> Result<Value, CommandError>;

pub struct CommandRegistry<E: Engine> {
    handlers: HashMap<&'static str, Handler<E>>,
}

impl<E: Engine> Default for CommandRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine> CommandRegistry<E> {
    /// Registry holding every bridge command
    pub fn new() -> Self {
        let mut registry = Self::empty();
        commands::register_all(&mut registry);
        registry
    }

    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, handler: Handler<E>) {
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<Handler<E>> {
        self.handlers.get(name).copied()
    }

    /// Registered command names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pob_engine::memory::MemoryEngine;

    #[test]
    fn test_every_command_is_registered() {
        let registry = CommandRegistry::<MemoryEngine>::new();
        let expected = [
            "ping", "new_build", "load_build_xml", "get_build_info", "get_build_xml", "shutdown",
            "alloc_node", "dealloc_node", "list_alloc_nodes", "search_nodes", "get_node_info",
            "list_items", "list_slots", "get_item_details", "add_item", "equip_item",
            "unequip_slot", "delete_item", "list_skills", "add_skill", "remove_skill",
            "set_main_skill", "get_output", "get_full_output", "get_stat", "get_stats_list",
            "search_modifiers", "get_modifier_tiers", "get_modifiers_for_item_type",
            "get_modifier_types", "search_base_items", "get_base_item_types",
            "get_base_item_details", "search_unique_items", "get_unique_item_details",
            "set_config", "set_custom_mods", "get_builds_path", "list_builds", "load_build_file",
            "save_build", "save_build_as", "delete_build_file", "create_folder",
            "rename_build_file",
        ];
        for name in expected {
            assert!(registry.get(name).is_some(), "{} is not registered", name);
        }
        assert_eq!(registry.names().len(), expected.len());
        assert!(registry.get("Ping").is_none());
    }
}

use std::path::{Path, PathBuf};

use crate::errors::{EngineError, EngineResult};
use crate::host::HostValue;
use crate::types::{
    BaseItemRecord, BuildInfo, ConfigValue, ItemDetails, ItemId, ItemSummary, ModRecord, NodeId,
    PassiveNode, SkillGroup, SkillGroupInfo, SlotInfo, UniqueRecord,
};

/// Process-wide calculation runtime.
///
/// An engine is created once at startup, reports whether its bootstrap
/// succeeded, and creates the builds the session works on. Its catalogs are
/// read-only.
pub trait Engine {
    type Build: Build;

    /// Fatal message raised while the engine bootstrapped, if any
    fn startup_message(&self) -> Option<String>;

    /// Create an empty build, replacing whatever build the engine held
    fn new_build(&mut self) -> EngineResult<Self::Build>;

    /// Create a build from exported XML text
    fn load_build_xml(&mut self, xml: &str, name: &str) -> EngineResult<Self::Build>;

    /// Load a build file and remember its path for later saves
    fn load_build_file(&mut self, path: &Path) -> EngineResult<Self::Build> {
        let xml = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| EngineError::InvalidBuild(format!("bad file name: {}", path.display())))?
            .to_string();
        let mut build = self.load_build_xml(&xml, &name)?;
        build.set_file_path(path);
        Ok(build)
    }

    /// Names of the item modifier catalogs
    fn mod_categories(&self) -> Vec<String>;

    /// Modifiers of one catalog; fails for unknown categories
    fn item_mods(&self, category: &str)
        -> EngineResult<Box<dyn Iterator<Item = ModRecord> + '_>>;

    fn item_bases(&self) -> Box<dyn Iterator<Item = BaseItemRecord> + '_>;

    fn uniques(&self) -> Box<dyn Iterator<Item = UniqueRecord> + '_>;
}

/// The character state the session mutates.
///
/// Mutations do not recalculate on their own; callers invoke
/// [`Build::recalculate`] once they are done.
pub trait Build {
    fn info(&self) -> EngineResult<BuildInfo>;

    /// Export the build in the engine's XML format
    fn to_xml(&self) -> EngineResult<String>;

    fn recalculate(&mut self) -> EngineResult<()>;

    fn node(&self, id: NodeId) -> EngineResult<Option<PassiveNode>>;

    /// Every node of the passive tree
    fn nodes(&self) -> EngineResult<Box<dyn Iterator<Item = PassiveNode> + '_>>;

    fn allocated_nodes(&self) -> EngineResult<Vec<PassiveNode>>;

    fn alloc_node(&mut self, id: NodeId) -> EngineResult<()>;

    fn dealloc_node(&mut self, id: NodeId) -> EngineResult<()>;

    fn items(&self) -> EngineResult<Vec<ItemSummary>>;

    fn item_details(&self, id: ItemId) -> EngineResult<Option<ItemDetails>>;

    /// Parse raw item text and add it to the build
    fn add_item(&mut self, raw: &str) -> EngineResult<ItemId>;

    fn delete_item(&mut self, id: ItemId) -> EngineResult<()>;

    fn slots(&self) -> EngineResult<Vec<SlotInfo>>;

    /// Select `item` in `slot`, or clear the slot with `None`
    fn set_slot_item(&mut self, slot: &str, item: Option<ItemId>) -> EngineResult<()>;

    fn skill_groups(&self) -> EngineResult<Vec<SkillGroupInfo>>;

    /// Append a group and return its 1-based index
    fn add_skill_group(&mut self, group: &SkillGroup) -> EngineResult<usize>;

    fn remove_skill_group(&mut self, index: usize) -> EngineResult<()>;

    fn set_main_skill_group(&mut self, index: usize) -> EngineResult<()>;

    fn set_config(&mut self, key: &str, value: &ConfigValue) -> EngineResult<()>;

    fn set_custom_mods(&mut self, mods: &str) -> EngineResult<()>;

    /// Write the build to `path` and make it the build's file path
    fn save_to_file(&mut self, path: &Path) -> EngineResult<()>;

    fn file_path(&self) -> Option<PathBuf>;

    fn set_file_path(&mut self, path: &Path);

    /// Calculated output mapping, owned by the engine
    fn output(&self) -> EngineResult<HostValue>;
}

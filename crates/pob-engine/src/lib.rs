//! Calculation engine interface for pob-bridge
//!
//! The bridge never computes anything itself. Every build mutation and
//! every derived number comes from an engine reached through the [`Engine`]
//! and [`Build`] traits defined here:
//!
//! - [`Engine`] owns the process-wide runtime and read-only catalogs and
//!   creates builds.
//! - [`Build`] is the single mutable character state the session holds.
//! - [`HostValue`] is the capability-typed view of engine-owned data that
//!   the bridge serializes without knowing its shape.
//!
//! With the `memory` feature, [`memory::MemoryEngine`] provides a small,
//! deterministic implementation used by the bridge's tests.

pub mod engine;
pub mod errors;
pub mod host;
pub mod types;

#[cfg(feature = "memory")]
pub mod memory;

pub use engine::{Build, Engine};
pub use errors::{EngineError, EngineResult};
pub use host::{HostKey, HostTable, HostValue, MemoryTable, OpaqueKind};
pub use types::{
    BaseItemRecord, BuildInfo, ConfigValue, GemInfo, GemSpec, ItemDetails, ItemId, ItemSummary,
    ModRecord, NodeId, NodeSummary, PassiveNode, SkillGroup, SkillGroupInfo, SlotInfo,
    UniqueRecord,
};

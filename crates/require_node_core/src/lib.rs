//! RequireNode Core
//!
//! Декларативная инъекция companion nodes в живое дерево сцены редактора.
//! Host-agnostic: всё общение с редактором идёт через traits из `host`.
//!
//! Flow:
//! 1. selection changed → `Supervisor` подписывается на сигналы узла
//! 2. definition changed → `resolver::resolve` (маркеры / compiled metadata)
//! 3. каждый companion → `mutator::place` (child или ancestor)
//!
//! HYBRID ARCHITECTURE:
//! - ядро = parser, resolver, mutator, supervisor (тестируется на `HeadlessEditor`)
//! - require_node_godot = EditorPlugin + реализация host traits поверх gdext

pub mod config;
pub mod error;
pub mod headless;
pub mod host;
pub mod logger;
pub mod marker;
pub mod mutator;
pub mod requirement;
pub mod resolver;
pub mod supervisor;

// Re-export для удобства
pub use config::{MarkerGrammar, RequireNodeConfig};
pub use error::{ConfigError, PlacementError, ResolveError};
pub use headless::{HeadlessEditor, NodeId, TemplateNode};
pub use host::{EditorHost, EditorSignals, GlobalClass, NodeFactory, NodeSignal, SceneTree, SessionSignal};
pub use logger::{
    clear_logger, init_logger, log, log_error, log_info, log_warning, set_log_level, set_logger, LogLevel,
    LogPrinter, MemoryLogger,
};
pub use marker::parse_markers;
pub use mutator::{attach_ancestor, attach_child, place};
pub use requirement::{Definition, Placement, RequireNodes, Requirement, RequirementRegistry, RequirementTarget};
pub use resolver::{resolve, Companion, Resolution};
pub use supervisor::{EditorEvent, PipelineReport, SessionState, Supervisor};

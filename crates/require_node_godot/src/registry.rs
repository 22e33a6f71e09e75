//! Глобальный реестр compiled requirements
//!
//! Rust extension classes (и скрипты, объявленные через `register_requirement`)
//! регистрируют свои requirements здесь, без reflection.
//!
//! ```ignore
//! impl RequireNodes for MovementController {
//!     const CLASS_NAME: &'static str = "MovementController";
//!
//!     fn requirements() -> Vec<Requirement> {
//!         vec![Requirement::template("res://player.tscn", Placement::AsAncestor)]
//!     }
//! }
//!
//! require_node_godot::registry::register_class::<MovementController>();
//! ```
//!
//! Ограничение: у extension class нет скрипта, `script_changed` для него не
//! приходит. Requirements применяются, когда узел входит в tracked parent
//! (`child_entered_tree`), а не при выделении уже лежащего в сцене узла.

use once_cell::sync::Lazy;
use require_node_core::{Definition, RequireNodes, Requirement, RequirementRegistry};
use std::sync::{Mutex, MutexGuard};

static REGISTRY: Lazy<Mutex<RequirementRegistry>> = Lazy::new(|| Mutex::new(RequirementRegistry::new()));

fn registry() -> MutexGuard<'static, RequirementRegistry> {
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn register_class<T: RequireNodes>() {
    registry().register::<T>();
}

pub fn register_requirement(class_name: &str, requirement: Requirement) {
    registry().push(class_name, requirement);
}

pub fn unregister_class(class_name: &str) -> bool {
    registry().unregister(class_name)
}

pub fn definition_for(class_name: &str) -> Option<Definition> {
    registry().definition_for(class_name)
}

//! GodotEditorHost — реализация host traits ядра поверх gdext
//!
//! Архитектура:
//! - Node handle = `InstanceId` (не `Gd<Node>`): освобождённый узел просто
//!   перестаёт резолвиться, таблица supervisor'а не держит объекты живыми
//! - Сигналы узлов подключаются к `#[func]` методам `RequireNodePlugin`,
//!   instance id узла передаётся через bound аргумент
//!
//! КРИТИЧНО:
//! - Main thread only (Godot API)
//! - tree_exiting / child_entered_tree / selection_changed подключаются DEFERRED:
//!   они срабатывают внутри наших же add_child/reparent, пока plugin под bind_mut

use godot::classes::object::ConnectFlags;
use godot::classes::{
    ClassDb, EditorInterface, EditorPlugin, Engine, GDScript, Node, Object, PackedScene, ProjectSettings,
    ResourceLoader, Script,
};
use godot::obj::EngineEnum;
use godot::prelude::*;
use require_node_core::{
    log_error, Definition, EditorSignals, GlobalClass, NodeFactory, NodeSignal, SceneTree, SessionSignal,
};
use std::collections::HashSet;
use std::path::Path;

use crate::registry;

/// Подключённый сигнал: источник + имя + callable (для disconnect)
#[derive(Debug)]
pub struct GodotConnection {
    source: InstanceId,
    signal: &'static str,
    callable: Callable,
}

pub struct GodotEditorHost {
    /// Получатель всех callbacks
    plugin: Gd<EditorPlugin>,
    /// Наследники Node из ClassDB (снимок на enter_tree)
    node_classes: HashSet<String>,
}

impl GodotEditorHost {
    pub fn new(plugin: Gd<EditorPlugin>) -> Self {
        let node_classes = ClassDb::singleton()
            .get_inheriters_from_class("Node")
            .as_slice()
            .iter()
            .map(|class| class.to_string())
            .collect();

        Self { plugin, node_classes }
    }

    pub fn is_editor() -> bool {
        Engine::singleton().is_editor_hint()
    }

    fn node(&self, id: &InstanceId) -> Option<Gd<Node>> {
        Gd::<Node>::try_from_instance_id(*id).ok()
    }

    fn connect(
        &self,
        mut source: Gd<Object>,
        signal: &'static str,
        callable: Callable,
        deferred: bool,
    ) -> GodotConnection {
        // После reload старое подключение могло остаться — переиспользуем
        if !source.is_connected(signal, &callable) {
            if deferred {
                source
                    .connect_ex(signal, &callable)
                    .flags(ConnectFlags::DEFERRED.ord() as u32)
                    .done();
            } else {
                source.connect(signal, &callable);
            }
        }

        GodotConnection {
            source: source.instance_id(),
            signal,
            callable,
        }
    }

    fn disconnect(&self, connection: GodotConnection) {
        let Ok(mut source) = Gd::<Object>::try_from_instance_id(connection.source) else {
            return;
        };
        if source.is_connected(connection.signal, &connection.callable) {
            source.disconnect(connection.signal, &connection.callable);
        }
    }

    /// Compiled definition: global class name скрипта, затем имя файла
    /// (C#: класс совпадает с именем файла)
    fn compiled_definition(script: &Gd<Script>) -> Option<Definition> {
        let global_name = script.get_global_name().to_string();
        if !global_name.is_empty() {
            if let Some(definition) = registry::definition_for(&global_name) {
                return Some(definition);
            }
        }

        let path = script.get_path().to_string();
        let stem = Path::new(&path).file_stem()?.to_str()?;
        registry::definition_for(stem)
    }
}

impl SceneTree for GodotEditorHost {
    type Node = InstanceId;

    fn is_valid(&self, node: &InstanceId) -> bool {
        self.node(node).is_some()
    }

    fn name(&self, node: &InstanceId) -> Option<String> {
        self.node(node).map(|node| node.get_name().to_string())
    }

    fn set_name(&mut self, node: &InstanceId, name: &str) {
        if let Some(mut node) = self.node(node) {
            node.set_name(name);
        }
    }

    fn parent(&self, node: &InstanceId) -> Option<InstanceId> {
        self.node(node)?.get_parent().map(|parent| parent.instance_id())
    }

    fn is_inside_tree(&self, node: &InstanceId) -> bool {
        self.node(node).is_some_and(|node| node.is_inside_tree())
    }

    fn add_child(&mut self, parent: &InstanceId, child: &InstanceId) {
        let (Some(mut parent), Some(child)) = (self.node(parent), self.node(child)) else {
            return;
        };
        parent.add_child(&child);
    }

    fn reparent(&mut self, node: &InstanceId, new_parent: &InstanceId) {
        let (Some(mut node), Some(new_parent)) = (self.node(node), self.node(new_parent)) else {
            return;
        };
        node.reparent(&new_parent);
    }

    fn owner(&self, node: &InstanceId) -> Option<InstanceId> {
        self.node(node)?.get_owner().map(|owner| owner.instance_id())
    }

    fn set_owner(&mut self, node: &InstanceId, owner: &InstanceId) {
        let (Some(mut node), Some(owner)) = (self.node(node), self.node(owner)) else {
            return;
        };
        node.set_owner(&owner);
    }

    fn edited_scene_root(&self) -> Option<InstanceId> {
        EditorInterface::singleton()
            .get_edited_scene_root()
            .map(|root| root.instance_id())
    }

    fn scene_file_path(&self, node: &InstanceId) -> Option<String> {
        let path = self.node(node)?.get_scene_file_path().to_string();
        (!path.is_empty()).then_some(path)
    }

    fn definition(&self, node: &InstanceId) -> Option<Definition> {
        let node = self.node(node)?;

        if let Ok(script) = node.get_script().try_to::<Gd<Script>>() {
            return match script.clone().try_cast::<GDScript>() {
                Ok(gdscript) => Some(Definition::Interpreted {
                    path: gdscript.get_path().to_string(),
                    source: gdscript.get_source_code().to_string(),
                }),
                Err(script) => Self::compiled_definition(&script),
            };
        }

        // Узел без скрипта: Rust extension class
        registry::definition_for(&node.get_class().to_string())
    }

    fn selected_nodes(&self) -> Vec<InstanceId> {
        let Some(mut selection) = EditorInterface::singleton().get_selection() else {
            return Vec::new();
        };
        selection
            .get_selected_nodes()
            .iter_shared()
            .map(|node| node.instance_id())
            .collect()
    }

    fn discard(&mut self, node: &InstanceId) {
        if let Some(mut node) = self.node(node) {
            node.queue_free();
        }
    }
}

impl NodeFactory for GodotEditorHost {
    fn is_node_class(&self, class: &str) -> bool {
        self.node_classes.contains(class)
    }

    fn instantiate_class(&mut self, class: &str) -> Option<InstanceId> {
        let mut class_db = ClassDb::singleton();
        if !(class == "Node" || self.is_node_class(class)) || !class_db.can_instantiate(class) {
            return None;
        }

        class_db
            .instantiate(class)
            .try_to::<Gd<Node>>()
            .ok()
            .map(|node| node.instance_id())
    }

    fn global_classes(&self) -> Vec<GlobalClass> {
        let field = |info: &Dictionary, key: &str| info.get(key).map(|value| value.to_string()).unwrap_or_default();

        ProjectSettings::singleton()
            .get_global_class_list()
            .iter_shared()
            .map(|info| GlobalClass {
                name: field(&info, "class"),
                base: field(&info, "base"),
                language: field(&info, "language"),
                path: field(&info, "path"),
            })
            .collect()
    }

    fn instantiate_script(&mut self, path: &str) -> Option<InstanceId> {
        let script = ResourceLoader::singleton()
            .load(path)
            .and_then(|resource| resource.try_cast::<GDScript>().ok())?;

        let base = script.get_instance_base_type();
        let mut node = ClassDb::singleton().instantiate(&base).try_to::<Gd<Node>>().ok()?;
        node.set_script(&script.to_variant());
        Some(node.instance_id())
    }

    fn instantiate_template(&mut self, path: &str) -> Option<InstanceId> {
        let scene = load_packed_scene(path)?;
        scene.instantiate().map(|node| node.instance_id())
    }
}

impl EditorSignals for GodotEditorHost {
    type Connection = GodotConnection;

    fn connect_session(&mut self, signal: SessionSignal) -> Option<GodotConnection> {
        let plugin = self.plugin.clone();
        let connection = match signal {
            SessionSignal::SelectionChanged => {
                let selection = EditorInterface::singleton().get_selection()?;
                self.connect(
                    selection.upcast(),
                    "selection_changed",
                    plugin.callable("on_selection_changed"),
                    true,
                )
            }
            SessionSignal::SceneChanged => self.connect(
                plugin.clone().upcast(),
                "scene_changed",
                plugin.callable("on_scene_changed"),
                false,
            ),
            SessionSignal::SceneClosed => self.connect(
                plugin.clone().upcast(),
                "scene_closed",
                plugin.callable("on_scene_closed"),
                false,
            ),
        };
        Some(connection)
    }

    fn disconnect_session(&mut self, connection: GodotConnection) {
        self.disconnect(connection);
    }

    fn connect_node(&mut self, node: &InstanceId, signal: NodeSignal) -> Option<GodotConnection> {
        let source = self.node(node)?.upcast::<Object>();
        let bound_id = varray![node.to_i64()];

        let connection = match signal {
            NodeSignal::DefinitionChanged => self.connect(
                source,
                "script_changed",
                self.plugin.callable("on_script_changed").bindv(&bound_id),
                false,
            ),
            NodeSignal::TreeExiting => self.connect(
                source,
                "tree_exiting",
                self.plugin.callable("on_tree_exiting").bindv(&bound_id),
                true,
            ),
            NodeSignal::ChildAdded => self.connect(
                source,
                "child_entered_tree",
                self.plugin.callable("on_child_entered_tree"),
                true,
            ),
        };
        Some(connection)
    }

    fn disconnect_node(&mut self, _node: &InstanceId, connection: GodotConnection) {
        self.disconnect(connection);
    }
}

/// Load PackedScene from Godot resource path
fn load_packed_scene(path: &str) -> Option<Gd<PackedScene>> {
    let mut resource_loader = ResourceLoader::singleton();

    match resource_loader.load(path) {
        Some(resource) => resource.try_cast::<PackedScene>().ok(),
        None => {
            log_error(&format!("load_packed_scene: failed to load '{}'", path));
            None
        }
    }
}

//! HeadlessEditor — in-memory редактор для тестов и CLI
//!
//! Повторяет поведение Godot, важное для плагина:
//! - имена siblings уникальны (конфликт → суффикс `2`, `3`, ...)
//! - шаблоны инстанцируются независимыми копиями, root помнит scene file path
//! - сигналы доставляются отложенно через очередь событий (`pump`)
//! - connections освобождённого узла исчезают вместе с ним

use crate::host::{EditorSignals, GlobalClass, NodeFactory, NodeSignal, SceneTree, SessionSignal};
use crate::requirement::Definition;
use crate::supervisor::{EditorEvent, PipelineReport, Supervisor};
use std::collections::{HashMap, VecDeque};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// Built-in node classes по умолчанию
pub const DEFAULT_NODE_CLASSES: &[&str] = &[
    "Node",
    "Node2D",
    "Node3D",
    "Sprite2D",
    "CharacterBody2D",
    "CollisionShape2D",
    "Area2D",
    "AnimationPlayer",
    "Camera2D",
    "Timer",
];

/// Описание шаблона сцены (аналог PackedScene)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNode {
    pub name: String,
    pub class: String,
    pub definition: Option<Definition>,
    pub children: Vec<TemplateNode>,
}

impl TemplateNode {
    pub fn new(name: &str, class: &str) -> Self {
        Self {
            name: name.to_string(),
            class: class.to_string(),
            definition: None,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: TemplateNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_definition(mut self, definition: Definition) -> Self {
        self.definition = Some(definition);
        self
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    class: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    owner: Option<NodeId>,
    scene_file_path: Option<String>,
    definition: Option<Definition>,
    alive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionTarget {
    Session(SessionSignal),
    Node(NodeId, NodeSignal),
}

#[derive(Debug, Clone)]
struct ScriptData {
    base: String,
    definition: Option<Definition>,
}

#[derive(Debug, Default)]
pub struct HeadlessEditor {
    nodes: Vec<NodeData>,
    classes: HashMap<String, bool>,
    global_classes: Vec<GlobalClass>,
    scripts: HashMap<String, ScriptData>,
    templates: HashMap<String, TemplateNode>,
    edited_root: Option<NodeId>,
    selection: Vec<NodeId>,
    connections: HashMap<ConnectionId, ConnectionTarget>,
    next_connection: u64,
    events: VecDeque<EditorEvent<NodeId>>,
    mutations: usize,
    /// Вставка портит имена child'а и (не root) parent'а, как это бывает в Godot
    rename_on_insert: bool,
}

impl HeadlessEditor {
    pub fn new() -> Self {
        let mut editor = Self::default();
        for class in DEFAULT_NODE_CLASSES {
            editor.register_class(class, true);
        }
        editor
    }

    // === Registry setup ===

    pub fn register_class(&mut self, class: &str, is_node: bool) {
        self.classes.insert(class.to_string(), is_node);
    }

    pub fn register_script(&mut self, path: &str, base: &str, definition: Option<Definition>) {
        self.scripts.insert(
            path.to_string(),
            ScriptData {
                base: base.to_string(),
                definition,
            },
        );
    }

    /// Global class + его скрипт по `path`
    pub fn register_global_class(
        &mut self,
        name: &str,
        base: &str,
        language: &str,
        path: &str,
        definition: Option<Definition>,
    ) {
        self.global_classes.push(GlobalClass {
            name: name.to_string(),
            base: base.to_string(),
            language: language.to_string(),
            path: path.to_string(),
        });
        self.register_script(path, base, definition);
    }

    pub fn register_template(&mut self, path: &str, template: TemplateNode) {
        self.templates.insert(path.to_string(), template);
    }

    /// Включает побочный эффект хоста: add_child переименовывает вставленный узел
    /// и его parent'а (кроме scene root) в `@Class@id`, reparent — только сам узел
    pub fn set_rename_on_insert(&mut self, enabled: bool) {
        self.rename_on_insert = enabled;
    }

    // === Editor actions (то, что делает пользователь) ===

    /// Открывает новую сцену; root помнит путь своего файла
    pub fn open_scene(&mut self, root_name: &str, class: &str, path: &str) -> NodeId {
        if self.edited_root.is_some() {
            self.free_scene();
        }

        let root = self.alloc(root_name, class, None);
        self.data_mut(root).scene_file_path = Some(path.to_string());
        self.edited_root = Some(root);
        self.emit_session(SessionSignal::SceneChanged, EditorEvent::SceneChanged);
        root
    }

    pub fn close_scene(&mut self) {
        if self.edited_root.is_none() {
            return;
        }
        self.free_scene();
        self.emit_session(SessionSignal::SceneClosed, EditorEvent::SceneClosed);
    }

    /// Добавляет обычный узел в редактируемую сцену
    pub fn add_node(&mut self, parent: NodeId, name: &str, class: &str) -> NodeId {
        let node = self.alloc(name, class, None);
        self.add_child(&parent, &node);
        if let Some(root) = self.edited_root {
            self.data_mut(node).owner = Some(root);
        }
        node
    }

    /// Инстанцирует сохранённую сцену внутрь редактируемой
    pub fn instance_scene(&mut self, parent: NodeId, path: &str) -> Option<NodeId> {
        let node = self.instantiate_template(path)?;
        self.add_child(&parent, &node);
        if let Some(root) = self.edited_root {
            self.data_mut(node).owner = Some(root);
        }
        Some(node)
    }

    /// Прикрепляет (или снимает) definition — аналог set_script
    pub fn set_definition(&mut self, node: NodeId, definition: Option<Definition>) {
        if !self.is_valid(&node) {
            return;
        }
        self.data_mut(node).definition = definition;
        self.emit_node(node, NodeSignal::DefinitionChanged, EditorEvent::DefinitionChanged(node));
    }

    pub fn select(&mut self, nodes: &[NodeId]) {
        self.selection = nodes.to_vec();
        self.emit_session(SessionSignal::SelectionChanged, EditorEvent::SelectionChanged);
    }

    /// Удаляет узел из дерева и освобождает его поддерево
    pub fn remove_node(&mut self, node: NodeId) {
        if !self.is_valid(&node) {
            return;
        }

        for id in self.subtree(node) {
            self.emit_node(id, NodeSignal::TreeExiting, EditorEvent::TreeExiting(id));
        }
        self.detach(node);
        self.free_subtree(node);
        if self.edited_root == Some(node) {
            self.edited_root = None;
        }
        self.mutations += 1;
    }

    // === Event queue ===

    /// Отложенное событие reload boundary (аналог OnBeforeSerialize)
    pub fn begin_reload(&mut self) {
        self.events.push_back(EditorEvent::BeforeSerialize);
    }

    pub fn finish_reload(&mut self) {
        self.events.push_back(EditorEvent::AfterDeserialize);
    }

    pub fn next_event(&mut self) -> Option<EditorEvent<NodeId>> {
        self.events.pop_front()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Доставляет все накопленные события supervisor'у
    pub fn pump(&mut self, supervisor: &mut Supervisor<HeadlessEditor>) -> Vec<PipelineReport> {
        let mut reports = Vec::new();
        while let Some(event) = self.events.pop_front() {
            if let Some(report) = supervisor.handle(self, event) {
                reports.push(report);
            }
        }
        reports
    }

    // === Queries ===

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.get(node).map(|data| data.children.clone()).unwrap_or_default()
    }

    pub fn class_of(&self, node: &NodeId) -> Option<String> {
        self.get(*node).map(|data| data.class.clone())
    }

    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .into_iter()
            .find(|child| self.get(*child).is_some_and(|data| data.name == name))
    }

    /// Путь от scene root: `Root/Body/Sprite2D`
    pub fn path_of(&self, node: NodeId) -> Option<String> {
        let mut parts = vec![self.get(node)?.name.clone()];
        let mut current = node;
        while let Some(parent) = self.get(current).and_then(|data| data.parent) {
            parts.push(self.get(parent)?.name.clone());
            current = parent;
        }
        parts.reverse();
        Some(parts.join("/"))
    }

    pub fn node_connection_count(&self, node: NodeId) -> usize {
        self.connections
            .values()
            .filter(|target| matches!(target, ConnectionTarget::Node(id, _) if *id == node))
            .count()
    }

    pub fn session_connection_count(&self) -> usize {
        self.connections
            .values()
            .filter(|target| matches!(target, ConnectionTarget::Session(_)))
            .count()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Счётчик мутаций дерева (add/reparent/rename/owner/remove)
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    /// Сколько освобождённых узлов (включая отклонённые companions)
    pub fn freed_count(&self) -> usize {
        self.nodes.iter().filter(|data| !data.alive).count()
    }

    // === Internals ===

    fn get(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.0 as usize).filter(|data| data.alive)
    }

    fn data_mut(&mut self, node: NodeId) -> &mut NodeData {
        &mut self.nodes[node.0 as usize]
    }

    fn alloc(&mut self, name: &str, class: &str, definition: Option<Definition>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            name: name.to_string(),
            class: class.to_string(),
            parent: None,
            children: Vec::new(),
            owner: None,
            scene_file_path: None,
            definition,
            alive: true,
        });
        id
    }

    fn build_template(&mut self, template: &TemplateNode, owner: Option<NodeId>) -> NodeId {
        let node = self.alloc(&template.name, &template.class, template.definition.clone());
        self.data_mut(node).owner = owner;

        let children_owner = owner.or(Some(node));
        for child_template in &template.children {
            let child = self.build_template(child_template, children_owner);
            self.data_mut(child).parent = Some(node);
            self.data_mut(node).children.push(child);
        }
        node
    }

    fn unique_name(&self, parent: NodeId, desired: &str, node: NodeId) -> String {
        let taken = |name: &str| {
            self.children(parent)
                .into_iter()
                .any(|sibling| sibling != node && self.get(sibling).is_some_and(|data| data.name == name))
        };

        if !taken(desired) {
            return desired.to_string();
        }
        (2..)
            .map(|suffix| format!("{}{}", desired, suffix))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| desired.to_string())
    }

    fn insert(&mut self, parent: NodeId, child: NodeId, touches_parent: bool) {
        if !self.is_valid(&parent) || !self.is_valid(&child) {
            return;
        }

        self.detach(child);
        let name = self.unique_name(parent, &self.nodes[child.0 as usize].name.clone(), child);
        let data = self.data_mut(child);
        data.name = name;
        data.parent = Some(parent);
        self.data_mut(parent).children.push(child);
        self.mutations += 1;

        if self.rename_on_insert {
            self.scramble_name(child);
            if touches_parent && self.edited_root != Some(parent) {
                self.scramble_name(parent);
            }
        }

        self.emit_node(parent, NodeSignal::ChildAdded, EditorEvent::ChildAdded(child));
    }

    fn scramble_name(&mut self, node: NodeId) {
        let data = self.data_mut(node);
        data.name = format!("@{}@{}", data.class, node.0);
    }

    fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = vec![node];
        let mut index = 0;
        while index < result.len() {
            result.extend(self.children(result[index]));
            index += 1;
        }
        result
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.get(node).and_then(|data| data.parent) {
            self.data_mut(parent).children.retain(|child| *child != node);
        }
        self.data_mut(node).parent = None;
    }

    fn free_subtree(&mut self, node: NodeId) {
        for id in self.subtree(node) {
            self.data_mut(id).alive = false;
            self.connections
                .retain(|_, target| !matches!(target, ConnectionTarget::Node(owner, _) if *owner == id));
            self.selection.retain(|selected| *selected != id);
        }
    }

    fn free_scene(&mut self) {
        if let Some(root) = self.edited_root.take() {
            for id in self.subtree(root) {
                self.emit_node(id, NodeSignal::TreeExiting, EditorEvent::TreeExiting(id));
            }
            self.free_subtree(root);
        }
    }

    fn emit_node(&mut self, node: NodeId, signal: NodeSignal, event: EditorEvent<NodeId>) {
        let target = ConnectionTarget::Node(node, signal);
        if self.connections.values().any(|connected| *connected == target) {
            self.events.push_back(event);
        }
    }

    fn emit_session(&mut self, signal: SessionSignal, event: EditorEvent<NodeId>) {
        let target = ConnectionTarget::Session(signal);
        if self.connections.values().any(|connected| *connected == target) {
            self.events.push_back(event);
        }
    }

    fn connect(&mut self, target: ConnectionTarget) -> ConnectionId {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.insert(id, target);
        id
    }
}

impl SceneTree for HeadlessEditor {
    type Node = NodeId;

    fn is_valid(&self, node: &NodeId) -> bool {
        self.get(*node).is_some()
    }

    fn name(&self, node: &NodeId) -> Option<String> {
        self.get(*node).map(|data| data.name.clone())
    }

    fn set_name(&mut self, node: &NodeId, name: &str) {
        let Some(data) = self.get(*node) else {
            return;
        };
        let name = match data.parent {
            Some(parent) => self.unique_name(parent, name, *node),
            None => name.to_string(),
        };
        self.data_mut(*node).name = name;
        self.mutations += 1;
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.get(*node).and_then(|data| data.parent)
    }

    fn is_inside_tree(&self, node: &NodeId) -> bool {
        let Some(root) = self.edited_root else {
            return false;
        };

        let mut current = *node;
        loop {
            if current == root {
                return true;
            }
            match self.parent(&current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn add_child(&mut self, parent: &NodeId, child: &NodeId) {
        self.insert(*parent, *child, true);
    }

    fn reparent(&mut self, node: &NodeId, new_parent: &NodeId) {
        if !self.is_valid(node) || !self.is_valid(new_parent) {
            return;
        }

        // Godot: remove_child (tree_exiting) + add_child; reparent портит только имя переносимого узла
        self.emit_node(*node, NodeSignal::TreeExiting, EditorEvent::TreeExiting(*node));
        self.insert(*new_parent, *node, false);
    }

    fn owner(&self, node: &NodeId) -> Option<NodeId> {
        self.get(*node).and_then(|data| data.owner)
    }

    fn set_owner(&mut self, node: &NodeId, owner: &NodeId) {
        if !self.is_valid(node) || !self.is_valid(owner) {
            return;
        }
        self.data_mut(*node).owner = Some(*owner);
        self.mutations += 1;
    }

    fn edited_scene_root(&self) -> Option<NodeId> {
        self.edited_root
    }

    fn scene_file_path(&self, node: &NodeId) -> Option<String> {
        self.get(*node).and_then(|data| data.scene_file_path.clone())
    }

    fn definition(&self, node: &NodeId) -> Option<Definition> {
        self.get(*node).and_then(|data| data.definition.clone())
    }

    fn selected_nodes(&self) -> Vec<NodeId> {
        self.selection
            .iter()
            .copied()
            .filter(|node| self.is_valid(node))
            .collect()
    }

    fn discard(&mut self, node: &NodeId) {
        if self.is_valid(node) {
            self.detach(*node);
            self.free_subtree(*node);
        }
    }
}

impl NodeFactory for HeadlessEditor {
    fn is_node_class(&self, class: &str) -> bool {
        self.classes.get(class).copied().unwrap_or(false)
    }

    fn instantiate_class(&mut self, class: &str) -> Option<NodeId> {
        if !self.is_node_class(class) {
            return None;
        }
        Some(self.alloc(class, class, None))
    }

    fn global_classes(&self) -> Vec<GlobalClass> {
        self.global_classes.clone()
    }

    fn instantiate_script(&mut self, path: &str) -> Option<NodeId> {
        let script = self.scripts.get(path)?.clone();
        if !self.is_node_class(&script.base) {
            return None;
        }
        Some(self.alloc(&script.base, &script.base, script.definition))
    }

    fn instantiate_template(&mut self, path: &str) -> Option<NodeId> {
        let template = self.templates.get(path)?.clone();
        let root = self.build_template(&template, None);
        self.data_mut(root).scene_file_path = Some(path.to_string());
        Some(root)
    }
}

impl EditorSignals for HeadlessEditor {
    type Connection = ConnectionId;

    fn connect_session(&mut self, signal: SessionSignal) -> Option<ConnectionId> {
        Some(self.connect(ConnectionTarget::Session(signal)))
    }

    fn disconnect_session(&mut self, connection: ConnectionId) {
        self.connections.remove(&connection);
    }

    fn connect_node(&mut self, node: &NodeId, signal: NodeSignal) -> Option<ConnectionId> {
        if !self.is_valid(node) {
            return None;
        }
        Some(self.connect(ConnectionTarget::Node(*node, signal)))
    }

    fn disconnect_node(&mut self, _node: &NodeId, connection: ConnectionId) {
        self.connections.remove(&connection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_names_are_unique() {
        let mut editor = HeadlessEditor::new();
        let root = editor.open_scene("Root", "Node2D", "res://main.tscn");
        let first = editor.add_node(root, "Timer", "Timer");
        let second = editor.add_node(root, "Timer", "Timer");

        assert_eq!(editor.name(&first).as_deref(), Some("Timer"));
        assert_eq!(editor.name(&second).as_deref(), Some("Timer2"));

        editor.set_name(&second, "Timer");
        assert_eq!(editor.name(&second).as_deref(), Some("Timer2"));
    }

    #[test]
    fn test_template_instances_are_independent() {
        let mut editor = HeadlessEditor::new();
        editor.register_template(
            "res://enemy.tscn",
            TemplateNode::new("Enemy", "CharacterBody2D").with_child(TemplateNode::new("Sprite", "Sprite2D")),
        );

        let a = editor.instantiate_template("res://enemy.tscn").unwrap();
        let b = editor.instantiate_template("res://enemy.tscn").unwrap();
        assert_ne!(a, b);
        assert_eq!(editor.children(a).len(), 1);
        assert_ne!(editor.children(a), editor.children(b));
        assert_eq!(editor.scene_file_path(&a).as_deref(), Some("res://enemy.tscn"));
        assert_eq!(editor.owner(&editor.children(a)[0]), Some(a));
    }

    #[test]
    fn test_remove_node_drops_its_connections() {
        let mut editor = HeadlessEditor::new();
        let root = editor.open_scene("Root", "Node2D", "res://main.tscn");
        let body = editor.add_node(root, "Body", "CharacterBody2D");
        editor.connect_node(&body, NodeSignal::DefinitionChanged).unwrap();
        editor.connect_node(&body, NodeSignal::TreeExiting).unwrap();
        assert_eq!(editor.node_connection_count(body), 2);

        editor.remove_node(body);
        assert!(!editor.is_valid(&body));
        assert_eq!(editor.node_connection_count(body), 0);
        assert_eq!(editor.next_event(), Some(EditorEvent::TreeExiting(body)));
        assert!(editor.children(root).is_empty());
    }

    #[test]
    fn test_rename_on_insert_perturbs_names() {
        let mut editor = HeadlessEditor::new();
        let root = editor.open_scene("Root", "Node2D", "res://main.tscn");
        let body = editor.add_node(root, "Body", "CharacterBody2D");
        editor.set_rename_on_insert(true);

        let timer = editor.instantiate_class("Timer").unwrap();
        editor.add_child(&body, &timer);

        assert_ne!(editor.name(&timer).as_deref(), Some("Timer"));
        assert_ne!(editor.name(&body).as_deref(), Some("Body"));
        assert_eq!(editor.name(&root).as_deref(), Some("Root"));
    }

    #[test]
    fn test_path_of() {
        let mut editor = HeadlessEditor::new();
        let root = editor.open_scene("Root", "Node2D", "res://main.tscn");
        let body = editor.add_node(root, "Body", "CharacterBody2D");
        let sprite = editor.add_node(body, "Sprite", "Sprite2D");
        assert_eq!(editor.path_of(sprite).as_deref(), Some("Root/Body/Sprite"));
        assert!(editor.is_inside_tree(&sprite));
    }
}

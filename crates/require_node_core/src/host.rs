//! Host abstraction — что ядро требует от редактора
//!
//! Дерево, ресурсы, ClassDB и сигналы принадлежат хосту. Ядро держит только
//! handles (`Node`) и перед каждым обращением проверяет `is_valid`.
//!
//! Реализации:
//! - `require_node_godot::GodotEditorHost` (EditorInterface / ClassDB / ResourceLoader)
//! - `crate::headless::HeadlessEditor` (in-memory, для тестов и CLI)

use crate::requirement::Definition;
use std::fmt::Debug;
use std::hash::Hash;

/// Глобальный script class (ProjectSettings global class list)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalClass {
    pub name: String,
    pub base: String,
    pub language: String,
    pub path: String,
}

/// Запросы и мутации живого дерева сцены
pub trait SceneTree {
    /// Non-owning handle узла
    type Node: Clone + Eq + Hash + Debug;

    fn is_valid(&self, node: &Self::Node) -> bool;

    fn name(&self, node: &Self::Node) -> Option<String>;

    /// Хост может переименовать узел при конфликте с sibling
    fn set_name(&mut self, node: &Self::Node, name: &str);

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Узел достижим из edited scene root
    fn is_inside_tree(&self, node: &Self::Node) -> bool;

    fn add_child(&mut self, parent: &Self::Node, child: &Self::Node);

    /// Перенос узла под нового parent (хост может переименовать узел)
    fn reparent(&mut self, node: &Self::Node, new_parent: &Self::Node);

    fn owner(&self, node: &Self::Node) -> Option<Self::Node>;

    fn set_owner(&mut self, node: &Self::Node, owner: &Self::Node);

    /// Корень редактируемой сцены
    fn edited_scene_root(&self) -> Option<Self::Node>;

    /// Путь файла сцены, если узел — инстанс сохранённой сцены
    fn scene_file_path(&self, node: &Self::Node) -> Option<String>;

    /// Definition, прикреплённый к узлу
    fn definition(&self, node: &Self::Node) -> Option<Definition>;

    /// Текущее выделение в редакторе
    fn selected_nodes(&self) -> Vec<Self::Node>;

    /// Освобождает companion, который так и не попал в дерево
    fn discard(&mut self, node: &Self::Node);
}

/// ClassDB + ResourceLoader
pub trait NodeFactory: SceneTree {
    /// Built-in class, наследующий базовый node class
    fn is_node_class(&self, class: &str) -> bool;

    fn instantiate_class(&mut self, class: &str) -> Option<Self::Node>;

    fn global_classes(&self) -> Vec<GlobalClass>;

    /// Загрузка скрипта и создание его экземпляра
    fn instantiate_script(&mut self, path: &str) -> Option<Self::Node>;

    /// Загрузка шаблона сцены и создание независимой копии
    fn instantiate_template(&mut self, path: &str) -> Option<Self::Node>;
}

/// Сигналы уровня сессии редактора
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionSignal {
    SelectionChanged,
    SceneChanged,
    SceneClosed,
}

impl SessionSignal {
    pub const ALL: [SessionSignal; 3] = [
        SessionSignal::SelectionChanged,
        SessionSignal::SceneChanged,
        SessionSignal::SceneClosed,
    ];
}

/// Сигналы отдельного узла
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeSignal {
    DefinitionChanged,
    TreeExiting,
    ChildAdded,
}

impl NodeSignal {
    pub const ALL: [NodeSignal; 3] = [
        NodeSignal::DefinitionChanged,
        NodeSignal::TreeExiting,
        NodeSignal::ChildAdded,
    ];
}

/// Подписки на сигналы; `Connection` — handle для последующего disconnect
pub trait EditorSignals: SceneTree {
    type Connection: Debug;

    fn connect_session(&mut self, signal: SessionSignal) -> Option<Self::Connection>;

    fn disconnect_session(&mut self, connection: Self::Connection);

    /// `None` если узел уже невалиден
    fn connect_node(&mut self, node: &Self::Node, signal: NodeSignal) -> Option<Self::Connection>;

    /// Отключение от освобождённого узла — no-op
    fn disconnect_node(&mut self, node: &Self::Node, connection: Self::Connection);
}

/// Всё, что нужно supervisor'у
pub trait EditorHost: SceneTree + NodeFactory + EditorSignals {}

impl<T> EditorHost for T where T: SceneTree + NodeFactory + EditorSignals {}

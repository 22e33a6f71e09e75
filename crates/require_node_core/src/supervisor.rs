//! Change-Tracking Supervisor
//!
//! State machine сессии редактора:
//! - `Inactive` → `Active` на `start` (подписка на selection/scene_changed/scene_closed)
//! - `Active`: selection → track узлов; definition changed / child added → pipeline
//! - scene changed / scene closed / reload boundary → полный reset
//! - `stop` → reset + отписка от сигналов сессии → `Inactive`
//!
//! Инвариант: не больше одной `NodeSubscription` на узел. Порядок очистки:
//! сначала disconnect, потом удаление записи.

use crate::config::{MarkerGrammar, RequireNodeConfig};
use crate::error::{PlacementError, ResolveError};
use crate::host::{EditorHost, NodeSignal, SessionSignal};
use crate::logger;
use crate::mutator::place;
use crate::resolver::resolve;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Active,
}

/// Уведомления хоста, которые обрабатывает supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent<N> {
    SelectionChanged,
    DefinitionChanged(N),
    /// Несёт узел, который вошёл в дерево (не parent)
    ChildAdded(N),
    TreeExiting(N),
    SceneChanged,
    SceneClosed,
    BeforeSerialize,
    AfterDeserialize,
}

/// Подписки одного tracked узла
#[derive(Debug)]
struct NodeSubscription<C> {
    definition_changed: C,
    tree_exiting: C,
    child_added: C,
}

impl<C> NodeSubscription<C> {
    fn into_connections(self) -> [C; 3] {
        [self.definition_changed, self.tree_exiting, self.child_added]
    }
}

/// Итог одного прогона resolve → mutate
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Сколько requirements объявлено (= сколько попыток)
    pub attempts: usize,
    pub placed: usize,
    pub resolve_errors: Vec<ResolveError>,
    pub placement_errors: Vec<PlacementError>,
}

impl PipelineReport {
    pub fn failed(&self) -> usize {
        self.resolve_errors.len() + self.placement_errors.len()
    }
}

pub struct Supervisor<H: EditorHost> {
    state: SessionState,
    grammar: MarkerGrammar,
    tracked: HashMap<H::Node, NodeSubscription<H::Connection>>,
    session: Vec<H::Connection>,
}

impl<H: EditorHost> Default for Supervisor<H> {
    fn default() -> Self {
        Self::new(MarkerGrammar::default())
    }
}

impl<H: EditorHost> Supervisor<H> {
    pub fn new(grammar: MarkerGrammar) -> Self {
        Self {
            state: SessionState::Inactive,
            grammar,
            tracked: HashMap::new(),
            session: Vec::new(),
        }
    }

    pub fn with_config(config: &RequireNodeConfig) -> Self {
        Self::new(config.grammar.clone())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn grammar(&self) -> &MarkerGrammar {
        &self.grammar
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_tracked(&self, node: &H::Node) -> bool {
        self.tracked.contains_key(node)
    }

    // === Lifecycle ===

    pub fn start(&mut self, host: &mut H) {
        if self.is_active() {
            return;
        }

        for signal in SessionSignal::ALL {
            match host.connect_session(signal) {
                Some(connection) => self.session.push(connection),
                None => logger::log_warning(&format!("failed to connect {:?}", signal)),
            }
        }

        self.state = SessionState::Active;
        logger::log("session started");
    }

    pub fn stop(&mut self, host: &mut H) {
        if !self.is_active() {
            return;
        }

        self.reset(host);
        for connection in self.session.drain(..) {
            host.disconnect_session(connection);
        }

        self.state = SessionState::Inactive;
        logger::log("session stopped");
    }

    // === Tracking table ===

    /// Подписывает узел на definition changed / tree exiting / child added.
    /// Возвращает `false`, если узел уже tracked или невалиден.
    pub fn track(&mut self, host: &mut H, node: &H::Node) -> bool {
        if self.tracked.contains_key(node) || !host.is_valid(node) {
            return false;
        }

        let mut connections = Vec::with_capacity(NodeSignal::ALL.len());
        for signal in NodeSignal::ALL {
            match host.connect_node(node, signal) {
                Some(connection) => connections.push(connection),
                None => {
                    // Частичная подписка хуже никакой
                    for connection in connections {
                        host.disconnect_node(node, connection);
                    }
                    return false;
                }
            }
        }

        let Ok([definition_changed, tree_exiting, child_added]) =
            <[H::Connection; 3]>::try_from(connections)
        else {
            return false;
        };

        self.tracked.insert(
            node.clone(),
            NodeSubscription {
                definition_changed,
                tree_exiting,
                child_added,
            },
        );
        logger::log(&format!("tracking {:?}", node));
        true
    }

    pub fn untrack(&mut self, host: &mut H, node: &H::Node) -> bool {
        let Some(subscription) = self.tracked.remove(node) else {
            return false;
        };

        for connection in subscription.into_connections() {
            host.disconnect_node(node, connection);
        }
        true
    }

    /// Отписывает все узлы и очищает таблицу
    pub fn reset(&mut self, host: &mut H) {
        if self.tracked.is_empty() {
            return;
        }

        let count = self.tracked.len();
        for (node, subscription) in self.tracked.drain() {
            for connection in subscription.into_connections() {
                host.disconnect_node(&node, connection);
            }
        }
        logger::log(&format!("cleared {} tracked node(s)", count));
    }

    // === Notification handlers ===

    pub fn on_selection_changed(&mut self, host: &mut H) {
        if !self.is_active() {
            return;
        }

        for node in host.selected_nodes() {
            self.track(host, &node);
        }
    }

    pub fn on_definition_changed(&mut self, host: &mut H, node: &H::Node) -> Option<PipelineReport> {
        if !self.is_active() {
            return None;
        }
        self.evaluate(host, node)
    }

    pub fn on_child_added(&mut self, host: &mut H, child: &H::Node) -> Option<PipelineReport> {
        if !self.is_active() {
            return None;
        }
        self.evaluate(host, child)
    }

    /// Хост доставляет tree exiting отложенно: если узел уже снова в дереве,
    /// это был reparent, и подписка остаётся
    pub fn on_tree_exiting(&mut self, host: &mut H, node: &H::Node) {
        if !self.is_active() || host.is_inside_tree(node) {
            return;
        }
        self.untrack(host, node);
    }

    pub fn on_scene_changed(&mut self, host: &mut H) {
        if self.is_active() {
            self.reset(host);
        }
    }

    pub fn on_scene_closed(&mut self, host: &mut H) {
        if self.is_active() {
            self.reset(host);
        }
    }

    /// Reload boundary: handles подписок не переживают перезагрузку кода
    pub fn before_serialize(&mut self, host: &mut H) {
        self.reset(host);
    }

    /// После reload таблица заполнится заново по selection событиям
    pub fn after_deserialize(&mut self, _host: &mut H) {}

    pub fn handle(&mut self, host: &mut H, event: EditorEvent<H::Node>) -> Option<PipelineReport> {
        match event {
            EditorEvent::SelectionChanged => self.on_selection_changed(host),
            EditorEvent::DefinitionChanged(node) => return self.on_definition_changed(host, &node),
            EditorEvent::ChildAdded(child) => return self.on_child_added(host, &child),
            EditorEvent::TreeExiting(node) => self.on_tree_exiting(host, &node),
            EditorEvent::SceneChanged => self.on_scene_changed(host),
            EditorEvent::SceneClosed => self.on_scene_closed(host),
            EditorEvent::BeforeSerialize => self.before_serialize(host),
            EditorEvent::AfterDeserialize => self.after_deserialize(host),
        }
        None
    }

    // === Pipeline ===

    /// Resolve → mutate для одного узла. `None` если узел не прошёл guard.
    pub fn evaluate(&mut self, host: &mut H, node: &H::Node) -> Option<PipelineReport> {
        if !self.is_editable(host, node) {
            return None;
        }
        let definition = host.definition(node)?;

        logger::log(&format!("checking {} on {:?}", definition.label(), node));

        let resolutions = resolve(host, &definition, &self.grammar);
        let mut report = PipelineReport {
            attempts: resolutions.len(),
            ..PipelineReport::default()
        };

        for resolution in resolutions {
            let companion = match resolution {
                Ok(companion) => companion,
                Err(error) => {
                    if error.is_silent() {
                        logger::log(&error.to_string());
                    } else {
                        logger::log_error(&error.to_string());
                    }
                    report.resolve_errors.push(error);
                    continue;
                }
            };

            match place(host, node, &companion) {
                Ok(()) => {
                    report.placed += 1;
                    logger::log_info(&format!(
                        "added '{}' {:?} for {}",
                        companion.name,
                        companion.placement,
                        definition.label()
                    ));
                }
                Err(error) => {
                    logger::log_error(&error.to_string());
                    report.placement_errors.push(error);
                }
            }
        }

        Some(report)
    }

    /// Инстансы сохранённых сцен (кроме редактируемого root) read-only
    fn is_editable(&self, host: &H, node: &H::Node) -> bool {
        if !host.is_valid(node) {
            return false;
        }

        match host.scene_file_path(node) {
            None => true,
            Some(_) => host.edited_scene_root().as_ref() == Some(node),
        }
    }
}

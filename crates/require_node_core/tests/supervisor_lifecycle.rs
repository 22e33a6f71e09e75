//! Supervisor integration tests
//!
//! Полный цикл на HeadlessEditor: selection → definition changed → companions в дереве.
//!
//! Проверяем:
//! - N requirements → N попыток в порядке объявления, ошибки не прерывают остальные
//! - повторный track — no-op (одна подписка на узел)
//! - scene changed / scene closed / reload boundary полностью чистят таблицу
//! - stop отписывается от сигналов сессии

use require_node_core::*;

const MOVER_SOURCE: &str = "\
# require_node: res://player.tscn,as parent
# require_node: Timer
# require_node: Health, as child
extends Node

var speed := 50.0
";

fn gdscript(path: &str, source: &str) -> Definition {
    Definition::Interpreted {
        path: path.to_string(),
        source: source.to_string(),
    }
}

/// Редактор с открытой сценой, шаблоном игрока и global class Health
fn setup() -> (HeadlessEditor, Supervisor<HeadlessEditor>, NodeId) {
    let mut editor = HeadlessEditor::new();
    editor.register_template(
        "res://player.tscn",
        TemplateNode::new("Player", "CharacterBody2D").with_child(TemplateNode::new("Sprite", "Sprite2D")),
    );
    editor.register_global_class("Health", "Node", "GDScript", "res://health.gd", None);

    let root = editor.open_scene("Level", "Node2D", "res://level.tscn");
    let mut supervisor = Supervisor::default();
    supervisor.start(&mut editor);
    editor.pump(&mut supervisor);

    (editor, supervisor, root)
}

#[test]
fn test_start_connects_session_signals_once() {
    let (mut editor, mut supervisor, _root) = setup();
    assert_eq!(supervisor.state(), SessionState::Active);
    assert_eq!(editor.session_connection_count(), 3);

    supervisor.start(&mut editor);
    assert_eq!(editor.session_connection_count(), 3);
}

#[test]
fn test_script_change_injects_companions_in_order() {
    let (mut editor, mut supervisor, root) = setup();
    let mover = editor.add_node(root, "Mover", "Node");

    editor.select(&[mover]);
    editor.pump(&mut supervisor);
    assert!(supervisor.is_tracked(&mover));

    editor.set_definition(mover, Some(gdscript("res://mover.gd", MOVER_SOURCE)));
    let reports = editor.pump(&mut supervisor);

    // Первый отчёт — сам mover; companions-дети тоже вызывают child added
    let report = &reports[0];
    assert_eq!(report.attempts, 3);
    assert_eq!(report.placed, 3);
    assert_eq!(report.failed(), 0);

    let player = editor.parent(&mover).unwrap();
    assert_eq!(editor.name(&player).as_deref(), Some("Player"));
    assert_eq!(editor.parent(&player), Some(root));
    assert_eq!(editor.owner(&player), Some(root));
    assert_eq!(editor.name(&mover).as_deref(), Some("Mover"));

    let children: Vec<_> = editor
        .children(mover)
        .into_iter()
        .filter_map(|child| editor.name(&child))
        .collect();
    assert_eq!(children, vec!["Timer", "Health"]);
}

#[test]
fn test_failing_requirements_do_not_stop_the_rest() {
    let (mut editor, mut supervisor, root) = setup();
    let mover = editor.add_node(root, "Mover", "Node");
    editor.select(&[mover]);
    editor.pump(&mut supervisor);

    let source = "\
# require_node: NotAType
# require_node: res://missing.tscn
# require_node: Timer
extends Node";
    editor.set_definition(mover, Some(gdscript("res://mover.gd", source)));
    let reports = editor.pump(&mut supervisor);

    let report = &reports[0];
    assert_eq!(report.attempts, 3);
    assert_eq!(report.placed, 1);
    assert_eq!(
        report.resolve_errors,
        vec![
            ResolveError::Unmatched { target: "NotAType".into() },
            ResolveError::TemplateLoad { path: "res://missing.tscn".into() },
        ]
    );
    assert!(editor.find_child(mover, "Timer").is_some());
}

#[test]
fn test_wrapping_scene_root_is_refused() {
    let (mut editor, mut supervisor, root) = setup();
    editor.select(&[root]);
    editor.pump(&mut supervisor);

    let source = "# require_node: Node2D,as parent\nextends Node2D";
    editor.set_definition(root, Some(gdscript("res://level.gd", source)));
    let reports = editor.pump(&mut supervisor);

    assert_eq!(reports[0].placed, 0);
    assert_eq!(
        reports[0].placement_errors,
        vec![PlacementError::SceneRootWrap { node: "Level".into() }]
    );
    assert_eq!(editor.edited_scene_root(), Some(root));
    assert!(editor.children(root).is_empty());
}

#[test]
fn test_compiled_definition() {
    let (mut editor, mut supervisor, root) = setup();
    let mover = editor.add_node(root, "Mover", "Node");
    editor.select(&[mover]);
    editor.pump(&mut supervisor);

    let mut registry = RequirementRegistry::new();
    registry.push("Mover", Requirement::template("res://player.tscn", Placement::AsAncestor));
    registry.push("Mover", Requirement::node_type("Area2D", Placement::AsChild));
    editor.set_definition(mover, registry.definition_for("Mover"));

    let reports = editor.pump(&mut supervisor);
    assert_eq!(reports[0].attempts, 2);
    assert_eq!(reports[0].placed, 2);
    assert_eq!(editor.path_of(mover).as_deref(), Some("Level/Player/Mover"));
    assert!(editor.find_child(mover, "Area2D").is_some());
}

#[test]
fn test_retracking_is_noop() {
    let (mut editor, mut supervisor, root) = setup();
    let mover = editor.add_node(root, "Mover", "Node");

    editor.select(&[mover]);
    editor.pump(&mut supervisor);
    editor.select(&[mover]);
    editor.pump(&mut supervisor);
    assert!(!supervisor.track(&mut editor, &mover));

    assert_eq!(supervisor.tracked_count(), 1);
    assert_eq!(editor.node_connection_count(mover), NodeSignal::ALL.len());

    // Одна подписка → один прогон pipeline на одно изменение
    editor.set_definition(mover, Some(gdscript("res://mover.gd", "# require_node: Timer")));
    let reports = editor.pump(&mut supervisor);
    assert_eq!(reports.len(), 1);
    assert_eq!(editor.children(mover).len(), 1);
}

#[test]
fn test_scene_changed_clears_tracking_table() {
    let (mut editor, mut supervisor, root) = setup();
    let a = editor.add_node(root, "A", "Node");
    let b = editor.add_node(root, "B", "Node");
    editor.select(&[a, b]);
    editor.pump(&mut supervisor);
    assert_eq!(supervisor.tracked_count(), 2);

    supervisor.on_scene_changed(&mut editor);

    assert_eq!(supervisor.tracked_count(), 0);
    assert_eq!(editor.node_connection_count(a), 0);
    assert_eq!(editor.node_connection_count(b), 0);
}

#[test]
fn test_opening_another_scene_clears_tracking_table() {
    let (mut editor, mut supervisor, root) = setup();
    let a = editor.add_node(root, "A", "Node");
    editor.select(&[a]);
    editor.pump(&mut supervisor);

    editor.open_scene("Menu", "Control", "res://menu.tscn");
    editor.pump(&mut supervisor);

    assert_eq!(supervisor.tracked_count(), 0);
    assert_eq!(editor.session_connection_count(), 3);
}

#[test]
fn test_scene_closed_clears_tracking_table() {
    let (mut editor, mut supervisor, root) = setup();
    let a = editor.add_node(root, "A", "Node");
    let b = editor.add_node(root, "B", "Node");
    editor.select(&[a, b]);
    editor.pump(&mut supervisor);

    editor.close_scene();
    editor.pump(&mut supervisor);

    assert_eq!(supervisor.tracked_count(), 0);
    assert_eq!(editor.connection_count(), editor.session_connection_count());
}

#[test]
fn test_reload_boundary_resets() {
    let (mut editor, mut supervisor, root) = setup();
    let a = editor.add_node(root, "A", "Node");
    editor.select(&[a]);
    editor.pump(&mut supervisor);

    editor.begin_reload();
    editor.finish_reload();
    editor.pump(&mut supervisor);

    assert_eq!(supervisor.tracked_count(), 0);
    assert!(supervisor.is_active());

    // После reload таблица заполняется заново по selection
    editor.select(&[a]);
    editor.pump(&mut supervisor);
    assert!(supervisor.is_tracked(&a));
}

#[test]
fn test_removed_node_is_untracked() {
    let (mut editor, mut supervisor, root) = setup();
    let a = editor.add_node(root, "A", "Node");
    let b = editor.add_node(root, "B", "Node");
    editor.select(&[a, b]);
    editor.pump(&mut supervisor);

    editor.remove_node(a);
    editor.pump(&mut supervisor);

    assert!(!supervisor.is_tracked(&a));
    assert!(supervisor.is_tracked(&b));
}

#[test]
fn test_reparented_node_stays_tracked() {
    let (mut editor, mut supervisor, root) = setup();
    let mover = editor.add_node(root, "Mover", "Node");
    editor.select(&[mover]);
    editor.pump(&mut supervisor);

    editor.set_definition(mover, Some(gdscript("res://mover.gd", "# require_node: Node2D,as parent")));
    editor.pump(&mut supervisor);

    assert_eq!(editor.path_of(mover).as_deref(), Some("Level/Node2D/Mover"));
    assert!(supervisor.is_tracked(&mover));
}

#[test]
fn test_instanced_subscene_is_read_only() {
    let (mut editor, mut supervisor, root) = setup();
    let player = editor.instance_scene(root, "res://player.tscn").unwrap();
    editor.select(&[player]);
    editor.pump(&mut supervisor);

    editor.set_definition(player, Some(gdscript("res://player.gd", "# require_node: Timer")));
    let reports = editor.pump(&mut supervisor);

    assert!(reports.is_empty());
    assert!(editor.find_child(player, "Timer").is_none());
}

#[test]
fn test_child_added_evaluates_the_new_child() {
    let (mut editor, mut supervisor, root) = setup();
    let body = editor.add_node(root, "Body", "CharacterBody2D");
    editor.select(&[body]);
    editor.pump(&mut supervisor);

    // Global class со своими requirements: companion Health тянет Timer
    editor.register_global_class(
        "Health",
        "Node",
        "GDScript",
        "res://health.gd",
        Some(gdscript("res://health.gd", "# require_node: Timer\nextends Node")),
    );
    let health = editor.instantiate_script("res://health.gd").unwrap();
    editor.add_child(&body, &health);
    let reports = editor.pump(&mut supervisor);

    assert_eq!(reports.len(), 1);
    assert!(editor.find_child(health, "Timer").is_some());
}

#[test]
fn test_stale_definition_change_is_ignored() {
    let (mut editor, mut supervisor, root) = setup();
    let a = editor.add_node(root, "A", "Node");
    editor.remove_node(a);

    assert!(supervisor.on_definition_changed(&mut editor, &a).is_none());
    assert!(!supervisor.track(&mut editor, &a));
}

#[test]
fn test_stop_disconnects_everything() {
    let (mut editor, mut supervisor, root) = setup();
    let a = editor.add_node(root, "A", "Node");
    editor.select(&[a]);
    editor.pump(&mut supervisor);

    supervisor.stop(&mut editor);

    assert_eq!(supervisor.state(), SessionState::Inactive);
    assert_eq!(supervisor.tracked_count(), 0);
    assert_eq!(editor.connection_count(), 0);

    // Inactive: selection больше не доставляется и не обрабатывается
    editor.select(&[a]);
    assert_eq!(editor.pending_events(), 0);
    supervisor.on_selection_changed(&mut editor);
    assert_eq!(supervisor.tracked_count(), 0);
}

#[test]
fn test_unmatched_target_is_logged_at_debug_only() {
    let logger = MemoryLogger::new();
    set_logger(Box::new(logger.clone()));
    set_log_level(LogLevel::Debug);

    let (mut editor, mut supervisor, root) = setup();
    let mover = editor.add_node(root, "Mover", "Node");
    editor.select(&[mover]);
    editor.pump(&mut supervisor);

    let source = "# require_node: NoSuchCompanionType\n# require_node: res://no_such_scene.tscn";
    editor.set_definition(mover, Some(gdscript("res://mover.gd", source)));
    editor.pump(&mut supervisor);

    assert!(logger.contains(LogLevel::Debug, "NoSuchCompanionType"));
    assert!(!logger.contains(LogLevel::Error, "NoSuchCompanionType"));
    assert!(logger.contains(LogLevel::Error, "res://no_such_scene.tscn"));
}

#[test]
fn test_compiled_node_is_evaluated_when_it_enters_a_tracked_parent() {
    let (mut editor, mut supervisor, root) = setup();
    let body = editor.add_node(root, "Body", "CharacterBody2D");
    editor.select(&[body]);
    editor.pump(&mut supervisor);

    let mut registry = RequirementRegistry::new();
    registry.push("Hitbox", Requirement::node_type("CollisionShape2D", Placement::AsChild));

    let hitbox = editor.instantiate_class("Area2D").unwrap();
    editor.set_definition(hitbox, registry.definition_for("Hitbox"));
    editor.add_child(&body, &hitbox);
    let reports = editor.pump(&mut supervisor);

    assert_eq!(reports.len(), 1);
    assert!(editor.find_child(hitbox, "CollisionShape2D").is_some());

    // Выделение без смены definition ничего не применяет повторно
    editor.select(&[hitbox]);
    assert!(editor.pump(&mut supervisor).is_empty());
    assert_eq!(editor.children(hitbox).len(), 1);
}

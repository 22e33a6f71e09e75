//! RequireNodePlugin — EditorPlugin, владеющий Supervisor
//!
//! Все сигналы редактора приходят сюда как `#[func]` callbacks и
//! пробрасываются в `Supervisor<GodotEditorHost>`.
//!
//! Lifecycle:
//! - enter_tree: logger + config → supervisor.start
//! - exit_tree: supervisor.stop (отписка от всего)
//! - reload extension: `before_reload` чистит таблицу до того, как handles протухнут

use godot::classes::{EditorPlugin, IEditorPlugin, ProjectSettings};
use godot::prelude::*;
use require_node_core::{
    clear_logger, log, log_error, set_log_level, set_logger, Requirement, RequireNodeConfig, Supervisor,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::host::GodotEditorHost;
use crate::logger::GodotLogger;
use crate::registry;

const CONFIG_PATH: &str = "res://addons/require_node/require_node.toml";

/// Instance id активного плагина (0 = нет)
static PLUGIN_ID: AtomicI64 = AtomicI64::new(0);

#[derive(GodotClass)]
#[class(tool, editor_plugin, base=EditorPlugin)]
pub struct RequireNodePlugin {
    base: Base<EditorPlugin>,
    host: Option<GodotEditorHost>,
    supervisor: Supervisor<GodotEditorHost>,
}

#[godot_api]
impl IEditorPlugin for RequireNodePlugin {
    fn init(base: Base<EditorPlugin>) -> Self {
        Self {
            base,
            host: None,
            supervisor: Supervisor::default(),
        }
    }

    fn enter_tree(&mut self) {
        if !GodotEditorHost::is_editor() {
            return;
        }

        set_logger(Box::new(GodotLogger));

        let config = load_config();
        set_log_level(config.log_level);
        self.supervisor = Supervisor::with_config(&config);

        let mut host = GodotEditorHost::new(self.to_gd().upcast());
        self.supervisor.start(&mut host);
        self.host = Some(host);

        PLUGIN_ID.store(self.base().instance_id().to_i64(), Ordering::SeqCst);
        log("RequireNodePlugin enabled");
    }

    fn exit_tree(&mut self) {
        if let Some(mut host) = self.host.take() {
            self.supervisor.stop(&mut host);
        }

        PLUGIN_ID.store(0, Ordering::SeqCst);
        log("RequireNodePlugin disabled");
        clear_logger();
    }
}

#[godot_api]
impl RequireNodePlugin {
    #[func]
    fn on_selection_changed(&mut self) {
        let Some(host) = self.host.as_mut() else {
            return;
        };
        self.supervisor.on_selection_changed(host);
    }

    /// Bound: instance id узла, у которого сменился script
    #[func]
    fn on_script_changed(&mut self, node_id: i64) {
        let (Some(host), Some(node)) = (self.host.as_mut(), InstanceId::try_from_i64(node_id)) else {
            return;
        };
        self.supervisor.on_definition_changed(host, &node);
    }

    /// Deferred: к моменту вызова узел может быть уже в новом parent'е
    #[func]
    fn on_tree_exiting(&mut self, node_id: i64) {
        let (Some(host), Some(node)) = (self.host.as_mut(), InstanceId::try_from_i64(node_id)) else {
            return;
        };
        self.supervisor.on_tree_exiting(host, &node);
    }

    /// Variant, а не Gd<Node>: deferred вызов может прийти после free
    #[func]
    fn on_child_entered_tree(&mut self, child: Variant) {
        let (Some(host), Some(child)) = (self.host.as_mut(), child.object_id()) else {
            return;
        };
        self.supervisor.on_child_added(host, &child);
    }

    #[func]
    fn on_scene_changed(&mut self, _scene_root: Variant) {
        let Some(host) = self.host.as_mut() else {
            return;
        };
        self.supervisor.on_scene_changed(host);
    }

    #[func]
    fn on_scene_closed(&mut self, _path: GString) {
        let Some(host) = self.host.as_mut() else {
            return;
        };
        self.supervisor.on_scene_closed(host);
    }

    /// Объявление requirement для compiled класса из editor скриптов:
    /// `plugin.register_requirement("Mover", "res://player.tscn", false)`
    #[func]
    fn register_requirement(&mut self, class_name: GString, target: GString, as_child: bool) {
        let requirement = Requirement::declared(
            &target.to_string(),
            as_child,
            &self.supervisor.grammar().template_prefix,
        );
        registry::register_requirement(&class_name.to_string(), requirement);
    }

    #[func]
    fn unregister_class(&mut self, class_name: GString) -> bool {
        registry::unregister_class(&class_name.to_string())
    }

    fn before_serialize(&mut self) {
        if let Some(host) = self.host.as_mut() {
            self.supervisor.before_serialize(host);
        }
    }

    /// Вызывается из `ExtensionLibrary::on_level_deinit` перед выгрузкой кода
    pub fn before_reload() {
        let id = PLUGIN_ID.swap(0, Ordering::SeqCst);
        let Some(instance_id) = InstanceId::try_from_i64(id) else {
            return;
        };
        if let Ok(mut plugin) = Gd::<RequireNodePlugin>::try_from_instance_id(instance_id) {
            plugin.bind_mut().before_serialize();
        }
    }
}

fn load_config() -> RequireNodeConfig {
    let path = PathBuf::from(ProjectSettings::singleton().globalize_path(CONFIG_PATH).to_string());

    match RequireNodeConfig::load(&path) {
        Ok(config) => config,
        Err(error) => {
            log_error(&format!("{} - using defaults", error));
            RequireNodeConfig::default()
        }
    }
}

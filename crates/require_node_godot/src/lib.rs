use godot::init::InitLevel;
use godot::prelude::*;

mod host;
mod logger;
mod plugin;
pub mod registry;

/// GDExtension entry point
struct RequireNodeExtension;

#[gdextension]
unsafe impl ExtensionLibrary for RequireNodeExtension {
    fn on_level_deinit(level: InitLevel) {
        // Reload boundary: подписки держат Callable на выгружаемый код
        if level == InitLevel::Editor {
            plugin::RequireNodePlugin::before_reload();
        }
    }
}

//! GodotLogger implementation
//!
//! Bridges Rust logging to Godot's godot_print!/godot_warn!/godot_error!.
//! Ошибки уходят в панель Errors редактора, остальное — в Output.

use require_node_core::{LogLevel, LogPrinter};

pub struct GodotLogger;

impl LogPrinter for GodotLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => godot::prelude::godot_error!("{}", message),
            LogLevel::Warning => godot::prelude::godot_warn!("{}", message),
            LogLevel::Debug | LogLevel::Info => {
                godot::prelude::godot_print!("[{}] {}", level.as_str(), message)
            }
        }
    }
}

//! Конфигурация плагина
//!
//! Всё имеет defaults; TOML файл (`require_node.toml`) переопределяет только
//! указанные поля.
//!
//! ```toml
//! log_level = "debug"
//!
//! [grammar]
//! marker = "# require_node:"
//! template_prefix = "res://"
//! ```

use crate::error::ConfigError;
use crate::logger::LogLevel;
use serde::Deserialize;
use std::path::Path;

/// Грамматика маркеров в interpreted definitions
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MarkerGrammar {
    /// Маркер requirement строки
    pub marker: String,
    /// Ключевое слово наследования: сканирование останавливается на первой строке с ним
    pub inheritance_keyword: String,
    /// Подстрока hint'а, означающая AS_CHILD
    pub child_hint: String,
    /// Префикс путей шаблонов
    pub template_prefix: String,
    /// Базовый node class (сам не входит в список наследников)
    pub base_node_type: String,
    /// Язык global classes, которые можно инстанцировать по имени
    pub interpreted_language: String,
}

impl Default for MarkerGrammar {
    fn default() -> Self {
        Self {
            marker: "# require_node:".to_string(),
            inheritance_keyword: "extends".to_string(),
            child_hint: "as child".to_string(),
            template_prefix: "res://".to_string(),
            base_node_type: "Node".to_string(),
            interpreted_language: "GDScript".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct RequireNodeConfig {
    pub grammar: MarkerGrammar,
    pub log_level: LogLevel,
}

impl RequireNodeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Загружает конфиг с диска; отсутствующий файл → defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RequireNodeConfig::default();
        assert_eq!(config.grammar.marker, "# require_node:");
        assert_eq!(config.grammar.inheritance_keyword, "extends");
        assert_eq!(config.grammar.template_prefix, "res://");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RequireNodeConfig::from_toml_str(
            r#"
            log_level = "debug"

            [grammar]
            marker = "%% needs:"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.grammar.marker, "%% needs:");
        assert_eq!(config.grammar.child_hint, "as child");
        assert_eq!(config.grammar.base_node_type, "Node");
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let result = RequireNodeConfig::from_toml_str("log_level = \"loud\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = RequireNodeConfig::load(Path::new("definitely/not/here/require_node.toml")).unwrap();
        assert_eq!(config, RequireNodeConfig::default());
    }
}

//! Error types
//!
//! Ни одна из этих ошибок не фатальна: supervisor логирует и идёт дальше.

/// Requirement не удалось превратить в companion node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Class не существует, не является Node или не создаётся без аргументов
    #[error("unable to create the specified node '{class}'")]
    Instantiate { class: String },

    /// Global script class найден, но его скрипт не загрузился / не дал Node
    #[error("unable to create the specified node '{class}' from script '{path}'")]
    ScriptInstantiate { class: String, path: String },

    /// Шаблон не загрузился или не инстанцировался
    #[error("unable to create the specified scene '{path}'")]
    TemplateLoad { path: String },

    /// Текст маркера не совпал ни с одним известным target
    #[error("no node type, global class or template matches '{target}'")]
    Unmatched { target: String },
}

impl ResolveError {
    /// Unmatched — ожидаемая ситуация (опечатка в комментарии), не ошибка редактора
    pub fn is_silent(&self) -> bool {
        matches!(self, ResolveError::Unmatched { .. })
    }
}

/// Мутация дерева отклонена
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("no scene is being edited")]
    NoEditedScene,

    #[error("can not change scene root node '{node}'")]
    SceneRootWrap { node: String },

    /// Узел освобождён между notification и обработкой
    #[error("node is no longer valid")]
    StaleNode,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

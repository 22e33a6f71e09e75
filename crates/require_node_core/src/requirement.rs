//! Requirement declarations — что скрипт узла требует от дерева
//!
//! Два вида definition:
//! - `Compiled`: метаданные заданы явно (таблица `RequirementRegistry`), без reflection
//! - `Interpreted`: исходник GDScript, requirements вытаскиваются парсером маркеров

use std::collections::HashMap;
use std::fmt;

/// Куда вставлять companion node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Новый child целевого узла
    AsChild,
    /// Новый parent между узлом и scene root
    AsAncestor,
}

impl Placement {
    pub fn from_as_child(as_child: bool) -> Self {
        if as_child {
            Placement::AsChild
        } else {
            Placement::AsAncestor
        }
    }

    pub fn is_child(self) -> bool {
        self == Placement::AsChild
    }
}

impl Default for Placement {
    fn default() -> Self {
        Placement::AsChild
    }
}

/// Чем удовлетворяется requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementTarget {
    /// Конкретный node class, создаётся через class registry (без аргументов)
    NodeType(String),
    /// Путь к сцене-шаблону (`res://...tscn`)
    Template(String),
    /// Сырой текст из маркера: built-in class, global class или путь шаблона.
    /// Разрешается resolver'ом по приоритету.
    Convention(String),
}

impl RequirementTarget {
    pub fn as_str(&self) -> &str {
        match self {
            RequirementTarget::NodeType(name) => name,
            RequirementTarget::Template(path) => path,
            RequirementTarget::Convention(text) => text,
        }
    }
}

impl fmt::Display for RequirementTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementTarget::NodeType(name) => write!(f, "type '{}'", name),
            RequirementTarget::Template(path) => write!(f, "template '{}'", path),
            RequirementTarget::Convention(text) => write!(f, "'{}'", text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub target: RequirementTarget,
    pub placement: Placement,
}

impl Requirement {
    pub fn node_type(name: impl Into<String>, placement: Placement) -> Self {
        Self {
            target: RequirementTarget::NodeType(name.into()),
            placement,
        }
    }

    pub fn template(path: impl Into<String>, placement: Placement) -> Self {
        Self {
            target: RequirementTarget::Template(path.into()),
            placement,
        }
    }

    pub fn convention(text: impl Into<String>, placement: Placement) -> Self {
        Self {
            target: RequirementTarget::Convention(text.into()),
            placement,
        }
    }

    /// Compiled requirement из пары (target, as_child): строка с префиксом
    /// шаблона → `Template`, иначе → `NodeType`
    pub fn declared(target: &str, as_child: bool, template_prefix: &str) -> Self {
        let placement = Placement::from_as_child(as_child);
        if target.starts_with(template_prefix) {
            Self::template(target, placement)
        } else {
            Self::node_type(target, placement)
        }
    }
}

/// Definition, прикреплённый к узлу (script / extension class)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Compiled {
        class_name: String,
        requirements: Vec<Requirement>,
    },
    Interpreted {
        path: String,
        source: String,
    },
}

impl Definition {
    /// Человекочитаемое имя для логов
    pub fn label(&self) -> &str {
        match self {
            Definition::Compiled { class_name, .. } => class_name,
            Definition::Interpreted { path, .. } => path,
        }
    }
}

/// Compiled class, который объявляет свои requirements.
/// Замена C#-атрибутов `[RequireNode<T>]` / `[RequireNode(path)]`.
pub trait RequireNodes {
    /// Имя класса в ClassDB (или global script class name)
    const CLASS_NAME: &'static str;

    fn requirements() -> Vec<Requirement>;
}

/// Таблица метаданных compiled definitions: class name → requirements
#[derive(Debug, Default, Clone)]
pub struct RequirementRegistry {
    classes: HashMap<String, Vec<Requirement>>,
}

impl RequirementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: RequireNodes>(&mut self) {
        self.register_requirements(T::CLASS_NAME, T::requirements());
    }

    /// Повторная регистрация класса заменяет его requirements целиком
    pub fn register_requirements(&mut self, class_name: &str, requirements: Vec<Requirement>) {
        self.classes.insert(class_name.to_string(), requirements);
    }

    /// Добавляет один requirement в конец списка класса (порядок объявления сохраняется)
    pub fn push(&mut self, class_name: &str, requirement: Requirement) {
        self.classes
            .entry(class_name.to_string())
            .or_default()
            .push(requirement);
    }

    pub fn unregister(&mut self, class_name: &str) -> bool {
        self.classes.remove(class_name).is_some()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn definition_for(&self, class_name: &str) -> Option<Definition> {
        self.classes
            .get(class_name)
            .map(|requirements| Definition::Compiled {
                class_name: class_name.to_string(),
                requirements: requirements.clone(),
            })
    }
}

//! Declaration Resolver — requirement → instantiated companion node
//!
//! Каждый requirement разрешается независимо: ошибка одного не мешает остальным.
//! Результат всегда одной длины со списком requirements и в том же порядке.

use crate::config::MarkerGrammar;
use crate::error::ResolveError;
use crate::host::NodeFactory;
use crate::marker::parse_markers;
use crate::requirement::{Definition, Placement, Requirement, RequirementTarget};

/// Созданный, но ещё не вставленный в дерево companion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Companion<N> {
    pub node: N,
    /// Имя, которое companion получит в дереве
    pub name: String,
    pub placement: Placement,
}

pub type Resolution<N> = Result<Companion<N>, ResolveError>;

/// Список requirements definition'а (для interpreted — через парсер маркеров)
pub fn requirements_of(definition: &Definition, grammar: &MarkerGrammar) -> Vec<Requirement> {
    match definition {
        Definition::Compiled { requirements, .. } => requirements.clone(),
        Definition::Interpreted { source, .. } => parse_markers(source, grammar),
    }
}

pub fn resolve<H: NodeFactory>(
    host: &mut H,
    definition: &Definition,
    grammar: &MarkerGrammar,
) -> Vec<Resolution<H::Node>> {
    requirements_of(definition, grammar)
        .iter()
        .map(|requirement| resolve_requirement(host, requirement, grammar))
        .collect()
}

pub fn resolve_requirement<H: NodeFactory>(
    host: &mut H,
    requirement: &Requirement,
    grammar: &MarkerGrammar,
) -> Resolution<H::Node> {
    let placement = requirement.placement;
    match &requirement.target {
        RequirementTarget::NodeType(class) => instantiate_class(host, class, placement),
        RequirementTarget::Template(path) => instantiate_template(host, path, placement),
        RequirementTarget::Convention(target) => resolve_convention(host, target, placement, grammar),
    }
}

/// Приоритет: built-in node class → global class того же языка → путь шаблона
fn resolve_convention<H: NodeFactory>(
    host: &mut H,
    target: &str,
    placement: Placement,
    grammar: &MarkerGrammar,
) -> Resolution<H::Node> {
    if is_node_type(host, target, grammar) {
        return instantiate_class(host, target, placement);
    }

    if let Some(path) = find_global_class(host, target, grammar) {
        return match host.instantiate_script(&path) {
            Some(node) => Ok(Companion {
                node,
                name: target.to_string(),
                placement,
            }),
            None => Err(ResolveError::ScriptInstantiate {
                class: target.to_string(),
                path,
            }),
        };
    }

    if target.starts_with(&grammar.template_prefix) {
        return instantiate_template(host, target, placement);
    }

    Err(ResolveError::Unmatched {
        target: target.to_string(),
    })
}

fn is_node_type<H: NodeFactory>(host: &H, class: &str, grammar: &MarkerGrammar) -> bool {
    class == grammar.base_node_type || host.is_node_class(class)
}

/// Путь скрипта global class'а, если он написан на interpreted языке и его base — Node
fn find_global_class<H: NodeFactory>(host: &H, target: &str, grammar: &MarkerGrammar) -> Option<String> {
    host.global_classes()
        .into_iter()
        .find(|class| {
            class.name == target
                && class.language == grammar.interpreted_language
                && is_node_type(host, &class.base, grammar)
        })
        .map(|class| class.path)
}

fn instantiate_class<H: NodeFactory>(
    host: &mut H,
    class: &str,
    placement: Placement,
) -> Resolution<H::Node> {
    host.instantiate_class(class)
        .map(|node| Companion {
            node,
            name: class.to_string(),
            placement,
        })
        .ok_or_else(|| ResolveError::Instantiate {
            class: class.to_string(),
        })
}

/// Companion из шаблона сохраняет имя своего root узла
fn instantiate_template<H: NodeFactory>(
    host: &mut H,
    path: &str,
    placement: Placement,
) -> Resolution<H::Node> {
    let error = || ResolveError::TemplateLoad {
        path: path.to_string(),
    };

    let node = host.instantiate_template(path).ok_or_else(error)?;
    let Some(name) = host.name(&node) else {
        host.discard(&node);
        return Err(error());
    };

    Ok(Companion {
        node,
        name,
        placement,
    })
}

//! Парсер маркеров в interpreted definitions
//!
//! Формат (одна декларация на строку, только выше строки с `extends`):
//!
//! ```text
//! # require_node: <target>[,<placement-hint>]
//! ```
//!
//! Hint пустой или содержит "as child" → AS_CHILD, любой другой → AS_ANCESTOR.
//! Нет hint'а вообще → AS_CHILD.

use crate::config::MarkerGrammar;
use crate::requirement::{Placement, Requirement};

/// Извлекает requirements из исходника, в порядке объявления
pub fn parse_markers(source: &str, grammar: &MarkerGrammar) -> Vec<Requirement> {
    let mut requirements = Vec::new();

    for line in source.lines() {
        if let Some(requirement) = parse_line(line, grammar) {
            requirements.push(requirement);
        }

        // Маркер на той же строке, что и extends, ещё учитывается
        if line.contains(&grammar.inheritance_keyword) {
            break;
        }
    }

    requirements
}

/// Разбирает одну строку; `None` если маркера нет или target пустой
pub fn parse_line(line: &str, grammar: &MarkerGrammar) -> Option<Requirement> {
    let (_, rest) = line.split_once(&grammar.marker)?;

    let mut fields = rest.trim().split(',');
    let target = fields.next()?.trim();
    if target.is_empty() {
        return None;
    }

    let placement = match fields.next() {
        Some(hint) => parse_hint(hint, grammar),
        None => Placement::AsChild,
    };

    Some(Requirement::convention(target, placement))
}

// Нестрогое совпадение подстрокой: "add as child please" тоже AS_CHILD
fn parse_hint(hint: &str, grammar: &MarkerGrammar) -> Placement {
    Placement::from_as_child(hint.is_empty() || hint.contains(&grammar.child_hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::RequirementTarget;

    fn parse(source: &str) -> Vec<Requirement> {
        parse_markers(source, &MarkerGrammar::default())
    }

    #[test]
    fn test_plain_type_is_child() {
        let requirements = parse("# require_node: Sprite2D\nextends Node2D\n");
        assert_eq!(requirements.len(), 1);
        assert_eq!(
            requirements[0].target,
            RequirementTarget::Convention("Sprite2D".into())
        );
        assert_eq!(requirements[0].placement, Placement::AsChild);
    }

    #[test]
    fn test_parent_hint_is_ancestor() {
        let requirements = parse("# require_node: Sprite2D,as parent\nextends Node2D");
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].placement, Placement::AsAncestor);
    }

    #[test]
    fn test_empty_hint_is_child() {
        let requirements = parse("# require_node: res://foo.tscn,\nextends Node");
        assert_eq!(requirements.len(), 1);
        assert_eq!(
            requirements[0].target,
            RequirementTarget::Convention("res://foo.tscn".into())
        );
        assert_eq!(requirements[0].placement, Placement::AsChild);
    }

    #[test]
    fn test_child_hint_matches_by_substring() {
        let requirements = parse("# require_node: Timer, please add as child here");
        assert_eq!(requirements[0].placement, Placement::AsChild);
    }

    #[test]
    fn test_marker_without_target_is_skipped() {
        assert!(parse("# require_node:\n# require_node:   \n# require_node: ,as parent").is_empty());
    }

    #[test]
    fn test_scan_stops_at_extends() {
        let source = "\
# require_node: Timer
# require_node: Area2D,as parent
extends CharacterBody2D
# require_node: Sprite2D
";
        let requirements = parse(source);
        let targets: Vec<_> = requirements.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["Timer", "Area2D"]);
        assert_eq!(requirements[1].placement, Placement::AsAncestor);
    }

    #[test]
    fn test_lines_without_marker_are_ignored() {
        let source = "@tool\n# plain comment\n# require_node: Timer\nclass_name Foo\nextends Node";
        assert_eq!(parse(source).len(), 1);
    }

    #[test]
    fn test_custom_grammar() {
        let grammar = MarkerGrammar {
            marker: "## needs:".to_string(),
            child_hint: "child".to_string(),
            ..MarkerGrammar::default()
        };
        let requirements = parse_markers("## needs: Timer,child\n# require_node: Area2D", &grammar);
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].target.as_str(), "Timer");
        assert_eq!(requirements[0].placement, Placement::AsChild);
    }
}

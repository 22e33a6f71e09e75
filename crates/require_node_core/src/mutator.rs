//! Tree Mutator — вставка companion в живое дерево
//!
//! КРИТИЧНО:
//! - Хост переименовывает узлы при вставке/reparent; имена восстанавливаем явно
//! - Owner = edited scene root, иначе узел не сохранится в .tscn
//! - Handles проверяются непосредственно перед мутацией

use crate::error::PlacementError;
use crate::host::SceneTree;
use crate::requirement::Placement;
use crate::resolver::Companion;

/// Вставляет `companion` как child `node` с именем `name`
pub fn attach_child<H: SceneTree>(
    host: &mut H,
    node: &H::Node,
    companion: &H::Node,
    name: &str,
) -> Result<(), PlacementError> {
    let scene_root = host.edited_scene_root().ok_or(PlacementError::NoEditedScene)?;
    if !host.is_valid(node) || !host.is_valid(companion) {
        return Err(PlacementError::StaleNode);
    }
    let node_name = host.name(node).ok_or(PlacementError::StaleNode)?;

    host.add_child(node, companion);
    host.set_name(companion, name);
    // Вставка может задеть имя parent'а — возвращаем как было
    host.set_name(node, &node_name);
    host.set_owner(companion, &scene_root);

    Ok(())
}

/// Вставляет `new_parent` под scene root и переносит под него `child`
pub fn attach_ancestor<H: SceneTree>(
    host: &mut H,
    new_parent: &H::Node,
    child: &H::Node,
    name: &str,
) -> Result<(), PlacementError> {
    let scene_root = host.edited_scene_root().ok_or(PlacementError::NoEditedScene)?;
    if !host.is_valid(child) || !host.is_valid(new_parent) {
        return Err(PlacementError::StaleNode);
    }
    let child_name = host.name(child).ok_or(PlacementError::StaleNode)?;

    if *child == scene_root {
        return Err(PlacementError::SceneRootWrap { node: child_name });
    }

    host.add_child(&scene_root, new_parent);
    host.set_name(new_parent, name);
    host.set_owner(new_parent, &scene_root);

    host.reparent(child, new_parent);
    host.set_name(child, &child_name);

    Ok(())
}

/// Вставляет companion по его placement; отклонённый companion освобождается
pub fn place<H: SceneTree>(
    host: &mut H,
    node: &H::Node,
    companion: &Companion<H::Node>,
) -> Result<(), PlacementError> {
    let result = match companion.placement {
        Placement::AsChild => attach_child(host, node, &companion.node, &companion.name),
        Placement::AsAncestor => attach_ancestor(host, &companion.node, node, &companion.name),
    };

    if result.is_err() && host.is_valid(&companion.node) {
        host.discard(&companion.node);
    }

    result
}

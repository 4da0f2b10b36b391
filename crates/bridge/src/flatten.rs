use controller::{NativeCommand, WorkspaceScope};
use shared::domain::{Cue, CueNode, CuePath, NESTING_MARKER, NO_NUMBER, UNNAMED};
use tracing::{debug, warn};

use crate::{Bridge, CommandSerializer};

/// Fetches the workspace's cue tree and flattens it.
///
/// A failed fetch is logged and reported as an empty list.
pub async fn flatten(
    serializer: &CommandSerializer,
    scope: &WorkspaceScope,
    max_depth: usize,
) -> Vec<Cue> {
    let command = NativeCommand::CueTree {
        scope: scope.clone(),
    };
    match serializer
        .execute(&command)
        .await
        .and_then(|reply| reply.into_tree(&command))
    {
        Ok(tree) => {
            let cues = flatten_tree(&tree, max_depth);
            debug!(count = cues.len(), "flattened cue list");
            cues
        }
        Err(error) => {
            warn!(%error, "failed to fetch cue tree");
            Vec::new()
        }
    }
}

/// Depth-first flattening of a cue tree.
///
/// Group cues are descended while their depth is below `max_depth`; anything
/// deeper is left out. Cues without an id are not addressable and are dropped,
/// though their children are still visited.
pub fn flatten_tree(tree: &[CueNode], max_depth: usize) -> Vec<Cue> {
    let mut walk = Walk {
        max_depth,
        cues: Vec::new(),
        skipped: 0,
    };
    walk.visit(tree, None);
    if walk.skipped > 0 {
        warn!(
            skipped = walk.skipped,
            max_depth, "cues nested deeper than the group depth limit were left out"
        );
    }
    walk.cues
}

struct Walk {
    max_depth: usize,
    cues: Vec<Cue>,
    skipped: usize,
}

impl Walk {
    fn visit(&mut self, nodes: &[CueNode], parent: Option<&CuePath>) {
        for (offset, node) in nodes.iter().enumerate() {
            let index = u32::try_from(offset + 1).unwrap_or(u32::MAX);
            let position = match parent {
                Some(path) => path.child(index),
                None => CuePath::root(index),
            };
            let depth = position.depth();

            if !node.id.trim().is_empty() {
                self.cues.push(to_cue(node, position.clone(), depth));
            }

            if node.is_group() && !node.children.is_empty() {
                if depth < self.max_depth {
                    self.visit(&node.children, Some(&position));
                } else {
                    self.skipped += count_nodes(&node.children);
                }
            }
        }
    }
}

fn to_cue(node: &CueNode, position: CuePath, depth: usize) -> Cue {
    let name = if node.name.is_empty() {
        UNNAMED.to_string()
    } else {
        node.name.clone()
    };
    let number = if node.number.trim().is_empty() {
        NO_NUMBER.to_string()
    } else {
        node.number.clone()
    };
    Cue {
        id: node.id.clone(),
        number,
        display_name: format!("{}{name}", NESTING_MARKER.repeat(depth)),
        original_name: name,
        position,
        depth,
        cue_type: node.cue_type.clone(),
    }
}

fn count_nodes(nodes: &[CueNode]) -> usize {
    nodes
        .iter()
        .map(|node| 1 + count_nodes(&node.children))
        .sum()
}

impl Bridge {
    /// Fresh flatten of the connected workspace; empty when disconnected.
    pub async fn list_cues(&self) -> Vec<Cue> {
        let Some((_, scope)) = self.connected_scope() else {
            return Vec::new();
        };
        flatten(self.serializer(), &scope, self.config().max_group_depth).await
    }
}

#[cfg(test)]
#[path = "tests/flatten_tests.rs"]
mod tests;

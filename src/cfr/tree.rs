//! Public game tree construction.
//!
//! A tree is unrolled once per resolve and is read-only afterwards. Nodes
//! live in a flat vector (index 0 is the root) so per-node solver state can
//! be kept in parallel arrays indexed by node id.

use crate::cfr::game::{Game, PublicState};

/// A single public state in an unrolled tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// The public state at this node.
    pub state: PublicState,
    /// Parent node index; `None` only for the root.
    pub parent: Option<usize>,
    /// Child node indices, positionally aligned with
    /// `game.legal_actions(&state)` (ascending action id).
    pub children: Vec<usize>,
    /// Distance from the tree root.
    pub depth: usize,
}

impl Node {
    /// A node with no children: either terminal or cut off by `max_depth`.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// An unrolled tree of reachable public states.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True only for a tree that was never unrolled.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Maximum node depth.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Access a node by index.
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// The root node.
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Iterate over all nodes in insertion (BFS) order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// A leaf whose state is *not* terminal: the depth cutoff was reached and
    /// its continuation must come from the value net.
    pub fn is_pseudo_leaf<G: Game>(&self, game: &G, index: usize) -> bool {
        let node = &self.nodes[index];
        node.is_leaf() && !game.is_terminal(&node.state)
    }
}

/// Unroll the public tree from `root` down to `max_depth`.
///
/// Expansion is breadth-first; every non-terminal node above the cutoff gets
/// one child per legal action, in ascending action-id order. Terminal states
/// are always leaves.
///
/// `transition` cannot fail here because children are generated from
/// `legal_actions` directly; a game that violates its own contract would be
/// a programming error, which we surface rather than swallow.
pub fn unroll<G: Game>(game: &G, root: PublicState, max_depth: usize) -> Tree {
    let mut nodes = vec![Node {
        state: root,
        parent: None,
        children: Vec::new(),
        depth: 0,
    }];

    let mut next = 0;
    while next < nodes.len() {
        let (state, depth) = (nodes[next].state, nodes[next].depth);
        if depth < max_depth && !game.is_terminal(&state) {
            for action in game.legal_actions(&state) {
                let child_state = game
                    .transition(&state, action)
                    .unwrap_or_else(|e| panic!("game produced illegal action: {}", e));
                let child_index = nodes.len();
                nodes.push(Node {
                    state: child_state,
                    parent: Some(next),
                    children: Vec::new(),
                    depth: depth + 1,
                });
                nodes[next].children.push(child_index);
            }
        }
        next += 1;
    }

    log::trace!("unrolled tree: {} nodes, depth {}", nodes.len(), max_depth);
    Tree { nodes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::kuhn::KuhnPoker;

    #[test]
    fn test_unroll_depth_bound() {
        let game = KuhnPoker::default();
        for max_depth in 0..5 {
            let tree = unroll(&game, game.initial_state(), max_depth);
            assert!(tree.depth() <= max_depth);
            for node in tree.nodes() {
                assert!(node.depth <= max_depth);
            }
        }
    }

    #[test]
    fn test_unroll_kuhn_full_tree() {
        let game = KuhnPoker::default();
        let tree = unroll(&game, game.initial_state(), 100);

        // Kuhn public tree: root, p, b, pp, pb, bp, bb, pbp, pbb = 9 nodes.
        assert_eq!(tree.len(), 9);
        assert_eq!(tree.depth(), 3);

        // Every non-root node has exactly one parent, and the parent's
        // children list points back at it.
        for (i, node) in tree.nodes().enumerate().skip(1) {
            let parent = node.parent.expect("non-root node without parent");
            assert!(tree.node(parent).children.contains(&i));
        }
    }

    #[test]
    fn test_children_follow_action_order() {
        let game = KuhnPoker::default();
        let tree = unroll(&game, game.initial_state(), 2);
        for (i, node) in tree.nodes().enumerate() {
            if node.is_leaf() {
                continue;
            }
            let actions = game.legal_actions(&node.state);
            assert_eq!(node.children.len(), actions.len());
            for (slot, (&child, &action)) in
                node.children.iter().zip(actions.iter()).enumerate()
            {
                let expected = game.transition(&node.state, action).unwrap();
                assert_eq!(
                    tree.node(child).state,
                    expected,
                    "child {} of node {} out of order",
                    slot,
                    i
                );
            }
        }
    }

    #[test]
    fn test_node_count_closed_form() {
        // With a constant branching factor of 2 and no terminals within the
        // cutoff, node count is 2^(d+1) - 1.
        let game = KuhnPoker::default();
        let tree = unroll(&game, game.initial_state(), 2);
        // Depth 2 in Kuhn: 1 + 2 + 4 = 7 nodes (no terminal before round 2
        // is reached, "pp"/"bp"/"bb" terminate exactly at depth 2).
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn test_pseudo_leaf_detection() {
        let game = KuhnPoker::default();
        let tree = unroll(&game, game.initial_state(), 1);
        // Depth-1 leaves "p" and "b" are cut off, not terminal.
        assert!(tree.is_pseudo_leaf(&game, 1));
        assert!(tree.is_pseudo_leaf(&game, 2));
        assert!(!tree.is_pseudo_leaf(&game, 0));
    }
}

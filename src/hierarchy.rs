//! Role tree views for administrative displays.
//!
//! A [`RoleHierarchyTree`] renders a role, or all roles granted to a user, as a tree:
//! role nodes have their contained roles and their privileges as children. The view is
//! read-only and built from the live graph on demand.

use crate::{
    error::{Error, Result},
    graph::PolicyGraph,
    role::{Role, RoleKey},
};
use log::debug;
#[cfg(feature = "persistence")]
use serde::{Deserialize, Serialize};

/// Version of the tree layout, bumped when nodes change shape.
pub const TREE_SCHEMA_VERSION: &str = "1.0.0";

/// Configuration for role tree rendering.
#[derive(Debug, Clone)]
pub struct HierarchyConfig {
    /// Nodes at this depth are not expanded further (root = 0).
    pub max_depth: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self { max_depth: 10 }
    }
}

/// Builder for creating hierarchy configurations.
#[derive(Debug, Default)]
pub struct HierarchyConfigBuilder {
    config: HierarchyConfig,
}

impl HierarchyConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum rendered depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn build(self) -> HierarchyConfig {
        self.config
    }
}

/// What a tree node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(Serialize, Deserialize))]
pub enum NodeKind {
    Role,
    Privilege,
}

/// A single node of a role tree.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "persistence", derive(Serialize, Deserialize))]
pub struct RoleTreeNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    /// Depth in the tree (root = 0)
    pub depth: usize,
    pub children: Vec<RoleTreeNode>,
    /// Number of nodes below this one
    pub descendant_count: usize,
}

impl RoleTreeNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: NodeKind, depth: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            depth,
            children: Vec::new(),
            descendant_count: 0,
        }
    }

    /// Add a child node.
    pub fn add_child(&mut self, child: RoleTreeNode) {
        self.descendant_count += child.descendant_count + 1;
        self.children.push(child);
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Ids of every node below this one, depth first.
    pub fn descendant_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for child in &self.children {
            ids.push(child.id.clone());
            ids.extend(child.descendant_ids());
        }
        ids
    }

    fn deepest(&self) -> usize {
        self.children
            .iter()
            .map(RoleTreeNode::deepest)
            .max()
            .unwrap_or(self.depth)
    }

    fn find(&self, id: &str, kind: NodeKind) -> Option<&RoleTreeNode> {
        if self.id == id && self.kind == kind {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id, kind))
    }
}

/// Metadata about a rendered tree.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "persistence", derive(Serialize, Deserialize))]
pub struct TreeMetadata {
    #[cfg(feature = "persistence")]
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub schema_version: String,
}

/// A rendered role tree. Rendering one role yields a single root; rendering a user
/// yields one root per granted role.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "persistence", derive(Serialize, Deserialize))]
pub struct RoleHierarchyTree {
    pub roots: Vec<RoleTreeNode>,
    /// Total number of nodes in the tree
    pub total_nodes: usize,
    /// Depth of the deepest node
    pub max_depth: usize,
    pub metadata: TreeMetadata,
}

impl RoleHierarchyTree {
    pub fn new(roots: Vec<RoleTreeNode>) -> Self {
        let total_nodes = roots.iter().map(|root| root.descendant_count + 1).sum();
        let max_depth = roots.iter().map(RoleTreeNode::deepest).max().unwrap_or(0);

        Self {
            roots,
            total_nodes,
            max_depth,
            metadata: TreeMetadata {
                #[cfg(feature = "persistence")]
                generated_at: chrono::Utc::now(),
                schema_version: TREE_SCHEMA_VERSION.to_string(),
            },
        }
    }

    /// Every node in the tree, depth first.
    pub fn flatten(&self) -> Vec<&RoleTreeNode> {
        fn walk<'a>(node: &'a RoleTreeNode, out: &mut Vec<&'a RoleTreeNode>) {
            out.push(node);
            for child in &node.children {
                walk(child, out);
            }
        }

        let mut nodes = Vec::with_capacity(self.total_nodes);
        for root in &self.roots {
            walk(root, &mut nodes);
        }
        nodes
    }

    /// First role node with `role_id`.
    pub fn find_role(&self, role_id: &str) -> Option<&RoleTreeNode> {
        self.roots
            .iter()
            .find_map(|root| root.find(role_id, NodeKind::Role))
    }

    /// First privilege node with `privilege_id`.
    pub fn find_privilege(&self, privilege_id: &str) -> Option<&RoleTreeNode> {
        self.roots
            .iter()
            .find_map(|root| root.find(privilege_id, NodeKind::Privilege))
    }
}

/// Renders role trees from a policy graph.
pub struct RoleTreeBuilder<'a> {
    graph: &'a PolicyGraph,
    config: HierarchyConfig,
}

impl<'a> RoleTreeBuilder<'a> {
    pub fn new(graph: &'a PolicyGraph, config: HierarchyConfig) -> Self {
        Self { graph, config }
    }

    /// Render the tree rooted at role `key`.
    pub fn build_for_role(&self, key: &RoleKey) -> Result<RoleHierarchyTree> {
        let role = self
            .graph
            .role(key)
            .ok_or_else(|| Error::RoleNotFound(key.clone()))?;
        let mut path = vec![key.clone()];
        let root = self.role_node(&role, 0, &mut path);
        Ok(RoleHierarchyTree::new(vec![root]))
    }

    /// Render the roles granted to `user_id` by its mapping in `source`.
    pub fn build_for_user(&self, user_id: &str, source: &str) -> Result<RoleHierarchyTree> {
        if !self.graph.contains_user(user_id) {
            return Err(Error::UserNotFound(user_id.to_string()));
        }

        let mut roots = Vec::new();
        if let Some(mapping) = self.graph.mapping(user_id, source) {
            for role_id in &mapping.roles {
                let key = RoleKey::new(role_id.clone(), source);
                match self.graph.role(&key) {
                    Some(role) => {
                        let mut path = vec![key];
                        roots.push(self.role_node(&role, 0, &mut path));
                    }
                    None => debug!("User '{user_id}' is mapped to unknown role '{key}'"),
                }
            }
        }

        Ok(RoleHierarchyTree::new(roots))
    }

    fn role_node(&self, role: &Role, depth: usize, path: &mut Vec<RoleKey>) -> RoleTreeNode {
        let mut node = RoleTreeNode::new(role.id(), role.name.clone(), NodeKind::Role, depth);
        if depth >= self.config.max_depth {
            return node;
        }

        for key in &role.contained_roles {
            if path.contains(key) {
                continue;
            }
            let Some(child) = self.graph.role(key) else {
                debug!("Role '{}' contains unknown role '{key}'", role.key);
                continue;
            };
            path.push(key.clone());
            node.add_child(self.role_node(&child, depth + 1, path));
            path.pop();
        }

        for privilege_id in &role.privilege_ids {
            match self.graph.privilege(privilege_id) {
                Some(privilege) => node.add_child(RoleTreeNode::new(
                    privilege.id,
                    privilege.name,
                    NodeKind::Privilege,
                    depth + 1,
                )),
                None => debug!("Role '{}' references unknown privilege '{privilege_id}'", role.key),
            }
        }

        node
    }
}

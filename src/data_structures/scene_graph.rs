//! Scene graph and hierarchical scene organization.
//!
//! Nodes live in an arena ([`NodeTree`]) and are addressed by [`NodeId`].
//! Loaders build a detached tree, post-process it, and then move it under a
//! parent of the live [`Scene`] with [`NodeTree::attach`], which hands back an
//! [`AttachedModel`] for translating ids of the loaded tree into scene ids.

use std::sync::Arc;

use anyhow::{Context, bail};
use cgmath::SquareMatrix;
use serde::Deserialize;

use crate::{
    data_structures::{geometry::Geometry, instance::Instance, material::StandardMaterial},
    resources::environment::EnvironmentMap,
};

/// Index of a node inside its [`NodeTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Light that illuminates every object equally.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AmbientLight {
    /// `0xRRGGBB`
    pub color: u32,
    pub intensity: f32,
}

impl AmbientLight {
    pub fn new(color: u32, intensity: f32) -> Self {
        Self { color, intensity }
    }

    /// Colour as linear `[r, g, b]` in `0.0..=1.0`, scaled by intensity.
    pub fn radiance(&self) -> [f32; 3] {
        let channel = |shift: u32| ((self.color >> shift) & 0xff) as f32 / 255.0 * self.intensity;
        [channel(16), channel(8), channel(0)]
    }
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self::new(0xffffff, 1.0)
    }
}

/// A drawable primitive: shared geometry plus its own material.
#[derive(Clone, Debug)]
pub struct MeshNode {
    pub geometry: Arc<Geometry>,
    pub material: StandardMaterial,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Group,
    Mesh(MeshNode),
    AmbientLight(AmbientLight),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub local: Instance,
    /// When set, replaces the TRS in `local` (used for tracker-driven anchors).
    pub matrix: Option<cgmath::Matrix4<f32>>,
    pub visible: bool,
    pub kind: NodeKind,
    world: cgmath::Matrix4<f32>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            local: Instance::new(),
            matrix: None,
            visible: true,
            kind,
            world: cgmath::Matrix4::identity(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: &str) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn mesh(name: &str, geometry: Arc<Geometry>, material: StandardMaterial) -> Self {
        Self::new(name, NodeKind::Mesh(MeshNode { geometry, material }))
    }

    pub fn ambient_light(light: AmbientLight) -> Self {
        Self::new("ambient_light", NodeKind::AmbientLight(light))
    }

    pub fn with_local(mut self, local: Instance) -> Self {
        self.local = local;
        self
    }

    pub fn mesh_ref(&self) -> Option<&MeshNode> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut MeshNode> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn local_matrix(&self) -> cgmath::Matrix4<f32> {
        self.matrix.unwrap_or_else(|| self.local.to_matrix())
    }

    /// World matrix as of the last [`NodeTree::update_world_transforms`].
    pub fn world_matrix(&self) -> cgmath::Matrix4<f32> {
        self.world
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena of nodes rooted at [`NodeTree::root`].
#[derive(Clone, Debug)]
pub struct NodeTree {
    nodes: Vec<Node>,
}

impl NodeTree {
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Node::group(root_name)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.nodes[0]
    }

    pub fn add(&mut self, parent: NodeId, mut node: Node) -> anyhow::Result<NodeId> {
        if parent.0 >= self.nodes.len() {
            bail!(
                "cannot add '{}': parent {} is out of bounds for {} nodes",
                node.name,
                parent.0,
                self.nodes.len()
            );
        }
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Moves every node of `tree` into `self`, making its root a child of `parent`.
    pub fn attach(&mut self, parent: NodeId, tree: NodeTree) -> anyhow::Result<AttachedModel> {
        self.node(parent)
            .with_context(|| format!("cannot attach '{}': no node {}", tree.nodes[0].name, parent.0))?;
        let offset = self.nodes.len();
        let len = tree.nodes.len();
        for mut node in tree.nodes {
            node.parent = Some(node.parent.map_or(parent, |p| NodeId(p.0 + offset)));
            node.children.iter_mut().for_each(|c| c.0 += offset);
            self.nodes.push(node);
        }
        let root = NodeId(offset);
        self.nodes[parent.0].children.push(root);
        Ok(AttachedModel { root, offset, len })
    }

    /// Unlinks `id` (and its subtree) from its parent. The nodes stay addressable.
    pub fn detach(&mut self, id: NodeId) -> anyhow::Result<()> {
        if id == self.root() {
            bail!("the root node cannot be detached");
        }
        let node = self
            .nodes
            .get_mut(id.0)
            .with_context(|| format!("no node {}", id.0))?;
        if let Some(parent) = node.parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
        Ok(())
    }

    /// Whether `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root() {
                return true;
            }
            match self.node(current).and_then(|n| n.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }

    /// `id` and all nodes below it, in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    pub fn traverse(&self, id: NodeId, mut f: impl FnMut(NodeId, &Node)) {
        for current in self.descendants(id) {
            f(current, &self.nodes[current.0]);
        }
    }

    pub fn traverse_mut(&mut self, id: NodeId, mut f: impl FnMut(&mut Node)) {
        for current in self.descendants(id) {
            f(&mut self.nodes[current.0]);
        }
    }

    /// Recomputes `parent * local` for every node reachable from the root.
    pub fn update_world_transforms(&mut self) {
        let mut stack = vec![(self.root(), cgmath::Matrix4::identity())];
        while let Some((id, parent_world)) = stack.pop() {
            let node = &mut self.nodes[id.0];
            node.world = parent_world * node.local_matrix();
            let world = node.world;
            stack.extend(node.children.iter().map(|c| (*c, world)));
        }
    }

    pub fn world_matrix(&self, id: NodeId) -> Option<cgmath::Matrix4<f32>> {
        self.node(id).map(Node::world_matrix)
    }

    /// Visible only if the node and all its ancestors are visible.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(cid) = current {
            match self.node(cid) {
                Some(node) if node.visible => current = node.parent,
                _ => return false,
            }
        }
        true
    }
}

/// Ids of a tree after it was moved into a scene by [`NodeTree::attach`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachedModel {
    root: NodeId,
    offset: usize,
    len: usize,
}

impl AttachedModel {
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Scene id of the node that had id `local` in the detached tree.
    pub fn resolve(&self, local: NodeId) -> Option<NodeId> {
        (local.0 < self.len).then(|| NodeId(local.0 + self.offset))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        (self.offset..self.offset + self.len).contains(&id.0)
    }
}

/// The live scene: node hierarchy plus scene-wide lighting state.
#[derive(Clone, Debug)]
pub struct Scene {
    pub graph: NodeTree,
    pub environment: Option<Arc<EnvironmentMap>>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            graph: NodeTree::new("scene"),
            environment: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.graph.root()
    }

    pub fn add(&mut self, node: Node) -> anyhow::Result<NodeId> {
        self.graph.add(self.graph.root(), node)
    }

    /// Meshes reachable from the root, with their ids.
    pub fn meshes(&self) -> Vec<(NodeId, &MeshNode)> {
        self.graph
            .descendants(self.root())
            .into_iter()
            .filter_map(|id| self.graph.node(id)?.mesh_ref().map(|m| (id, m)))
            .collect()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

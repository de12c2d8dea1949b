use std::{collections::HashMap, sync::Arc};

use anyhow::bail;

use crate::{
    animation::{action::AnimationAction, clip::AnimationClip},
    data_structures::{
        instance::Instance,
        scene_graph::{AttachedModel, NodeId, Scene},
    },
};

/// Handle to an action owned by an [`AnimationMixer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(usize);

#[derive(Debug, Clone)]
struct Binding {
    track_index: usize,
    node: NodeId,
}

#[derive(Debug, Clone)]
struct BoundAction {
    action: AnimationAction,
    bindings: Vec<Binding>,
}

/// Drives the actions of one model and writes their poses into the scene.
///
/// A mixer can only be bound to a model that is already part of the scene,
/// so every track resolves to a live node.
#[derive(Debug)]
pub struct AnimationMixer {
    model: AttachedModel,
    actions: Vec<BoundAction>,
    rest_pose: HashMap<NodeId, Instance>,
    time: f32,
}

impl AnimationMixer {
    pub fn bind(scene: &Scene, model: AttachedModel) -> anyhow::Result<Self> {
        if !scene.graph.is_attached(model.root()) {
            bail!(
                "animation root {} is not attached to the scene",
                model.root().index()
            );
        }
        Ok(Self {
            model,
            actions: Vec::new(),
            rest_pose: HashMap::new(),
            time: 0.0,
        })
    }

    pub fn root(&self) -> NodeId {
        self.model.root()
    }

    /// Creates an action for `clip`. Tracks whose target is not part of the
    /// bound model are skipped.
    pub fn clip_action(&mut self, scene: &Scene, clip: Arc<AnimationClip>) -> ActionId {
        let mut bindings = Vec::with_capacity(clip.tracks.len());
        for (track_index, track) in clip.tracks.iter().enumerate() {
            let node = self
                .model
                .resolve(track.target)
                .and_then(|id| scene.graph.node(id).map(|node| (id, node)));
            match node {
                Some((id, node)) => {
                    self.rest_pose.entry(id).or_insert(node.local);
                    bindings.push(Binding {
                        track_index,
                        node: id,
                    });
                }
                None => log::warn!(
                    "clip '{}' track {} targets node {} outside of the bound model",
                    clip.name,
                    track_index,
                    track.target.index()
                ),
            }
        }
        self.actions.push(BoundAction {
            action: AnimationAction::new(clip),
            bindings,
        });
        ActionId(self.actions.len() - 1)
    }

    pub fn action(&self, id: ActionId) -> Option<&AnimationAction> {
        self.actions.get(id.0).map(|b| &b.action)
    }

    pub fn action_mut(&mut self, id: ActionId) -> Option<&mut AnimationAction> {
        self.actions.get_mut(id.0).map(|b| &mut b.action)
    }

    pub fn actions(&self) -> impl Iterator<Item = &AnimationAction> {
        self.actions.iter().map(|b| &b.action)
    }

    /// Total time advanced through [`update`](Self::update).
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Advances all actions by `dt` seconds and poses the bound nodes.
    ///
    /// Actions that stop contributing this frame put their nodes back into
    /// the pose they had when the action was created.
    pub fn update(&mut self, dt: f32, scene: &mut Scene) {
        self.time += dt;

        for bound in &mut self.actions {
            let was_running = bound.action.is_running();
            bound.action.update(dt);
            if was_running && !bound.action.is_running() {
                for binding in &bound.bindings {
                    if let (Some(node), Some(rest)) = (
                        scene.graph.node_mut(binding.node),
                        self.rest_pose.get(&binding.node),
                    ) {
                        node.local = *rest;
                    }
                }
            }
        }

        for bound in &self.actions {
            if !bound.action.is_running() {
                continue;
            }
            let clip = bound.action.clip();
            for binding in &bound.bindings {
                if let Some(node) = scene.graph.node_mut(binding.node) {
                    clip.tracks[binding.track_index].apply(bound.action.time, &mut node.local);
                }
            }
        }
    }
}

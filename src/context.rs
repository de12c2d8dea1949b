use anyhow::{Context, bail};

use crate::{
    camera::Camera,
    data_structures::scene_graph::{Node, NodeId, Scene},
    render::RendererSettings,
    resources::AssetSource,
    tracker::{AnchorEvent, ImageTracker},
};

/// A tracked-image-relative coordinate frame. Content added below `group`
/// follows the target while it is visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Anchor {
    pub target_index: usize,
    pub group: NodeId,
}

/// Everything an AR session owns: tracker, scene, camera and renderer settings.
#[derive(Debug)]
pub struct SessionContext<T: ImageTracker> {
    tracker: T,
    pub scene: Scene,
    pub camera: Camera,
    pub settings: RendererSettings,
    anchors: Vec<Anchor>,
    target_count: usize,
    started: bool,
}

impl<T: ImageTracker> SessionContext<T> {
    pub fn new(mut tracker: T, descriptor: &[u8]) -> anyhow::Result<Self> {
        let target_count = tracker
            .load_targets(descriptor)
            .context("tracker rejected the target descriptor")?;
        let camera = Camera::new(tracker.projection());
        log::info!("tracking session with {} image target(s)", target_count);
        Ok(Self {
            tracker,
            scene: Scene::new(),
            camera,
            settings: RendererSettings::default(),
            anchors: Vec::new(),
            target_count,
            started: false,
        })
    }

    /// Loads the target descriptor from `source` and creates the session.
    pub async fn connect<S: AssetSource>(
        tracker: T,
        source: &S,
        descriptor_path: &str,
    ) -> anyhow::Result<Self> {
        let descriptor = source.load_binary(descriptor_path).await?;
        Self::new(tracker, &descriptor)
            .with_context(|| format!("cannot start a session from {descriptor_path}"))
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Creates an anchor for target `target_index`. The anchor group stays
    /// hidden until the target is first tracked.
    pub fn add_anchor(&mut self, target_index: usize) -> anyhow::Result<Anchor> {
        if target_index >= self.target_count {
            bail!(
                "no image target {} (descriptor holds {})",
                target_index,
                self.target_count
            );
        }
        let mut group = Node::group(&format!("anchor_{target_index}"));
        group.visible = false;
        let group = self.scene.add(group)?;
        let anchor = Anchor {
            target_index,
            group,
        };
        self.anchors.push(anchor);
        Ok(anchor)
    }

    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.tracker.start().await.context("image tracker failed to start")?;
        self.started = true;
        log::info!("image tracking started");
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.started {
            self.tracker.stop();
            self.started = false;
            log::info!("image tracking stopped");
        }
    }

    /// Copies target poses onto the anchor groups and refreshes world transforms.
    pub fn sync_anchors(&mut self) -> Vec<AnchorEvent> {
        let mut events = Vec::new();
        for anchor in &self.anchors {
            let pose = self.tracker.target_pose(anchor.target_index);
            let Some(group) = self.scene.graph.node_mut(anchor.group) else {
                continue;
            };
            let was_visible = group.visible;
            match pose {
                Some(pose) => {
                    group.matrix = Some(pose);
                    group.visible = true;
                    if !was_visible {
                        events.push(AnchorEvent::TargetFound {
                            target_index: anchor.target_index,
                        });
                    }
                }
                None => {
                    group.visible = false;
                    if was_visible {
                        events.push(AnchorEvent::TargetLost {
                            target_index: anchor.target_index,
                        });
                    }
                }
            }
        }
        for event in &events {
            log::debug!("{:?}", event);
        }
        self.scene.graph.update_world_transforms();
        events
    }
}

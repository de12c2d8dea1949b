//! The circular image plane shown next to the anchored model.

use std::{rc::Rc, sync::Arc};

use crate::{
    config::{OverlayConfig, OverlayGate},
    data_structures::{
        geometry::Geometry,
        material::{Side, StandardMaterial},
        scene_graph::{Node, NodeId, Scene},
        texture::Texture,
    },
    flow::{PendingMutation, SceneMutation},
    resources::{AssetSource, environment::EnvironmentMap, glyphs::glyphs_ready, load_texture},
};

pub const OVERLAY_NODE_NAME: &str = "overlay_plane";

/// Builds the overlay mesh. The material reflects `environment` explicitly,
/// independent of whether the scene environment is set.
pub fn circular_plane(
    texture: Option<Arc<Texture>>,
    environment: Option<Arc<EnvironmentMap>>,
    params: &OverlayConfig,
) -> Node {
    let geometry = Arc::new(Geometry::circle(params.radius, params.segments));
    let material = StandardMaterial {
        map: texture,
        env_map: environment,
        env_map_intensity: params.env_map_intensity,
        metalness: params.metalness,
        roughness: params.roughness,
        side: if params.double_sided {
            Side::Double
        } else {
            Side::Front
        },
        transparent: params.transparent,
        alpha_test: params.alpha_test,
        needs_update: true,
        ..StandardMaterial::new("overlay")
    };
    let [x, y, z] = params.position;
    let mut node = Node::mesh(OVERLAY_NODE_NAME, geometry, material);
    node.local = node.local.with_position(x, y, z);
    node
}

/// Everything the deferred overlay task needs, owned so the future is `'static`.
#[derive(Clone, Debug)]
pub struct OverlayRequest {
    pub gate: OverlayGate,
    pub glyphs_path: String,
    pub image_path: String,
    pub params: OverlayConfig,
    pub environment: Option<Arc<EnvironmentMap>>,
    pub anchor: NodeId,
}

/// Waits for the gate, loads the overlay image and resolves to a mutation that
/// attaches the plane below the anchor. A failing glyph load skips the overlay;
/// a failing image load attaches the plane without a texture.
pub fn pending_overlay<S: AssetSource + 'static>(
    source: Rc<S>,
    request: OverlayRequest,
) -> PendingMutation {
    Box::pin(async move {
        if request.gate == OverlayGate::GlyphResource {
            if let Err(e) = glyphs_ready(source.as_ref(), &request.glyphs_path).await {
                log::error!(
                    "Glyph resource {} failed, skipping the overlay: {:#}",
                    request.glyphs_path,
                    e
                );
                return None;
            }
        }

        let texture = match load_texture(source.as_ref(), &request.image_path, None).await {
            Ok(texture) => Some(Arc::new(texture)),
            Err(e) => {
                log::warn!(
                    "Overlay image {} unavailable, using an untextured plane: {:#}",
                    request.image_path,
                    e
                );
                None
            }
        };

        let node = circular_plane(texture, request.environment, &request.params);
        let anchor = request.anchor;
        let mutation: SceneMutation = Box::new(move |scene: &mut Scene| {
            scene.graph.add(anchor, node)?;
            log::info!("overlay plane attached to anchor group {}", anchor.index());
            Ok(())
        });
        Some(mutation)
    })
}

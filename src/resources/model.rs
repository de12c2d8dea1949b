//! glTF / GLB model loading.
//!
//! A model is decoded into a detached [`NodeTree`] plus its animation clips.
//! Tracks reference nodes by their id inside that tree, so after the tree is
//! attached to a scene the clips are bound through the returned
//! [`AttachedModel`](crate::data_structures::scene_graph::AttachedModel).

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, bail};
use cgmath::{Quaternion, Vector3};

use crate::{
    animation::{
        clip::{AnimationClip, Track, TrackData},
        track::{InterpolationMode, KeyframeTrack},
    },
    config::ModelPlacement,
    data_structures::{
        geometry::Geometry,
        instance::Instance,
        material::{Side, StandardMaterial},
        scene_graph::{MeshNode, Node, NodeId, NodeTree},
        texture::Texture,
    },
    resources::{AssetSource, sibling_path},
};

/// Decodes primitives whose vertex data is stored in a compressed extension.
///
/// The loader asks the decoder for every primitive that has no directly
/// readable positions.
pub trait GeometryDecoder {
    /// Name of the glTF extension this decoder handles, if any.
    fn extension(&self) -> Option<&str> {
        None
    }

    fn decode(&self, primitive: &gltf::Primitive<'_>, buffers: &[Vec<u8>]) -> anyhow::Result<Geometry>;
}

/// Decoder for plain (uncompressed) models.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDecoder;

impl GeometryDecoder for NoDecoder {
    fn decode(&self, primitive: &gltf::Primitive<'_>, _: &[Vec<u8>]) -> anyhow::Result<Geometry> {
        bail!(
            "primitive {} has no readable positions; compressed meshes need a GeometryDecoder",
            primitive.index()
        )
    }
}

/// A loaded model: its node tree and the clips animating it.
#[derive(Clone, Debug)]
pub struct ModelAsset {
    pub scene: NodeTree,
    pub clips: Vec<AnimationClip>,
}

impl ModelAsset {
    /// Sets the transform of the model root.
    pub fn place(&mut self, placement: &ModelPlacement) {
        self.scene.root_mut().local = placement.to_instance();
    }

    /// Disables environment reflections on every mesh material. Returns the
    /// number of materials touched.
    pub fn strip_environment(&mut self) -> usize {
        let mut stripped = 0;
        let root = self.scene.root();
        self.scene.traverse_mut(root, |node| {
            if let Some(mesh) = node.mesh_mut() {
                mesh.material.strip_environment();
                stripped += 1;
            }
        });
        stripped
    }

    pub fn meshes(&self) -> Vec<&MeshNode> {
        self.scene
            .descendants(self.scene.root())
            .into_iter()
            .filter_map(|id| self.scene.node(id)?.mesh_ref())
            .collect()
    }
}

pub async fn load_model<S: AssetSource, D: GeometryDecoder>(
    source: &S,
    file_name: &str,
    decoder: &D,
) -> anyhow::Result<ModelAsset> {
    let bytes = source.load_binary(file_name).await?;
    let unchecked = gltf::Gltf::from_slice_without_validation(&bytes)
        .with_context(|| format!("{file_name} is not a valid glTF asset"))?;
    if let Some(ext) = unchecked.extensions_required().find(|ext| {
        !gltf::json::extensions::ENABLED_EXTENSIONS.contains(ext) && decoder.extension() != Some(*ext)
    }) {
        bail!(
            "{file_name} requires the glTF extension {ext}; provide a GeometryDecoder for it through Bootstrapper::with_decoder"
        );
    }
    let gltf = match decoder.extension() {
        // extension-backed accessors have no buffer views and fail strict validation
        Some(_) => unchecked,
        None => gltf::Gltf::from_slice(&bytes).with_context(|| format!("{file_name} is not a valid glTF asset"))?,
    };

    // Load buffers
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{file_name} references a missing binary chunk"))?;
                buffer_data.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                let bin = source.load_binary(&sibling_path(file_name, uri)).await?;
                buffer_data.push(bin);
            }
        }
    }

    // Load base colour textures once per image
    let mut images: HashMap<usize, Arc<Texture>> = HashMap::new();
    for material in gltf.materials() {
        let Some(info) = material.pbr_metallic_roughness().base_color_texture() else {
            continue;
        };
        let image = info.texture().source();
        if images.contains_key(&image.index()) {
            continue;
        }
        match load_image(source, file_name, &image, &buffer_data).await {
            Ok(texture) => {
                images.insert(image.index(), Arc::new(texture));
            }
            Err(e) => log::warn!("texture {} of {} skipped: {:#}", image.index(), file_name, e),
        }
    }

    let materials: Vec<StandardMaterial> = gltf
        .materials()
        .map(|m| to_material(&m, &images))
        .collect();

    let scene_def = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .with_context(|| format!("{file_name} contains no scene"))?;

    let mut tree = NodeTree::new(scene_def.name().unwrap_or(file_name));
    let mut node_ids: HashMap<usize, NodeId> = HashMap::new();
    let root = tree.root();
    for node in scene_def.nodes() {
        add_node(&mut tree, root, &node, &buffer_data, &materials, decoder, &mut node_ids)
            .with_context(|| format!("failed to decode {file_name}"))?;
    }

    let mut clips = Vec::new();
    for animation in gltf.animations() {
        let name = animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("clip_{}", animation.index()));
        let mut tracks = Vec::new();
        for channel in animation.channels() {
            let Some(&target) = node_ids.get(&channel.target().node().index()) else {
                log::warn!("clip {name}: channel {} targets a node outside the scene", channel.index());
                continue;
            };
            match read_channel(&channel, &buffer_data) {
                Ok(Some(data)) => tracks.push(Track { target, data }),
                Ok(None) => log::warn!("clip {name}: morph target weights are not supported"),
                Err(e) => log::warn!("clip {name}: channel {} skipped: {:#}", channel.index(), e),
            }
        }
        clips.push(AnimationClip::new(&name, tracks));
    }

    log::debug!(
        "loaded {}: {} nodes, {} materials, {} clips",
        file_name,
        tree.len(),
        materials.len(),
        clips.len()
    );
    Ok(ModelAsset { scene: tree, clips })
}

async fn load_image<S: AssetSource>(
    source: &S,
    file_name: &str,
    image: &gltf::Image<'_>,
    buffers: &[Vec<u8>],
) -> anyhow::Result<Texture> {
    match image.source() {
        gltf::image::Source::View { view, mime_type } => {
            let buffer = &buffers[view.buffer().index()];
            let bytes = buffer
                .get(view.offset()..view.offset() + view.length())
                .context("image buffer view out of bounds")?;
            let label = format!("{file_name}#image{}", image.index());
            Texture::from_bytes(bytes, &label, mime_type.split('/').next_back())
        }
        gltf::image::Source::Uri { uri, mime_type } => {
            let path = sibling_path(file_name, uri);
            let bytes = source.load_binary(&path).await?;
            Texture::from_bytes(&bytes, &path, mime_type.and_then(|mt| mt.split('/').next_back()))
        }
    }
}

fn to_material(material: &gltf::Material<'_>, images: &HashMap<usize, Arc<Texture>>) -> StandardMaterial {
    let pbr = material.pbr_metallic_roughness();
    let map = pbr
        .base_color_texture()
        .and_then(|info| images.get(&info.texture().source().index()).cloned());
    let (transparent, alpha_test) = match material.alpha_mode() {
        gltf::material::AlphaMode::Opaque => (false, 0.0),
        gltf::material::AlphaMode::Mask => (false, material.alpha_cutoff().unwrap_or(0.5)),
        gltf::material::AlphaMode::Blend => (true, 0.0),
    };
    StandardMaterial {
        name: material.name().unwrap_or("material").to_string(),
        base_color: pbr.base_color_factor(),
        map,
        metalness: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        side: if material.double_sided() { Side::Double } else { Side::Front },
        transparent,
        alpha_test,
        ..Default::default()
    }
}

fn add_node<D: GeometryDecoder>(
    tree: &mut NodeTree,
    parent: NodeId,
    node: &gltf::Node<'_>,
    buffers: &[Vec<u8>],
    materials: &[StandardMaterial],
    decoder: &D,
    node_ids: &mut HashMap<usize, NodeId>,
) -> anyhow::Result<()> {
    let (t, r, s) = node.transform().decomposed();
    let local = Instance {
        position: t.into(),
        // glTF stores quaternions as [x, y, z, w]
        rotation: Quaternion::new(r[3], r[0], r[1], r[2]),
        scale: s.into(),
    };
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()));

    let mut primitives = Vec::new();
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let geometry = read_geometry(&primitive, buffers, decoder)?;
            let material = match primitive.material().index() {
                Some(idx) => materials.get(idx).cloned().unwrap_or_default(),
                None => StandardMaterial::default(),
            };
            primitives.push(MeshNode {
                geometry: Arc::new(geometry),
                material,
            });
        }
    }

    // a single primitive becomes the node itself, several become children of a group
    let id = if primitives.len() == 1 {
        let mesh = primitives.remove(0);
        tree.add(parent, Node::mesh(&name, mesh.geometry, mesh.material).with_local(local))?
    } else {
        let group = tree.add(parent, Node::group(&name).with_local(local))?;
        for (i, mesh) in primitives.into_iter().enumerate() {
            tree.add(group, Node::mesh(&format!("{name}_{i}"), mesh.geometry, mesh.material))?;
        }
        group
    };
    node_ids.insert(node.index(), id);

    for child in node.children() {
        add_node(tree, id, &child, buffers, materials, decoder, node_ids)?;
    }
    Ok(())
}

fn read_geometry<D: GeometryDecoder>(
    primitive: &gltf::Primitive<'_>,
    buffers: &[Vec<u8>],
    decoder: &D,
) -> anyhow::Result<Geometry> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let Some(positions) = reader.read_positions() else {
        return decoder.decode(primitive, buffers);
    };
    let mut geometry = Geometry {
        positions: positions.collect(),
        ..Default::default()
    };
    if let Some(normals) = reader.read_normals() {
        geometry.normals = normals.collect();
    }
    if let Some(tex_coords) = reader.read_tex_coords(0) {
        geometry.tex_coords = tex_coords.into_f32().collect();
    }
    if let Some(indices) = reader.read_indices() {
        geometry.indices = indices.into_u32().collect();
    }
    geometry.ensure_indices();
    Ok(geometry)
}

fn read_channel(
    channel: &gltf::animation::Channel<'_>,
    buffers: &[Vec<u8>],
) -> anyhow::Result<Option<TrackData>> {
    use gltf::animation::util::ReadOutputs;

    let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let times: Vec<f32> = reader
        .read_inputs()
        .context("animation channel without keyframe times")?
        .collect();
    let interpolation = match channel.sampler().interpolation() {
        gltf::animation::Interpolation::Linear => InterpolationMode::Linear,
        gltf::animation::Interpolation::Step => InterpolationMode::Step,
        gltf::animation::Interpolation::CubicSpline => InterpolationMode::CubicSpline,
    };
    let outputs = reader
        .read_outputs()
        .context("animation channel without keyframe values")?;

    let data = match outputs {
        ReadOutputs::Translations(values) => TrackData::Translation(KeyframeTrack::new(
            times,
            values.map(Vector3::from).collect(),
            interpolation,
        )?),
        ReadOutputs::Rotations(values) => TrackData::Rotation(KeyframeTrack::new(
            times,
            values
                .into_f32()
                .map(|[x, y, z, w]| Quaternion::new(w, x, y, z))
                .collect(),
            interpolation,
        )?),
        ReadOutputs::Scales(values) => TrackData::Scale(KeyframeTrack::new(
            times,
            values.map(Vector3::from).collect(),
            interpolation,
        )?),
        ReadOutputs::MorphTargetWeights(_) => return Ok(None),
    };
    Ok(Some(data))
}

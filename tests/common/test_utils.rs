use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    io::Cursor,
    path::Path,
    rc::Rc,
};

use anchor_ngin::{
    FrameRenderer, ImageTracker, Matrix4,
    camera::Camera,
    config::BootstrapConfig,
    data_structures::{geometry::Geometry, scene_graph::Scene},
    render::RendererSettings,
    resources::{AssetSource, model::GeometryDecoder},
};
use anyhow::{Context, bail};
use futures::channel::oneshot;

pub fn init_logger() {
    anchor_ngin::flow::init_logger();
}

/// In-memory assets that remember the order in which they were requested.
#[derive(Default)]
pub struct MemorySource {
    files: RefCell<HashMap<String, Vec<u8>>>,
    failing: RefCell<HashSet<String>>,
    gates: RefCell<HashMap<String, oneshot::Receiver<()>>>,
    requests: RefCell<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every asset of the stock scene, valid and small.
    pub fn with_stock_assets(config: &BootstrapConfig) -> Self {
        let source = Self::new();
        let assets = &config.assets;
        source.insert(&assets.target, b"targets".to_vec());
        source.insert(&assets.environment, hdr_bytes(4, 2, [128, 128, 128, 129]));
        source.insert(&assets.model, sample_glb());
        source.insert(&assets.glyphs, GLYPHS.as_bytes().to_vec());
        source.insert(&assets.overlay_image, png_bytes(4, 4, [200, 40, 40, 255]));
        source
    }

    /// Writes every stored file below `dir`, keeping relative paths.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<()> {
        for (path, bytes) in self.files.borrow().iter() {
            let full = dir.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full, bytes)?;
        }
        Ok(())
    }

    pub fn insert(&self, path: &str, bytes: Vec<u8>) {
        self.files.borrow_mut().insert(path.to_string(), bytes);
    }

    pub fn fail(&self, path: &str) {
        self.failing.borrow_mut().insert(path.to_string());
    }

    /// Holds requests for `path` until the returned sender fires (or is dropped).
    pub fn delay(&self, path: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().insert(path.to_string(), rx);
        tx
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn was_requested(&self, path: &str) -> bool {
        self.requests.borrow().iter().any(|p| p == path)
    }
}

impl AssetSource for MemorySource {
    async fn load_binary(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        self.requests.borrow_mut().push(path.to_string());
        let gate = self.gates.borrow_mut().remove(path);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.failing.borrow().contains(path) {
            bail!("{path}: connection reset");
        }
        self.files
            .borrow()
            .get(path)
            .cloned()
            .with_context(|| format!("{path}: not found"))
    }
}

#[derive(Debug, Default)]
pub struct ScriptedTracker {
    pub target_count: usize,
    pub poses: HashMap<usize, Matrix4<f32>>,
    pub fail_start: bool,
    pub started: bool,
    pub descriptor: Vec<u8>,
}

impl ScriptedTracker {
    pub fn new(target_count: usize) -> Self {
        Self {
            target_count,
            ..Default::default()
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

impl ImageTracker for ScriptedTracker {
    fn load_targets(&mut self, descriptor: &[u8]) -> anyhow::Result<usize> {
        if descriptor.is_empty() {
            bail!("empty target descriptor");
        }
        self.descriptor = descriptor.to_vec();
        Ok(self.target_count)
    }

    async fn start(&mut self) -> anyhow::Result<()> {
        if self.fail_start {
            bail!("camera permission denied");
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn target_pose(&self, index: usize) -> Option<Matrix4<f32>> {
        self.poses.get(&index).copied()
    }
}

/// What a renderer saw in one frame.
#[derive(Clone, Debug)]
pub struct FrameRecord {
    pub meshes: Vec<String>,
    pub visible_meshes: Vec<String>,
    pub exposure: f32,
    pub has_environment: bool,
}

#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub frames: Vec<FrameRecord>,
}

impl RecordingRenderer {
    pub fn last(&self) -> &FrameRecord {
        self.frames.last().expect("no frame rendered yet")
    }
}

impl FrameRenderer for RecordingRenderer {
    fn render(
        &mut self,
        scene: &Scene,
        _camera: &Camera,
        settings: &RendererSettings,
    ) -> anyhow::Result<()> {
        let mut meshes = Vec::new();
        let mut visible_meshes = Vec::new();
        for (id, _) in scene.meshes() {
            let name = scene.graph.node(id).unwrap().name.clone();
            if scene.graph.is_visible(id) {
                visible_meshes.push(name.clone());
            }
            meshes.push(name);
        }
        self.frames.push(FrameRecord {
            meshes,
            visible_meshes,
            exposure: settings.exposure,
            has_environment: scene.environment.is_some(),
        });
        Ok(())
    }
}

pub const GLYPHS: &str = r#"{
    "glyphs": { "a": { "ha": 500, "x_min": 0, "x_max": 480, "o": "m 0 0 l 480 0" } },
    "familyName": "Edwardian Script ITC",
    "resolution": 1000
}"#;

/// Flat radiance image filled with one RGBE texel.
pub fn hdr_bytes(width: u32, height: u32, rgbe: [u8; 4]) -> Vec<u8> {
    let mut bytes =
        format!("#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y {height} +X {width}\n").into_bytes();
    for _ in 0..width * height {
        bytes.extend_from_slice(&rgbe);
    }
    bytes
}

pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// A GLB with an `Armature` group holding two meshes (`Body`, `Hat`) and one
/// clip `Wave` moving `Body` from x = 0 to x = 2 over two seconds.
pub fn sample_glb() -> Vec<u8> {
    let mut bin = Vec::new();
    // positions, 36 bytes at 0
    bin.extend(f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]));
    // indices, 6 bytes at 36, padded to 44
    for i in [0u16, 1, 2] {
        bin.extend(i.to_le_bytes());
    }
    bin.extend([0, 0]);
    // keyframe times, 12 bytes at 44
    bin.extend(f32_bytes(&[0.0, 1.0, 2.0]));
    // keyframe translations, 36 bytes at 56
    bin.extend(f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 2.0, 0.0, 0.0]));
    assert_eq!(bin.len(), 92);

    let primitive = |material: u32| {
        serde_json::json!({ "attributes": { "POSITION": 0 }, "indices": 1, "material": material })
    };
    let json = serde_json::json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "Armature", "children": [1, 2] },
            { "name": "Body", "mesh": 0 },
            { "name": "Hat", "mesh": 1, "translation": [0.0, 1.0, 0.0] }
        ],
        "meshes": [
            { "primitives": [primitive(0)] },
            { "primitives": [primitive(1)] }
        ],
        "materials": [
            {
                "name": "body",
                "pbrMetallicRoughness": {
                    "baseColorFactor": [1.0, 0.0, 0.0, 1.0],
                    "metallicFactor": 0.2,
                    "roughnessFactor": 0.8
                }
            },
            { "name": "hat", "alphaMode": "MASK", "alphaCutoff": 0.3, "doubleSided": true }
        ],
        "animations": [{
            "name": "Wave",
            "channels": [{ "sampler": 0, "target": { "node": 1, "path": "translation" } }],
            "samplers": [{ "input": 2, "output": 3, "interpolation": "LINEAR" }]
        }],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
            { "bufferView": 2, "componentType": 5126, "count": 3, "type": "SCALAR",
              "min": [0.0], "max": [2.0] },
            { "bufferView": 3, "componentType": 5126, "count": 3, "type": "VEC3" }
        ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 },
            { "buffer": 0, "byteOffset": 44, "byteLength": 12 },
            { "buffer": 0, "byteOffset": 56, "byteLength": 36 }
        ],
        "buffers": [{ "byteLength": 92 }]
    });

    let mut json = serde_json::to_vec(&json).unwrap();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend(b"glTF");
    glb.extend(2u32.to_le_bytes());
    glb.extend((total as u32).to_le_bytes());
    glb.extend((json.len() as u32).to_le_bytes());
    glb.extend(b"JSON");
    glb.extend(json);
    glb.extend((bin.len() as u32).to_le_bytes());
    glb.extend(b"BIN\0");
    glb.extend(bin);
    glb
}

pub const DRACO: &str = "KHR_draco_mesh_compression";

/// A single Draco-flagged triangle whose POSITION accessor has no buffer view.
pub fn draco_gltf() -> Vec<u8> {
    let json = serde_json::json!({
        "asset": { "version": "2.0" },
        "extensionsUsed": [DRACO],
        "extensionsRequired": [DRACO],
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "Compressed", "mesh": 0 }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": 0 },
                "extensions": {
                    "KHR_draco_mesh_compression": { "bufferView": 0, "attributes": { "POSITION": 0 } }
                }
            }]
        }],
        "accessors": [{ "componentType": 5126, "count": 3, "type": "VEC3" }]
    });
    serde_json::to_vec(&json).unwrap()
}

/// Stands in for a Draco decoder: every primitive becomes one triangle.
#[derive(Clone, Debug, Default)]
pub struct TriangleDecoder {
    pub calls: Rc<Cell<usize>>,
}

impl GeometryDecoder for TriangleDecoder {
    fn extension(&self) -> Option<&str> {
        Some(DRACO)
    }

    fn decode(&self, _: &gltf::Primitive<'_>, _: &[Vec<u8>]) -> anyhow::Result<Geometry> {
        self.calls.set(self.calls.get() + 1);
        Ok(Geometry {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            indices: vec![0, 1, 2],
            ..Default::default()
        })
    }
}

use std::{rc::Rc, time::Duration};

use anchor_ngin::{
    BootstrapConfig, BootstrapError, Bootstrapped, Bootstrapper, Matrix4, Rad, Stage, Vector3,
    config::OverlayGate,
    overlay::OVERLAY_NODE_NAME,
    resources::{FsSource, environment::Mapping},
    tracker::AnchorEvent,
};

use crate::common::test_utils::{
    MemorySource, RecordingRenderer, ScriptedTracker, TriangleDecoder, draco_gltf, init_logger,
};

mod common;

async fn bootstrap(
    config: BootstrapConfig,
    source: Rc<MemorySource>,
    tracker: ScriptedTracker,
) -> anyhow::Result<Bootstrapped<ScriptedTracker>> {
    init_logger();
    Bootstrapper::new(tracker, source, config).run().await
}

async fn stock() -> (Bootstrapped<ScriptedTracker>, Rc<MemorySource>) {
    let config = BootstrapConfig::default();
    let source = Rc::new(MemorySource::with_stock_assets(&config));
    let scene = bootstrap(config, source.clone(), ScriptedTracker::new(1))
        .await
        .unwrap();
    (scene, source)
}

fn stage_of(err: &anyhow::Error) -> &BootstrapError {
    err.downcast_ref::<BootstrapError>()
        .expect("fatal failures carry a BootstrapError")
}

fn assert_matrix_eq(actual: Matrix4<f32>, expected: Matrix4<f32>) {
    let a: [[f32; 4]; 4] = actual.into();
    let e: [[f32; 4]; 4] = expected.into();
    for (col_a, col_e) in a.iter().zip(e.iter()) {
        for (x, y) in col_a.iter().zip(col_e.iter()) {
            assert!((x - y).abs() < 1e-5, "{:?} != {:?}", a, e);
        }
    }
}

#[tokio::test]
async fn stages_run_in_order() {
    let (scene, source) = stock().await;
    assert_eq!(
        scene.trace(),
        [
            Stage::Session,
            Stage::Renderer,
            Stage::AmbientLight,
            Stage::Environment,
            Stage::Model,
            Stage::ModelPlacement,
            Stage::Anchor,
            Stage::Animation,
            Stage::TrackerStart,
            Stage::FrameLoop,
            Stage::OverlayDeferred,
        ]
    );
    let anchor_at = scene.trace().iter().position(|s| *s == Stage::Anchor);
    let mixer_at = scene.trace().iter().position(|s| *s == Stage::Animation);
    assert!(anchor_at < mixer_at);

    // the glyph resource is only requested once the frame loop polls the overlay
    assert_eq!(
        source.requests(),
        ["new.mind", "assets/venice_sunset_1k.hdr", "assets/preset.glb"]
    );
    assert!(scene.session.tracker().started);
    assert_eq!(scene.session.tracker().descriptor, b"targets");
    assert!(scene.overlay_pending());
}

#[tokio::test]
async fn model_is_placed_below_the_anchor() {
    let (mut scene, _) = stock().await;
    let graph = &scene.session.scene.graph;
    let model_root = graph.node(scene.model().root()).unwrap();
    assert_eq!(model_root.parent(), Some(scene.anchor().group));

    let placement = Matrix4::from_translation(Vector3::new(-0.12, 0.05, -0.05))
        * Matrix4::from_angle_x(Rad(std::f32::consts::FRAC_PI_2))
        * Matrix4::from_scale(0.022);
    assert_matrix_eq(model_root.local_matrix(), placement);

    let pose = Matrix4::from_translation(Vector3::new(0.1, -0.2, -1.5));
    scene.session.tracker_mut().poses.insert(0, pose);
    let mut renderer = RecordingRenderer::default();
    scene.frame_with_delta(&mut renderer, 0.0).unwrap();
    assert_matrix_eq(
        scene.session.scene.graph.world_matrix(scene.model().root()).unwrap(),
        pose * placement,
    );
}

#[tokio::test]
async fn model_materials_ignore_the_scene_environment() {
    let (scene, _) = stock().await;
    let env = scene.session.scene.environment.as_ref().unwrap();
    assert_eq!(env.mapping, Mapping::EquirectangularReflection);

    let model_meshes: Vec<_> = scene
        .session
        .scene
        .meshes()
        .into_iter()
        .filter(|(id, _)| scene.model().contains(*id))
        .collect();
    assert_eq!(model_meshes.len(), 2);
    for (_, mesh) in model_meshes {
        assert!(mesh.material.env_map.is_none());
        assert!(mesh.material.needs_update);
        assert!(mesh.material.effective_environment(Some(env)).is_none());
    }
}

#[tokio::test]
async fn clips_hold_their_last_frame() {
    let (mut scene, _) = stock().await;
    let mut renderer = RecordingRenderer::default();
    let body = scene.session.scene.graph.find("Body").unwrap();
    let x = |scene: &Bootstrapped<ScriptedTracker>| scene.session.scene.graph.node(body).unwrap().local.position.x;

    scene.frame_with_delta(&mut renderer, 1.0).unwrap();
    assert!((x(&scene) - 1.0).abs() < 1e-5);

    scene.frame_with_delta(&mut renderer, 1.0).unwrap();
    let at_end = x(&scene);
    assert!((at_end - 2.0).abs() < 1e-5);

    scene.frame_with_delta(&mut renderer, 2.0).unwrap();
    assert_eq!(x(&scene), at_end);
    assert!(scene.frame_loop.mixer().actions().all(|a| a.is_finished()));
}

#[tokio::test]
async fn hdr_failure_stops_before_the_model() {
    let config = BootstrapConfig::default();
    let source = Rc::new(MemorySource::with_stock_assets(&config));
    source.fail("assets/venice_sunset_1k.hdr");

    let err = bootstrap(config, source.clone(), ScriptedTracker::new(1))
        .await
        .unwrap_err();
    let err = stage_of(&err);
    assert_eq!(err.stage, Stage::Environment);
    assert_eq!(err.path.as_deref(), Some("assets/venice_sunset_1k.hdr"));
    assert!(!source.was_requested("assets/preset.glb"));
}

#[tokio::test]
async fn broken_model_is_fatal() {
    let config = BootstrapConfig::default();
    let source = Rc::new(MemorySource::with_stock_assets(&config));
    source.insert("assets/preset.glb", b"definitely not gltf".to_vec());

    let err = bootstrap(config, source.clone(), ScriptedTracker::new(1))
        .await
        .unwrap_err();
    assert_eq!(stage_of(&err).stage, Stage::Model);
    assert!(!source.was_requested("Edwardian.json"));
}

#[tokio::test]
async fn compressed_model_needs_the_configured_decoder() {
    let config = BootstrapConfig::default();
    let source = Rc::new(MemorySource::with_stock_assets(&config));
    source.insert(&config.assets.model, draco_gltf());

    let err = bootstrap(config.clone(), source.clone(), ScriptedTracker::new(1))
        .await
        .unwrap_err();
    let failure = stage_of(&err);
    assert_eq!(failure.stage, Stage::Model);
    assert_eq!(failure.path.as_deref(), Some("assets/preset.glb"));
    assert!(format!("{:#}", failure.source).contains("with_decoder"));

    let decoder = TriangleDecoder::default();
    let scene = Bootstrapper::new(ScriptedTracker::new(1), source, config)
        .with_decoder(decoder.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(decoder.calls.get(), 1);
    let graph = &scene.session.scene.graph;
    let compressed = graph.find("Compressed").unwrap();
    let model_root = scene.model().root();
    assert_eq!(graph.node(compressed).unwrap().parent(), Some(model_root));
    assert_eq!(graph.node(model_root).unwrap().parent(), Some(scene.anchor().group));
}

#[tokio::test]
async fn tracker_start_failure_is_fatal() {
    let config = BootstrapConfig::default();
    let source = Rc::new(MemorySource::with_stock_assets(&config));
    let err = bootstrap(config, source, ScriptedTracker::new(1).failing_start())
        .await
        .unwrap_err();
    let err = stage_of(&err);
    assert_eq!(err.stage, Stage::TrackerStart);
    assert!(format!("{:#}", err.source).contains("camera permission denied"));
}

#[tokio::test]
async fn anchor_must_name_a_loaded_target() {
    let config = BootstrapConfig {
        anchor_index: 3,
        ..BootstrapConfig::default()
    };
    let source = Rc::new(MemorySource::with_stock_assets(&config));
    let err = bootstrap(config, source, ScriptedTracker::new(1))
        .await
        .unwrap_err();
    assert_eq!(stage_of(&err).stage, Stage::Anchor);
}

#[tokio::test]
async fn overlay_waits_for_the_glyph_resource() {
    let config = BootstrapConfig::default();
    let source = Rc::new(MemorySource::with_stock_assets(&config));
    let glyphs_loaded = source.delay("Edwardian.json");
    let mut scene = bootstrap(config, source.clone(), ScriptedTracker::new(1))
        .await
        .unwrap();
    let mut renderer = RecordingRenderer::default();

    scene.frame_with_delta(&mut renderer, 0.016).unwrap();
    scene.frame_with_delta(&mut renderer, 0.016).unwrap();
    assert!(source.was_requested("Edwardian.json"));
    assert!(!source.was_requested("assets/new1.jpg"));
    assert!(!renderer.last().meshes.iter().any(|m| m == OVERLAY_NODE_NAME));
    assert!(scene.overlay_pending());

    glyphs_loaded.send(()).unwrap();
    scene.frame_with_delta(&mut renderer, 0.016).unwrap();
    assert!(renderer.last().meshes.iter().any(|m| m == OVERLAY_NODE_NAME));
    assert!(!scene.overlay_pending());

    let overlay = scene.session.scene.graph.find(OVERLAY_NODE_NAME).unwrap();
    let node = scene.session.scene.graph.node(overlay).unwrap();
    assert_eq!(node.parent(), Some(scene.anchor().group));
    let material = &node.mesh_ref().unwrap().material;
    assert!(material.map.is_some());
    assert!(material.env_map.is_some());
}

#[tokio::test]
async fn immediate_gate_attaches_overlay_with_the_anchor() {
    let config = BootstrapConfig {
        overlay_gate: OverlayGate::Immediate,
        ..BootstrapConfig::default()
    };
    let source = Rc::new(MemorySource::with_stock_assets(&config));
    source.fail("Edwardian.json");
    let scene = bootstrap(config, source.clone(), ScriptedTracker::new(1))
        .await
        .unwrap();

    let trace = scene.trace();
    let anchor_at = trace.iter().position(|s| *s == Stage::Anchor).unwrap();
    assert_eq!(trace[anchor_at + 1], Stage::Overlay);
    assert!(!trace.contains(&Stage::OverlayDeferred));
    assert!(!source.was_requested("Edwardian.json"));
    assert!(scene.session.scene.graph.find(OVERLAY_NODE_NAME).is_some());
    assert!(!scene.overlay_pending());
}

#[tokio::test]
async fn glyph_failure_skips_overlay_but_keeps_rendering() {
    let config = BootstrapConfig::default();
    let source = Rc::new(MemorySource::with_stock_assets(&config));
    source.fail("Edwardian.json");
    let mut scene = bootstrap(config, source.clone(), ScriptedTracker::new(1))
        .await
        .unwrap();
    let mut renderer = RecordingRenderer::default();

    for _ in 0..3 {
        scene.frame_with_delta(&mut renderer, 0.016).unwrap();
    }
    assert_eq!(renderer.frames.len(), 3);
    assert!(!scene.overlay_pending());
    assert!(scene.session.scene.graph.find(OVERLAY_NODE_NAME).is_none());
    assert!(!source.was_requested("assets/new1.jpg"));
}

#[tokio::test]
async fn missing_overlay_image_keeps_an_untextured_plane() {
    let config = BootstrapConfig::default();
    let source = Rc::new(MemorySource::with_stock_assets(&config));
    source.fail("assets/new1.jpg");
    let mut scene = bootstrap(config, source, ScriptedTracker::new(1))
        .await
        .unwrap();
    let mut renderer = RecordingRenderer::default();
    scene.frame_with_delta(&mut renderer, 0.016).unwrap();

    let overlay = scene.session.scene.graph.find(OVERLAY_NODE_NAME).unwrap();
    let material = &scene.session.scene.graph.node(overlay).unwrap().mesh_ref().unwrap().material;
    assert!(material.map.is_none());
    assert!(material.env_map.is_some());
}

#[tokio::test]
async fn anchored_content_follows_the_target() {
    let (mut scene, _) = stock().await;
    let mut renderer = RecordingRenderer::default();

    assert!(scene.frame_with_delta(&mut renderer, 0.016).unwrap().is_empty());
    assert!(renderer.last().visible_meshes.is_empty());
    assert_eq!(renderer.last().exposure, 0.5);
    assert!(renderer.last().has_environment);

    scene
        .session
        .tracker_mut()
        .poses
        .insert(0, Matrix4::from_translation(Vector3::new(0.0, 0.0, -1.0)));
    let events = scene.frame_with_delta(&mut renderer, 0.016).unwrap();
    assert_eq!(events, [AnchorEvent::TargetFound { target_index: 0 }]);
    let visible = &renderer.last().visible_meshes;
    for name in ["Body", "Hat", OVERLAY_NODE_NAME] {
        assert!(visible.iter().any(|m| m == name), "{name} not visible");
    }

    scene.session.tracker_mut().poses.clear();
    let events = scene.frame_with_delta(&mut renderer, 0.016).unwrap();
    assert_eq!(events, [AnchorEvent::TargetLost { target_index: 0 }]);
    assert!(renderer.last().visible_meshes.is_empty());

    scene.shutdown();
    assert!(!scene.session.tracker().started);
}

#[test]
fn file_assets_resolve_the_overlay_between_frames() {
    init_logger();
    let config = BootstrapConfig::default();
    let dir = std::env::temp_dir().join(format!("anchor-ngin-frames-{}", std::process::id()));
    MemorySource::with_stock_assets(&config).write_to(&dir).unwrap();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let source = Rc::new(FsSource::new(&dir));
    let mut scene = runtime
        .block_on(Bootstrapper::new(ScriptedTracker::new(1), source, config).run())
        .unwrap();
    assert!(scene.overlay_pending());

    // frames are driven from the host thread, not from inside the runtime
    let mut renderer = RecordingRenderer::default();
    for _ in 0..500 {
        scene.frame_with_delta(&mut renderer, 0.016).unwrap();
        if !scene.overlay_pending() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!scene.overlay_pending());
    assert!(renderer.last().meshes.iter().any(|m| m == OVERLAY_NODE_NAME));
    let overlay = scene.session.scene.graph.find(OVERLAY_NODE_NAME).unwrap();
    let material = &scene.session.scene.graph.node(overlay).unwrap().mesh_ref().unwrap().material;
    assert!(material.map.is_some());

    std::fs::remove_dir_all(&dir).unwrap();
}

//! Ordered scene bootstrap.
//!
//! [`Bootstrapper::run`] walks the stages below strictly in order and stops
//! at the first fatal failure:
//! 1. `Session`: load the target descriptor and hand it to the tracker
//! 2. `Renderer`: output encoding, tone mapping, exposure
//! 3. `AmbientLight`
//! 4. `Environment`: HDR map, equirectangular reflection mapping, scene environment
//! 5. `Model`: glTF/GLB with materials and clips
//! 6. `ModelPlacement`: root transform, environment stripped from every mesh material
//! 7. `Anchor`: anchor group for the configured target, model attached below it
//! 8. `Animation`: mixer bound to the attached model, every clip played once and held
//! 9. `TrackerStart`
//! 10. `FrameLoop`
//! 11. `OverlayDeferred`: overlay plane queued behind the glyph resource
//!
//! With [`OverlayGate::Immediate`] the overlay is attached as `Overlay` right
//! after `Anchor` instead of being deferred.

use std::{fmt::Display, rc::Rc, sync::Arc};

use crate::{
    animation::{AnimationMixer, LoopMode},
    config::{BootstrapConfig, OverlayGate},
    context::{Anchor, SessionContext},
    data_structures::scene_graph::{AttachedModel, Node},
    flow::{FrameLoop, init_logger},
    overlay::{OverlayRequest, pending_overlay},
    render::FrameRenderer,
    resources::{
        AssetSource,
        environment::{Mapping, load_environment_map},
        model::{GeometryDecoder, NoDecoder, load_model},
    },
    tracker::{AnchorEvent, ImageTracker},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Session,
    Renderer,
    AmbientLight,
    Environment,
    Model,
    ModelPlacement,
    Anchor,
    Overlay,
    Animation,
    TrackerStart,
    FrameLoop,
    OverlayDeferred,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Session => "session",
            Stage::Renderer => "renderer",
            Stage::AmbientLight => "ambient light",
            Stage::Environment => "environment map",
            Stage::Model => "model",
            Stage::ModelPlacement => "model placement",
            Stage::Anchor => "anchor",
            Stage::Overlay => "overlay",
            Stage::Animation => "animation",
            Stage::TrackerStart => "tracker start",
            Stage::FrameLoop => "frame loop",
            Stage::OverlayDeferred => "deferred overlay",
        };
        f.write_str(name)
    }
}

/// A fatal bootstrap failure. Reaches callers inside an [`anyhow::Error`];
/// use `downcast_ref::<BootstrapError>()` to inspect it.
#[derive(Debug)]
pub struct BootstrapError {
    pub stage: Stage,
    /// Asset being loaded when the stage failed, if any.
    pub path: Option<String>,
    pub source: anyhow::Error,
}

impl BootstrapError {
    fn at(stage: Stage, path: Option<&str>) -> impl FnOnce(anyhow::Error) -> anyhow::Error {
        let path = path.map(str::to_string);
        move |source| {
            let err = BootstrapError { stage, path, source };
            log::error!("{}: {:#}", err, err.source);
            anyhow::Error::new(err)
        }
    }
}

impl Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "bootstrap failed at {} ({})", self.stage, path),
            None => write!(f, "bootstrap failed at {}", self.stage),
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

/// Builds the anchored scene from a tracker, an asset source and a config.
pub struct Bootstrapper<T, S, D = NoDecoder> {
    tracker: T,
    source: Rc<S>,
    decoder: D,
    config: BootstrapConfig,
}

impl<T: ImageTracker, S: AssetSource + 'static> Bootstrapper<T, S> {
    pub fn new(tracker: T, source: Rc<S>, config: BootstrapConfig) -> Self {
        Self {
            tracker,
            source,
            decoder: NoDecoder,
            config,
        }
    }
}

impl<T: ImageTracker, S: AssetSource + 'static, D: GeometryDecoder> Bootstrapper<T, S, D> {
    /// Replaces the decoder used for compressed primitives.
    pub fn with_decoder<D2: GeometryDecoder>(self, decoder: D2) -> Bootstrapper<T, S, D2> {
        Bootstrapper {
            tracker: self.tracker,
            source: self.source,
            decoder,
            config: self.config,
        }
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub async fn run(self) -> anyhow::Result<Bootstrapped<T>> {
        let Self {
            tracker,
            source,
            decoder,
            config,
        } = self;
        init_logger();
        let assets = &config.assets;
        let mut trace = Vec::new();

        let mut session = SessionContext::connect(tracker, source.as_ref(), &assets.target)
            .await
            .map_err(BootstrapError::at(Stage::Session, Some(assets.target.as_str())))?;
        trace.push(Stage::Session);

        session.settings = config.renderer;
        log::info!(
            "renderer: {:?} output, {:?} tone mapping, exposure {}",
            session.settings.output_encoding,
            session.settings.tone_mapping,
            session.settings.exposure
        );
        trace.push(Stage::Renderer);

        session
            .scene
            .add(Node::ambient_light(config.ambient_light))
            .map_err(BootstrapError::at(Stage::AmbientLight, None))?;
        trace.push(Stage::AmbientLight);

        let mut environment = load_environment_map(source.as_ref(), &assets.environment)
            .await
            .map_err(BootstrapError::at(Stage::Environment, Some(assets.environment.as_str())))?;
        environment.mapping = Mapping::EquirectangularReflection;
        let environment = Arc::new(environment);
        session.scene.environment = Some(environment.clone());
        log::info!("environment map {} set", assets.environment);
        trace.push(Stage::Environment);

        let mut model = load_model(source.as_ref(), &assets.model, &decoder)
            .await
            .map_err(BootstrapError::at(Stage::Model, Some(assets.model.as_str())))?;
        log::info!(
            "model {} loaded: {} nodes, {} clips",
            assets.model,
            model.scene.len(),
            model.clips.len()
        );
        trace.push(Stage::Model);

        model.place(&config.model);
        let stripped = model.strip_environment();
        log::debug!("environment stripped from {} model materials", stripped);
        trace.push(Stage::ModelPlacement);

        let anchor = session
            .add_anchor(config.anchor_index)
            .map_err(BootstrapError::at(Stage::Anchor, None))?;
        let attached = session
            .scene
            .graph
            .attach(anchor.group, model.scene)
            .map_err(BootstrapError::at(Stage::Anchor, Some(assets.model.as_str())))?;
        trace.push(Stage::Anchor);

        let overlay = OverlayRequest {
            gate: config.overlay_gate,
            glyphs_path: assets.glyphs.clone(),
            image_path: assets.overlay_image.clone(),
            params: config.overlay,
            environment: Some(environment),
            anchor: anchor.group,
        };

        if config.overlay_gate == OverlayGate::Immediate {
            if let Some(mutation) = pending_overlay(source.clone(), overlay.clone()).await {
                mutation(&mut session.scene)
                    .map_err(BootstrapError::at(Stage::Overlay, Some(assets.overlay_image.as_str())))?;
            }
            trace.push(Stage::Overlay);
        }

        let mut mixer = AnimationMixer::bind(&session.scene, attached)
            .map_err(BootstrapError::at(Stage::Animation, Some(assets.model.as_str())))?;
        for clip in model.clips {
            let name = clip.name.clone();
            let id = mixer.clip_action(&session.scene, Arc::new(clip));
            if let Some(action) = mixer.action_mut(id) {
                action.loop_mode = LoopMode::Once;
                action.clamp_when_finished = true;
                action.play();
                log::debug!("playing clip '{}' ({:.2}s)", name, action.clip().duration);
            }
        }
        trace.push(Stage::Animation);

        session
            .start()
            .await
            .map_err(BootstrapError::at(Stage::TrackerStart, None))?;
        trace.push(Stage::TrackerStart);

        session.scene.graph.update_world_transforms();
        let mut frame_loop = FrameLoop::new(mixer);
        trace.push(Stage::FrameLoop);

        if config.overlay_gate == OverlayGate::GlyphResource {
            frame_loop.defer(pending_overlay(source, overlay));
            trace.push(Stage::OverlayDeferred);
        }

        log::info!("scene ready: {:?}", trace);
        Ok(Bootstrapped {
            session,
            frame_loop,
            anchor,
            model: attached,
            trace,
        })
    }
}

/// A running scene: the session plus the frame loop driving it.
#[derive(Debug)]
pub struct Bootstrapped<T: ImageTracker> {
    pub session: SessionContext<T>,
    pub frame_loop: FrameLoop,
    anchor: Anchor,
    model: AttachedModel,
    trace: Vec<Stage>,
}

impl<T: ImageTracker> Bootstrapped<T> {
    pub fn frame<R: FrameRenderer>(&mut self, renderer: &mut R) -> anyhow::Result<Vec<AnchorEvent>> {
        self.frame_loop.frame(&mut self.session, renderer)
    }

    pub fn frame_with_delta<R: FrameRenderer>(
        &mut self,
        renderer: &mut R,
        dt: f32,
    ) -> anyhow::Result<Vec<AnchorEvent>> {
        self.frame_loop.frame_with_delta(&mut self.session, renderer, dt)
    }

    /// Completed stages in execution order.
    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn model(&self) -> AttachedModel {
        self.model
    }

    /// Whether the deferred overlay has not been applied yet.
    pub fn overlay_pending(&self) -> bool {
        self.frame_loop.pending_count() > 0
    }

    pub fn shutdown(&mut self) {
        self.session.stop();
    }
}

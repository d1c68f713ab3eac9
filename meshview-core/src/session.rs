/// Viewer lifecycle: owns the surface, camera, controls and render loop, and
/// turns loader events into a normalized, framed, shaded model.
use nalgebra::Matrix4;
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::bounds::Aabb;
use crate::config::ViewerConfig;
use crate::controls::OrbitControls;
use crate::error::{LoadErrorKind, SurfaceError};
use crate::format::MeshFormat;
use crate::framing::{frame_scene, Framing};
use crate::geometry::Surface;
use crate::loader::{LoadEvent, LoadState, LoadedModel, MeshLoader, ModelResource};
use crate::material::{Color, DisplayMode, Material};
use crate::mesh::{NormalizedMesh, LARGE_MODEL_TRIANGLES};
use crate::projection::Camera;
use crate::render_loop::RenderLoop;
use crate::resources::ResourceTracker;
use crate::source::ByteSource;
use crate::transform::{RotationState, Transform};

/// Where a session is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerPhase {
    Uninitialized,
    Initializing,
    Loading,
    Ready,
    Error,
    Disposing,
    Disposed,
}

/// Notifications for the host application
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Progress(u8),
    Ready,
    Failed { reason: String, kind: LoadErrorKind },
}

/// A stand-in shape drawn while loading or after a failure
#[derive(Debug, Clone)]
pub struct Marker<'a> {
    pub surface: &'a Surface,
    pub model_matrix: Matrix4<f32>,
    pub material: Material,
    pub label: String,
}

#[derive(Debug, Clone)]
pub enum FrameContent<'a> {
    Empty,
    Model(&'a NormalizedMesh),
    Marker(Marker<'a>),
}

/// Everything a surface needs to draw one frame
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    pub camera: &'a Camera,
    pub background: Color,
    pub show_grid: bool,
    pub mode: DisplayMode,
    pub phase: ViewerPhase,
    pub content: FrameContent<'a>,
}

/// A drawable target sized to its container
pub trait RenderSurface {
    /// Attach to the container and return its size in pixels (or cells).
    fn attach(&mut self) -> Result<(u32, u32), SurfaceError>;
    fn resize(&mut self, width: u32, height: u32);
    fn render(&mut self, frame: &Frame<'_>) -> Result<(), SurfaceError>;
    fn detach(&mut self);
}

/// Shared services a session is opened with
#[derive(Clone)]
pub struct ViewerContext {
    pub runtime: Handle,
    pub source: Arc<dyn ByteSource>,
    pub config: ViewerConfig,
    pub tracker: ResourceTracker,
}

impl ViewerContext {
    pub fn new(runtime: Handle, source: Arc<dyn ByteSource>) -> Self {
        Self {
            runtime,
            source,
            config: ViewerConfig::default(),
            tracker: ResourceTracker::new(),
        }
    }

    pub fn with_config(mut self, config: ViewerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tracker(mut self, tracker: ResourceTracker) -> Self {
        self.tracker = tracker;
        self
    }
}

const LOADING_COLOR: Color = Color::new(0.0, 0.722, 0.831);
const ERROR_COLOR: Color = Color::new(1.0, 0.0, 0.0);

/// One open viewer
pub struct ViewerSession<S: RenderSurface> {
    config: ViewerConfig,
    phase: ViewerPhase,
    load_state: LoadState,
    mode: DisplayMode,
    color: Color,
    background: Color,
    camera: Camera,
    controls: OrbitControls,
    surface: S,
    render_loop: RenderLoop,
    loader: MeshLoader,
    tracker: ResourceTracker,
    mesh: Option<NormalizedMesh>,
    resource: Option<ModelResource>,
    format: Option<MeshFormat>,
    marker: Surface,
    spinner: RotationState,
    events: Vec<ViewerEvent>,
    frame_failures: u64,
}

impl<S: RenderSurface> ViewerSession<S> {
    /// Create the surface, camera and controls, start the render loop and begin loading.
    pub fn open(resource: ModelResource, surface: S, context: ViewerContext) -> Result<Self, SurfaceError> {
        let ViewerContext {
            runtime,
            source,
            config,
            tracker,
        } = context;

        let mut controls = OrbitControls::new(config.min_distance, config.max_distance, config.zoom_speed);
        if let Some(factor) = config.damping {
            controls = controls.with_damping(factor);
        }

        let mut session = Self {
            phase: ViewerPhase::Uninitialized,
            load_state: LoadState::Idle,
            mode: config.display_mode,
            color: config.base_color,
            background: config.background,
            camera: Camera::new(1, 1)
                .with_fov_degrees(config.fov_degrees)
                .with_clip(config.near, config.far),
            controls,
            surface,
            render_loop: RenderLoop::new(config.frame_interval()),
            loader: MeshLoader::new(runtime, source),
            tracker,
            mesh: None,
            resource: None,
            format: None,
            marker: Surface::cube(1.0),
            spinner: RotationState::zero(),
            events: Vec::new(),
            frame_failures: 0,
            config,
        };

        session.phase = ViewerPhase::Initializing;
        let (width, height) = session.surface.attach()?;
        session.camera.set_viewport(width, height);
        session.render_loop.start();
        tracing::info!(width, height, "viewer initialized");

        session.load(resource);
        Ok(session)
    }

    /// Switch to another resource. The current model is released and the
    /// previous load, if any, will never be applied.
    pub fn load(&mut self, resource: ModelResource) {
        if matches!(self.phase, ViewerPhase::Disposing | ViewerPhase::Disposed) {
            tracing::warn!(locator = %resource.locator, "load requested on a closed viewer");
            return;
        }
        self.release_mesh();
        self.format = Some(resource.format());
        self.loader.start(&resource);
        self.resource = Some(resource);
        self.load_state = LoadState::Loading { progress: 0 };
        self.phase = ViewerPhase::Loading;
        self.spinner = RotationState::zero();
    }

    /// Apply every event the current load has produced.
    pub fn pump(&mut self) {
        for event in self.loader.poll() {
            match event {
                LoadEvent::Progress(progress) => {
                    self.load_state = LoadState::Loading { progress };
                    self.events.push(ViewerEvent::Progress(progress));
                }
                LoadEvent::Loaded(model) => self.attach_model(model),
                LoadEvent::Failed(error) => {
                    let reason = error.to_string();
                    let kind = error.kind();
                    tracing::error!(%reason, ?kind, "model failed to load");
                    self.load_state = LoadState::Failed {
                        reason: reason.clone(),
                        kind,
                    };
                    self.phase = ViewerPhase::Error;
                    self.events.push(ViewerEvent::Failed { reason, kind });
                }
            }
        }
    }

    fn attach_model(&mut self, model: LoadedModel) {
        let LoadedModel {
            format,
            root,
            byte_len,
        } = model;
        let mut mesh = NormalizedMesh::from_node(root, Material::for_mode(self.mode, self.color));

        let source_bounds = mesh.local_bounds();
        let transform = mesh.normalize(self.config.canonical_size);
        mesh.upload(&self.tracker);

        let triangles = mesh.triangle_count();
        if triangles > LARGE_MODEL_TRIANGLES {
            tracing::warn!(triangles, "very large model, rendering may be slow");
        }
        tracing::info!(
            %format,
            byte_len,
            surfaces = mesh.surfaces().len(),
            triangles,
            size = ?source_bounds.size(),
            scale = transform.scale,
            "model ready"
        );

        self.mesh = Some(mesh);
        self.load_state = LoadState::Ready;
        self.phase = ViewerPhase::Ready;
        self.reframe();
        self.events.push(ViewerEvent::Ready);
    }

    /// Frame the camera on whatever is currently in the scene.
    pub fn reframe(&mut self) -> Option<Framing> {
        let bounds = self.scene_bounds();
        frame_scene(&mut self.camera, &mut self.controls, &bounds, self.config.framing_margin)
    }

    /// World-space bounds of every renderable surface
    pub fn scene_bounds(&self) -> Aabb {
        self.mesh
            .as_ref()
            .map(NormalizedMesh::world_bounds)
            .unwrap_or_else(Aabb::empty)
    }

    /// Produce one frame. Returns false once the render loop has stopped.
    ///
    /// A failing surface is logged and the previous frame stays on screen.
    pub fn frame(&mut self) -> bool {
        if !self.render_loop.is_running() {
            return false;
        }
        self.pump();

        if self.phase == ViewerPhase::Loading {
            self.spinner.rotate(0.01, 0.01, 0.0);
        }
        self.controls.update(&mut self.camera);

        // Field-by-field borrows so the surface can be borrowed mutably below.
        let content = frame_content(
            self.phase,
            &self.load_state,
            self.mesh.as_ref(),
            &self.marker,
            &self.spinner,
            self.format.as_ref(),
        );
        let frame = Frame {
            camera: &self.camera,
            background: self.background,
            show_grid: self.mode != DisplayMode::XRay,
            mode: self.mode,
            phase: self.phase,
            content,
        };
        if let Err(e) = self.surface.render(&frame) {
            self.frame_failures += 1;
            tracing::warn!(error = %e, failures = self.frame_failures, "frame failed, keeping previous frame");
        }
        self.render_loop.record_frame();
        true
    }

    #[cfg(test)]
    fn content(&self) -> FrameContent<'_> {
        frame_content(
            self.phase,
            &self.load_state,
            self.mesh.as_ref(),
            &self.marker,
            &self.spinner,
            self.format.as_ref(),
        )
    }

    /// Reassign every surface's material; effective on the next frame.
    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.mode = mode;
        if let Some(mesh) = &mut self.mesh {
            mesh.apply_display_mode(mode, self.color);
        }
        tracing::debug!(%mode, "display mode changed");
    }

    /// Recolor the existing materials in place; effective on the next frame.
    pub fn set_base_color(&mut self, color: Color) {
        self.color = color;
        if let Some(mesh) = &mut self.mesh {
            mesh.set_color(color);
        }
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    /// Follow a container resize without touching the model.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_viewport(width, height);
        self.surface.resize(width, height);
    }

    /// Release the model, stop the loop and detach the surface.
    ///
    /// Loads still in flight are invalidated and never applied.
    pub fn close(&mut self) {
        if matches!(self.phase, ViewerPhase::Disposing | ViewerPhase::Disposed) {
            return;
        }
        self.phase = ViewerPhase::Disposing;
        self.loader.invalidate();
        self.release_mesh();
        self.render_loop.stop();
        self.surface.detach();
        self.events.clear();
        self.phase = ViewerPhase::Disposed;
        tracing::info!(
            buffers = self.tracker.live_buffers(),
            materials = self.tracker.live_materials(),
            "viewer closed"
        );
    }

    fn release_mesh(&mut self) {
        if let Some(mut mesh) = self.mesh.take() {
            mesh.release();
            tracing::debug!(surfaces = mesh.surfaces().len(), "released model resources");
        }
    }

    /// Drain the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn phase(&self) -> ViewerPhase {
        self.phase
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn mesh(&self) -> Option<&NormalizedMesh> {
        self.mesh.as_ref()
    }

    pub fn resource(&self) -> Option<&ModelResource> {
        self.resource.as_ref()
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn base_color(&self) -> Color {
        self.color
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    /// Controls and camera, for input handlers that pan relative to the view
    pub fn controls_mut(&mut self) -> (&mut OrbitControls, &Camera) {
        (&mut self.controls, &self.camera)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }

    pub fn is_running(&self) -> bool {
        self.render_loop.is_running()
    }

    pub fn resources(&self) -> &ResourceTracker {
        &self.tracker
    }

    pub fn frame_failures(&self) -> u64 {
        self.frame_failures
    }

    /// True while a load has been started but not finished
    pub fn is_loading(&self) -> bool {
        self.loader.is_pending()
    }

    pub fn discarded_results(&self) -> usize {
        self.loader.discarded()
    }
}

/// What to draw for the current phase: the model, a loading or error marker, or nothing.
fn frame_content<'a>(
    phase: ViewerPhase,
    load_state: &'a LoadState,
    mesh: Option<&'a NormalizedMesh>,
    marker: &'a Surface,
    spinner: &RotationState,
    format: Option<&MeshFormat>,
) -> FrameContent<'a> {
    match (phase, load_state) {
        (ViewerPhase::Ready, _) => mesh.map(FrameContent::Model).unwrap_or(FrameContent::Empty),
        (ViewerPhase::Loading, LoadState::Loading { progress }) => FrameContent::Marker(Marker {
            surface: marker,
            model_matrix: Transform::rotation_matrix(spinner),
            material: Material::for_mode(DisplayMode::Wireframe, LOADING_COLOR),
            label: if *progress > 0 {
                format!("Loading: {progress}%")
            } else {
                "Loading...".to_string()
            },
        }),
        (ViewerPhase::Error, LoadState::Failed { reason, .. }) => FrameContent::Marker(Marker {
            surface: marker,
            model_matrix: Matrix4::identity(),
            material: Material::for_mode(DisplayMode::Normal, ERROR_COLOR),
            label: match format {
                Some(format) => format!("{reason} (format: {format})"),
                None => reason.clone(),
            },
        }),
        _ => FrameContent::Empty,
    }
}

impl<S: RenderSurface> Drop for ViewerSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}

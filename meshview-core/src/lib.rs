/// meshview core library - model loading, normalization and viewer lifecycle
///
/// This library loads STL and OBJ models asynchronously, centers and scales
/// them to a canonical size, frames a camera on them and drives a render
/// surface through the viewer's lifecycle.

pub mod bounds;
pub mod catalog;
pub mod config;
pub mod controls;
pub mod error;
pub mod format;
pub mod framing;
pub mod geometry;
pub mod loader;
pub mod material;
pub mod mesh;
pub mod normalize;
pub mod obj;
pub mod projection;
pub mod render_loop;
pub mod resources;
pub mod session;
pub mod source;
pub mod stl;
pub mod transform;

// Re-export commonly used types
pub use bounds::Aabb;
pub use catalog::{HttpCatalog, ModelCatalog, ModelRecord};
pub use config::ViewerConfig;
pub use controls::OrbitControls;
pub use error::{
    CatalogError, ConfigError, LoadError, LoadErrorKind, ParseError, ParseStage, SurfaceError, TransportError,
};
pub use format::{detect_format, MeshFormat};
pub use framing::{compute_framing, frame_scene, Framing};
pub use geometry::{SceneNode, Surface, Triangle, Vertex};
pub use loader::{LoadEvent, LoadState, LoadToken, LoadedModel, MeshLoader, ModelResource};
pub use material::{Color, DisplayMode, Material};
pub use mesh::NormalizedMesh;
pub use normalize::compute_normalization;
pub use projection::Camera;
pub use resources::ResourceTracker;
pub use session::{Frame, FrameContent, Marker, RenderSurface, ViewerContext, ViewerEvent, ViewerPhase, ViewerSession};
pub use source::{ByteSource, FileSource, HttpSource, SourceRouter};
pub use transform::{NodeTransform, RotationState, Transform};

mod common;

use approx::assert_relative_eq;
use common::*;
use meshview_core::framing::framing_distance;
use meshview_core::loader::parse_model;
use meshview_core::session::{ViewerContext, ViewerPhase, ViewerSession};
use meshview_core::{
    Color, DisplayMode, Material, MeshFormat, ModelResource, NormalizedMesh, ViewerConfig,
};
use nalgebra::{Point3, Vector3};
use std::sync::Arc;
use tokio::runtime::Handle;

#[test]
fn single_triangle_is_scaled_to_canonical_size() {
    let root = parse_model(&MeshFormat::Stl, &single_triangle_stl()).unwrap();
    let mut mesh = NormalizedMesh::from_node(root, Material::for_mode(DisplayMode::Normal, Color::new(0.0, 0.7, 0.8)));

    assert_relative_eq!(mesh.local_bounds().size(), Vector3::new(1.0, 1.0, 0.0));
    let transform = mesh.normalize(4.0);
    assert_relative_eq!(transform.scale, 4.0);

    let world = mesh.world_bounds();
    assert_relative_eq!(world.center(), Point3::origin(), epsilon = 1e-5);
    assert_relative_eq!(world.size(), Vector3::new(4.0, 4.0, 0.0), epsilon = 1e-5);
}

#[tokio::test(flavor = "multi_thread")]
async fn stl_resource_ends_framed_and_ready() {
    let source = Arc::new(ScriptedSource::new().with_file("models/part.STL", single_triangle_stl()));
    let context = ViewerContext::new(Handle::current(), source);
    let mut session =
        ViewerSession::open(ModelResource::new("models/part.STL"), RecordingSurface::new(), context).unwrap();
    assert!(frames_until(&mut session, |s| s.phase() == ViewerPhase::Ready).await);

    let mesh = session.mesh().unwrap();
    assert_relative_eq!(mesh.world_bounds().max_extent(), 4.0, epsilon = 1e-5);
    assert!(mesh.surfaces().iter().all(|s| s.is_uploaded()));
    assert!(mesh.surfaces()[0].geometry.has_usable_normals());

    let expected = framing_distance(4.0, 75f32.to_radians(), 1.5);
    let camera = session.camera();
    assert_relative_eq!(camera.target, mesh.world_bounds().center(), epsilon = 1e-4);
    assert_relative_eq!((camera.position - camera.target).norm(), expected, epsilon = 1e-3);
    assert_relative_eq!(session.controls().target, camera.target, epsilon = 1e-4);
}

#[tokio::test(flavor = "multi_thread")]
async fn obj_groups_share_one_transform() {
    let source = Arc::new(ScriptedSource::new().with_file("upload-17", TWO_PART_OBJ));
    let context = ViewerContext::new(Handle::current(), source);
    let resource = ModelResource::new("upload-17").with_format_hint("obj");
    let mut session = ViewerSession::open(resource, RecordingSurface::new(), context).unwrap();
    assert!(frames_until(&mut session, |s| s.phase() == ViewerPhase::Ready).await);

    let mesh = session.mesh().unwrap();
    assert_eq!(mesh.surfaces().len(), 2);
    assert_eq!(mesh.triangle_count(), 3);
    let names: Vec<_> = mesh.surfaces().iter().map(|s| s.geometry.name.as_deref()).collect();
    assert_eq!(names, vec![Some("lid"), Some("base")]);

    // Combined source box is 2 x 2 x 10 around (11, 11, 5).
    let transform = mesh.transform();
    assert_relative_eq!(transform.scale, 0.4, epsilon = 1e-6);
    assert_relative_eq!(transform.offset, Vector3::new(-11.0, -11.0, -5.0), epsilon = 1e-5);
    assert_relative_eq!(mesh.world_bounds().center(), Point3::origin(), epsilon = 1e-5);
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_canonical_size_is_used() {
    let config = ViewerConfig::from_toml_str("canonical_size = 10.0\ndisplay_mode = \"wireframe\"").unwrap();
    let source = Arc::new(ScriptedSource::new().with_file("part.stl", single_triangle_stl()));
    let context = ViewerContext::new(Handle::current(), source).with_config(config);
    let mut session = ViewerSession::open(ModelResource::new("part.stl"), RecordingSurface::new(), context).unwrap();
    assert!(frames_until(&mut session, |s| s.phase() == ViewerPhase::Ready).await);

    assert_relative_eq!(session.mesh().unwrap().world_bounds().max_extent(), 10.0, epsilon = 1e-4);
    assert_eq!(session.display_mode(), DisplayMode::Wireframe);
    session.frame();
    assert!(session.surface().last.materials[0].wireframe);
}

#[tokio::test(flavor = "multi_thread")]
async fn switching_resources_replaces_the_model() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_file("a.stl", single_triangle_stl())
            .with_file("b.obj", TWO_PART_OBJ),
    );
    let context = ViewerContext::new(Handle::current(), source);
    let mut session = ViewerSession::open(ModelResource::new("a.stl"), RecordingSurface::new(), context).unwrap();
    assert!(frames_until(&mut session, |s| s.phase() == ViewerPhase::Ready).await);
    let buffers = session.resources().live_buffers();

    session.load(ModelResource::new("b.obj"));
    assert!(session.mesh().is_none());
    assert_eq!(session.resources().live_buffers(), 0);
    assert!(session.surface().attached);

    assert!(frames_until(&mut session, |s| s.phase() == ViewerPhase::Ready).await);
    assert_eq!(session.mesh().unwrap().surfaces().len(), 2);
    assert!(session.resources().live_buffers() > buffers);
}

#![allow(dead_code)]

use futures::future::BoxFuture;
use futures::FutureExt;
use meshview_core::error::{SurfaceError, TransportError};
use meshview_core::session::{Frame, FrameContent, RenderSurface, ViewerPhase, ViewerSession};
use meshview_core::source::{ByteSource, ChunkCallback};
use meshview_core::{DisplayMode, Material};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Binary STL bytes for triangles given as [normal, v0, v1, v2].
pub fn binary_stl(triangles: &[[[f32; 3]; 4]]) -> Vec<u8> {
    let mut bytes = vec![0u8; 80];
    bytes.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
    for facet in triangles {
        for vector in facet {
            for component in vector {
                bytes.extend_from_slice(&component.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
    }
    bytes
}

pub fn single_triangle_stl() -> Vec<u8> {
    binary_stl(&[[[0.0, 0.0, 1.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]])
}

pub const TWO_PART_OBJ: &str = "\
o lid
v 10 10 10
v 12 10 10
v 12 12 10
v 10 12 10
f 1 2 3 4
o base
v 10 10 0
v 12 10 0
v 11 12 0
f -3 -2 -1
";

/// In-memory byte source. Locators registered as gated wait for [`ScriptedSource::release`].
#[derive(Default)]
pub struct ScriptedSource {
    files: HashMap<String, Vec<u8>>,
    gates: HashMap<String, Arc<Notify>>,
    pub fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, locator: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(locator.to_string(), bytes.into());
        self
    }

    pub fn with_gated_file(mut self, locator: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.gates.insert(locator.to_string(), Arc::new(Notify::new()));
        self.with_file(locator, bytes)
    }

    pub fn release(&self, locator: &str) {
        if let Some(gate) = self.gates.get(locator) {
            gate.notify_one();
        }
    }
}

impl ByteSource for ScriptedSource {
    fn fetch<'a>(
        &'a self,
        locator: &'a str,
        on_chunk: ChunkCallback<'a>,
    ) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        async move {
            let data = self.files.get(locator).cloned().ok_or_else(|| TransportError::NotFound {
                path: locator.into(),
            })?;
            let total = data.len() as u64;
            on_chunk(total / 2, Some(total));
            if let Some(gate) = self.gates.get(locator) {
                gate.notified().await;
            }
            on_chunk(total, Some(total));
            Ok(data)
        }
        .boxed()
    }
}

/// What the last rendered frame contained
#[derive(Debug, Clone, Default)]
pub struct FrameRecord {
    pub phase: Option<ViewerPhase>,
    pub mode: Option<DisplayMode>,
    pub show_grid: bool,
    pub materials: Vec<Material>,
    pub label: Option<String>,
    pub triangles: usize,
}

/// A surface that remembers frames and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub attached: bool,
    pub size: (u32, u32),
    pub rendered: usize,
    pub last: FrameRecord,
    pub failing: Arc<AtomicBool>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            size: (800, 600),
            ..Self::default()
        }
    }
}

impl RenderSurface for RecordingSurface {
    fn attach(&mut self) -> Result<(u32, u32), SurfaceError> {
        self.attached = true;
        Ok(self.size)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), SurfaceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SurfaceError::Io(std::io::Error::new(std::io::ErrorKind::Other, "lost")));
        }
        let mut record = FrameRecord {
            phase: Some(frame.phase),
            mode: Some(frame.mode),
            show_grid: frame.show_grid,
            ..FrameRecord::default()
        };
        match &frame.content {
            FrameContent::Model(mesh) => {
                record.materials = mesh.surfaces().iter().map(|s| *s.material()).collect();
                record.triangles = mesh.triangle_count();
            }
            FrameContent::Marker(marker) => {
                record.materials = vec![marker.material];
                record.label = Some(marker.label.clone());
            }
            FrameContent::Empty => {}
        }
        self.rendered += 1;
        self.last = record;
        Ok(())
    }

    fn detach(&mut self) {
        self.attached = false;
    }
}

/// Produce frames until `done` holds or a couple of seconds pass.
pub async fn frames_until<S: RenderSurface>(
    session: &mut ViewerSession<S>,
    mut done: impl FnMut(&ViewerSession<S>) -> bool,
) -> bool {
    for _ in 0..400 {
        session.frame();
        if done(session) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

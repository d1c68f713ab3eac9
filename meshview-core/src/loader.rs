/// Asynchronous fetch-and-parse of model files.
///
/// Every load gets a generation number. Starting a new load or invalidating the
/// loader bumps the active generation, and both the load task and
/// [`MeshLoader::poll`] drop anything produced under an older one.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::error::{LoadError, LoadErrorKind, ParseError, ParseStage};
use crate::format::{detect_format, MeshFormat};
use crate::geometry::SceneNode;
use crate::obj::parse_obj;
use crate::source::ByteSource;
use crate::stl::parse_stl;

/// A model file to load. Immutable once handed to the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResource {
    pub locator: String,
    pub format_hint: Option<String>,
    pub byte_size: Option<u64>,
}

impl ModelResource {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            format_hint: None,
            byte_size: None,
        }
    }

    pub fn with_format_hint(mut self, hint: impl Into<String>) -> Self {
        self.format_hint = Some(hint.into());
        self
    }

    pub fn with_byte_size(mut self, bytes: u64) -> Self {
        self.byte_size = Some(bytes);
        self
    }

    pub fn format(&self) -> MeshFormat {
        detect_format(&self.locator, self.format_hint.as_deref().unwrap_or(""))
    }
}

/// Progress of the session's current load
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading { progress: u8 },
    Ready,
    Failed { reason: String, kind: LoadErrorKind },
}

/// Parsed geometry, ready for normalization
#[derive(Debug)]
pub struct LoadedModel {
    pub format: MeshFormat,
    pub root: SceneNode,
    pub byte_len: usize,
}

#[derive(Debug)]
pub enum LoadEvent {
    Progress(u8),
    Loaded(LoadedModel),
    Failed(LoadError),
}

impl LoadEvent {
    fn is_terminal(&self) -> bool {
        !matches!(self, LoadEvent::Progress(_))
    }
}

#[derive(Debug)]
struct LoadMessage {
    generation: u64,
    event: LoadEvent,
}

/// Liveness check handed to a load task
#[derive(Debug, Clone)]
pub struct LoadToken {
    generation: u64,
    active: Arc<AtomicU64>,
}

impl LoadToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_live(&self) -> bool {
        self.active.load(Ordering::SeqCst) == self.generation
    }
}

/// Turns (received, total) byte counts into non-decreasing whole percentages.
#[derive(Debug, Default)]
struct ProgressMeter {
    last: Option<u8>,
}

impl ProgressMeter {
    fn update(&mut self, loaded: u64, total: Option<u64>) -> Option<u8> {
        let total = total.filter(|t| *t > 0)?;
        let percent = (loaded.saturating_mul(100) / total).min(100) as u8;
        if self.last.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }
}

/// Decode bytes for a supported format and fill in missing normals.
pub fn parse_model(format: &MeshFormat, bytes: &[u8]) -> Result<SceneNode, LoadError> {
    let mut root = match format {
        MeshFormat::Stl => SceneNode::Surface(parse_stl(bytes)?),
        MeshFormat::Obj => parse_obj(&String::from_utf8_lossy(bytes))?,
        other => {
            return Err(LoadError::UnsupportedFormat {
                format: other.to_string(),
            })
        }
    };
    for surface in root.surfaces_mut() {
        surface.ensure_normals();
    }
    Ok(root)
}

/// Starts loads on a tokio runtime and hands back events for the current one
pub struct MeshLoader {
    runtime: Handle,
    source: Arc<dyn ByteSource>,
    tx: UnboundedSender<LoadMessage>,
    rx: UnboundedReceiver<LoadMessage>,
    active: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
    finished: bool,
    discarded: usize,
}

impl MeshLoader {
    pub fn new(runtime: Handle, source: Arc<dyn ByteSource>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            source,
            tx,
            rx,
            active: Arc::new(AtomicU64::new(0)),
            task: None,
            finished: true,
            discarded: 0,
        }
    }

    /// Make every earlier load stale and stop its task if it is still running.
    pub fn invalidate(&mut self) -> u64 {
        let generation = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.finished = true;
        generation
    }

    /// Begin loading `resource`, replacing any load in flight.
    pub fn start(&mut self, resource: &ModelResource) -> LoadToken {
        let generation = self.invalidate();
        let token = LoadToken {
            generation,
            active: Arc::clone(&self.active),
        };
        self.finished = false;

        let format = resource.format();
        if !format.is_supported() {
            tracing::warn!(locator = %resource.locator, %format, "unsupported format");
            let _ = self.tx.send(LoadMessage {
                generation,
                event: LoadEvent::Failed(LoadError::UnsupportedFormat {
                    format: format.to_string(),
                }),
            });
            return token;
        }

        tracing::info!(locator = %resource.locator, %format, generation, "starting load");
        let task = run_load(
            resource.clone(),
            format,
            Arc::clone(&self.source),
            self.tx.clone(),
            token.clone(),
        );
        self.task = Some(self.runtime.spawn(task));
        token
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.active.load(Ordering::SeqCst) == generation
    }

    /// True while the current load has not delivered its terminal event.
    pub fn is_pending(&self) -> bool {
        !self.finished
    }

    /// Whether the spawned task has exited (or none was spawned).
    pub fn task_done(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Number of events dropped because their load was no longer current
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Drain queued events, keeping only those of the current load.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            if !self.is_current(message.generation) || self.finished {
                if let LoadEvent::Loaded(model) = &message.event {
                    tracing::warn!(
                        generation = message.generation,
                        surfaces = model.root.surfaces().len(),
                        "discarding stale load result"
                    );
                }
                self.discarded += 1;
                continue;
            }
            if message.event.is_terminal() {
                self.finished = true;
            }
            events.push(message.event);
        }
        events
    }
}

impl Drop for MeshLoader {
    fn drop(&mut self) {
        self.invalidate();
    }
}

async fn run_load(
    resource: ModelResource,
    format: MeshFormat,
    source: Arc<dyn ByteSource>,
    tx: UnboundedSender<LoadMessage>,
    token: LoadToken,
) {
    let generation = token.generation();
    let send = |event: LoadEvent| {
        if token.is_live() {
            let _ = tx.send(LoadMessage { generation, event });
        }
    };

    let mut meter = ProgressMeter::default();
    let declared = resource.byte_size;
    let mut on_chunk = |loaded: u64, total: Option<u64>| {
        if let Some(percent) = meter.update(loaded, total.or(declared)) {
            tracing::trace!(generation, percent, "load progress");
            send(LoadEvent::Progress(percent));
        }
    };

    let bytes = match source.fetch(&resource.locator, &mut on_chunk).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(locator = %resource.locator, error = %e, "fetch failed");
            send(LoadEvent::Failed(e.into()));
            return;
        }
    };
    if !token.is_live() {
        tracing::debug!(generation, "load superseded before parsing");
        return;
    }

    let byte_len = bytes.len();
    let parse_format = format.clone();
    let parsed = tokio::task::spawn_blocking(move || parse_model(&parse_format, &bytes)).await;

    let event = match parsed {
        Ok(Ok(root)) => {
            tracing::info!(
                generation,
                surfaces = root.surfaces().len(),
                triangles = root.triangle_count(),
                "model parsed"
            );
            LoadEvent::Loaded(LoadedModel {
                format,
                root,
                byte_len,
            })
        }
        Ok(Err(e)) => {
            tracing::error!(locator = %resource.locator, error = %e, "parse failed");
            LoadEvent::Failed(e)
        }
        Err(join) => {
            tracing::error!(locator = %resource.locator, error = %join, "parser task failed");
            LoadEvent::Failed(LoadError::Parse(ParseError::new(
                if format == MeshFormat::Stl { "stl" } else { "obj" },
                ParseStage::Header,
                "parser aborted",
            )))
        }
    };
    send(event);
}

/// Error types for loading, rendering and configuring the viewer
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Decode stage at which a mesh file was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Header,
    Facet,
    Vertex,
    Face,
    Index,
    Utf8,
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseStage::Header => "header",
            ParseStage::Facet => "facet",
            ParseStage::Vertex => "vertex",
            ParseStage::Face => "face",
            ParseStage::Index => "index",
            ParseStage::Utf8 => "utf8",
        };
        f.write_str(name)
    }
}

/// Bytes were received but could not be interpreted as geometry
#[derive(Debug, Clone, Error)]
#[error("{format} parse failed at {stage}: {message}")]
pub struct ParseError {
    pub format: &'static str,
    pub stage: ParseStage,
    pub message: String,
}

impl ParseError {
    pub fn new(format: &'static str, stage: ParseStage, message: impl Into<String>) -> Self {
        Self {
            format,
            stage,
            message: message.into(),
        }
    }
}

/// Network or filesystem failure while fetching bytes
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("resource not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP {status} while fetching {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Machine-readable classification of a load failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    UnsupportedFormat,
    Transport,
    Parse,
}

/// Everything that can end a load with a failure event
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file format: {format}")]
    UnsupportedFormat { format: String },

    #[error("failed to fetch model: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to parse model: {0}")]
    Parse(#[from] ParseError),
}

impl LoadError {
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            LoadError::UnsupportedFormat { .. } => LoadErrorKind::UnsupportedFormat,
            LoadError::Transport(_) => LoadErrorKind::Transport,
            LoadError::Parse(_) => LoadErrorKind::Parse,
        }
    }
}

/// Failure while presenting a single frame
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render surface is detached")]
    Detached,
}

/// Failure while resolving a model record
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("model {id} not found")]
    NotFound { id: String },

    #[error("catalog returned HTTP {status}")]
    Status { status: u16 },

    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure while reading viewer configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

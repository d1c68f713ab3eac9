/// Mesh format detection from resource identifiers
use std::fmt;

/// Known mesh formats. Only STL and OBJ can be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    Stl,
    Obj,
    Gltf,
    Other(String),
}

impl MeshFormat {
    /// Map a format name or extension to a format, case-insensitively.
    pub fn from_name(name: &str) -> Self {
        let lower = name.trim().trim_start_matches('.').to_ascii_lowercase();
        match lower.as_str() {
            "stl" => MeshFormat::Stl,
            "obj" => MeshFormat::Obj,
            "gltf" | "glb" => MeshFormat::Gltf,
            _ => MeshFormat::Other(lower),
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, MeshFormat::Stl | MeshFormat::Obj)
    }

    pub fn name(&self) -> &str {
        match self {
            MeshFormat::Stl => "stl",
            MeshFormat::Obj => "obj",
            MeshFormat::Gltf => "gltf",
            MeshFormat::Other(name) => name,
        }
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name().is_empty() {
            f.write_str("(unknown)")
        } else {
            f.write_str(self.name())
        }
    }
}

const KNOWN_EXTENSIONS: &[&str] = &["stl", "obj", "gltf", "glb"];

/// Infer the format from the identifier's trailing extension, or fall back.
///
/// URLs have their query string and fragment stripped first so that signed
/// download links still resolve by extension.
pub fn detect_format(identifier: &str, fallback: &str) -> MeshFormat {
    let mut path = identifier;
    if path.contains("://") {
        if let Some(end) = path.find(['?', '#']) {
            path = &path[..end];
        }
    }

    let lower = path.to_ascii_lowercase();
    KNOWN_EXTENSIONS
        .iter()
        .find(|ext| {
            lower
                .strip_suffix(*ext)
                .is_some_and(|stem| stem.ends_with('.'))
        })
        .map(|ext| MeshFormat::from_name(ext))
        .unwrap_or_else(|| MeshFormat::from_name(fallback))
}

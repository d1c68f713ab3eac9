/// Wavefront OBJ parser.
///
/// Reads positions, normals and polygonal faces. Each `o` or `g` statement
/// starts a new named surface; material statements are skipped since material
/// libraries are never resolved.
use nalgebra::{Point3, Vector3};
use nom::{
    bytes::complete::take_till1,
    character::complete::{char, i64 as integer, space0, space1},
    combinator::{all_consuming, opt},
    multi::{many0, many1},
    number::complete::float,
    sequence::{preceded, terminated},
    IResult,
};
use std::collections::HashMap;

use crate::error::{ParseError, ParseStage};
use crate::geometry::{SceneNode, Surface};

#[derive(Debug, Clone, Copy, PartialEq)]
struct FaceVertex {
    position: i64,
    normal: Option<i64>,
}

fn keyword(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace())(input)
}

fn floats(input: &str) -> IResult<&str, Vec<f32>> {
    all_consuming(terminated(many0(preceded(space1, float)), space0))(input)
}

fn face_vertex(input: &str) -> IResult<&str, FaceVertex> {
    let (input, position) = integer(input)?;
    let (input, _texcoord) = opt(preceded(char('/'), opt(integer)))(input)?;
    let (input, normal) = opt(preceded(char('/'), opt(integer)))(input)?;
    Ok((
        input,
        FaceVertex {
            position,
            normal: normal.flatten(),
        },
    ))
}

fn face(input: &str) -> IResult<&str, Vec<FaceVertex>> {
    all_consuming(terminated(many1(preceded(space1, face_vertex)), space0))(input)
}

/// Resolve a 1-based (or negative, relative) OBJ index.
fn resolve_index(raw: i64, len: usize, line: usize) -> Result<usize, ParseError> {
    let resolved = if raw > 0 {
        Some(raw - 1)
    } else if raw < 0 {
        Some(len as i64 + raw)
    } else {
        None
    };
    resolved
        .filter(|i| *i >= 0 && (*i as usize) < len)
        .map(|i| i as usize)
        .ok_or_else(|| {
            ParseError::new(
                "obj",
                ParseStage::Index,
                format!("line {line}: index {raw} out of range (have {len})"),
            )
        })
}

/// Faces gathered for one `o`/`g` section.
#[derive(Default)]
struct SurfaceBuilder {
    name: Option<String>,
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    has_normals: bool,
    indices: Vec<u32>,
    remap: HashMap<(usize, Option<usize>), u32>,
}

impl SurfaceBuilder {
    fn named(name: Option<String>) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn vertex(&mut self, position: Point3<f32>, normal: Option<(usize, Vector3<f32>)>, key: usize) -> u32 {
        let slot = (key, normal.map(|(i, _)| i));
        if let Some(&index) = self.remap.get(&slot) {
            return index;
        }
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(normal.map(|(_, n)| n).unwrap_or_else(Vector3::zeros));
        self.has_normals |= normal.is_some();
        self.remap.insert(slot, index);
        index
    }

    fn finish(self) -> Option<Surface> {
        if self.indices.is_empty() {
            return None;
        }
        let mut surface = Surface::indexed(self.positions, self.indices);
        if self.has_normals {
            surface = surface.with_normals(self.normals);
        }
        if let Some(name) = self.name {
            surface = surface.with_name(name);
        }
        Some(surface)
    }
}

/// Parse OBJ text into a group of surfaces, one per object/group section.
pub fn parse_obj(input: &str) -> Result<SceneNode, ParseError> {
    let mut positions: Vec<Point3<f32>> = Vec::new();
    let mut normals: Vec<Vector3<f32>> = Vec::new();
    let mut surfaces = Vec::new();
    let mut current = SurfaceBuilder::default();

    for (number, raw_line) in input.lines().enumerate() {
        let line_no = number + 1;
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Ok((rest, kw)) = keyword(line) else {
            continue;
        };

        match kw {
            "v" | "vn" => {
                let stage = ParseStage::Vertex;
                let values = floats(rest)
                    .map(|(_, v)| v)
                    .map_err(|_| ParseError::new("obj", stage, format!("line {line_no}: malformed {kw} statement")))?;
                if values.len() < 3 {
                    return Err(ParseError::new(
                        "obj",
                        stage,
                        format!("line {line_no}: {kw} needs 3 components, got {}", values.len()),
                    ));
                }
                if kw == "v" {
                    positions.push(Point3::new(values[0], values[1], values[2]));
                } else {
                    normals.push(Vector3::new(values[0], values[1], values[2]));
                }
            }
            "f" => {
                let (_, corners) = face(rest).map_err(|_| {
                    ParseError::new("obj", ParseStage::Face, format!("line {line_no}: malformed face"))
                })?;
                if corners.len() < 3 {
                    return Err(ParseError::new(
                        "obj",
                        ParseStage::Face,
                        format!("line {line_no}: face needs at least 3 vertices"),
                    ));
                }
                let mut resolved = Vec::with_capacity(corners.len());
                for corner in &corners {
                    let p = resolve_index(corner.position, positions.len(), line_no)?;
                    let n = match corner.normal {
                        Some(raw) => {
                            let i = resolve_index(raw, normals.len(), line_no)?;
                            Some((i, normals[i]))
                        }
                        None => None,
                    };
                    resolved.push(current.vertex(positions[p], n, p));
                }
                // Fan triangulation for polygons
                for i in 1..resolved.len() - 1 {
                    current
                        .indices
                        .extend_from_slice(&[resolved[0], resolved[i], resolved[i + 1]]);
                }
            }
            "o" | "g" => {
                let name = rest.trim();
                let name = (!name.is_empty()).then(|| name.to_string());
                let finished = std::mem::replace(&mut current, SurfaceBuilder::named(name));
                surfaces.extend(finished.finish());
            }
            _ => {}
        }
    }
    surfaces.extend(current.finish());

    tracing::debug!(
        surfaces = surfaces.len(),
        positions = positions.len(),
        "parsed obj"
    );

    Ok(SceneNode::group(
        None,
        surfaces.into_iter().map(SceneNode::Surface).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const QUAD: &str = "\
# a unit quad
mtllib quad.mtl
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vn 0 0 1
usemtl red
f 1/1/1 2/1/1 3/1/1 4/1/1
";

    #[test]
    fn test_quad_is_fanned() {
        let node = parse_obj(QUAD).unwrap();
        let surfaces = node.surfaces();
        assert_eq!(surfaces.len(), 1);
        let quad = surfaces[0];
        assert_eq!(quad.name.as_deref(), Some("quad"));
        assert_eq!(quad.triangle_count(), 2);
        assert_eq!(quad.indices().unwrap(), &[0, 1, 2, 0, 2, 3]);
        assert_relative_eq!(quad.normals().unwrap()[3], Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_groups_become_surfaces() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
g first
f 1 2 3
g second
f 1 3 4
f -4 -2 -1
";
        let node = parse_obj(text).unwrap();
        let surfaces = node.surfaces();
        assert_eq!(surfaces.len(), 2);
        assert_eq!(surfaces[0].name.as_deref(), Some("first"));
        assert_eq!(surfaces[1].triangle_count(), 2);
        assert!(surfaces[1].normals().is_none());
        assert_relative_eq!(node.bounds().size(), Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_face_forms() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\nf 1/1 2/2 3/3\n";
        let node = parse_obj(text).unwrap();
        assert_eq!(node.triangle_count(), 2);
    }

    #[test]
    fn test_index_out_of_range() {
        let err = parse_obj("v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert_eq!(err.stage, ParseStage::Index);
        assert!(err.message.starts_with("line 2"));

        let err = parse_obj("v 0 0 0\nv 1 1 1\nv 1 0 0\nf 0 1 2\n").unwrap_err();
        assert_eq!(err.stage, ParseStage::Index);
    }

    #[test]
    fn test_malformed_statements() {
        let err = parse_obj("v 0 zero 0\n").unwrap_err();
        assert_eq!(err.stage, ParseStage::Vertex);

        let err = parse_obj("v 0 0\n").unwrap_err();
        assert!(err.message.contains("needs 3"));

        let err = parse_obj("v 0 0 0\nv 1 0 0\nf 1 2\n").unwrap_err();
        assert_eq!(err.stage, ParseStage::Face);
    }

    #[test]
    fn test_empty_obj_is_empty_group() {
        let node = parse_obj("# nothing here\n").unwrap();
        assert!(node.surfaces().is_empty());
        assert!(node.bounds().is_empty());
    }
}

/// STL file parser for binary and ASCII formats
use nalgebra::{Point3, Vector3};
use nom::{
    bytes::complete::tag,
    character::complete::{multispace0, multispace1, not_line_ending},
    combinator::opt,
    multi::many0,
    number::complete::float,
    sequence::preceded,
    IResult,
};

use crate::error::{ParseError, ParseStage};
use crate::geometry::{Surface, Triangle, Vertex};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

fn stl_error(stage: ParseStage, message: impl Into<String>) -> ParseError {
    ParseError::new("stl", stage, message)
}

fn read_vec3(bytes: &[u8]) -> Vector3<f32> {
    let f = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    Vector3::new(f(0), f(4), f(8))
}

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Surface, ParseError> {
    if data.len() < HEADER_LEN + 4 {
        return Err(stl_error(
            ParseStage::Header,
            format!("file too small to be a valid STL ({} bytes)", data.len()),
        ));
    }

    let body = &data[HEADER_LEN..];
    let triangle_count = u32::from_le_bytes([body[0], body[1], body[2], body[3]]) as usize;
    let facets = &body[4..];

    let available = facets.len() / FACET_LEN;
    if available < triangle_count {
        return Err(stl_error(
            ParseStage::Facet,
            format!("header declares {triangle_count} triangles but only {available} are present"),
        ));
    }

    let mut triangles = Vec::with_capacity(triangle_count);
    for facet in facets.chunks_exact(FACET_LEN).take(triangle_count) {
        let n = read_vec3(&facet[0..12]);
        let vertex = |offset: usize| {
            let p = read_vec3(&facet[offset..offset + 12]);
            Vertex::new(p.x, p.y, p.z, n.x, n.y, n.z)
        };
        // Trailing two bytes are the attribute byte count
        triangles.push(Triangle::new(vertex(12), vertex(24), vertex(36)));
    }

    Ok(Surface::from_triangles(&triangles))
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Surface, ParseError> {
    match parse_ascii_stl_impl(input) {
        Ok((_, triangles)) => Ok(Surface::from_triangles(&triangles)),
        Err(e) => Err(stl_error(ParseStage::Facet, format!("{e:?}"))),
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Vec<Triangle>> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _) = not_line_ending(input)?; // Optional name
    let (input, triangles) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    let (input, _) = opt(not_line_ending)(input)?;

    Ok((input, triangles))
}

fn parse_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input, normal)?;
    let (input, v2) = parse_vertex(input, normal)?;
    let (input, v3) = parse_vertex(input, normal)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, Triangle::new(v1, v2, v3)))
}

fn parse_vertex(input: &str, normal: Point3<f32>) -> IResult<&str, Vertex> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, p) = parse_vector3(input)?;
    Ok((input, Vertex::new(p.x, p.y, p.z, normal.x, normal.y, normal.z)))
}

fn parse_vector3(input: &str) -> IResult<&str, Point3<f32>> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, Point3::new(x, y, z)))
}

/// A binary file whose size matches its declared triangle count exactly.
fn has_consistent_binary_size(data: &[u8]) -> bool {
    if data.len() < HEADER_LEN + 4 {
        return false;
    }
    let count = u32::from_le_bytes([
        data[HEADER_LEN],
        data[HEADER_LEN + 1],
        data[HEADER_LEN + 2],
        data[HEADER_LEN + 3],
    ]) as usize;
    count
        .checked_mul(FACET_LEN)
        .and_then(|n| n.checked_add(HEADER_LEN + 4))
        == Some(data.len())
}

/// Detect and parse STL file (binary or ASCII)
///
/// Binary files may start with "solid" too, so a file is only treated as ASCII
/// when its size does not match a binary layout.
pub fn parse_stl(data: &[u8]) -> Result<Surface, ParseError> {
    let looks_ascii = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .is_some_and(|start| data[start..].starts_with(b"solid"));

    if looks_ascii && !has_consistent_binary_size(data) {
        let text = std::str::from_utf8(data)
            .map_err(|e| stl_error(ParseStage::Utf8, e.to_string()))?;
        return parse_ascii_stl(text);
    }

    parse_binary_stl(data)
}

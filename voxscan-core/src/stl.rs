//! STL parser for binary and ASCII files
use nom::{
    bytes::complete::{tag, take},
    character::complete::{multispace0, multispace1, not_line_ending},
    combinator::opt,
    multi::{count, many0},
    number::complete::{float, le_f32, le_u32},
    sequence::{preceded, tuple},
    IResult,
};
use tracing::debug;

use crate::error::{Result, VoxScanError};
use crate::geometry::{Mesh, Triangle, Vertex};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh> {
    if data.len() < HEADER_LEN + 4 {
        return Err(VoxScanError::Stl(
            "file too small to be a valid STL".to_string(),
        ));
    }

    let (body, triangle_count) = binary_header(data).map_err(|e| stl_error("header", e))?;
    let triangle_count = triangle_count as usize;
    if body.len() < triangle_count * FACET_LEN {
        return Err(VoxScanError::Stl(format!(
            "expected {} triangles, found data for {}",
            triangle_count,
            body.len() / FACET_LEN
        )));
    }

    let (_, triangles) =
        count(binary_facet, triangle_count)(body).map_err(|e| stl_error("facet", e))?;
    Ok(Mesh { triangles })
}

fn binary_header(input: &[u8]) -> IResult<&[u8], u32> {
    preceded(take(HEADER_LEN), le_u32)(input)
}

fn binary_vector(input: &[u8]) -> IResult<&[u8], (f32, f32, f32)> {
    tuple((le_f32, le_f32, le_f32))(input)
}

fn binary_facet(input: &[u8]) -> IResult<&[u8], Triangle> {
    let (input, (nx, ny, nz)) = binary_vector(input)?;
    let (input, corners) = count(binary_vector, 3)(input)?;
    // Attribute byte count
    let (input, _) = take(2usize)(input)?;

    let vertex = |(x, y, z): (f32, f32, f32)| Vertex::new(x, y, z, nx, ny, nz);
    Ok((
        input,
        Triangle::new(vertex(corners[0]), vertex(corners[1]), vertex(corners[2])),
    ))
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh> {
    match parse_ascii_stl_impl(input) {
        Ok((_, mesh)) => Ok(mesh),
        Err(e) => Err(VoxScanError::Stl(format!("malformed ASCII STL: {:?}", e))),
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Mesh> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _name) = not_line_ending(input)?;
    let (input, triangles) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    let (input, _) = opt(not_line_ending)(input)?;

    Ok((input, Mesh { triangles }))
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

fn parse_vertex(input: &str, normal: (f32, f32, f32)) -> IResult<&str, Vertex> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, (x, y, z)) = parse_vector3(input)?;
    Ok((input, Vertex::new(x, y, z, normal.0, normal.1, normal.2)))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

fn stl_error(what: &str, e: nom::Err<nom::error::Error<&[u8]>>) -> VoxScanError {
    VoxScanError::Stl(format!("truncated binary {}: {:?}", what, e.map(|e| e.code)))
}

/// Detect and parse STL file (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<Mesh> {
    // Binary files may also start with "solid"; fall back when ASCII fails.
    if data.starts_with(b"solid") {
        if let Ok(text) = std::str::from_utf8(data) {
            match parse_ascii_stl(text) {
                Ok(mesh) => {
                    debug!(triangles = mesh.triangles.len(), "Parsed ASCII STL");
                    return Ok(mesh);
                }
                Err(e) => debug!(error = %e, "ASCII parse failed, trying binary"),
            }
        }
    }

    let mesh = parse_binary_stl(data)?;
    debug!(triangles = mesh.triangles.len(), "Parsed binary STL");
    Ok(mesh)
}

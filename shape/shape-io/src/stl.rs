//! STL (Stereolithography) file format support.
//!
//! Supports both ASCII and binary STL. STL stores every facet with its own
//! three corners, so loading merges corners with bit-identical coordinates
//! back into shared points; the point order is first-seen order, which is
//! stable for a given file.
//!
//! # Binary Format
//!
//! ```text
//! UINT8[80]    – Header
//! UINT32       – Number of triangles
//! foreach triangle
//!     REAL32[3] – Normal vector
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count
//! end
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use hashbrown::HashMap;
use nalgebra::Point3;
use shape_types::{Mesh, MeshTopology, Vertex};

use crate::error::{IoError, IoResult};

/// STL binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Size of one triangle in binary STL (normal + 3 vertices + attribute).
const TRIANGLE_SIZE: usize = 50;

/// Collects facet corners and merges identical positions.
struct CornerWelder {
    mesh: Mesh,
    lookup: HashMap<[u64; 3], u32>,
}

impl CornerWelder {
    fn with_capacity(faces: usize) -> Self {
        Self {
            mesh: Mesh::with_capacity(faces / 2 + 3, faces),
            lookup: HashMap::with_capacity(faces / 2 + 3),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    // Truncation: mesh indices are u32, meshes with >4B vertices are unsupported
    fn index_of(&mut self, p: Point3<f64>) -> u32 {
        let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
        let vertices = &mut self.mesh.vertices;
        *self.lookup.entry(key).or_insert_with(|| {
            vertices.push(Vertex::new(p));
            (vertices.len() - 1) as u32
        })
    }

    fn push_facet(&mut self, corners: [Point3<f64>; 3]) {
        let face = [
            self.index_of(corners[0]),
            self.index_of(corners[1]),
            self.index_of(corners[2]),
        ];
        self.mesh.faces.push(face);
    }

    fn finish(self) -> Mesh {
        self.mesh
    }
}

/// Load a mesh from an STL file, detecting ASCII vs binary.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid STL.
pub fn load_stl<P: AsRef<Path>>(path: P) -> IoResult<Mesh> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    File::open(path)
        .map_err(|e| IoError::from_open(e, path))?
        .read_to_end(&mut bytes)?;

    if bytes.len() < 6 {
        return Err(IoError::invalid_content("file too small to be valid STL"));
    }

    if looks_ascii(&bytes) {
        load_stl_ascii(BufReader::new(bytes.as_slice()))
    } else {
        load_stl_binary(&bytes)
    }
}

/// ASCII files start with "solid" and, unlike binary files whose header
/// happens to start with "solid", have a size that does not match the
/// binary layout.
fn looks_ascii(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(HEADER_SIZE)]);
    if !head.trim_start().starts_with("solid") {
        return false;
    }
    if bytes.len() < HEADER_SIZE + 4 {
        return true;
    }
    let count = u32::from_le_bytes([
        bytes[HEADER_SIZE],
        bytes[HEADER_SIZE + 1],
        bytes[HEADER_SIZE + 2],
        bytes[HEADER_SIZE + 3],
    ]) as usize;
    bytes.len() != HEADER_SIZE + 4 + count * TRIANGLE_SIZE
}

fn load_stl_binary(bytes: &[u8]) -> IoResult<Mesh> {
    if bytes.len() < HEADER_SIZE + 4 {
        return Err(IoError::InvalidHeader {
            expected: HEADER_SIZE + 4,
            got: bytes.len(),
        });
    }

    let face_count = u32::from_le_bytes([
        bytes[HEADER_SIZE],
        bytes[HEADER_SIZE + 1],
        bytes[HEADER_SIZE + 2],
        bytes[HEADER_SIZE + 3],
    ]);

    let body = &bytes[HEADER_SIZE + 4..];
    let mut welder = CornerWelder::with_capacity(face_count as usize);

    for i in 0..face_count {
        let start = i as usize * TRIANGLE_SIZE;
        let Some(tri) = body.get(start..start + TRIANGLE_SIZE) else {
            return Err(IoError::InvalidFaceCount {
                expected: face_count,
                got: i,
            });
        };
        // Skip the 12-byte facet normal; it is recomputed downstream.
        welder.push_facet([
            read_point(&tri[12..24]),
            read_point(&tri[24..36]),
            read_point(&tri[36..48]),
        ]);
    }

    Ok(welder.finish())
}

/// Read a point from 12 bytes (3 little-endian f32s).
fn read_point(buf: &[u8]) -> Point3<f64> {
    let x = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let y = f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let z = f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    Point3::new(f64::from(x), f64::from(y), f64::from(z))
}

fn load_stl_ascii<R: BufRead>(reader: R) -> IoResult<Mesh> {
    let mut welder = CornerWelder::with_capacity(0);
    let mut corners: Vec<Point3<f64>> = Vec::with_capacity(3);
    let mut in_loop = false;

    for line in reader.lines() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(keyword) = parts.first() else {
            continue;
        };

        match keyword.to_ascii_lowercase().as_str() {
            "outer" => {
                in_loop = true;
                corners.clear();
            }
            "vertex" if in_loop && parts.len() >= 4 => {
                corners.push(Point3::new(
                    parts[1].parse()?,
                    parts[2].parse()?,
                    parts[3].parse()?,
                ));
            }
            "endloop" => in_loop = false,
            "endfacet" => {
                if let [a, b, c] = corners[..] {
                    welder.push_facet([a, b, c]);
                }
                corners.clear();
            }
            "endsolid" => break,
            _ => {}
        }
    }

    Ok(welder.finish())
}

/// Save a mesh to an STL file.
///
/// STL stores single precision and no point order; prefer PLY for training
/// data that must keep correspondence.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_stl<P: AsRef<Path>>(mesh: &Mesh, path: P, binary: bool) -> IoResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    if binary {
        save_stl_binary(mesh, &mut writer)?;
    } else {
        save_stl_ascii(mesh, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

fn save_stl_binary<W: Write>(mesh: &Mesh, writer: &mut W) -> IoResult<()> {
    let mut header = [b' '; HEADER_SIZE];
    let text = b"Binary STL generated by shape-io";
    header[..text.len()].copy_from_slice(text);
    writer.write_all(&header)?;

    #[allow(clippy::cast_possible_truncation)]
    // Face count: mesh faces limited to u32 range
    let face_count = mesh.faces.len() as u32;
    writer.write_all(&face_count.to_le_bytes())?;

    for tri in mesh.triangles() {
        let n = tri.normal().unwrap_or_else(nalgebra::Vector3::zeros);
        for value in [
            n.x, n.y, n.z, tri.v0.x, tri.v0.y, tri.v0.z, tri.v1.x, tri.v1.y, tri.v1.z, tri.v2.x,
            tri.v2.y, tri.v2.z,
        ] {
            #[allow(clippy::cast_possible_truncation)]
            // Truncation: STL is a single-precision format
            writer.write_all(&(value as f32).to_le_bytes())?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }

    Ok(())
}

fn save_stl_ascii<W: Write>(mesh: &Mesh, writer: &mut W) -> IoResult<()> {
    writeln!(writer, "solid mesh")?;

    for tri in mesh.triangles() {
        let n = tri.normal().unwrap_or_else(nalgebra::Vector3::zeros);
        writeln!(writer, "  facet normal {:.6e} {:.6e} {:.6e}", n.x, n.y, n.z)?;
        writeln!(writer, "    outer loop")?;
        for v in [tri.v0, tri.v1, tri.v2] {
            writeln!(writer, "      vertex {:.9e} {:.9e} {:.9e}", v.x, v.y, v.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }

    writeln!(writer, "endsolid mesh")?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use shape_types::unit_cube;

    #[test]
    fn binary_roundtrip_welds_corners() {
        let original = unit_cube();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.stl");
        save_stl(&original, &path, true).unwrap();

        let loaded = load_stl(&path).unwrap();
        assert_eq!(loaded.face_count(), 12);
        assert_eq!(loaded.vertex_count(), 8);
        assert!((loaded.signed_volume() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ascii_roundtrip() {
        let original = unit_cube();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube_ascii.stl");
        save_stl(&original, &path, false).unwrap();

        let loaded = load_stl(&path).unwrap();
        assert_eq!(loaded.face_count(), 12);
        assert_eq!(loaded.vertex_count(), 8);
    }

    #[test]
    fn ascii_parsing() {
        let ascii_stl = b"solid test
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid test";

        let mesh = load_stl_ascii(BufReader::new(&ascii_stl[..])).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn truncated_binary_rejected() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; TRIANGLE_SIZE]);
        let result = load_stl_binary(&bytes);
        assert!(matches!(
            result,
            Err(IoError::InvalidFaceCount {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn load_nonexistent_file() {
        let result = load_stl("nonexistent_file_12345.stl");
        assert!(matches!(result, Err(IoError::FileNotFound { .. })));
    }
}

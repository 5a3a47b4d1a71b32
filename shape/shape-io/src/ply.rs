//! PLY (Polygon File Format) support.
//!
//! PLY is the default export format for training data: it keeps the point
//! order of a mesh exactly, which is what point correspondence relies on.
//!
//! # Supported Properties
//!
//! - Vertex positions (x, y, z) - required, `float` or `double`
//! - Vertex normals (nx, ny, nz) - optional
//! - Face vertex indices (`vertex_indices` or `vertex_index`)
//!
//! # Example
//!
//! ```no_run
//! use shape_io::{load_ply, save_ply};
//!
//! let mesh = load_ply("bone.ply").unwrap();
//! save_ply(&mesh, "copy.ply", true).unwrap(); // Binary
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Vector3;
use ply_rs::parser::Parser;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use shape_types::{Mesh, Vertex};

use crate::error::{IoError, IoResult};

/// Load a mesh from a PLY file.
///
/// Supports ASCII, binary little-endian, and binary big-endian files.
/// Polygons with more than three corners are fan-triangulated.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid PLY, or a face
/// references a vertex that does not exist.
pub fn load_ply<P: AsRef<Path>>(path: P) -> IoResult<Mesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::from_open(e, path))?;
    let mut reader = BufReader::new(file);

    let parser = Parser::<DefaultElement>::new();
    let header = parser
        .read_header(&mut reader)
        .map_err(|e| IoError::invalid_content(format!("failed to parse PLY header: {e}")))?;
    let payload = parser
        .read_payload(&mut reader, &header)
        .map_err(|e| IoError::invalid_content(format!("failed to read PLY payload: {e}")))?;

    let mut mesh = Mesh::new();

    if let Some(vertex_elements) = payload.get("vertex") {
        mesh.vertices.reserve(vertex_elements.len());
        for (i, element) in vertex_elements.iter().enumerate() {
            let (Some(x), Some(y), Some(z)) = (
                get_float_property(element, "x"),
                get_float_property(element, "y"),
                get_float_property(element, "z"),
            ) else {
                return Err(IoError::invalid_content(format!(
                    "vertex {i} is missing an x, y or z property"
                )));
            };
            let mut vertex = Vertex::from_coords(x, y, z);
            if let (Some(nx), Some(ny), Some(nz)) = (
                get_float_property(element, "nx"),
                get_float_property(element, "ny"),
                get_float_property(element, "nz"),
            ) {
                vertex.normal = Some(Vector3::new(nx, ny, nz));
            }
            mesh.vertices.push(vertex);
        }
    }

    if let Some(face_elements) = payload.get("face") {
        mesh.faces.reserve(face_elements.len());
        for element in face_elements {
            let indices = get_index_list(element);
            if indices.len() >= 3 {
                for i in 1..indices.len() - 1 {
                    mesh.faces.push([indices[0], indices[i], indices[i + 1]]);
                }
            }
        }
    }

    mesh.validate()?;
    Ok(mesh)
}

/// Extract a scalar float property from a PLY element.
fn get_float_property(element: &DefaultElement, key: &str) -> Option<f64> {
    match element.get(key)? {
        Property::Float(v) => Some(f64::from(*v)),
        Property::Double(v) => Some(*v),
        _ => None,
    }
}

/// Extract the vertex index list from a face element.
#[allow(clippy::cast_sign_loss)]
// Sign: negative indices are invalid and surface as out-of-range in validate()
fn get_index_list(element: &DefaultElement) -> Vec<u32> {
    for key in &["vertex_indices", "vertex_index"] {
        if let Some(prop) = element.get(*key) {
            return match prop {
                Property::ListInt(v) => v.iter().map(|&i| i as u32).collect(),
                Property::ListUInt(v) => v.clone(),
                Property::ListUChar(v) => v.iter().map(|&i| u32::from(i)).collect(),
                Property::ListChar(v) => v.iter().map(|&i| i as u32).collect(),
                Property::ListShort(v) => v.iter().map(|&i| i as u32).collect(),
                Property::ListUShort(v) => v.iter().map(|&i| u32::from(i)).collect(),
                _ => continue,
            };
        }
    }
    Vec::new()
}

/// Save a mesh to a PLY file.
///
/// Positions are written as `double` so that a save/load cycle preserves
/// coordinates exactly. Normals are written when every vertex has one.
///
/// # Arguments
///
/// * `mesh` - The mesh to save
/// * `path` - Output file path
/// * `binary` - If true, save as binary little-endian; if false, save as ASCII
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_ply<P: AsRef<Path>>(mesh: &Mesh, path: P, binary: bool) -> IoResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    if binary {
        save_ply_binary(mesh, &mut writer)?;
    } else {
        save_ply_ascii(mesh, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Save mesh as binary PLY (little-endian).
///
/// Written by hand because ply-rs writes the element count instead of the
/// list length for binary list properties.
fn save_ply_binary<W: Write>(mesh: &Mesh, writer: &mut W) -> IoResult<()> {
    let with_normals = mesh.has_normals();

    writeln!(writer, "ply")?;
    writeln!(writer, "format binary_little_endian 1.0")?;
    writeln!(writer, "comment Generated by shape-io")?;
    writeln!(writer, "element vertex {}", mesh.vertices.len())?;
    writeln!(writer, "property double x")?;
    writeln!(writer, "property double y")?;
    writeln!(writer, "property double z")?;
    if with_normals {
        writeln!(writer, "property float nx")?;
        writeln!(writer, "property float ny")?;
        writeln!(writer, "property float nz")?;
    }
    writeln!(writer, "element face {}", mesh.faces.len())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    for v in &mesh.vertices {
        writer.write_all(&v.position.x.to_le_bytes())?;
        writer.write_all(&v.position.y.to_le_bytes())?;
        writer.write_all(&v.position.z.to_le_bytes())?;
        if with_normals {
            let n = v.normal.unwrap_or_else(Vector3::zeros);
            #[allow(clippy::cast_possible_truncation)]
            // Truncation: normals are unit vectors, f32 is ample
            {
                writer.write_all(&(n.x as f32).to_le_bytes())?;
                writer.write_all(&(n.y as f32).to_le_bytes())?;
                writer.write_all(&(n.z as f32).to_le_bytes())?;
            }
        }
    }

    for &[i0, i1, i2] in &mesh.faces {
        writer.write_all(&[3u8])?;
        #[allow(clippy::cast_possible_wrap)]
        {
            writer.write_all(&(i0 as i32).to_le_bytes())?;
            writer.write_all(&(i1 as i32).to_le_bytes())?;
            writer.write_all(&(i2 as i32).to_le_bytes())?;
        }
    }

    Ok(())
}

/// Save mesh as ASCII PLY using ply-rs.
fn save_ply_ascii<W: Write>(mesh: &Mesh, writer: &mut W) -> IoResult<()> {
    let with_normals = mesh.has_normals();

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;
    ply.header
        .comments
        .push("Generated by shape-io".to_string());

    let mut vertex_def = ElementDef::new("vertex".to_string());
    let mut keys = vec!["x", "y", "z"];
    if with_normals {
        keys.extend(["nx", "ny", "nz"]);
    }
    for key in &keys {
        vertex_def.properties.add(PropertyDef::new(
            (*key).to_string(),
            PropertyType::Scalar(ScalarType::Double),
        ));
    }
    vertex_def.count = mesh.vertices.len();
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    ));
    face_def.count = mesh.faces.len();
    ply.header.elements.add(face_def);

    let mut vertex_elements = Vec::with_capacity(mesh.vertices.len());
    for v in &mesh.vertices {
        let mut element = DefaultElement::new();
        element.insert("x".to_string(), Property::Double(v.position.x));
        element.insert("y".to_string(), Property::Double(v.position.y));
        element.insert("z".to_string(), Property::Double(v.position.z));
        if with_normals {
            let n = v.normal.unwrap_or_else(Vector3::zeros);
            element.insert("nx".to_string(), Property::Double(n.x));
            element.insert("ny".to_string(), Property::Double(n.y));
            element.insert("nz".to_string(), Property::Double(n.z));
        }
        vertex_elements.push(element);
    }
    ply.payload.insert("vertex".to_string(), vertex_elements);

    let mut face_elements = Vec::with_capacity(mesh.faces.len());
    for &[i0, i1, i2] in &mesh.faces {
        let mut element = DefaultElement::new();
        #[allow(clippy::cast_possible_wrap)]
        let indices = vec![i0 as i32, i1 as i32, i2 as i32];
        element.insert("vertex_indices".to_string(), Property::ListInt(indices));
        face_elements.push(element);
    }
    ply.payload.insert("face".to_string(), face_elements);

    Writer::new()
        .write_ply(writer, &mut ply)
        .map_err(|e| IoError::invalid_content(format!("failed to write PLY: {e}")))?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use shape_types::{unit_cube, MeshTopology};

    #[test]
    fn roundtrip_binary_is_exact() {
        let mut original = unit_cube();
        original.translate(Vector3::new(0.1, 1.0 / 3.0, -7.25));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.ply");
        save_ply(&original, &path, true).unwrap();

        let loaded = load_ply(&path).unwrap();
        assert_eq!(loaded.face_count(), 12);
        assert_eq!(loaded.faces, original.faces);
        for (a, b) in original.vertices.iter().zip(&loaded.vertices) {
            assert_eq!(a.position, b.position);
        }
    }

    #[test]
    fn roundtrip_ascii_with_normals() {
        let mut original = unit_cube();
        for v in &mut original.vertices {
            v.normal = Some(Vector3::new(0.0, 0.0, 1.0));
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube_ascii.ply");
        save_ply(&original, &path, false).unwrap();

        let loaded = load_ply(&path).unwrap();
        assert_eq!(loaded.vertex_count(), 8);
        assert_eq!(loaded.face_count(), 12);
        assert!(loaded.has_normals());
        assert_eq!(loaded.vertices[3].normal, Some(Vector3::z()));
    }

    #[test]
    fn quad_faces_are_fan_triangulated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.ply");
        std::fs::write(
            &path,
            "ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\nproperty float z\n\
             element face 1\nproperty list uchar int vertex_indices\nend_header\n\
             0 0 0\n1 0 0\n1 1 0\n0 1 0\n4 0 1 2 3\n",
        )
        .unwrap();

        let mesh = load_ply(&path).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn out_of_range_face_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ply");
        std::fs::write(
            &path,
            "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\n\
             element face 1\nproperty list uchar int vertex_indices\nend_header\n\
             0 0 0\n1 0 0\n1 1 0\n3 0 1 5\n",
        )
        .unwrap();

        assert!(matches!(load_ply(&path), Err(IoError::Types(_))));
    }

    #[test]
    fn load_nonexistent_file() {
        let result = load_ply("nonexistent_file_12345.ply");
        assert!(matches!(result, Err(IoError::FileNotFound { .. })));
    }
}

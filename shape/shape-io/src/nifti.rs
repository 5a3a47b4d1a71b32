//! NIfTI-1 single-file (`.nii`) label volume support.
//!
//! Only the parts of the format a segmentation needs are read: the voxel
//! grid, voxel spacing and the qform translation. Rotation in the qform or
//! sform is ignored, matching how label maps are meshed in voxel-aligned
//! world space.
//!
//! # Header Layout (348 bytes)
//!
//! ```text
//! 0    i32      sizeof_hdr (348, also used to detect byte order)
//! 40   i16[8]   dim        (dim[0] = rank, dim[1..4] = nx, ny, nz)
//! 70   i16      datatype
//! 72   i16      bitpix
//! 76   f32[8]   pixdim     (pixdim[1..4] = voxel spacing)
//! 108  f32      vox_offset
//! 112  f32      scl_slope
//! 116  f32      scl_inter
//! 252  i16      qform_code
//! 268  f32[3]   qoffset_x, qoffset_y, qoffset_z
//! 344  u8[4]    magic      ("n+1\0")
//! ```

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};
use shape_types::LabelVolume;
use tracing::debug;

use crate::error::{IoError, IoResult};

const HEADER_SIZE: usize = 348;
const SIZEOF_HDR: i32 = 348;
const DATA_OFFSET: usize = 352;
const MAGIC: &[u8; 4] = b"n+1\0";

const DT_UINT8: i16 = 2;
const DT_INT16: i16 = 4;
const DT_INT32: i16 = 8;
const DT_FLOAT32: i16 = 16;
const DT_FLOAT64: i16 = 64;
const DT_INT8: i16 = 256;
const DT_UINT16: i16 = 512;
const DT_UINT32: i16 = 768;

/// Byte-order aware view over a NIfTI header.
struct Header<'a> {
    bytes: &'a [u8],
    big_endian: bool,
}

impl Header<'_> {
    fn raw<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[offset..offset + N]);
        if self.big_endian {
            out.reverse();
        }
        out
    }

    fn i16_at(&self, offset: usize) -> i16 {
        i16::from_le_bytes(self.raw(offset))
    }

    fn i32_at(&self, offset: usize) -> i32 {
        i32::from_le_bytes(self.raw(offset))
    }

    fn f32_at(&self, offset: usize) -> f32 {
        f32::from_le_bytes(self.raw(offset))
    }
}

/// Load a label volume from a NIfTI-1 `.nii` file.
///
/// Voxel values are scaled by `scl_slope`/`scl_inter` when a slope is set
/// and rounded to the nearest integer label. Higher dimensions beyond the
/// third are ignored; the first 3D volume is read.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the header is malformed, the
/// datatype is not an integer or float scalar type, or a voxel is not finite.
///
/// # Example
///
/// ```no_run
/// use shape_io::load_nifti;
///
/// let volume = load_nifti("subject_01.nii").unwrap();
/// println!("labels: {:?}", volume.labels_present());
/// ```
pub fn load_nifti<P: AsRef<Path>>(path: P) -> IoResult<LabelVolume> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    File::open(path)
        .map_err(|e| IoError::from_open(e, path))?
        .read_to_end(&mut bytes)?;
    let volume = parse_nifti(&bytes)?;
    debug!(
        path = %path.display(),
        dims = ?volume.dims(),
        "Loaded NIfTI volume"
    );
    Ok(volume)
}

/// Decode an in-memory NIfTI-1 file.
///
/// # Errors
///
/// Same as [`load_nifti`].
pub fn parse_nifti(bytes: &[u8]) -> IoResult<LabelVolume> {
    if bytes.len() < HEADER_SIZE {
        return Err(IoError::InvalidHeader {
            expected: HEADER_SIZE,
            got: bytes.len(),
        });
    }

    let sizeof_hdr = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let big_endian = match i32::from_le_bytes(sizeof_hdr) {
        SIZEOF_HDR => false,
        _ if i32::from_be_bytes(sizeof_hdr) == SIZEOF_HDR => true,
        n => {
            return Err(IoError::invalid_content(format!(
                "sizeof_hdr is {n}, expected {HEADER_SIZE}"
            )))
        }
    };
    if &bytes[344..348] != MAGIC {
        return Err(IoError::invalid_content(
            "missing n+1 magic (only single-file .nii is supported)",
        ));
    }

    let header = Header { bytes, big_endian };

    let rank = header.i16_at(40);
    if !(1..=7).contains(&rank) {
        return Err(IoError::invalid_content(format!("invalid dim[0] = {rank}")));
    }
    let mut dims = [1usize; 3];
    for (axis, dim) in dims.iter_mut().enumerate() {
        if axis < rank as usize {
            let n = header.i16_at(42 + 2 * axis);
            if n < 1 {
                return Err(IoError::invalid_content(format!(
                    "dim[{}] = {n} must be positive",
                    axis + 1
                )));
            }
            *dim = usize::from(n.unsigned_abs());
        }
    }

    let spacing = Vector3::new(
        f64::from(header.f32_at(80)).abs(),
        f64::from(header.f32_at(84)).abs(),
        f64::from(header.f32_at(88)).abs(),
    );
    let spacing = spacing.map(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });

    let origin = if header.i16_at(252) > 0 {
        Point3::new(
            f64::from(header.f32_at(268)),
            f64::from(header.f32_at(272)),
            f64::from(header.f32_at(276)),
        )
    } else {
        Point3::origin()
    };

    let datatype = header.i16_at(70);
    let width = match datatype {
        DT_UINT8 | DT_INT8 => 1,
        DT_INT16 | DT_UINT16 => 2,
        DT_INT32 | DT_UINT32 | DT_FLOAT32 => 4,
        DT_FLOAT64 => 8,
        code => return Err(IoError::UnsupportedDatatype { code }),
    };

    let vox_offset = header.f32_at(108);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    // Saturating cast; an absurd offset is caught by the range check below
    let offset = if vox_offset.is_finite() && vox_offset >= 348.0 {
        vox_offset as usize
    } else {
        DATA_OFFSET
    };

    let count = dims[0] * dims[1] * dims[2];
    let needed = count
        .checked_mul(width)
        .and_then(|len| offset.checked_add(len))
        .ok_or_else(|| IoError::invalid_content(format!("voxel data offset {vox_offset} is out of range")))?;
    if bytes.len() < needed {
        return Err(IoError::invalid_content(format!(
            "voxel data truncated: need {needed} bytes, file has {}",
            bytes.len()
        )));
    }

    let slope = f64::from(header.f32_at(112));
    let inter = f64::from(header.f32_at(116));
    let scaled = slope != 0.0 && slope.is_finite() && !(slope == 1.0 && inter == 0.0);

    let mut data = Vec::with_capacity(count);
    for chunk in bytes[offset..needed].chunks_exact(width) {
        let raw = decode_voxel(chunk, datatype, big_endian);
        let value = if scaled { raw.mul_add(slope, inter) } else { raw };
        if !value.is_finite() {
            return Err(IoError::invalid_content("non-finite voxel value"));
        }
        #[allow(clippy::cast_possible_truncation)]
        // Saturating float-to-int cast; labels are small integers
        data.push(value.round() as i32);
    }

    Ok(LabelVolume::new(dims, spacing, origin, data)?)
}

fn decode_voxel(chunk: &[u8], datatype: i16, big_endian: bool) -> f64 {
    let mut buf = [0u8; 8];
    buf[..chunk.len()].copy_from_slice(chunk);
    if big_endian {
        buf[..chunk.len()].reverse();
    }
    match datatype {
        DT_UINT8 => f64::from(buf[0]),
        DT_INT8 => f64::from(i8::from_le_bytes([buf[0]])),
        DT_INT16 => f64::from(i16::from_le_bytes([buf[0], buf[1]])),
        DT_UINT16 => f64::from(u16::from_le_bytes([buf[0], buf[1]])),
        DT_INT32 => f64::from(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])),
        DT_UINT32 => f64::from(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])),
        DT_FLOAT32 => f64::from(f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])),
        _ => f64::from_le_bytes(buf),
    }
}

/// Save a label volume as a little-endian NIfTI-1 `.nii` file with `int16`
/// voxels.
///
/// # Errors
///
/// Returns an error if the file cannot be written, a dimension exceeds
/// `i16::MAX`, or a label does not fit in `int16`.
pub fn save_nifti<P: AsRef<Path>>(volume: &LabelVolume, path: P) -> IoResult<()> {
    let [nx, ny, nz] = volume.dims();
    let mut dims = [0i16; 3];
    for (out, n) in dims.iter_mut().zip([nx, ny, nz]) {
        *out = i16::try_from(n)
            .map_err(|_| IoError::invalid_content(format!("dimension {n} exceeds int16")))?;
    }

    let mut header = [0u8; DATA_OFFSET];
    let put_i16 = |h: &mut [u8; DATA_OFFSET], offset: usize, v: i16| {
        h[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
    };
    let put_f32 = |h: &mut [u8; DATA_OFFSET], offset: usize, v: f32| {
        h[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
    };

    header[0..4].copy_from_slice(&SIZEOF_HDR.to_le_bytes());
    put_i16(&mut header, 40, 3);
    put_i16(&mut header, 42, dims[0]);
    put_i16(&mut header, 44, dims[1]);
    put_i16(&mut header, 46, dims[2]);
    for axis in 4..8 {
        put_i16(&mut header, 40 + 2 * axis, 1);
    }
    put_i16(&mut header, 70, DT_INT16);
    put_i16(&mut header, 72, 16);

    let spacing = volume.spacing();
    let origin = volume.origin();
    // Truncation: NIfTI-1 stores geometry as f32
    #[allow(clippy::cast_possible_truncation)]
    let (spacing, origin) = (spacing.map(|s| s as f32), origin.map(|o| o as f32));
    put_f32(&mut header, 76, 1.0);
    put_f32(&mut header, 80, spacing.x);
    put_f32(&mut header, 84, spacing.y);
    put_f32(&mut header, 88, spacing.z);
    put_f32(&mut header, 108, 352.0);
    put_f32(&mut header, 112, 1.0);
    put_f32(&mut header, 268, origin.x);
    put_f32(&mut header, 272, origin.y);
    put_f32(&mut header, 276, origin.z);
    // xyzt_units: millimetres
    header[123] = 2;
    put_i16(&mut header, 252, 1);
    header[344..348].copy_from_slice(MAGIC);

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&header)?;
    for &label in volume.data() {
        let value = i16::try_from(label)
            .map_err(|_| IoError::invalid_content(format!("label {label} exceeds int16")))?;
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

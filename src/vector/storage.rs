//! Memory-mapped persistence for the vector matrix and the similarity index.
//!
//! # Storage Format
//!
//! Both artifacts share a 16-byte header followed by row-major
//! little-endian `f32` values:
//! - Header: magic (4 bytes), version, dimension, row count (u32 LE each)
//! - Index only: metric (u32), reserved (u32), matrix fingerprint (32 bytes)
//! - Rows: `count * dimension` values
//!
//! Row order is document order; rows carry no ids of their own.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use memmap2::{Mmap, MmapOptions};
use thiserror::Error;

use crate::artifact::write_atomic;
use crate::error::{PipelineError, PipelineResult};
use crate::vector::{VectorDimension, VectorError, VectorMatrix};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the common header in bytes.
const HEADER_SIZE: usize = 16;

/// Extra index header: metric, reserved, fingerprint.
const INDEX_EXTRA_SIZE: usize = 4 + 4 + 32;

/// Magic bytes identifying a vector matrix file.
const MATRIX_MAGIC: &[u8; 4] = b"VGMX";

/// Magic bytes identifying a similarity index file.
const INDEX_MAGIC: &[u8; 4] = b"VGIX";

/// Metric tag for exact inner product.
pub(crate) const METRIC_INNER_PRODUCT: u32 = 1;

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

/// Errors specific to artifact decoding.
#[derive(Error, Debug)]
pub enum VectorStorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error(
        "Invalid storage version: expected {expected}, got {actual}\nSuggestion: Regenerate the artifact with this version of vaultgraph"
    )]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),
}

/// Decoded index file contents.
#[derive(Debug)]
pub(crate) struct IndexFile {
    pub metric: u32,
    pub fingerprint: [u8; 32],
    pub vectors: VectorMatrix,
}

/// Persist the vector matrix as a single artifact.
pub fn save_matrix(path: &Path, matrix: &VectorMatrix) -> PipelineResult<()> {
    write_atomic(path, |w| {
        write_header(w, MATRIX_MAGIC, matrix)?;
        write_rows(w, matrix)
    })?;
    tracing::info!(
        path = %path.display(),
        rows = matrix.rows(),
        dimension = matrix.dimension().get(),
        "vector matrix saved"
    );
    Ok(())
}

/// Load a vector matrix written by [`save_matrix`].
pub fn load_matrix(path: &Path) -> PipelineResult<VectorMatrix> {
    read_matrix(path).map_err(|e| PipelineError::read(path, e))
}

pub(crate) fn save_index_file(
    path: &Path,
    metric: u32,
    fingerprint: &[u8; 32],
    vectors: &VectorMatrix,
) -> PipelineResult<()> {
    write_atomic(path, |w| {
        write_header(w, INDEX_MAGIC, vectors)?;
        w.write_all(&metric.to_le_bytes())?;
        w.write_all(&0u32.to_le_bytes())?;
        w.write_all(fingerprint)?;
        write_rows(w, vectors)
    })
}

pub(crate) fn load_index_file(path: &Path) -> PipelineResult<IndexFile> {
    read_index(path).map_err(|e| PipelineError::read(path, e))
}

fn read_matrix(path: &Path) -> Result<VectorMatrix, VectorStorageError> {
    let mmap = map_file(path)?;
    let (dimension, count) = read_header(&mmap, MATRIX_MAGIC)?;
    decode_rows(&mmap[HEADER_SIZE..], dimension, count)
}

fn read_index(path: &Path) -> Result<IndexFile, VectorStorageError> {
    let mmap = map_file(path)?;
    let (dimension, count) = read_header(&mmap, INDEX_MAGIC)?;

    let extra = mmap
        .get(HEADER_SIZE..HEADER_SIZE + INDEX_EXTRA_SIZE)
        .ok_or_else(|| {
            VectorStorageError::InvalidFormat("File too small to contain index header".into())
        })?;
    let metric = read_u32(extra, 0);
    let mut fingerprint = [0u8; 32];
    fingerprint.copy_from_slice(&extra[8..40]);

    let vectors = decode_rows(&mmap[HEADER_SIZE + INDEX_EXTRA_SIZE..], dimension, count)?;
    Ok(IndexFile {
        metric,
        fingerprint,
        vectors,
    })
}

fn map_file(path: &Path) -> Result<Mmap, VectorStorageError> {
    let file = File::open(path)?;
    // Artifacts are replaced by rename, never modified in place
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    Ok(mmap)
}

fn write_header(w: &mut dyn Write, magic: &[u8; 4], matrix: &VectorMatrix) -> io::Result<()> {
    let dimension = u32::try_from(matrix.dimension().get())
        .map_err(|_| io::Error::other("dimension does not fit in u32"))?;
    let rows = u32::try_from(matrix.rows())
        .map_err(|_| io::Error::other("row count does not fit in u32"))?;

    w.write_all(magic)?;
    w.write_all(&STORAGE_VERSION.to_le_bytes())?;
    w.write_all(&dimension.to_le_bytes())?;
    w.write_all(&rows.to_le_bytes())
}

fn write_rows(w: &mut dyn Write, matrix: &VectorMatrix) -> io::Result<()> {
    for &value in matrix.as_slice() {
        w.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

fn read_header(
    bytes: &[u8],
    magic: &[u8; 4],
) -> Result<(VectorDimension, usize), VectorStorageError> {
    if bytes.len() < HEADER_SIZE {
        return Err(VectorStorageError::InvalidFormat(
            "File too small to contain header".to_string(),
        ));
    }

    if &bytes[0..4] != magic {
        return Err(VectorStorageError::InvalidFormat(format!(
            "Invalid magic bytes, expected {}",
            String::from_utf8_lossy(magic)
        )));
    }

    let version = read_u32(bytes, 4);
    if version != STORAGE_VERSION {
        return Err(VectorStorageError::VersionMismatch {
            expected: STORAGE_VERSION,
            actual: version,
        });
    }

    let dimension = VectorDimension::new(read_u32(bytes, 8) as usize)?;
    let count = read_u32(bytes, 12) as usize;

    Ok((dimension, count))
}

fn decode_rows(
    payload: &[u8],
    dimension: VectorDimension,
    count: usize,
) -> Result<VectorMatrix, VectorStorageError> {
    let expected = count
        .checked_mul(dimension.get())
        .and_then(|values| values.checked_mul(BYTES_PER_F32))
        .ok_or_else(|| {
            VectorStorageError::InvalidFormat(format!(
                "Header claims {count} rows of dimension {dimension}, which cannot fit in memory"
            ))
        })?;
    if payload.len() != expected {
        return Err(VectorStorageError::InvalidFormat(format!(
            "Expected {expected} bytes of vector data for {count} rows, found {}",
            payload.len()
        )));
    }

    let data: Vec<f32> = payload
        .chunks_exact(BYTES_PER_F32)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(VectorMatrix::from_flat(dimension, data)?)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

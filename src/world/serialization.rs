use crate::tiles::{ChunkCell, ChunkPos, PrototypeCatalog, PrototypeId, SolvedChunk};
use bevy::math::{IVec2, UVec2};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

/// Magic number for solved chunk files ("WFCC" in ASCII)
const MAGIC_NUMBER: [u8; 4] = [b'W', b'F', b'C', b'C'];

/// Current chunk file format version
const VERSION: u16 = 1;

/// Upper bound on cells per stored chunk, guards the body allocation
const MAX_STORED_CELLS: u64 = 1 << 24;

/// Encoded size of one `CellRecord` (u16 prototype + bool)
const RECORD_BYTES: u64 = 3;

/// bincode length prefix of the record sequence
const LENGTH_PREFIX_BYTES: u64 = 8;

/// Error type for serialization operations
#[derive(Debug)]
pub enum SerializationError {
    Io(io::Error),
    Encode(bincode::Error),
    InvalidMagicNumber,
    InvalidVersion(u16),
    InvalidChunkSize(usize),
    InvalidChecksum,
    UnknownPrototype(PrototypeId),
}

impl From<io::Error> for SerializationError {
    fn from(err: io::Error) -> Self {
        SerializationError::Io(err)
    }
}

impl From<bincode::Error> for SerializationError {
    fn from(err: bincode::Error) -> Self {
        SerializationError::Encode(err)
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationError::Io(e) => write!(f, "IO error: {}", e),
            SerializationError::Encode(e) => write!(f, "Encoding error: {}", e),
            SerializationError::InvalidMagicNumber => write!(f, "Invalid magic number"),
            SerializationError::InvalidVersion(v) => write!(f, "Invalid version: {}", v),
            SerializationError::InvalidChunkSize(s) => write!(f, "Invalid chunk size: {}", s),
            SerializationError::InvalidChecksum => write!(f, "Checksum mismatch"),
            SerializationError::UnknownPrototype(id) => {
                write!(f, "Unknown prototype id: {}", id.0)
            }
        }
    }
}

impl std::error::Error for SerializationError {}

/// On-disk form of one cell; positions are implied by row-major order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CellRecord {
    prototype: u16,
    forced: bool,
}

/// Save a solved chunk to disk in binary format
pub fn save_chunk<P: AsRef<Path>>(chunk: &SolvedChunk, path: P) -> Result<(), SerializationError> {
    // Ensure directory exists
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }

    let records: Vec<CellRecord> = chunk
        .cells()
        .iter()
        .map(|cell| CellRecord {
            prototype: cell.prototype.0,
            forced: cell.forced,
        })
        .collect();
    let body = bincode::serialize(&records)?;
    let body_len =
        u32::try_from(body.len()).map_err(|_| SerializationError::InvalidChunkSize(body.len()))?;

    let mut file = File::create(path)?;

    // Header
    file.write_all(&MAGIC_NUMBER)?;
    file.write_all(&VERSION.to_le_bytes())?;
    file.write_all(&chunk.position.x.to_le_bytes())?;
    file.write_all(&chunk.position.y.to_le_bytes())?;
    file.write_all(&chunk.size.x.to_le_bytes())?;
    file.write_all(&chunk.size.y.to_le_bytes())?;
    file.write_all(&body_len.to_le_bytes())?;

    file.write_all(&body)?;

    // Checksum (CRC32) of the body
    let checksum = crc32fast::hash(&body);
    file.write_all(&checksum.to_le_bytes())?;

    file.sync_all()?;
    Ok(())
}

fn read_u32(file: &mut File) -> Result<u32, io::Error> {
    let mut bytes = [0u8; 4];
    file.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_i32(file: &mut File) -> Result<i32, io::Error> {
    let mut bytes = [0u8; 4];
    file.read_exact(&mut bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

/// Load a solved chunk from disk, checking every prototype against `catalog`
pub fn load_chunk<P: AsRef<Path>>(
    path: P,
    catalog: &PrototypeCatalog,
) -> Result<SolvedChunk, SerializationError> {
    let mut file = File::open(path)?;

    // Read and verify magic number
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if magic != MAGIC_NUMBER {
        return Err(SerializationError::InvalidMagicNumber);
    }

    // Read and verify version
    let mut version_bytes = [0u8; 2];
    file.read_exact(&mut version_bytes)?;
    let version = u16::from_le_bytes(version_bytes);
    if version != VERSION {
        return Err(SerializationError::InvalidVersion(version));
    }

    let position = ChunkPos::new(read_i32(&mut file)?, read_i32(&mut file)?);
    let size = UVec2::new(read_u32(&mut file)?, read_u32(&mut file)?);
    let area = size.x as u64 * size.y as u64;
    if area == 0 || area > MAX_STORED_CELLS {
        return Err(SerializationError::InvalidChunkSize(area as usize));
    }

    let body_len = read_u32(&mut file)?;
    if u64::from(body_len) > LENGTH_PREFIX_BYTES + RECORD_BYTES * area {
        return Err(SerializationError::InvalidChunkSize(body_len as usize));
    }
    let mut body = vec![0u8; body_len as usize];
    file.read_exact(&mut body)?;

    // Read and verify checksum
    let expected_checksum = read_u32(&mut file)?;
    let actual_checksum = crc32fast::hash(&body);
    if actual_checksum != expected_checksum {
        return Err(SerializationError::InvalidChecksum);
    }

    let records: Vec<CellRecord> = bincode::deserialize(&body)?;
    if records.len() as u64 != area {
        return Err(SerializationError::InvalidChunkSize(records.len()));
    }

    let width = size.x as usize;
    let mut cells = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        let prototype = PrototypeId(record.prototype);
        if catalog.get(prototype).is_none() {
            return Err(SerializationError::UnknownPrototype(prototype));
        }
        cells.push(ChunkCell {
            position: IVec2::new((i % width) as i32, (i / width) as i32),
            prototype,
            forced: record.forced,
        });
    }

    SolvedChunk::new(position, size, cells)
        .ok_or(SerializationError::InvalidChunkSize(area as usize))
}

/// Check if a chunk file exists
pub fn chunk_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists()
}

/// Delete a chunk file
pub fn delete_chunk<P: AsRef<Path>>(path: P) -> Result<(), io::Error> {
    fs::remove_file(path)
}

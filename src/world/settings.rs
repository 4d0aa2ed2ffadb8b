use crate::tiles::{
    ChunkPos, PrototypeCatalog, PrototypeId, CHUNK_DEPTH, CHUNK_LOAD_RADIUS, CHUNK_WIDTH,
    RETRY_THRESHOLD, TILE_SIZE, WORLD_SEED,
};
use crate::wfc::SolverSettings;
use bevy::math::{UVec2, Vec2};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where chunk solves run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispatchMode {
    /// Solve on the scheduling thread during dispatch
    #[default]
    Inline,
    /// Solve on Bevy's async compute pool
    Worker,
}

/// World generation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub chunk_width: u32,
    pub chunk_depth: u32,
    /// Square radius in chunks around the observer chunk
    pub load_radius: u32,
    pub tile_size: f32,
    pub retry_threshold: u32,
    pub backtrack_budget: Option<usize>,
    pub fallback: PrototypeId,
    pub world_seed: u64,
    pub dispatch: DispatchMode,
    /// Persist finished chunks here when set
    pub save_directory: Option<PathBuf>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            chunk_width: CHUNK_WIDTH,
            chunk_depth: CHUNK_DEPTH,
            load_radius: CHUNK_LOAD_RADIUS,
            tile_size: TILE_SIZE,
            retry_threshold: RETRY_THRESHOLD,
            backtrack_budget: None,
            fallback: PrototypeId(0),
            world_seed: WORLD_SEED,
            dispatch: DispatchMode::Inline,
            save_directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    ZeroChunkSize { width: u32, depth: u32 },
    InvalidTileSize(f32),
    UnknownFallback { fallback: PrototypeId, catalog_len: usize },
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::ZeroChunkSize { width, depth } => {
                write!(f, "Chunk size must be non-zero, got {}x{}", width, depth)
            }
            SettingsError::InvalidTileSize(size) => {
                write!(f, "Tile size must be positive, got {}", size)
            }
            SettingsError::UnknownFallback {
                fallback,
                catalog_len,
            } => write!(
                f,
                "Fallback prototype {} is outside the catalog ({} prototypes)",
                fallback.0, catalog_len
            ),
        }
    }
}

impl std::error::Error for SettingsError {}

impl GenerationSettings {
    pub fn validate(&self, catalog: &PrototypeCatalog) -> Result<(), SettingsError> {
        if self.chunk_width == 0 || self.chunk_depth == 0 {
            return Err(SettingsError::ZeroChunkSize {
                width: self.chunk_width,
                depth: self.chunk_depth,
            });
        }
        if !(self.tile_size.is_finite() && self.tile_size > 0.0) {
            return Err(SettingsError::InvalidTileSize(self.tile_size));
        }
        if catalog.get(self.fallback).is_none() {
            return Err(SettingsError::UnknownFallback {
                fallback: self.fallback,
                catalog_len: catalog.len(),
            });
        }
        Ok(())
    }

    pub fn chunk_size(&self) -> UVec2 {
        UVec2::new(self.chunk_width, self.chunk_depth)
    }

    pub fn chunk_world_size(&self) -> Vec2 {
        self.chunk_size().as_vec2() * self.tile_size
    }

    /// Solver settings for one chunk, seeded from the world seed and coordinate
    pub fn solver_settings(&self, position: ChunkPos) -> SolverSettings {
        SolverSettings {
            retry_threshold: self.retry_threshold,
            backtrack_budget: self.backtrack_budget,
            fallback: self.fallback,
            seed: chunk_seed(self.world_seed, position),
        }
    }

    /// File a chunk is persisted to, if persistence is enabled
    pub fn chunk_path(&self, position: ChunkPos) -> Option<PathBuf> {
        self.save_directory.as_ref().map(|dir| {
            dir.join("chunks")
                .join(format!("chunk_{}_{}.bin", position.x, position.y))
        })
    }
}

/// splitmix64 over the world seed and both coordinates
pub fn chunk_seed(world_seed: u64, position: ChunkPos) -> u64 {
    let coords = ((position.x as u32 as u64) << 32) | position.y as u32 as u64;
    let mut z = world_seed ^ coords.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

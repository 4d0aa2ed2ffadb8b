use super::types::{ChunkPos, Direction, PrototypeId};
use bevy::math::{IVec2, UVec2, Vec2};
use serde::{Deserialize, Serialize};

/// One collapsed cell of a finished chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkCell {
    /// Chunk-local grid position
    pub position: IVec2,
    pub prototype: PrototypeId,
    /// Set when the solver assigned the fallback without checking adjacency
    pub forced: bool,
}

/// A fully solved chunk. Immutable once produced; shared as `Arc<SolvedChunk>`.
///
/// Cells are stored row-major: `index = y * width + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedChunk {
    pub position: ChunkPos,
    /// Global cell coordinate of cell (0, 0)
    pub origin: IVec2,
    pub size: UVec2,
    cells: Vec<ChunkCell>,
}

impl SolvedChunk {
    /// Returns `None` for an empty size or if `cells` does not cover `size` exactly
    pub fn new(position: ChunkPos, size: UVec2, cells: Vec<ChunkCell>) -> Option<Self> {
        if size.x == 0 || size.y == 0 || cells.len() != size.x as usize * size.y as usize {
            return None;
        }
        Some(Self {
            position,
            origin: position.origin(size),
            size,
            cells,
        })
    }

    pub fn cells(&self) -> &[ChunkCell] {
        &self.cells
    }

    /// Get the cell at a chunk-local position.
    /// Out of bounds gives `None` unless `wrapping`, which wraps modulo the chunk size.
    pub fn cell(&self, local: IVec2, wrapping: bool) -> Option<&ChunkCell> {
        let (w, h) = (self.size.x as i32, self.size.y as i32);
        if w <= 0 || h <= 0 {
            return None;
        }
        let (x, y) = if wrapping {
            (local.x.rem_euclid(w), local.y.rem_euclid(h))
        } else {
            if local.x < 0 || local.y < 0 || local.x >= w || local.y >= h {
                return None;
            }
            (local.x, local.y)
        };
        self.cells.get((y * w + x) as usize)
    }

    /// Get the cell at a global cell position, `None` if it lies in another chunk
    pub fn cell_at_global(&self, global: IVec2) -> Option<&ChunkCell> {
        self.cell(global - self.origin, false)
    }

    pub fn prototype_at(&self, local: IVec2) -> Option<PrototypeId> {
        self.cell(local, false).map(|c| c.prototype)
    }

    /// Cells along the edge facing `direction`, in ascending order along the edge
    pub fn border(&self, direction: Direction) -> Vec<&ChunkCell> {
        coords::edge_positions(self.size, direction)
            .into_iter()
            .filter_map(|p| self.cell(p, false))
            .collect()
    }

    pub fn forced_count(&self) -> usize {
        self.cells.iter().filter(|c| c.forced).count()
    }
}

/// Helper functions for coordinate conversions
pub mod coords {
    use super::*;

    /// World units covered by one chunk
    pub fn chunk_world_size(chunk_size: UVec2, tile_size: f32) -> Vec2 {
        chunk_size.as_vec2() * tile_size
    }

    /// Convert a ground-plane world position (x, z) to chunk position
    pub fn world_to_chunk(world_pos: Vec2, chunk_size: UVec2, tile_size: f32) -> ChunkPos {
        ChunkPos::from_world(world_pos, chunk_world_size(chunk_size, tile_size))
    }

    /// Convert a ground-plane world position to a global cell position
    pub fn world_to_cell(world_pos: Vec2, tile_size: f32) -> IVec2 {
        (world_pos / tile_size).floor().as_ivec2()
    }

    /// Chunk-local positions of the edge facing `direction`, ascending along the edge
    pub fn edge_positions(size: UVec2, direction: Direction) -> Vec<IVec2> {
        let (w, h) = (size.x as i32, size.y as i32);
        if w == 0 || h == 0 {
            return Vec::new();
        }
        match direction {
            Direction::Left => (0..h).map(|y| IVec2::new(0, y)).collect(),
            Direction::Right => (0..h).map(|y| IVec2::new(w - 1, y)).collect(),
            Direction::Back => (0..w).map(|x| IVec2::new(x, 0)).collect(),
            Direction::Forward => (0..w).map(|x| IVec2::new(x, h - 1)).collect(),
        }
    }

    /// World position of a chunk's first corner
    pub fn chunk_to_world(pos: ChunkPos, chunk_size: UVec2, tile_size: f32) -> Vec2 {
        pos.origin(chunk_size).as_vec2() * tile_size
    }
}

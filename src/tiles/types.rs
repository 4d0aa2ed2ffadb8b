use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Dense index of a prototype inside a `PrototypeCatalog`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrototypeId(pub u16);

impl PrototypeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The four cardinal directions on the chunk plane.
///
/// Left/Right step along x, Back/Forward step along the grid's second axis
/// (world z, grid row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
    Back,
    Forward,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Back,
        Direction::Forward,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
            Direction::Back => 2,
            Direction::Forward => 3,
        }
    }

    pub const fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Back => Direction::Forward,
            Direction::Forward => Direction::Back,
        }
    }

    /// Unit step in grid coordinates
    pub const fn offset(self) -> IVec2 {
        match self {
            Direction::Left => IVec2::new(-1, 0),
            Direction::Right => IVec2::new(1, 0),
            Direction::Back => IVec2::new(0, -1),
            Direction::Forward => IVec2::new(0, 1),
        }
    }
}

/// Chunk position in chunk coordinates (not world/tile coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Convert from a world position on the ground plane to chunk position
    pub fn from_world(world_pos: Vec2, chunk_world_size: Vec2) -> Self {
        Self {
            x: (world_pos.x / chunk_world_size.x).floor() as i32,
            y: (world_pos.y / chunk_world_size.y).floor() as i32,
        }
    }

    /// Convert from a global cell position to chunk position
    pub fn from_cell(cell_pos: IVec2, chunk_size: UVec2) -> Self {
        Self {
            x: cell_pos.x.div_euclid(chunk_size.x as i32),
            y: cell_pos.y.div_euclid(chunk_size.y as i32),
        }
    }

    /// Global cell coordinate of this chunk's first cell (chunk coordinate × chunk size)
    pub fn origin(&self, chunk_size: UVec2) -> IVec2 {
        IVec2::new(
            self.x * chunk_size.x as i32,
            self.y * chunk_size.y as i32,
        )
    }

    /// The adjacent chunk one step in `direction`
    pub fn neighbor(&self, direction: Direction) -> ChunkPos {
        let step = direction.offset();
        ChunkPos::new(self.x + step.x, self.y + step.y)
    }

    /// Get all chunks in a square radius around this chunk
    pub fn chunks_in_radius(&self, radius: i32) -> Vec<ChunkPos> {
        let mut chunks = Vec::with_capacity(((radius * 2 + 1) * (radius * 2 + 1)) as usize);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                chunks.push(ChunkPos::new(self.x + dx, self.y + dy));
            }
        }
        chunks
    }

    /// Chebyshev distance (square/max distance) between two chunk positions.
    /// Matches the square load radius.
    pub fn chebyshev_distance(&self, other: &ChunkPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl From<(i32, i32)> for ChunkPos {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl From<IVec2> for ChunkPos {
    fn from(v: IVec2) -> Self {
        Self::new(v.x, v.y)
    }
}

impl From<ChunkPos> for IVec2 {
    fn from(pos: ChunkPos) -> Self {
        IVec2::new(pos.x, pos.y)
    }
}

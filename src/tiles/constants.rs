/// Default chunk width in cells (x)
pub const CHUNK_WIDTH: u32 = 16;

/// Default chunk depth in cells (grid y, world z)
pub const CHUNK_DEPTH: u32 = 16;

/// World units covered by one cell
pub const TILE_SIZE: f32 = 1.0;

// Chunk generation radius
/// Radius of chunks to generate around the observer (5x5 = 25 chunks)
pub const CHUNK_LOAD_RADIUS: u32 = 2;

/// Failed collapse attempts allowed before a forced collapse
pub const RETRY_THRESHOLD: u32 = 10;

/// Default world seed
pub const WORLD_SEED: u64 = 0x5EED_CAFE;

/// Maximum number of prototypes a catalog can hold (ids are u16)
pub const MAX_PROTOTYPES: usize = u16::MAX as usize + 1;

pub mod chunk;
pub mod constants;
pub mod registry;
pub mod types;

// Re-export commonly used items
pub use chunk::{coords, ChunkCell, SolvedChunk};
pub use constants::*;
pub use registry::{
    CatalogError, DirectionalConnections, Prototype, PrototypeCatalog, PrototypeRecord,
    VisualHandle,
};
pub use types::{ChunkPos, Direction, PrototypeId};

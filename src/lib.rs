//! Chunked wave function collapse terrain for Bevy.
//!
//! `tiles` holds the data model and the adjacency catalog, `wfc` the per-chunk
//! solver and border stitching, and `world` the scheduler that generates
//! chunks around an observer and hands them to listeners.

pub mod tiles;
pub mod wfc;
pub mod world;

pub use tiles::{ChunkPos, Direction, PrototypeCatalog, PrototypeId, PrototypeRecord, SolvedChunk};
pub use wfc::{solve_chunk, BorderSeeds, SolveStats, SolverSettings, WfcSolver};
pub use world::{
    ChunkGenerated, ChunkListener, ChunkObserver, ChunkScheduler, DispatchMode,
    GenerationSettings, WfcTerrainPlugin,
};

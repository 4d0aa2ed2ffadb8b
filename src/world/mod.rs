pub mod generator;
pub mod loader;
pub mod manager;
pub mod serialization;
pub mod settings;

// Re-export commonly used items
pub use generator::{generate_chunk, ChunkSource, GeneratedChunk, GenerationJob};
pub use loader::{ChunkGenerated, ChunkObserver, WfcTerrainPlugin};
pub use manager::{ChunkListener, ChunkScheduler, ListenerId, WorldStats};
pub use serialization::SerializationError;
pub use settings::{chunk_seed, DispatchMode, GenerationSettings, SettingsError};

use super::serialization;
use crate::tiles::{ChunkPos, Direction, PrototypeCatalog, SolvedChunk};
use crate::wfc::{compute_border_seeds, solve_chunk, SolveStats, SolverSettings};
use bevy::log::{debug, error, warn};
use bevy::math::UVec2;
use std::path::PathBuf;
use std::sync::Arc;

/// How a finished chunk came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSource {
    Solved,
    Loaded,
}

/// A finished chunk on its way from a generator to the scheduler
#[derive(Debug, Clone)]
pub struct GeneratedChunk {
    pub chunk: Arc<SolvedChunk>,
    pub stats: SolveStats,
    pub source: ChunkSource,
}

/// Everything one chunk generation needs, owned so it can move to a worker.
/// Neighbors are already finished and only read.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub position: ChunkPos,
    pub size: UVec2,
    pub catalog: Arc<PrototypeCatalog>,
    pub solver: SolverSettings,
    pub neighbors: Vec<(Direction, Arc<SolvedChunk>)>,
    /// Load from / save to this file when set
    pub save_path: Option<PathBuf>,
}

impl GenerationJob {
    /// Load the chunk from disk if possible, otherwise stitch and solve it
    pub fn run(self) -> Option<GeneratedChunk> {
        if let Some(loaded) = self.try_load() {
            return Some(GeneratedChunk {
                chunk: Arc::new(loaded),
                stats: SolveStats::default(),
                source: ChunkSource::Loaded,
            });
        }

        let (chunk, stats) = generate_chunk(
            self.catalog.clone(),
            self.solver,
            self.position,
            self.size,
            &self.neighbors,
        )?;

        if let Some(path) = &self.save_path {
            if let Err(e) = serialization::save_chunk(&chunk, path) {
                error!("Failed to save chunk {:?}: {}", self.position, e);
            }
        }

        Some(GeneratedChunk {
            chunk: Arc::new(chunk),
            stats,
            source: ChunkSource::Solved,
        })
    }

    fn try_load(&self) -> Option<SolvedChunk> {
        let path = self.save_path.as_ref()?;
        if !serialization::chunk_exists(path) {
            return None;
        }
        match serialization::load_chunk(path, &self.catalog) {
            Ok(chunk) if chunk.position == self.position && chunk.size == self.size => {
                debug!("Loaded chunk {:?} from disk", self.position);
                Some(chunk)
            }
            Ok(chunk) => {
                warn!(
                    "Chunk file for {:?} holds {:?} of size {}, generating new",
                    self.position, chunk.position, chunk.size
                );
                None
            }
            Err(e) => {
                warn!("Failed to load chunk {:?}: {}, generating new", self.position, e);
                None
            }
        }
    }
}

/// Stitch against finished neighbors, then solve one chunk
pub fn generate_chunk(
    catalog: Arc<PrototypeCatalog>,
    settings: SolverSettings,
    position: ChunkPos,
    size: UVec2,
    neighbors: &[(Direction, Arc<SolvedChunk>)],
) -> Option<(SolvedChunk, SolveStats)> {
    let seeds = compute_border_seeds(&catalog, size, neighbors);
    let result = solve_chunk(catalog, settings, position, size, &seeds);
    if result.is_none() {
        error!("Solver for chunk {:?} finished without a result", position);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::{PrototypeId, PrototypeRecord};
    use std::env;
    use std::fs;

    fn catalog() -> Arc<PrototypeCatalog> {
        Arc::new(
            PrototypeCatalog::from_records(vec![
                PrototypeRecord::new("land", 2.0).allow_all(&["land", "coast"]),
                PrototypeRecord::new("coast", 1.0).allow_all(&["land", "coast", "sea"]),
                PrototypeRecord::new("sea", 2.0).allow_all(&["coast", "sea"]),
            ])
            .unwrap(),
        )
    }

    fn job(position: ChunkPos, save_path: Option<PathBuf>) -> GenerationJob {
        GenerationJob {
            position,
            size: UVec2::new(4, 4),
            catalog: catalog(),
            solver: SolverSettings {
                seed: 17,
                fallback: PrototypeId(1),
                ..Default::default()
            },
            neighbors: Vec::new(),
            save_path,
        }
    }

    #[test]
    fn test_generate_chunk_fills_grid() {
        let (chunk, stats) = generate_chunk(
            catalog(),
            SolverSettings::default(),
            ChunkPos::new(3, -1),
            UVec2::new(5, 4),
            &[],
        )
        .unwrap();
        assert_eq!(chunk.position, ChunkPos::new(3, -1));
        assert_eq!(chunk.cells().len(), 20);
        assert!(stats.collapses + stats.forced >= 1);
    }

    #[test]
    fn test_job_saves_then_loads() {
        let path = env::temp_dir().join("chunkweave_test_job_chunk.bin");
        let _ = fs::remove_file(&path);

        let first = job(ChunkPos::new(0, 0), Some(path.clone())).run().unwrap();
        assert_eq!(first.source, ChunkSource::Solved);
        assert!(path.exists());

        let second = job(ChunkPos::new(0, 0), Some(path.clone())).run().unwrap();
        assert_eq!(second.source, ChunkSource::Loaded);
        assert_eq!(second.chunk, first.chunk);

        // A file written for another coordinate is ignored
        let third = job(ChunkPos::new(1, 0), Some(path.clone())).run().unwrap();
        assert_eq!(third.source, ChunkSource::Solved);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_solving() {
        let path = env::temp_dir().join("chunkweave_test_job_corrupt.bin");
        fs::write(&path, b"not a chunk").unwrap();

        let generated = job(ChunkPos::new(0, 0), Some(path.clone())).run().unwrap();
        assert_eq!(generated.source, ChunkSource::Solved);

        let _ = fs::remove_file(path);
    }
}

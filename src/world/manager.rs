use super::generator::{ChunkSource, GeneratedChunk, GenerationJob};
use super::settings::{DispatchMode, GenerationSettings, SettingsError};
use crate::tiles::{coords, ChunkPos, Direction, PrototypeCatalog, SolvedChunk};
use crate::wfc::gather_neighbors;
use async_channel::{Receiver, Sender};
use bevy::log::{debug, info, warn};
use bevy::math::Vec2;
use bevy::prelude::Resource;
use bevy::tasks::{AsyncComputeTaskPool, TaskPool};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Handle returned by [`ChunkScheduler::register_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receives every newly finished chunk, on the scheduling thread
pub trait ChunkListener: Send + Sync {
    fn on_chunk_generated(&mut self, chunk: &Arc<SolvedChunk>, position: ChunkPos);
}

impl<F> ChunkListener for F
where
    F: FnMut(&Arc<SolvedChunk>, ChunkPos) + Send + Sync,
{
    fn on_chunk_generated(&mut self, chunk: &Arc<SolvedChunk>, position: ChunkPos) {
        self(chunk, position)
    }
}

/// Result of one job, tagged with its coordinate so a failed solve still clears it
struct Completion {
    position: ChunkPos,
    result: Option<GeneratedChunk>,
}

/// Chunk scheduler resource: owns the chunk cache, dispatches generation
/// around the observer and broadcasts finished chunks.
///
/// The cache is append-only. A coordinate is requested at most once; it is
/// held back while a cardinal neighbor is still generating so its borders are
/// always seeded from every finished neighbor.
#[derive(Resource)]
pub struct ChunkScheduler {
    catalog: Arc<PrototypeCatalog>,
    settings: GenerationSettings,

    /// Finished chunks by coordinate
    cache: HashMap<ChunkPos, Arc<SolvedChunk>>,

    /// Worker jobs whose completion has not been drained
    in_flight: HashSet<ChunkPos>,

    /// Missing coordinates held back on the last dispatch
    deferred: usize,

    /// Completion queue (worker -> scheduling thread)
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,

    listeners: Vec<(ListenerId, Box<dyn ChunkListener>)>,
    next_listener: u64,

    /// Current observer chunk position
    pub observer_chunk: Option<ChunkPos>,

    generated: usize,
    loaded: usize,
    forced_cells: usize,
}

impl ChunkScheduler {
    pub fn new(
        catalog: Arc<PrototypeCatalog>,
        settings: GenerationSettings,
    ) -> Result<Self, SettingsError> {
        settings.validate(&catalog)?;
        let (sender, receiver) = async_channel::unbounded();
        Ok(Self {
            catalog,
            settings,
            cache: HashMap::new(),
            in_flight: HashSet::new(),
            deferred: 0,
            sender,
            receiver,
            listeners: Vec::new(),
            next_listener: 0,
            observer_chunk: None,
            generated: 0,
            loaded: 0,
            forced_cells: 0,
        })
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &Arc<PrototypeCatalog> {
        &self.catalog
    }

    /// Get a finished chunk
    pub fn get_chunk(&self, pos: &ChunkPos) -> Option<&Arc<SolvedChunk>> {
        self.cache.get(pos)
    }

    pub fn is_generated(&self, pos: &ChunkPos) -> bool {
        self.cache.contains_key(pos)
    }

    pub fn is_in_flight(&self, pos: &ChunkPos) -> bool {
        self.in_flight.contains(pos)
    }

    pub fn cached_chunks(&self) -> impl Iterator<Item = (&ChunkPos, &Arc<SolvedChunk>)> {
        self.cache.iter()
    }

    pub fn register_listener(&mut self, listener: Box<dyn ChunkListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns false if `id` was not registered
    pub fn deregister_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Track the observer's ground-plane position (world x, z)
    pub fn update_observer(&mut self, world_pos: Vec2) -> ChunkPos {
        let chunk_pos = coords::world_to_chunk(
            world_pos,
            self.settings.chunk_size(),
            self.settings.tile_size,
        );

        // Only log if the observer moved to a new chunk
        if self.observer_chunk != Some(chunk_pos) {
            self.observer_chunk = Some(chunk_pos);
            info!("Observer moved to chunk {:?}", chunk_pos);
        }
        chunk_pos
    }

    /// Missing coordinates in the load radius, nearest first
    pub fn missing_chunks(&self) -> Vec<ChunkPos> {
        let Some(center) = self.observer_chunk else {
            return Vec::new();
        };
        let radius = i32::try_from(self.settings.load_radius).unwrap_or(i32::MAX / 2);
        let mut missing: Vec<ChunkPos> = center
            .chunks_in_radius(radius)
            .into_iter()
            .filter(|pos| !self.cache.contains_key(pos) && !self.in_flight.contains(pos))
            .collect();
        // Stable sort keeps row order among equal distances
        missing.sort_by_key(|pos| center.chebyshev_distance(pos));
        missing
    }

    /// Request generation for every missing coordinate that can start now.
    /// Returns the number of coordinates dispatched.
    pub fn dispatch(&mut self) -> usize {
        let missing = self.missing_chunks();
        let mut dispatched = 0;
        self.deferred = 0;

        for pos in missing {
            if self.has_in_flight_neighbor(pos) {
                self.deferred += 1;
                continue;
            }

            let job = GenerationJob {
                position: pos,
                size: self.settings.chunk_size(),
                catalog: self.catalog.clone(),
                solver: self.settings.solver_settings(pos),
                neighbors: gather_neighbors(&self.cache, pos),
                save_path: self.settings.chunk_path(pos),
            };
            dispatched += 1;

            match self.settings.dispatch {
                DispatchMode::Inline => {
                    let result = job.run();
                    // Publish now so later chunks this tick stitch against it
                    if let Some(generated) = &result {
                        self.cache.entry(pos).or_insert_with(|| generated.chunk.clone());
                    }
                    let _ = self.sender.try_send(Completion {
                        position: pos,
                        result,
                    });
                }
                DispatchMode::Worker => {
                    self.in_flight.insert(pos);
                    let sender = self.sender.clone();
                    AsyncComputeTaskPool::get_or_init(TaskPool::new)
                        .spawn(async move {
                            let result = job.run();
                            let _ = sender
                                .send(Completion {
                                    position: pos,
                                    result,
                                })
                                .await;
                        })
                        .detach();
                }
            }
        }

        if dispatched > 0 {
            debug!(
                "Dispatched {} chunk(s), {} deferred, {} in flight",
                dispatched,
                self.deferred,
                self.in_flight.len()
            );
        }
        dispatched
    }

    /// Drain the completion queue: publish each chunk and broadcast it to
    /// listeners in registration order. Returns the chunks delivered, in
    /// completion order.
    pub fn drain(&mut self) -> Vec<(ChunkPos, Arc<SolvedChunk>)> {
        let mut delivered = Vec::new();

        while let Ok(completion) = self.receiver.try_recv() {
            self.in_flight.remove(&completion.position);
            let Some(generated) = completion.result else {
                warn!(
                    "Generation for chunk {:?} produced nothing, will retry",
                    completion.position
                );
                continue;
            };

            let pos = completion.position;
            let chunk = self
                .cache
                .entry(pos)
                .or_insert_with(|| generated.chunk.clone())
                .clone();

            match generated.source {
                ChunkSource::Solved => self.generated += 1,
                ChunkSource::Loaded => self.loaded += 1,
            }
            self.forced_cells += chunk.forced_count();

            info!(
                "Chunk {:?} ready ({:?}, {} forced cell(s))",
                pos,
                generated.source,
                chunk.forced_count()
            );
            debug!("Chunk {:?} solve stats: {:?}", pos, generated.stats);

            for (_, listener) in self.listeners.iter_mut() {
                listener.on_chunk_generated(&chunk, pos);
            }
            delivered.push((pos, chunk));
        }

        delivered
    }

    /// One scheduling step: observer update, dispatch, then drain
    pub fn tick(&mut self, observer_world: Vec2) -> Vec<(ChunkPos, Arc<SolvedChunk>)> {
        self.update_observer(observer_world);
        self.dispatch();
        self.drain()
    }

    fn has_in_flight_neighbor(&self, pos: ChunkPos) -> bool {
        Direction::ALL
            .iter()
            .any(|&dir| self.in_flight.contains(&pos.neighbor(dir)))
    }

    /// Get statistics about the world state
    pub fn stats(&self) -> WorldStats {
        WorldStats {
            cached_chunks: self.cache.len(),
            in_flight_chunks: self.in_flight.len(),
            deferred_chunks: self.deferred,
            generated_chunks: self.generated,
            loaded_chunks: self.loaded,
            forced_cells: self.forced_cells,
            listeners: self.listeners.len(),
            observer_chunk: self.observer_chunk,
        }
    }
}

/// Statistics about the current world state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldStats {
    pub cached_chunks: usize,
    pub in_flight_chunks: usize,
    pub deferred_chunks: usize,
    pub generated_chunks: usize,
    pub loaded_chunks: usize,
    pub forced_cells: usize,
    pub listeners: usize,
    pub observer_chunk: Option<ChunkPos>,
}

impl std::fmt::Display for WorldStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cached: {}, In flight: {}, Deferred: {}, Solved: {}, Loaded: {}, Forced cells: {}, Observer: {:?}",
            self.cached_chunks,
            self.in_flight_chunks,
            self.deferred_chunks,
            self.generated_chunks,
            self.loaded_chunks,
            self.forced_cells,
            self.observer_chunk
        )
    }
}

use super::manager::{ChunkScheduler, WorldStats};
use super::settings::{GenerationSettings, SettingsError};
use crate::tiles::{ChunkPos, PrototypeCatalog, SolvedChunk};
use bevy::prelude::*;
use std::sync::Arc;

/// Marks the entity whose position drives chunk generation.
/// Its ground-plane position is the transform's x and z.
#[derive(Component, Default)]
pub struct ChunkObserver;

/// Written once per newly finished chunk, in completion order
#[derive(Message, Debug, Clone)]
pub struct ChunkGenerated {
    pub position: ChunkPos,
    pub chunk: Arc<SolvedChunk>,
}

/// Plugin wiring the chunk scheduler into the Update schedule
pub struct WfcTerrainPlugin {
    catalog: Arc<PrototypeCatalog>,
    settings: GenerationSettings,
}

impl WfcTerrainPlugin {
    pub fn new(
        catalog: Arc<PrototypeCatalog>,
        settings: GenerationSettings,
    ) -> Result<Self, SettingsError> {
        settings.validate(&catalog)?;
        Ok(Self { catalog, settings })
    }
}

impl Plugin for WfcTerrainPlugin {
    fn build(&self, app: &mut App) {
        let scheduler = match ChunkScheduler::new(self.catalog.clone(), self.settings.clone()) {
            Ok(scheduler) => scheduler,
            Err(e) => {
                error!("Terrain generation disabled: {}", e);
                return;
            }
        };

        app.insert_resource(scheduler)
            .add_message::<ChunkGenerated>()
            .add_systems(
                Update,
                (
                    update_observer_chunk,
                    dispatch_chunk_generation,
                    deliver_completed_chunks,
                    log_world_stats,
                )
                    .chain(),
            );
    }
}

/// System to track the observer and record its chunk
pub fn update_observer_chunk(
    observer_query: Query<&Transform, With<ChunkObserver>>,
    mut scheduler: ResMut<ChunkScheduler>,
) {
    if let Ok(transform) = observer_query.single() {
        let ground = Vec2::new(transform.translation.x, transform.translation.z);
        scheduler.update_observer(ground);
    }
}

/// System to request generation for missing chunks around the observer
pub fn dispatch_chunk_generation(mut scheduler: ResMut<ChunkScheduler>) {
    scheduler.dispatch();
}

/// System to drain finished chunks, notify listeners and write messages
pub fn deliver_completed_chunks(
    mut scheduler: ResMut<ChunkScheduler>,
    mut generated: MessageWriter<ChunkGenerated>,
) {
    let delivered = scheduler.drain();
    if delivered.is_empty() {
        return;
    }

    #[cfg(feature = "debug_chunks")]
    if let Some(observer) = scheduler.observer_chunk {
        print_chunk_grid(&scheduler, observer);
    }

    for (position, chunk) in delivered {
        generated.write(ChunkGenerated { position, chunk });
    }
}

/// System to log world statistics when they change
pub fn log_world_stats(scheduler: Res<ChunkScheduler>, mut last: Local<Option<WorldStats>>) {
    let stats = scheduler.stats();
    if last.as_ref() != Some(&stats) {
        debug!("World stats: {}", stats);
        *last = Some(stats);
    }
}

/// Print a visual representation of generated chunks
#[cfg(feature = "debug_chunks")]
fn print_chunk_grid(scheduler: &ChunkScheduler, observer: ChunkPos) {
    let load_radius = scheduler.settings().load_radius as i32;
    let view_radius = (load_radius + 1).max(3);

    let mut grid = String::new();
    grid.push_str("\n╔══════════ Chunk Grid ══════════╗\n");
    for y in (observer.y - view_radius..=observer.y + view_radius).rev() {
        grid.push_str(&format!("{:4}", y));
        for x in observer.x - view_radius..=observer.x + view_radius {
            let pos = ChunkPos::new(x, y);
            let symbol = if pos == observer {
                " @ "
            } else if let Some(chunk) = scheduler.get_chunk(&pos) {
                if chunk.forced_count() > 0 {
                    " ▓ " // Contains forced cells
                } else {
                    " █ "
                }
            } else if scheduler.is_in_flight(&pos) {
                " ░ "
            } else {
                " · "
            };
            grid.push_str(symbol);
        }
        grid.push('\n');
    }
    grid.push_str("╚════════════════════════════════╝\n");
    grid.push_str("Legend: @ = Observer  █ = Generated  ▓ = Has forced cells  ░ = Generating  · = Missing\n");
    grid.push_str(&format!("{}\n", scheduler.stats()));

    info!("{}", grid);
}

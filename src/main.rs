use bevy::{app::ScheduleRunnerPlugin, log::LogPlugin, prelude::*};
use clap::Parser;
use chunkweave::tiles::{CatalogError, PrototypeCatalog, PrototypeRecord, SolvedChunk};
use chunkweave::world::loader::deliver_completed_chunks;
use chunkweave::world::{
    ChunkGenerated, ChunkObserver, ChunkScheduler, DispatchMode, GenerationSettings,
    WfcTerrainPlugin,
};
use chunkweave::ChunkPos;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Observer walk configuration
const WALK_SPEED: f32 = 24.0; // World units per second
const WAYPOINT_TOLERANCE: f32 = 0.5;
const WALK_PATH: [(f32, f32); 4] = [(0.0, 0.0), (96.0, 0.0), (96.0, 64.0), (-32.0, 64.0)];

// Frame rate of the headless runner
const TICKS_PER_SECOND: f64 = 30.0;

#[derive(Parser, Debug)]
#[command(name = "chunkweave")]
#[command(about = "Walk an observer across chunked wave function collapse terrain")]
struct Args {
    /// Solve chunks on the async compute pool instead of the main thread
    #[arg(long)]
    worker: bool,

    /// Directory to save finished chunks to and load them from
    #[arg(long)]
    save: Option<PathBuf>,

    /// World seed (defaults to the built-in seed)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Load radius in chunks around the observer
    #[arg(short, long)]
    radius: Option<u32>,
}

/// Remaining (x, z) waypoints of the observer
#[derive(Component)]
struct WalkPath {
    points: Vec<Vec2>,
    next: usize,
}

/// Running totals from `ChunkGenerated` messages
#[derive(Resource, Default)]
struct GenerationReport {
    chunks: usize,
    forced_cells: usize,
}

fn main() -> AppExit {
    let catalog = match build_catalog() {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            eprintln!("Invalid tile catalog: {}", e);
            return AppExit::error();
        }
    };

    let settings = settings_from_args(&Args::parse());
    let plugin = match WfcTerrainPlugin::new(catalog, settings) {
        Ok(plugin) => plugin,
        Err(e) => {
            eprintln!("Invalid generation settings: {}", e);
            return AppExit::error();
        }
    };

    App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / TICKS_PER_SECOND,
            ))),
            LogPlugin::default(),
            plugin,
        ))
        .init_resource::<GenerationReport>()
        .add_systems(Startup, setup_world)
        .add_systems(
            Update,
            (
                walk_observer,
                report_generated_chunks.after(deliver_completed_chunks),
                finish_when_idle.after(report_generated_chunks),
            ),
        )
        .run()
}

fn settings_from_args(args: &Args) -> GenerationSettings {
    let mut settings = GenerationSettings {
        save_directory: args.save.clone(),
        ..Default::default()
    };
    if args.worker {
        settings.dispatch = DispatchMode::Worker;
    }
    if let Some(seed) = args.seed {
        settings.world_seed = seed;
    }
    if let Some(radius) = args.radius {
        settings.load_radius = radius;
    }
    settings
}

/// A small overworld: grass and forest inland, sand between grass and water
fn build_catalog() -> Result<PrototypeCatalog, CatalogError> {
    PrototypeCatalog::from_records(vec![
        PrototypeRecord::new("grass", 4.0)
            .with_visual(".")
            .allow_all(&["grass", "forest", "sand"]),
        PrototypeRecord::new("forest", 2.0)
            .with_visual("T")
            .allow_all(&["grass", "forest"]),
        PrototypeRecord::new("sand", 1.0)
            .with_visual(":")
            .allow_all(&["grass", "sand", "shallows"]),
        PrototypeRecord::new("shallows", 1.0)
            .with_visual("~")
            .allow_all(&["sand", "shallows", "water"]),
        PrototypeRecord::new("water", 3.0)
            .with_visual("=")
            .allow_all(&["shallows", "water"]),
    ])
}

fn setup_world(mut commands: Commands, mut scheduler: ResMut<ChunkScheduler>) {
    let points: Vec<Vec2> = WALK_PATH.iter().map(|&(x, z)| Vec2::new(x, z)).collect();
    let start = points.first().copied().unwrap_or(Vec2::ZERO);

    commands.spawn((
        ChunkObserver,
        Transform::from_xyz(start.x, 0.0, start.y),
        WalkPath { points, next: 1 },
    ));

    // Draw the first chunk next to the observer's start
    let catalog = scheduler.catalog().clone();
    let mut previewed = false;
    scheduler.register_listener(Box::new(
        move |chunk: &Arc<SolvedChunk>, position: ChunkPos| {
            if previewed {
                return;
            }
            previewed = true;
            info!(
                "Chunk {:?} preview:\n{}",
                position,
                preview_chunk(chunk, &catalog)
            );
        },
    ));
}

/// Text rendering of a chunk, forward edge on top; forced cells show as `!`
fn preview_chunk(chunk: &SolvedChunk, catalog: &PrototypeCatalog) -> String {
    let mut out = String::new();
    for y in (0..chunk.size.y as i32).rev() {
        for x in 0..chunk.size.x as i32 {
            let glyph = chunk
                .cell(IVec2::new(x, y), false)
                .map(|cell| {
                    if cell.forced {
                        "!"
                    } else {
                        catalog
                            .get(cell.prototype)
                            .map(|p| p.visual.0.as_str())
                            .unwrap_or("?")
                    }
                })
                .unwrap_or(" ");
            out.push_str(glyph);
        }
        out.push('\n');
    }
    out
}

fn walk_observer(time: Res<Time>, mut query: Query<(&mut Transform, &mut WalkPath)>) {
    for (mut transform, mut path) in query.iter_mut() {
        let Some(&target) = path.points.get(path.next) else {
            continue;
        };

        let current = Vec2::new(transform.translation.x, transform.translation.z);
        let to_target = target - current;
        let step = WALK_SPEED * time.delta_secs();

        let moved = if to_target.length() <= step.max(WAYPOINT_TOLERANCE) {
            path.next += 1;
            info!("Observer reached waypoint {:?}", target);
            target
        } else {
            current + to_target.normalize() * step
        };

        transform.translation.x = moved.x;
        transform.translation.z = moved.y;
    }
}

fn report_generated_chunks(
    mut messages: MessageReader<ChunkGenerated>,
    mut report: ResMut<GenerationReport>,
) {
    for message in messages.read() {
        report.chunks += 1;
        report.forced_cells += message.chunk.forced_count();
    }
}

/// Exit once the walk is over and every requested chunk has arrived
fn finish_when_idle(
    paths: Query<&WalkPath>,
    scheduler: Res<ChunkScheduler>,
    report: Res<GenerationReport>,
    mut exit: MessageWriter<AppExit>,
) {
    let walking = paths.iter().any(|p| p.next < p.points.len());
    if walking || !scheduler.missing_chunks().is_empty() || scheduler.stats().in_flight_chunks > 0 {
        return;
    }

    info!(
        "Walk finished: {} chunks generated, {} forced cells. {}",
        report.chunks,
        report.forced_cells,
        scheduler.stats()
    );
    exit.write(AppExit::Success);
}

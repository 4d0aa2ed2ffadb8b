//! Border seeding from already-solved neighbor chunks.
//!
//! Before a chunk is solved, each edge cell that touches a finished neighbor
//! is restricted to the prototypes that pair with the neighbor's facing cell.
//! Neighbors are only read.

use super::candidates::CandidateSet;
use super::grid::CellGrid;
use super::propagation::propagate;
use crate::tiles::{coords, ChunkPos, Direction, PrototypeCatalog, SolvedChunk};
use bevy::log::warn;
use bevy::math::{IVec2, UVec2};
use std::collections::HashMap;
use std::sync::Arc;

/// Candidate restrictions for a new chunk's edge cells, keyed by local position.
/// A cell seeded from two sides holds the intersection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BorderSeeds {
    seeds: Vec<(IVec2, CandidateSet)>,
}

impl BorderSeeds {
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn get(&self, local: IVec2) -> Option<&CandidateSet> {
        self.seeds.iter().find(|(p, _)| *p == local).map(|(_, s)| s)
    }

    /// Restrict `local` to `allowed`, intersecting with any earlier seed
    pub fn restrict(&mut self, local: IVec2, allowed: CandidateSet) {
        match self.seeds.iter_mut().find(|(p, _)| *p == local) {
            Some((_, existing)) => {
                existing.intersect_with(&allowed);
            }
            None => self.seeds.push((local, allowed)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (IVec2, &CandidateSet)> {
        self.seeds.iter().map(|(p, s)| (*p, s))
    }
}

/// Finished chunks adjacent to `pos`, in `Direction::ALL` order
pub fn gather_neighbors(
    cache: &HashMap<ChunkPos, Arc<SolvedChunk>>,
    pos: ChunkPos,
) -> Vec<(Direction, Arc<SolvedChunk>)> {
    Direction::ALL
        .iter()
        .filter_map(|&dir| cache.get(&pos.neighbor(dir)).map(|c| (dir, c.clone())))
        .collect()
}

/// Compute seeds for a chunk of `size` from its finished neighbors.
///
/// `neighbors` pairs each chunk with the direction it lies in, seen from the new
/// chunk. The edge cell next to a neighbor cell holding `n` may only hold `q`
/// when `n` permits `q` toward the new chunk or `q` permits `n` back.
pub fn compute_border_seeds(
    catalog: &PrototypeCatalog,
    size: UVec2,
    neighbors: &[(Direction, Arc<SolvedChunk>)],
) -> BorderSeeds {
    let mut seeds = BorderSeeds::default();

    for (dir, neighbor) in neighbors {
        let toward_new = dir.opposite();
        let facing = neighbor.border(toward_new);
        let edge = coords::edge_positions(size, *dir);

        if facing.len() != edge.len() {
            warn!(
                "Skipping seeds from chunk {:?}: border of {} cells does not match edge of {}",
                neighbor.position,
                facing.len(),
                edge.len()
            );
            continue;
        }

        for (outer, local) in facing.iter().zip(edge) {
            let allowed = if catalog.get(outer.prototype).is_some() {
                catalog.compatible(outer.prototype, toward_new).clone()
            } else {
                warn!(
                    "Chunk {:?} holds unknown prototype {:?}; seeding nothing",
                    neighbor.position, outer.prototype
                );
                CandidateSet::empty(catalog.len())
            };
            seeds.restrict(local, allowed);
        }
    }

    seeds
}

/// Narrow seeded cells and propagate from each. Returns frontier cells processed.
pub fn apply_seeds(grid: &mut CellGrid, catalog: &PrototypeCatalog, seeds: &BorderSeeds) -> usize {
    let mut seeded = Vec::with_capacity(seeds.len());
    for (local, allowed) in seeds.iter() {
        let Some(index) = grid.index_of(local) else {
            continue;
        };
        grid.cell_mut(index).candidates.intersect_with(allowed);
        seeded.push(index);
    }

    seeded
        .into_iter()
        .map(|index| propagate(grid, catalog, index, None).visited)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::{ChunkCell, PrototypeId, PrototypeRecord};
    use crate::wfc::solver::{solve_chunk, SolverSettings};

    /// Road tiles: "ns" runs along y, "ew" along x, "grass" fills in
    fn roads() -> Arc<PrototypeCatalog> {
        Arc::new(
            PrototypeCatalog::from_records(vec![
                PrototypeRecord::new("grass", 2.0)
                    .allow(Direction::Left, &["grass", "ns"])
                    .allow(Direction::Right, &["grass", "ns"])
                    .allow(Direction::Back, &["grass", "ew"])
                    .allow(Direction::Forward, &["grass", "ew"]),
                PrototypeRecord::new("ns", 1.0)
                    .allow(Direction::Left, &["grass"])
                    .allow(Direction::Right, &["grass"])
                    .allow(Direction::Back, &["ns"])
                    .allow(Direction::Forward, &["ns"]),
                PrototypeRecord::new("ew", 1.0)
                    .allow(Direction::Left, &["ew"])
                    .allow(Direction::Right, &["ew"])
                    .allow(Direction::Back, &["grass"])
                    .allow(Direction::Forward, &["grass"]),
            ])
            .unwrap(),
        )
    }

    fn uniform(position: ChunkPos, size: UVec2, prototype: PrototypeId) -> Arc<SolvedChunk> {
        let cells = (0..size.y as i32)
            .flat_map(|y| (0..size.x as i32).map(move |x| IVec2::new(x, y)))
            .map(|position| ChunkCell {
                position,
                prototype,
                forced: false,
            })
            .collect();
        Arc::new(SolvedChunk::new(position, size, cells).unwrap())
    }

    #[test]
    fn test_seeds_follow_facing_border() {
        let catalog = roads();
        let size = UVec2::new(3, 3);
        // Left neighbor is all "ew" road: the road must continue into the new chunk
        let left = uniform(ChunkPos::new(-1, 0), size, PrototypeId(2));

        let seeds = compute_border_seeds(&catalog, size, &[(Direction::Left, left)]);
        assert_eq!(seeds.len(), 3);
        for y in 0..3 {
            let seed = seeds.get(IVec2::new(0, y)).unwrap();
            assert_eq!(seed.iter().collect::<Vec<_>>(), vec![PrototypeId(2)]);
        }
        assert!(seeds.get(IVec2::new(1, 0)).is_none());
    }

    #[test]
    fn test_corner_seed_is_intersection() {
        let catalog = roads();
        let size = UVec2::new(2, 2);
        let left = uniform(ChunkPos::new(-1, 0), size, PrototypeId(0));
        let back = uniform(ChunkPos::new(0, -1), size, PrototypeId(0));

        let seeds = compute_border_seeds(
            &catalog,
            size,
            &[(Direction::Left, left), (Direction::Back, back)],
        );
        // grass on the left allows grass/ns, grass behind allows grass/ew
        assert_eq!(
            seeds.get(IVec2::new(0, 0)).unwrap().iter().collect::<Vec<_>>(),
            vec![PrototypeId(0)]
        );
        assert_eq!(seeds.get(IVec2::new(0, 1)).unwrap().len(), 2);
    }

    #[test]
    fn test_seed_from_neighbor_list_alone() {
        // "dock" lists "sea" on its right; "sea" lists nothing
        let catalog = PrototypeCatalog::from_records(vec![
            PrototypeRecord::new("dock", 1.0).allow(Direction::Right, &["sea"]),
            PrototypeRecord::new("sea", 1.0),
            PrototypeRecord::new("reef", 1.0),
        ])
        .unwrap();
        let size = UVec2::new(2, 2);
        let left = uniform(ChunkPos::new(-1, 0), size, PrototypeId(0));

        let seeds = compute_border_seeds(&catalog, size, &[(Direction::Left, left)]);
        for y in 0..2 {
            let seed = seeds.get(IVec2::new(0, y)).unwrap();
            assert_eq!(seed.iter().collect::<Vec<_>>(), vec![PrototypeId(1)]);
        }
    }

    #[test]
    fn test_mismatched_border_is_skipped() {
        let catalog = roads();
        let left = uniform(ChunkPos::new(-1, 0), UVec2::new(4, 4), PrototypeId(0));
        let seeds = compute_border_seeds(&catalog, UVec2::new(3, 3), &[(Direction::Left, left)]);
        assert!(seeds.is_empty());
    }

    #[test]
    fn test_gather_neighbors() {
        let size = UVec2::new(2, 2);
        let mut cache = HashMap::new();
        for pos in [ChunkPos::new(1, 0), ChunkPos::new(0, -1), ChunkPos::new(1, 1)] {
            cache.insert(pos, uniform(pos, size, PrototypeId(0)));
        }
        let dirs: Vec<Direction> = gather_neighbors(&cache, ChunkPos::new(0, 0))
            .into_iter()
            .map(|(d, _)| d)
            .collect();
        // The diagonal chunk is not a neighbor
        assert_eq!(dirs, vec![Direction::Right, Direction::Back]);
    }

    #[test]
    fn test_stitched_chunks_agree_across_border() {
        let catalog = roads();
        let size = UVec2::new(6, 6);

        for seed in [1, 2, 3, 4] {
            let settings = SolverSettings {
                seed,
                fallback: PrototypeId(0),
                ..Default::default()
            };
            let (first, _) = solve_chunk(
                catalog.clone(),
                settings,
                ChunkPos::new(0, 0),
                size,
                &BorderSeeds::default(),
            )
            .unwrap();
            let first = Arc::new(first);

            let seeds = compute_border_seeds(&catalog, size, &[(Direction::Left, first.clone())]);
            let settings = SolverSettings {
                seed: seed + 100,
                ..settings
            };
            let (second, _) =
                solve_chunk(catalog.clone(), settings, ChunkPos::new(1, 0), size, &seeds).unwrap();

            for (outer, inner) in first
                .border(Direction::Right)
                .iter()
                .zip(second.border(Direction::Left))
            {
                if inner.forced {
                    continue;
                }
                assert!(catalog.pair_allowed(outer.prototype, Direction::Right, inner.prototype));
            }
        }
    }

    #[test]
    fn test_apply_seeds_propagates_inward() {
        let catalog = roads();
        let size = UVec2::new(3, 1);
        let mut grid = CellGrid::new(ChunkPos::new(0, 0), size, &catalog.all());
        let mut seeds = BorderSeeds::default();
        seeds.restrict(IVec2::new(0, 0), CandidateSet::single(3, PrototypeId(2)));

        apply_seeds(&mut grid, &catalog, &seeds);
        // An "ew" road on the left forces the whole row to stay road
        for index in 0..3 {
            assert_eq!(
                grid.cell(index).candidates().iter().collect::<Vec<_>>(),
                vec![PrototypeId(2)]
            );
        }
    }
}

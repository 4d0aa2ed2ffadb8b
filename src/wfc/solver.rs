//! Collapse/backtrack solver for one chunk.
//!
//! Minimum-entropy selection, weighted collapse, and a history stack for
//! rollback. Each committed collapse keeps the propagation trail it caused, so
//! undoing it restores every narrowed neighbor. The loop is iterative with an
//! explicit depth counter: a success resets it, a failure rolls back the last
//! committed collapse and bumps it, and past `retry_threshold` the
//! minimum-entropy cell is force-collapsed to the fallback prototype. Forced
//! collapses are never rolled back: a failure with only forced entries left
//! to undo forces the failing cell too, so each cell is forced at most once.
//! The backtrack budget bounds the total number of rollbacks; once spent,
//! every failure force-collapses, so a solve always ends.

use super::candidates::CandidateSet;
use super::grid::{Cell, CellGrid};
use super::propagation::{propagate, rewind, TrailEntry};
use super::stitching::{apply_seeds, BorderSeeds};
use crate::tiles::{
    ChunkPos, Direction, PrototypeCatalog, PrototypeId, SolvedChunk, RETRY_THRESHOLD, WORLD_SEED,
};
use bevy::log::{debug, warn};
use bevy::math::{IVec2, UVec2};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Failed attempts in a row before a forced collapse
    pub retry_threshold: u32,
    /// Total rollbacks allowed; `None` means `cells × retry_threshold`
    pub backtrack_budget: Option<usize>,
    /// Assigned unconditionally by a forced collapse
    pub fallback: PrototypeId,
    pub seed: u64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            retry_threshold: RETRY_THRESHOLD,
            backtrack_budget: None,
            fallback: PrototypeId(0),
            seed: WORLD_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Uninitialized,
    Solving,
    Solved,
}

/// Cell state captured right before a collapse
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub index: usize,
    pub candidates: CandidateSet,
    /// Selection before the attempt
    pub previous: Option<PrototypeId>,
    /// Prototype the attempt committed to
    pub chosen: Option<PrototypeId>,
    pub forced: bool,
    /// Everything narrowed while this entry is on the stack
    trail: Vec<TrailEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    pub collapses: usize,
    pub failed_attempts: usize,
    pub backtracks: usize,
    pub forced: usize,
    /// Frontier cells processed across all propagation runs
    pub propagation_visits: usize,
}

pub struct WfcSolver {
    catalog: Arc<PrototypeCatalog>,
    settings: SolverSettings,
    rng: ChaCha8Rng,
    grid: Option<CellGrid>,
    history: Vec<HistoryEntry>,
    state: SolverState,
    stats: SolveStats,
    backtracks_left: usize,
}

impl WfcSolver {
    pub fn new(catalog: Arc<PrototypeCatalog>, settings: SolverSettings) -> Self {
        Self {
            catalog,
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            settings,
            grid: None,
            history: Vec::new(),
            state: SolverState::Uninitialized,
            stats: SolveStats::default(),
            backtracks_left: 0,
        }
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn stats(&self) -> SolveStats {
        self.stats
    }

    pub fn grid(&self) -> Option<&CellGrid> {
        self.grid.as_ref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Allocate the grid with the full catalog in every cell, then apply border seeds
    pub fn initialize(&mut self, position: ChunkPos, size: UVec2, seeds: &BorderSeeds) {
        let mut grid = CellGrid::new(position, size, &self.catalog.all());
        self.stats = SolveStats::default();
        self.stats.propagation_visits += apply_seeds(&mut grid, &self.catalog, seeds);

        self.backtracks_left = self
            .settings
            .backtrack_budget
            .unwrap_or(grid.len() * self.settings.retry_threshold as usize);
        self.history.clear();
        self.grid = Some(grid);
        self.state = SolverState::Solving;
    }

    /// Cell at a chunk-local position; `None` out of bounds unless `wrapping`
    pub fn get_cell(&self, local: IVec2, wrapping: bool) -> Option<&Cell> {
        self.grid.as_ref()?.get_cell(local, wrapping)
    }

    /// Uncollapsed cell with the fewest candidates. Ties go to the cell whose
    /// best candidate weighs the most, then to a seeded draw.
    pub fn select_next_cell(&mut self) -> Option<usize> {
        let grid = self.grid.as_ref()?;
        let catalog = &self.catalog;

        let mut best: Option<(usize, f32)> = None;
        let mut tied = Vec::new();
        for (index, cell) in grid.cells().iter().enumerate() {
            if cell.is_collapsed() {
                continue;
            }
            let entropy = cell.entropy();
            let weight = cell
                .candidates()
                .iter()
                .map(|id| catalog.weight(id))
                .fold(0.0, f32::max);

            let better = match best {
                None => true,
                Some((e, w)) => entropy < e || (entropy == e && weight > w),
            };
            if better {
                best = Some((entropy, weight));
                tied.clear();
                tied.push(index);
            } else if best == Some((entropy, weight)) {
                tied.push(index);
            }
        }

        match tied.len() {
            0 => None,
            1 => Some(tied[0]),
            n => Some(tied[self.rng.gen_range(0..n)]),
        }
    }

    /// Commit `index` to the heaviest candidate (seeded tie-break) that fits every
    /// collapsed orthogonal neighbor. Fails on a collapsed or empty cell, or
    /// when no candidate fits. Does not propagate.
    pub fn collapse(&mut self, index: usize) -> bool {
        let Some(grid) = self.grid.as_mut() else {
            return false;
        };
        let cell = grid.cell(index);
        if cell.is_collapsed() || cell.candidates().is_empty() {
            return false;
        }

        let catalog = &self.catalog;
        let mut order: Vec<PrototypeId> = cell.candidates().iter().collect();
        order.shuffle(&mut self.rng);
        // Stable: equal weights keep their shuffled order
        order.sort_by(|a, b| catalog.weight(*b).total_cmp(&catalog.weight(*a)));

        let Some(chosen) = order
            .into_iter()
            .find(|&candidate| fits_neighbors(grid, catalog, index, candidate))
        else {
            return false;
        };

        grid.cell_mut(index).collapse_to(chosen, false);
        true
    }

    /// Run the main loop until every cell is collapsed
    pub fn solve(&mut self) -> SolveStats {
        if self.state != SolverState::Solving {
            return self.stats;
        }

        let threshold = self.settings.retry_threshold;
        let mut depth = 0u32;

        loop {
            if depth > threshold {
                if let Some(index) = self.select_next_cell() {
                    self.force_collapse(index);
                }
                depth = 0;
                continue;
            }

            let Some(grid) = self.grid.as_ref() else {
                break;
            };
            if grid.all_collapsed() {
                break;
            }
            let Some(index) = self.select_next_cell() else {
                break;
            };

            let cell = self.grid.as_ref().map(|g| g.cell(index));
            let Some(cell) = cell else {
                break;
            };
            self.history.push(HistoryEntry {
                index,
                candidates: cell.candidates().clone(),
                previous: cell.selected(),
                chosen: None,
                forced: false,
                trail: Vec::new(),
            });

            if self.collapse(index) {
                self.commit_top(index);
                depth = 0;
                continue;
            }

            // The attempt never committed; drop its entry and roll back the last real one
            self.history.pop();
            self.stats.failed_attempts += 1;
            if self.backtracks_left > 0 && self.backtrack() {
                depth += 1;
            } else {
                self.force_collapse(index);
                depth = 0;
            }
        }

        self.state = SolverState::Solved;
        if let Some(grid) = &self.grid {
            debug!(
                "Solved chunk {:?}: {} collapses, {} backtracks, {} forced",
                grid.position(),
                self.stats.collapses,
                self.stats.backtracks,
                self.stats.forced
            );
        }
        self.stats
    }

    /// The finished chunk, only once solved
    pub fn result(&self) -> Option<SolvedChunk> {
        if self.state != SolverState::Solved {
            return None;
        }
        self.grid.as_ref()?.to_solved()
    }

    /// Record the committed choice on the top entry and propagate from it
    fn commit_top(&mut self, index: usize) {
        let (Some(grid), Some(entry)) = (self.grid.as_mut(), self.history.last_mut()) else {
            return;
        };
        entry.chosen = grid.cell(index).selected();
        let run = propagate(grid, &self.catalog, index, Some(&mut entry.trail));
        self.stats.collapses += 1;
        self.stats.propagation_visits += run.visited;
    }

    /// Undo the most recent committed entry and exclude what it chose.
    /// Returns false when the history is empty or its top entry was forced.
    fn backtrack(&mut self) -> bool {
        let Some(grid) = self.grid.as_mut() else {
            return false;
        };
        if self.history.last().map_or(true, |entry| entry.forced) {
            return false;
        }
        let Some(entry) = self.history.pop() else {
            return false;
        };
        self.backtracks_left -= 1;
        self.stats.backtracks += 1;

        rewind(grid, entry.trail);
        let mut restored = entry.candidates.clone();
        if let Some(chosen) = entry.chosen {
            restored.remove(chosen);
        }
        grid.cell_mut(entry.index).uncollapse(restored);

        // The exclusion holds only under the entries still below, so it unwinds with them
        let run = match self.history.last_mut() {
            Some(below) => {
                below.trail.push(TrailEntry {
                    index: entry.index,
                    previous: entry.candidates,
                });
                propagate(grid, &self.catalog, entry.index, Some(&mut below.trail))
            }
            None => propagate(grid, &self.catalog, entry.index, None),
        };
        self.stats.propagation_visits += run.visited;
        true
    }

    /// Assign the fallback without any compatibility check
    fn force_collapse(&mut self, index: usize) {
        let Some(grid) = self.grid.as_mut() else {
            return;
        };
        let fallback = self.settings.fallback;
        let cell = grid.cell(index);
        let mut entry = HistoryEntry {
            index,
            candidates: cell.candidates().clone(),
            previous: cell.selected(),
            chosen: Some(fallback),
            forced: true,
            trail: Vec::new(),
        };

        warn!(
            "Forced collapse in chunk {:?} at {:?} (entropy {}), using fallback {:?}",
            grid.position(),
            cell.position,
            cell.entropy(),
            fallback
        );

        grid.cell_mut(index).collapse_to(fallback, true);
        let run = propagate(grid, &self.catalog, index, Some(&mut entry.trail));
        self.history.push(entry);
        self.stats.forced += 1;
        self.stats.propagation_visits += run.visited;
    }
}

/// True if `candidate` at `index` agrees with every collapsed orthogonal neighbor
fn fits_neighbors(
    grid: &CellGrid,
    catalog: &PrototypeCatalog,
    index: usize,
    candidate: PrototypeId,
) -> bool {
    Direction::ALL.iter().all(|&dir| {
        match grid.neighbor(index, dir).and_then(|n| grid.cell(n).selected()) {
            Some(neighbor) => catalog.pair_allowed(candidate, dir, neighbor),
            None => true,
        }
    })
}

/// Convenience: initialize, solve and return the chunk in one call
pub fn solve_chunk(
    catalog: Arc<PrototypeCatalog>,
    settings: SolverSettings,
    position: ChunkPos,
    size: UVec2,
    seeds: &BorderSeeds,
) -> Option<(SolvedChunk, SolveStats)> {
    let mut solver = WfcSolver::new(catalog, settings);
    solver.initialize(position, size, seeds);
    let stats = solver.solve();
    solver.result().map(|chunk| (chunk, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::PrototypeRecord;

    fn catalog(records: Vec<PrototypeRecord>) -> Arc<PrototypeCatalog> {
        Arc::new(PrototypeCatalog::from_records(records).unwrap())
    }

    /// grass | sand | water, with sand as the shore between grass and water
    fn terrain() -> Arc<PrototypeCatalog> {
        catalog(vec![
            PrototypeRecord::new("grass", 3.0).allow_all(&["grass", "sand"]),
            PrototypeRecord::new("sand", 1.0).allow_all(&["grass", "sand", "water"]),
            PrototypeRecord::new("water", 2.0).allow_all(&["sand", "water"]),
        ])
    }

    fn settings(seed: u64) -> SolverSettings {
        SolverSettings {
            seed,
            fallback: PrototypeId(1),
            ..Default::default()
        }
    }

    fn solve(
        catalog: Arc<PrototypeCatalog>,
        settings: SolverSettings,
        size: UVec2,
    ) -> (SolvedChunk, SolveStats) {
        solve_chunk(catalog, settings, ChunkPos::new(0, 0), size, &BorderSeeds::default()).unwrap()
    }

    #[test]
    fn test_state_machine() {
        let mut solver = WfcSolver::new(terrain(), settings(1));
        assert_eq!(solver.state(), SolverState::Uninitialized);
        assert!(solver.result().is_none());
        assert!(solver.get_cell(IVec2::ZERO, false).is_none());

        solver.initialize(ChunkPos::new(0, 0), UVec2::new(3, 3), &BorderSeeds::default());
        assert_eq!(solver.state(), SolverState::Solving);
        assert!(solver.result().is_none());

        solver.solve();
        assert_eq!(solver.state(), SolverState::Solved);
        assert!(solver.result().is_some());
        assert!(solver.get_cell(IVec2::new(4, 4), true).unwrap().is_collapsed());
    }

    #[test]
    fn test_trivial_single_cell() {
        let catalog = catalog(vec![PrototypeRecord::new("a", 1.0)]);
        let settings = SolverSettings {
            fallback: PrototypeId(0),
            ..Default::default()
        };
        let (chunk, stats) = solve(catalog, settings, UVec2::new(1, 1));
        assert_eq!(chunk.prototype_at(IVec2::ZERO), Some(PrototypeId(0)));
        assert_eq!(stats.forced, 0);
    }

    #[test]
    fn test_simple_pair_is_ordered() {
        // Only "a" lists anything: "b" may sit on its right. "b" lists nothing.
        let catalog = catalog(vec![
            PrototypeRecord::new("a", 1.0).allow(Direction::Right, &["b"]),
            PrototypeRecord::new("b", 1.0),
        ]);
        let settings = |seed| SolverSettings {
            seed,
            fallback: PrototypeId(0),
            ..Default::default()
        };

        for seed in 0..32 {
            let (chunk, stats) = solve(catalog.clone(), settings(seed), UVec2::new(2, 1));
            assert_eq!(chunk.prototype_at(IVec2::new(0, 0)), Some(PrototypeId(0)), "seed {}", seed);
            assert_eq!(chunk.prototype_at(IVec2::new(1, 0)), Some(PrototypeId(1)), "seed {}", seed);
            assert_eq!(stats.forced, 0, "seed {}", seed);
            assert_eq!(chunk.forced_count(), 0);
        }
    }

    #[test]
    fn test_simple_pair_listed_by_both_sides() {
        let catalog = catalog(vec![
            PrototypeRecord::new("a", 1.0).allow(Direction::Right, &["b"]),
            PrototypeRecord::new("b", 1.0).allow(Direction::Left, &["a"]),
        ]);
        for seed in 0..16 {
            let (chunk, stats) = solve(catalog.clone(), settings(seed), UVec2::new(2, 1));
            assert_eq!(chunk.prototype_at(IVec2::new(0, 0)), Some(PrototypeId(0)));
            assert_eq!(chunk.prototype_at(IVec2::new(1, 0)), Some(PrototypeId(1)));
            assert_eq!(stats.forced, 0, "seed {}", seed);
        }
    }

    #[test]
    fn test_forced_fallback_terminates() {
        // Nothing may sit next to anything: every neighbor of a collapse contradicts
        let catalog = catalog(vec![
            PrototypeRecord::new("rock", 1.0),
            PrototypeRecord::new("ice", 1.0),
        ]);
        let settings = SolverSettings {
            fallback: PrototypeId(1),
            seed: 7,
            ..Default::default()
        };
        let size = UVec2::new(4, 4);
        let (chunk, stats) = solve(catalog, settings, size);

        assert_eq!(chunk.cells().len(), 16);
        assert!(chunk.forced_count() >= 1);
        assert!(chunk
            .cells()
            .iter()
            .filter(|c| c.forced)
            .all(|c| c.prototype == PrototypeId(1)));
        // Forced cells are permanent, so every forced collapse shows in the output
        assert_eq!(stats.forced, chunk.forced_count());
        assert!(stats.backtracks <= 16 * RETRY_THRESHOLD as usize);
    }

    #[test]
    fn test_forced_collapses_bounded_by_cell_count() {
        let catalog = catalog(vec![
            PrototypeRecord::new("rock", 1.0),
            PrototypeRecord::new("ice", 1.0),
            PrototypeRecord::new("mud", 1.0),
        ]);
        for (width, depth, threshold) in [(2, 1, 10), (4, 4, 10), (6, 3, 2), (5, 5, 0)] {
            let cells = (width * depth) as usize;
            for seed in 0..8 {
                let settings = SolverSettings {
                    retry_threshold: threshold,
                    fallback: PrototypeId(0),
                    seed,
                    ..Default::default()
                };
                let (chunk, stats) = solve(catalog.clone(), settings, UVec2::new(width, depth));
                assert!(stats.forced <= cells, "{}x{} seed {}: {:?}", width, depth, seed, stats);
                assert!(stats.backtracks <= cells * threshold as usize);
                assert_eq!(stats.forced, chunk.forced_count());
                assert!(chunk.forced_count() >= 1);
            }
        }
    }

    #[test]
    fn test_zero_budget_still_terminates() {
        let catalog = catalog(vec![PrototypeRecord::new("lonely", 1.0)]);
        let settings = SolverSettings {
            backtrack_budget: Some(0),
            retry_threshold: 0,
            ..Default::default()
        };
        let (chunk, stats) = solve(catalog, settings, UVec2::new(5, 3));
        assert_eq!(chunk.cells().len(), 15);
        assert_eq!(stats.backtracks, 0);
        assert!(stats.forced > 0);
    }

    #[test]
    fn test_local_consistency_for_unforced_cells() {
        let catalog = terrain();
        for seed in [3, 11, 42] {
            let (chunk, _) = solve(catalog.clone(), settings(seed), UVec2::new(12, 9));
            for cell in chunk.cells().iter().filter(|c| !c.forced) {
                for dir in Direction::ALL {
                    let Some(other) = chunk.cell(cell.position + dir.offset(), false) else {
                        continue;
                    };
                    if other.forced {
                        continue;
                    }
                    assert!(
                        catalog.pair_allowed(cell.prototype, dir, other.prototype),
                        "{:?} {:?} {:?} at {:?}",
                        cell.prototype,
                        dir,
                        other.prototype,
                        cell.position
                    );
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let catalog = terrain();
        let (a, _) = solve(catalog.clone(), settings(99), UVec2::new(10, 10));
        let (b, _) = solve(catalog, settings(99), UVec2::new(10, 10));
        assert_eq!(a, b);
    }

    #[test]
    fn test_collapse_refuses_collapsed_and_empty_cells() {
        let mut solver = WfcSolver::new(terrain(), settings(5));
        solver.initialize(ChunkPos::new(0, 0), UVec2::new(2, 1), &BorderSeeds::default());

        assert!(solver.collapse(0));
        assert!(!solver.collapse(0));

        if let Some(grid) = solver.grid.as_mut() {
            grid.cell_mut(1).candidates.clear();
        }
        assert!(!solver.collapse(1));
    }

    #[test]
    fn test_select_prefers_low_entropy_then_weight() {
        let mut solver = WfcSolver::new(terrain(), settings(5));
        solver.initialize(ChunkPos::new(0, 0), UVec2::new(3, 1), &BorderSeeds::default());

        let (sand, water) = (PrototypeId(1), PrototypeId(2));
        if let Some(grid) = solver.grid.as_mut() {
            grid.cell_mut(0).candidates = CandidateSet::from_ids(3, [sand, water]);
            grid.cell_mut(2).candidates = CandidateSet::from_ids(3, [PrototypeId(0), sand]);
        }
        // Both have two candidates; grass (3.0) outweighs water (2.0)
        assert_eq!(solver.select_next_cell(), Some(2));

        if let Some(grid) = solver.grid.as_mut() {
            grid.cell_mut(1).candidates = CandidateSet::single(3, sand);
        }
        assert_eq!(solver.select_next_cell(), Some(1));
    }
}

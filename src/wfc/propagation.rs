//! Breadth-first constraint propagation.
//!
//! From a changed cell, every uncollapsed orthogonal neighbor is intersected
//! with the set the cell's current candidates permit in that direction. A
//! neighbor that shrinks is queued in turn, at most once per run. Candidate
//! sets only shrink, so the queue always drains.

use super::candidates::CandidateSet;
use super::grid::CellGrid;
use crate::tiles::{Direction, PrototypeCatalog};
use std::collections::VecDeque;

/// A candidate set as it was before propagation narrowed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailEntry {
    pub index: usize,
    pub previous: CandidateSet,
}

/// Result of one propagation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Propagation {
    /// Frontier cells processed
    pub visited: usize,
    /// Times a neighbor's candidate set shrank
    pub narrowed: usize,
    /// Neighbors left with no candidates
    pub contradictions: usize,
}

/// Union of what `candidates` permit one step in `direction`
pub fn permitted(
    catalog: &PrototypeCatalog,
    candidates: &CandidateSet,
    direction: Direction,
) -> CandidateSet {
    let mut permitted = CandidateSet::empty(catalog.len());
    for id in candidates.iter() {
        permitted.union_with(catalog.compatible(id, direction));
    }
    permitted
}

/// Propagate from `start` until the queue drains.
///
/// A cell enters the queue at most once per run; a visited cell can still be
/// narrowed by a later frontier but is not processed again. Every narrowed
/// cell's previous set is pushed onto `trail` when one is given,
/// so the caller can rewind the run exactly. Collapsed cells are never touched.
/// A contradicted cell (no candidates) does not propagate further; it is left
/// for the solver to resolve.
pub fn propagate(
    grid: &mut CellGrid,
    catalog: &PrototypeCatalog,
    start: usize,
    mut trail: Option<&mut Vec<TrailEntry>>,
) -> Propagation {
    let mut stats = Propagation::default();
    let mut visited = vec![false; grid.len()];
    let mut queue = VecDeque::new();

    queue.push_back(start);
    visited[start] = true;

    while let Some(current) = queue.pop_front() {
        stats.visited += 1;

        if grid.cell(current).candidates.is_empty() {
            continue;
        }

        for dir in Direction::ALL {
            let Some(neighbor) = grid.neighbor(current, dir) else {
                continue;
            };
            if grid.cell(neighbor).is_collapsed() {
                continue;
            }

            let allowed = permitted(catalog, &grid.cell(current).candidates, dir);
            let before = grid.cell(neighbor).candidates.clone();
            let cell = grid.cell_mut(neighbor);
            if !cell.candidates.intersect_with(&allowed) {
                continue;
            }

            stats.narrowed += 1;
            if cell.candidates.is_empty() {
                stats.contradictions += 1;
            }
            if let Some(trail) = trail.as_deref_mut() {
                trail.push(TrailEntry {
                    index: neighbor,
                    previous: before,
                });
            }
            if !visited[neighbor] {
                visited[neighbor] = true;
                queue.push_back(neighbor);
            }
        }
    }

    stats
}

/// Undo a trail, newest change first
pub fn rewind(grid: &mut CellGrid, trail: Vec<TrailEntry>) {
    for entry in trail.into_iter().rev() {
        grid.cell_mut(entry.index).candidates = entry.previous;
    }
}

//! Cell grid for a single chunk solve.
//!
//! The grid owns every cell by value in a flat row-major store. Cells never
//! point back at the grid; neighbor lookup is [`CellGrid::neighbor`], a pure
//! function of grid shape and index.

use super::candidates::CandidateSet;
use crate::tiles::{coords, ChunkCell, ChunkPos, Direction, PrototypeId, SolvedChunk};
use bevy::math::{IVec2, UVec2};

/// Solver-side cell state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub position: IVec2,
    pub(crate) selected: Option<PrototypeId>,
    pub(crate) candidates: CandidateSet,
    pub(crate) forced: bool,
}

impl Cell {
    pub fn is_collapsed(&self) -> bool {
        self.selected.is_some()
    }

    /// Present iff collapsed
    pub fn selected(&self) -> Option<PrototypeId> {
        self.selected
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// Number of remaining candidates
    pub fn entropy(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub(crate) fn collapse_to(&mut self, prototype: PrototypeId, forced: bool) {
        self.selected = Some(prototype);
        self.forced = forced;
        self.candidates = CandidateSet::single(self.candidates.capacity(), prototype);
    }

    pub(crate) fn uncollapse(&mut self, candidates: CandidateSet) {
        self.selected = None;
        self.forced = false;
        self.candidates = candidates;
    }
}

#[derive(Debug, Clone)]
pub struct CellGrid {
    position: ChunkPos,
    size: UVec2,
    origin: IVec2,
    cells: Vec<Cell>,
}

impl CellGrid {
    /// Every cell starts uncollapsed with `initial` as its candidates
    pub fn new(position: ChunkPos, size: UVec2, initial: &CandidateSet) -> Self {
        let cells = (0..size.y as i32)
            .flat_map(|y| (0..size.x as i32).map(move |x| IVec2::new(x, y)))
            .map(|position| Cell {
                position,
                selected: None,
                candidates: initial.clone(),
                forced: false,
            })
            .collect();

        Self {
            position,
            size,
            origin: position.origin(size),
            cells,
        }
    }

    pub fn position(&self) -> ChunkPos {
        self.position
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn origin(&self) -> IVec2 {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Flat index of a chunk-local position, `None` when out of bounds
    pub fn index_of(&self, local: IVec2) -> Option<usize> {
        if local.x < 0 || local.y < 0 || local.x >= self.size.x as i32 || local.y >= self.size.y as i32
        {
            return None;
        }
        Some((local.y * self.size.x as i32 + local.x) as usize)
    }

    pub fn position_of(&self, index: usize) -> IVec2 {
        let w = self.size.x as usize;
        IVec2::new((index % w) as i32, (index / w) as i32)
    }

    /// Index of the cell one step in `direction`; `None` past the grid edge
    /// (no constraint from that side)
    pub fn neighbor(&self, index: usize, direction: Direction) -> Option<usize> {
        self.index_of(self.position_of(index) + direction.offset())
    }

    /// Cell at a chunk-local position, wrapping modulo the grid size if requested
    pub fn get_cell(&self, local: IVec2, wrapping: bool) -> Option<&Cell> {
        if wrapping {
            if self.cells.is_empty() {
                return None;
            }
            let wrapped = IVec2::new(
                local.x.rem_euclid(self.size.x as i32),
                local.y.rem_euclid(self.size.y as i32),
            );
            return self.index_of(wrapped).map(|i| &self.cells[i]);
        }
        self.index_of(local).map(|i| &self.cells[i])
    }

    /// Cell at a global cell position (world cell coordinates)
    pub fn get_cell_global(&self, global: IVec2, wrapping: bool) -> Option<&Cell> {
        self.get_cell(global - self.origin, wrapping)
    }

    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    pub(crate) fn cell_mut(&mut self, index: usize) -> &mut Cell {
        &mut self.cells[index]
    }

    pub fn all_collapsed(&self) -> bool {
        self.cells.iter().all(Cell::is_collapsed)
    }

    /// Indices of the edge facing `direction`, ascending along the edge
    pub fn border_indices(&self, direction: Direction) -> Vec<usize> {
        coords::edge_positions(self.size, direction)
            .into_iter()
            .filter_map(|p| self.index_of(p))
            .collect()
    }

    /// Freeze into a chunk value. `None` while any cell is uncollapsed.
    pub fn to_solved(&self) -> Option<SolvedChunk> {
        let cells = self
            .cells
            .iter()
            .map(|cell| {
                cell.selected.map(|prototype| ChunkCell {
                    position: cell.position,
                    prototype,
                    forced: cell.forced,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        SolvedChunk::new(self.position, self.size, cells)
    }
}

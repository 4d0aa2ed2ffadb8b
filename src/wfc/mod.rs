pub mod candidates;
pub mod grid;
pub mod propagation;
pub mod solver;
pub mod stitching;

// Re-export commonly used items
pub use candidates::CandidateSet;
pub use grid::{Cell, CellGrid};
pub use propagation::{propagate, Propagation, TrailEntry};
pub use solver::{solve_chunk, HistoryEntry, SolveStats, SolverSettings, SolverState, WfcSolver};
pub use stitching::{apply_seeds, compute_border_seeds, gather_neighbors, BorderSeeds};

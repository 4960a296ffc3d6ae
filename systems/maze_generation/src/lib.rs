#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Randomised depth-first maze generation.
//!
//! Mazes are carved over the odd-coordinate sublattice of a square grid: every
//! lattice cell ends up connected to the start through exactly one simple path.
//! The start sits at `(1, 1)` and the end at `(size - 2, size - 2)`; when the
//! end does not land on a carved lattice cell (even sizes), a forcing step
//! opens the neighbour that links it back to the lattice.

use maze_lab_core::{CellKind, Grid, MIN_MAZE_SIZE};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

const LATTICE_STRIDE: i64 = 2;
const START: (i64, i64) = (1, 1);
const LATTICE_DIRECTIONS: [(i64, i64); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Generates a fresh maze of the provided side length from operating system entropy.
///
/// Sizes below [`MIN_MAZE_SIZE`] are clamped up to it.
#[must_use]
pub fn generate_maze(size: u32) -> Grid {
    let mut rng = ChaCha8Rng::from_entropy();
    generate_maze_with(size, &mut rng)
}

/// Generates a maze drawing every random choice from `rng`.
#[must_use]
pub fn generate_maze_with<R: Rng + ?Sized>(size: u32, rng: &mut R) -> Grid {
    let mut carver = Carver::new(size.max(MIN_MAZE_SIZE));
    carver.carve(rng);
    carver.force_end();
    carver.into_grid()
}

/// Deterministic maze source that derives one seed per generated layout.
///
/// Each call to [`MazeGenerator::generate`] hashes the global seed together
/// with the level and a running generation counter, so a replay that issues
/// the same sequence of requests observes the same sequence of mazes.
#[derive(Clone, Debug)]
pub struct MazeGenerator {
    seed: u64,
    generation: u64,
}

impl MazeGenerator {
    /// Creates a generator that replays deterministically from `seed`.
    #[must_use]
    pub const fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            generation: 0,
        }
    }

    /// Creates a generator seeded from operating system entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random())
    }

    /// Global seed the generator derives its layouts from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Produces the next maze for `level` with side length `size`.
    pub fn generate(&mut self, level: u32, size: u32) -> Grid {
        let layout_seed = derive_layout_seed(self.seed, level, self.generation);
        self.generation = self.generation.wrapping_add(1);
        let mut rng = ChaCha8Rng::seed_from_u64(layout_seed);
        generate_maze_with(size, &mut rng)
    }
}

struct Carver {
    size: i64,
    cells: Vec<CellKind>,
}

impl Carver {
    fn new(size: u32) -> Self {
        let side = usize::try_from(size).unwrap_or(0);
        Self {
            size: i64::from(size),
            cells: vec![CellKind::Wall; side * side],
        }
    }

    fn carve<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.open(START);
        let mut stack = vec![START];
        let mut frontier = Vec::with_capacity(LATTICE_DIRECTIONS.len());

        while let Some(&(column, row)) = stack.last() {
            frontier.clear();
            for (dx, dy) in LATTICE_DIRECTIONS {
                let target = (column + dx * LATTICE_STRIDE, row + dy * LATTICE_STRIDE);
                if self.on_lattice(target) && self.is_wall(target) {
                    frontier.push((target, (column + dx, row + dy)));
                }
            }

            match frontier.choose(rng) {
                Some(&(target, between)) => {
                    self.open(between);
                    self.open(target);
                    stack.push(target);
                }
                None => {
                    let _ = stack.pop();
                }
            }
        }
    }

    fn force_end(&mut self) {
        let end = (self.size - 2, self.size - 2);
        self.open(end);

        let connected = LATTICE_DIRECTIONS
            .iter()
            .any(|(dx, dy)| !self.is_wall((end.0 + dx, end.1 + dy)));
        if connected {
            return;
        }

        // Left first: for even sizes it touches the lattice cell above it.
        for (dx, dy) in [(-1, 0), (0, -1)] {
            let neighbor = (end.0 + dx, end.1 + dy);
            if self.is_interior(neighbor) {
                self.open(neighbor);
                return;
            }
        }
    }

    fn into_grid(mut self) -> Grid {
        self.set(START, CellKind::Start);
        self.set((self.size - 2, self.size - 2), CellKind::End);
        let size = u32::try_from(self.size).unwrap_or(MIN_MAZE_SIZE);
        match Grid::from_kinds(size, self.cells) {
            Ok(grid) => grid,
            Err(error) => unreachable!("carved maze violates grid invariants: {error}"),
        }
    }

    fn on_lattice(&self, (column, row): (i64, i64)) -> bool {
        column % 2 == 1 && row % 2 == 1 && self.is_interior((column, row))
    }

    fn is_interior(&self, (column, row): (i64, i64)) -> bool {
        column >= 1 && row >= 1 && column <= self.size - 2 && row <= self.size - 2
    }

    fn is_wall(&self, cell: (i64, i64)) -> bool {
        self.index(cell)
            .map_or(true, |index| self.cells[index] == CellKind::Wall)
    }

    fn open(&mut self, cell: (i64, i64)) {
        self.set(cell, CellKind::Empty);
    }

    fn set(&mut self, cell: (i64, i64), kind: CellKind) {
        if let Some(index) = self.index(cell) {
            self.cells[index] = kind;
        }
    }

    fn index(&self, (column, row): (i64, i64)) -> Option<usize> {
        if column < 0 || row < 0 || column >= self.size || row >= self.size {
            return None;
        }
        usize::try_from(row * self.size + column).ok()
    }
}

fn derive_layout_seed(global_seed: u64, level: u32, generation: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(global_seed.to_le_bytes());
    hasher.update(level.to_le_bytes());
    hasher.update(generation.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for a Maze Lab run.
//!
//! The world binds one immutable [`Grid`] to the mutable run state: the
//! cursor, the trail of visited cells and the move counter. It implements
//! [`MovementApi`], the only surface compiled programs can reach.

use maze_lab_core::{CellCoord, Direction, Grid, MoveOutcome, MovementApi};
use tracing::trace;

/// Represents the maze together with the state of the active run.
#[derive(Clone, Debug)]
pub struct World {
    grid: Grid,
    cursor: CellCoord,
    trail: Vec<CellCoord>,
    moves: u32,
}

impl World {
    /// Creates a world for the provided grid with a freshly reset run.
    #[must_use]
    pub fn new(grid: Grid) -> Self {
        let start = grid.start();
        Self {
            grid,
            cursor: start,
            trail: vec![start],
            moves: 0,
        }
    }

    /// Swaps in a new grid and resets the run state against it.
    pub fn replace_grid(&mut self, grid: Grid) {
        self.grid = grid;
        self.reset_run();
    }

    /// Returns the cursor to the start and clears the trail and move counter.
    pub fn reset_run(&mut self) {
        self.cursor = self.grid.start();
        self.trail.clear();
        self.trail.push(self.cursor);
        self.moves = 0;
    }

    /// Reports whether the cursor currently stands on the exit.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.cursor == self.grid.end()
    }

    fn signed_cell(column: i64, row: i64) -> Option<CellCoord> {
        CellCoord::from_signed(column, row)
    }
}

impl MovementApi for World {
    fn position(&self) -> CellCoord {
        self.cursor
    }

    fn is_wall(&self, column: i64, row: i64) -> bool {
        Self::signed_cell(column, row).map_or(true, |cell| self.grid.is_wall(cell))
    }

    fn is_end(&self, column: i64, row: i64) -> bool {
        Self::signed_cell(column, row).map_or(false, |cell| cell == self.grid.end())
    }

    fn step(&mut self, direction: Direction) -> MoveOutcome {
        let from = self.cursor;
        let Some(to) = from.neighbor(direction) else {
            trace!(%from, direction = direction.name(), "move absorbed at grid edge");
            return MoveOutcome::Blocked { at: from };
        };

        if self.grid.is_wall(to) {
            trace!(%from, direction = direction.name(), "move absorbed by wall");
            return MoveOutcome::Blocked { at: from };
        }

        self.cursor = to;
        self.trail.push(to);
        self.moves = self.moves.saturating_add(1);
        MoveOutcome::Moved { from, to }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::World;
    use maze_lab_core::{CellCoord, Grid};

    /// Provides read-only access to the maze.
    #[must_use]
    pub fn grid(world: &World) -> &Grid {
        &world.grid
    }

    /// Current cursor position.
    #[must_use]
    pub fn cursor(world: &World) -> CellCoord {
        world.cursor
    }

    /// Ordered history of visited cells, starting with the start cell.
    #[must_use]
    pub fn trail(world: &World) -> &[CellCoord] {
        &world.trail
    }

    /// Number of successful moves in the active run.
    #[must_use]
    pub fn move_count(world: &World) -> u32 {
        world.moves
    }

    /// Captures an owned snapshot suitable for handing to a presentation layer.
    #[must_use]
    pub fn snapshot(world: &World) -> WorldSnapshot {
        WorldSnapshot {
            grid: world.grid.clone(),
            cursor: world.cursor,
            trail: world.trail.clone(),
            moves: world.moves,
        }
    }

    /// Owned copy of the world state at a point in time.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct WorldSnapshot {
        /// Maze the run takes place in.
        pub grid: Grid,
        /// Cursor position.
        pub cursor: CellCoord,
        /// Visited cells in order.
        pub trail: Vec<CellCoord>,
        /// Number of successful moves.
        pub moves: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> World {
        let grid = Grid::from_rows(&["#####", "#S.E#", "#.###", "#...#", "#####"])
            .expect("grid parses");
        World::new(grid)
    }

    #[test]
    fn new_world_starts_on_the_start_cell() {
        let world = corridor();

        assert_eq!(query::cursor(&world), CellCoord::new(1, 1));
        assert_eq!(query::trail(&world), &[CellCoord::new(1, 1)]);
        assert_eq!(query::move_count(&world), 0);
    }

    #[test]
    fn legal_move_updates_cursor_trail_and_counter() {
        let mut world = corridor();

        let outcome = world.step(Direction::Right);

        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                from: CellCoord::new(1, 1),
                to: CellCoord::new(2, 1),
            }
        );
        assert_eq!(query::cursor(&world), CellCoord::new(2, 1));
        assert_eq!(
            query::trail(&world),
            &[CellCoord::new(1, 1), CellCoord::new(2, 1)]
        );
        assert_eq!(query::move_count(&world), 1);
    }

    #[test]
    fn wall_move_is_absorbed() {
        let mut world = corridor();

        let outcome = world.step(Direction::Up);

        assert_eq!(
            outcome,
            MoveOutcome::Blocked {
                at: CellCoord::new(1, 1)
            }
        );
        assert_eq!(query::trail(&world).len(), 1);
        assert_eq!(query::move_count(&world), 0);
    }

    #[test]
    fn wall_queries_treat_out_of_bounds_as_walls() {
        let world = corridor();

        assert!(world.is_wall(-1, 1));
        assert!(world.is_wall(1, 99));
        assert!(world.is_wall(0, 0));
        assert!(!world.is_wall(2, 1));
    }

    #[test]
    fn end_query_matches_only_the_exit() {
        let world = corridor();

        assert!(world.is_end(3, 1));
        assert!(!world.is_end(2, 1));
        assert!(!world.is_end(-3, 1));
    }

    #[test]
    fn reset_run_restores_the_start() {
        let mut world = corridor();
        let _ = world.step(Direction::Right);
        let _ = world.step(Direction::Right);
        assert!(world.at_end());

        world.reset_run();

        assert_eq!(query::cursor(&world), CellCoord::new(1, 1));
        assert_eq!(query::trail(&world), &[CellCoord::new(1, 1)]);
        assert_eq!(query::move_count(&world), 0);
        assert!(!world.at_end());
    }
}

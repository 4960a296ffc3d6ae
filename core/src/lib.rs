#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Maze Lab sandbox.
//!
//! This crate defines the message surface that connects adapters, the
//! session controller, and the pure systems. Adapters submit [`Command`]
//! values describing desired transitions, the controller executes them via
//! its `apply` entry point, and then broadcasts [`Event`] values describing
//! what changed. Authored programs never see any of these types: they reach
//! the maze exclusively through the [`MovementApi`] capability surface.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason attached to [`RunResult::Failed`] when a program ends away from the exit.
pub const FAILED_REASON: &str = "did not reach the exit";

/// Smallest maze side length the generator accepts.
pub const MIN_MAZE_SIZE: u32 = 5;

/// Commands that express all permissible session transitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Replaces the maze with a fresh layout at the current level.
    RegenerateMaze,
    /// Moves to the next level after a winning run.
    AdvanceLevel,
    /// Clears the trail, cursor and status without touching the maze.
    ResetRun,
    /// Starts a new run of the provided program, discarding any active run.
    SubmitProgram {
        /// Program authored by the user.
        program: AuthoredProgram,
    },
    /// Advances the host clock, letting the active run resume once per move delay.
    Tick {
        /// Duration of wall-clock time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the controller after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Announces that a new maze is active.
    MazeGenerated {
        /// Level the maze was generated for.
        level: u32,
        /// Side length of the square maze.
        size: u32,
        /// Cell where every run begins.
        start: CellCoord,
        /// Cell a run must reach to win.
        end: CellCoord,
    },
    /// Confirms that a submitted program began executing.
    RunStarted {
        /// Syntax the program was authored in.
        syntax: SyntaxTag,
    },
    /// Confirms that the cursor advanced to an adjacent cell.
    CursorMoved {
        /// Cell the cursor occupied before the move.
        from: CellCoord,
        /// Cell the cursor occupies after the move.
        to: CellCoord,
        /// Number of successful moves in the run so far.
        moves: u32,
    },
    /// Reports that a move was absorbed because it pointed into a wall.
    MoveBlocked {
        /// Cell the cursor stayed on.
        at: CellCoord,
        /// Direction the program attempted.
        direction: Direction,
    },
    /// Line printed by the authored program.
    ProgramOutput {
        /// Rendered output text.
        line: String,
    },
    /// Reports the terminal classification of a run.
    RunFinished {
        /// Classification of the run.
        result: RunResult,
    },
    /// Confirms that the run state was cleared.
    RunReset,
    /// Announces that the session moved to a new level.
    LevelAdvanced {
        /// Level that became active.
        level: u32,
        /// Maze side length derived from the level.
        size: u32,
    },
    /// Reports that an advance request arrived without a winning run.
    AdvanceRejected,
}

/// Cardinal movement directions available to authored programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    Up,
    /// Movement toward increasing row indices.
    Down,
    /// Movement toward decreasing column indices.
    Left,
    /// Movement toward increasing column indices.
    Right,
}

impl Direction {
    /// All directions in the order programs usually try them.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Lower-case name used in logs and rendered output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Column and row offsets applied by a single step.
    #[must_use]
    pub const fn offset(self) -> (i64, i64) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell (the `x` seen by programs).
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell (the `y` seen by programs).
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// Neighbouring cell in the provided direction, if it does not underflow.
    #[must_use]
    pub fn neighbor(self, direction: Direction) -> Option<CellCoord> {
        let (dx, dy) = direction.offset();
        let column = i64::from(self.column) + dx;
        let row = i64::from(self.row) + dy;
        Self::from_signed(column, row)
    }

    /// Converts signed coordinates, as seen by authored programs, into a cell.
    #[must_use]
    pub fn from_signed(column: i64, row: i64) -> Option<CellCoord> {
        let column = u32::try_from(column).ok()?;
        let row = u32::try_from(row).ok()?;
        Some(Self::new(column, row))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Kind tag carried by every cell of a maze.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    /// Impassable cell.
    Wall,
    /// Open corridor cell.
    Empty,
    /// Open cell where every run begins.
    Start,
    /// Open cell a run must reach.
    End,
}

impl CellKind {
    /// Reports whether the cursor may stand on the cell.
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Wall)
    }

    /// Glyph used by the text rendering of a grid.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Wall => '#',
            Self::Empty => '.',
            Self::Start => 'S',
            Self::End => 'E',
        }
    }

    fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '#' => Some(Self::Wall),
            '.' | ' ' => Some(Self::Empty),
            'S' => Some(Self::Start),
            'E' => Some(Self::End),
            _ => None,
        }
    }
}

/// Single grid position paired with its kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Location of the cell.
    pub coord: CellCoord,
    /// Kind tag of the cell.
    pub kind: CellKind,
}

/// Reasons a grid description may be rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    /// The description contained no rows.
    #[error("grid has no rows")]
    Empty,
    /// The rows do not form a square.
    #[error("grid is not square: row {row} has {found} cells, expected {expected}")]
    NotSquare {
        /// Zero-based index of the offending row.
        row: usize,
        /// Number of cells found on that row.
        found: usize,
        /// Side length implied by the row count.
        expected: usize,
    },
    /// A glyph outside `#`, `.`, `S` and `E` was found.
    #[error("unknown cell glyph '{glyph}' at {cell}")]
    UnknownGlyph {
        /// Offending glyph.
        glyph: char,
        /// Location of the glyph.
        cell: CellCoord,
    },
    /// The number of cells does not match the declared side length.
    #[error("expected {expected} cells, found {found}")]
    CellCount {
        /// Cell count implied by the side length.
        expected: usize,
        /// Cell count provided.
        found: usize,
    },
    /// The grid does not contain exactly one start cell.
    #[error("grid must contain exactly one start cell, found {0}")]
    StartCount(usize),
    /// The grid does not contain exactly one end cell.
    #[error("grid must contain exactly one end cell, found {0}")]
    EndCount(usize),
}

/// Square maze made of [`CellKind`] values stored in row-major order.
///
/// A grid is immutable once built: exactly one start and one end cell are
/// guaranteed by construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Grid {
    size: u32,
    cells: Vec<CellKind>,
    start: CellCoord,
    end: CellCoord,
}

impl Grid {
    /// Builds a grid from row-major cell kinds, validating start and end.
    pub fn from_kinds(size: u32, cells: Vec<CellKind>) -> Result<Self, GridError> {
        let side = usize::try_from(size).unwrap_or(usize::MAX);
        let expected = side.saturating_mul(side);
        if cells.len() != expected {
            return Err(GridError::CellCount {
                expected,
                found: cells.len(),
            });
        }

        let locate = |wanted: CellKind| -> Vec<CellCoord> {
            cells
                .iter()
                .enumerate()
                .filter(|(_, kind)| **kind == wanted)
                .filter_map(|(index, _)| coord_for_index(index, side))
                .collect()
        };

        let starts = locate(CellKind::Start);
        let ends = locate(CellKind::End);
        let [start] = starts[..] else {
            return Err(GridError::StartCount(starts.len()));
        };
        let [end] = ends[..] else {
            return Err(GridError::EndCount(ends.len()));
        };

        Ok(Self {
            size,
            cells,
            start,
            end,
        })
    }

    /// Parses a grid from text rows using the glyphs of [`CellKind::glyph`].
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, GridError> {
        if rows.is_empty() {
            return Err(GridError::Empty);
        }

        let side = rows.len();
        let mut cells = Vec::with_capacity(side * side);
        for (row_index, row) in rows.iter().enumerate() {
            let glyphs: Vec<char> = row.as_ref().chars().collect();
            if glyphs.len() != side {
                return Err(GridError::NotSquare {
                    row: row_index,
                    found: glyphs.len(),
                    expected: side,
                });
            }
            for (column_index, glyph) in glyphs.into_iter().enumerate() {
                let kind = CellKind::from_glyph(glyph).ok_or_else(|| GridError::UnknownGlyph {
                    glyph,
                    cell: CellCoord::new(
                        u32::try_from(column_index).unwrap_or(u32::MAX),
                        u32::try_from(row_index).unwrap_or(u32::MAX),
                    ),
                })?;
                cells.push(kind);
            }
        }

        Self::from_kinds(u32::try_from(side).unwrap_or(u32::MAX), cells)
    }

    /// Side length of the square grid.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Cell where every run begins.
    #[must_use]
    pub const fn start(&self) -> CellCoord {
        self.start
    }

    /// Cell a run must reach to win.
    #[must_use]
    pub const fn end(&self) -> CellCoord {
        self.end
    }

    /// Kind of the provided cell, or `None` when it lies outside the grid.
    #[must_use]
    pub fn kind(&self, cell: CellCoord) -> Option<CellKind> {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied())
    }

    /// Cell at the provided coordinate, or `None` when it lies outside the grid.
    #[must_use]
    pub fn cell(&self, coord: CellCoord) -> Option<Cell> {
        self.kind(coord).map(|kind| Cell { coord, kind })
    }

    /// Reports whether the cell is a wall. Out-of-bounds cells count as walls.
    #[must_use]
    pub fn is_wall(&self, cell: CellCoord) -> bool {
        self.kind(cell).map_or(true, |kind| !kind.is_open())
    }

    /// Iterates every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let side = usize::try_from(self.size).unwrap_or(0);
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(index, kind)| {
                coord_for_index(index, side).map(|coord| Cell { coord, kind: *kind })
            })
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.size && cell.row() < self.size {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.size).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in self.cells() {
            write!(f, "{}", cell.kind.glyph())?;
            if cell.coord.column() + 1 == self.size {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

fn coord_for_index(index: usize, side: usize) -> Option<CellCoord> {
    if side == 0 {
        return None;
    }
    let column = u32::try_from(index % side).ok()?;
    let row = u32::try_from(index / side).ok()?;
    Some(CellCoord::new(column, row))
}

/// Outcome of a single move request against the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The cursor advanced to the adjacent cell.
    Moved {
        /// Cell the cursor left.
        from: CellCoord,
        /// Cell the cursor now occupies.
        to: CellCoord,
    },
    /// The move pointed into a wall or off the grid and was absorbed.
    Blocked {
        /// Cell the cursor stayed on.
        at: CellCoord,
    },
}

/// Capability surface exposed to authored programs.
///
/// This trait is the sandbox boundary: compiled programs can observe and
/// mutate the maze only through these operations.
pub trait MovementApi {
    /// Current cursor position.
    fn position(&self) -> CellCoord;

    /// Reports whether the signed coordinate is a wall or out of bounds.
    fn is_wall(&self, column: i64, row: i64) -> bool;

    /// Reports whether the signed coordinate is the exit.
    fn is_end(&self, column: i64, row: i64) -> bool;

    /// Attempts to move the cursor one cell in the provided direction.
    fn step(&mut self, direction: Direction) -> MoveOutcome;
}

/// Authoring syntaxes accepted by the sandbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyntaxTag {
    /// Indentation-delimited blocks with snake_case primitives.
    Indented,
    /// Brace-delimited blocks with camelCase awaited primitives.
    PrimitiveCall,
}

impl SyntaxTag {
    /// Stable identifier used by adapters and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Indented => "indented",
            Self::PrimitiveCall => "primitive-call",
        }
    }
}

/// Source text paired with the syntax it was written in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AuthoredProgram {
    syntax: SyntaxTag,
    source: String,
}

impl AuthoredProgram {
    /// Creates a new authored program.
    #[must_use]
    pub fn new(syntax: SyntaxTag, source: impl Into<String>) -> Self {
        Self {
            syntax,
            source: source.into(),
        }
    }

    /// Syntax the source was written in.
    #[must_use]
    pub const fn syntax(&self) -> SyntaxTag {
        self.syntax
    }

    /// Raw source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Terminal classification of a run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunResult {
    /// The program finished with the cursor on the exit.
    Win,
    /// The program finished with the cursor elsewhere.
    Failed {
        /// Human readable explanation, always [`FAILED_REASON`].
        reason: String,
    },
    /// The program raised an error; the message is surfaced verbatim.
    Errored {
        /// Error message produced while compiling or running the program.
        message: String,
    },
    /// The program exceeded its instruction budget without finishing.
    BudgetExhausted {
        /// Number of instructions executed before the run was stopped.
        executed: u64,
    },
}

impl RunResult {
    /// Creates the canonical navigation failure.
    #[must_use]
    pub fn failed() -> Self {
        Self::Failed {
            reason: FAILED_REASON.to_owned(),
        }
    }

    /// Reports whether the run reached the exit.
    #[must_use]
    pub const fn is_win(&self) -> bool {
        matches!(self, Self::Win)
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => write!(f, "win"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            Self::Errored { message } => write!(f, "error: {message}"),
            Self::BudgetExhausted { executed } => {
                write!(f, "stopped after {executed} instructions without finishing")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CellCoord, CellKind, Direction, Grid, GridError, RunResult, SyntaxTag};
    use serde::{de::DeserializeOwned, Serialize};

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
    }

    #[test]
    fn neighbor_refuses_to_underflow() {
        let origin = CellCoord::new(0, 0);
        assert_eq!(origin.neighbor(Direction::Up), None);
        assert_eq!(origin.neighbor(Direction::Left), None);
        assert_eq!(
            origin.neighbor(Direction::Right),
            Some(CellCoord::new(1, 0))
        );
        assert_eq!(origin.neighbor(Direction::Down), Some(CellCoord::new(0, 1)));
    }

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn run_result_round_trips_through_bincode() {
        assert_round_trip(&RunResult::Errored {
            message: "boom".to_owned(),
        });
        assert_round_trip(&RunResult::BudgetExhausted { executed: 12 });
    }

    #[test]
    fn syntax_tag_round_trips_through_bincode() {
        assert_round_trip(&SyntaxTag::PrimitiveCall);
    }

    #[test]
    fn grid_parses_rows_and_locates_endpoints() {
        let grid = Grid::from_rows(&["#####", "#S..#", "###.#", "#E..#", "#####"])
            .expect("grid parses");

        assert_eq!(grid.size(), 5);
        assert_eq!(grid.start(), CellCoord::new(1, 1));
        assert_eq!(grid.end(), CellCoord::new(1, 3));
        assert_eq!(grid.kind(CellCoord::new(3, 2)), Some(CellKind::Empty));
        assert!(grid.is_wall(CellCoord::new(0, 0)));
        assert!(grid.is_wall(CellCoord::new(9, 1)));
        assert_eq!(
            grid.cell(CellCoord::new(1, 3)).map(|cell| cell.kind),
            Some(CellKind::End)
        );
        assert_eq!(grid.cell(CellCoord::new(5, 0)), None);
        assert_eq!(
            grid.to_string(),
            "#####\n#S..#\n###.#\n#E..#\n#####\n"
        );
    }

    #[test]
    fn grid_rejects_duplicate_starts() {
        let error = Grid::from_rows(&["S.#", ".S#", "E.."]).expect_err("two starts");
        assert_eq!(error, GridError::StartCount(2));
    }

    #[test]
    fn grid_rejects_ragged_rows() {
        let error = Grid::from_rows(&["S..", "..", "..E"]).expect_err("ragged");
        assert_eq!(
            error,
            GridError::NotSquare {
                row: 1,
                found: 2,
                expected: 3,
            }
        );
    }
}

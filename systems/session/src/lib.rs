#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Session controller that sequences mazes, runs and level progression.
//!
//! The controller owns the world, the execution engine and the current
//! [`Session`]. Every transition arrives as a [`Command`] through
//! [`Controller::apply`], which reports what changed as [`Event`] values.
//! Active runs only advance on [`Command::Tick`], one move per elapsed move
//! delay.

use std::time::Duration;

use maze_lab_core::{Command, Event, RunResult};
use maze_lab_system_execution::{Engine, ExecutionLimits, Progress};
use maze_lab_system_maze_generation::MazeGenerator;
use maze_lab_world::World;
use tracing::debug;

/// Maze side length at level one.
pub const BASE_SIZE: u32 = 7;

/// Largest maze side length any level reaches.
pub const MAX_SIZE: u32 = 31;

/// Side length of the maze for `level`; levels below one count as one.
#[must_use]
pub fn size_for_level(level: u32) -> u32 {
    let steps = level.max(1) - 1;
    BASE_SIZE
        .saturating_add(steps.saturating_mul(2))
        .min(MAX_SIZE)
}

/// Level progress of the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Session {
    level: u32,
}

impl Session {
    /// Creates a session at `level`, clamped to at least one.
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self {
            level: level.max(1),
        }
    }

    /// Current level, starting at one.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Maze side length for the current level.
    #[must_use]
    pub fn size(&self) -> u32 {
        size_for_level(self.level)
    }

    /// Session for the following level.
    #[must_use]
    pub fn next(self) -> Self {
        Self::new(self.level.saturating_add(1))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Durable storage for the level counter.
pub trait LevelStore {
    /// Last stored level, if any.
    fn load(&self) -> Option<u32>;

    /// Persists `level`.
    fn store(&mut self, level: u32);
}

/// Level store that keeps the counter in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryLevelStore {
    level: Option<u32>,
}

impl MemoryLevelStore {
    /// Creates an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self { level: None }
    }

    /// Creates a store that already holds `level`.
    #[must_use]
    pub const fn with_level(level: u32) -> Self {
        Self { level: Some(level) }
    }
}

impl LevelStore for MemoryLevelStore {
    fn load(&self) -> Option<u32> {
        self.level
    }

    fn store(&mut self, level: u32) {
        self.level = Some(level);
    }
}

/// Parameters required to construct the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time that must elapse between two moves of an active run.
    pub move_delay: Duration,
    /// Bounds applied to every run.
    pub limits: ExecutionLimits,
    /// Seed for maze generation; `None` draws one from entropy.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            move_delay: Duration::from_millis(100),
            limits: ExecutionLimits::default(),
            seed: None,
        }
    }
}

/// Owns the world and the active run, and applies session commands.
#[derive(Debug)]
pub struct Controller<S: LevelStore> {
    session: Session,
    world: World,
    engine: Engine,
    generator: MazeGenerator,
    store: S,
    move_delay: Duration,
    accumulator: Duration,
    last_result: Option<RunResult>,
}

impl<S: LevelStore> Controller<S> {
    /// Restores the level from `store` and generates its first maze.
    #[must_use]
    pub fn new(config: SessionConfig, store: S) -> Self {
        let session = Session::new(store.load().unwrap_or(1));
        let mut generator = config
            .seed
            .map_or_else(MazeGenerator::from_entropy, MazeGenerator::from_seed);
        let grid = generator.generate(session.level(), session.size());
        debug!(
            level = session.level(),
            size = session.size(),
            seed = generator.seed(),
            "session restored"
        );

        Self {
            session,
            world: World::new(grid),
            engine: Engine::new(config.limits),
            generator,
            store,
            move_delay: config.move_delay,
            accumulator: Duration::ZERO,
            last_result: None,
        }
    }

    /// Executes the provided command and broadcasts the resulting events.
    pub fn apply(&mut self, command: Command, out: &mut Vec<Event>) {
        match command {
            Command::RegenerateMaze => self.regenerate(out),
            Command::AdvanceLevel => {
                if self.last_result.as_ref().is_some_and(RunResult::is_win) {
                    self.session = self.session.next();
                    self.store.store(self.session.level());
                    debug!(level = self.session.level(), "level advanced");
                    out.push(Event::LevelAdvanced {
                        level: self.session.level(),
                        size: self.session.size(),
                    });
                    self.regenerate(out);
                } else {
                    debug!(last_result = ?self.last_result, "advance rejected");
                    out.push(Event::AdvanceRejected);
                }
            }
            Command::ResetRun => {
                self.clear_run();
                self.world.reset_run();
                out.push(Event::RunReset);
            }
            Command::SubmitProgram { program } => {
                self.clear_run();
                let progress = self.engine.start(&program, &mut self.world);
                out.push(Event::RunStarted {
                    syntax: program.syntax(),
                });
                self.record(progress, out);
            }
            Command::Tick { dt } => self.tick(dt, out),
        }
    }

    fn regenerate(&mut self, out: &mut Vec<Event>) {
        self.clear_run();
        let grid = self
            .generator
            .generate(self.session.level(), self.session.size());
        let (start, end) = (grid.start(), grid.end());
        self.world.replace_grid(grid);
        debug!(level = self.session.level(), %start, %end, "maze generated");
        out.push(Event::MazeGenerated {
            level: self.session.level(),
            size: self.session.size(),
            start,
            end,
        });
    }

    fn clear_run(&mut self) {
        self.engine.cancel();
        self.accumulator = Duration::ZERO;
        self.last_result = None;
    }

    fn tick(&mut self, dt: Duration, out: &mut Vec<Event>) {
        if !self.engine.is_running() {
            self.accumulator = Duration::ZERO;
            return;
        }

        if self.move_delay.is_zero() {
            let progress = self.engine.resume(&mut self.world);
            self.record(progress, out);
            return;
        }

        self.accumulator = self.accumulator.saturating_add(dt);
        while self.engine.is_running() && self.accumulator >= self.move_delay {
            self.accumulator -= self.move_delay;
            let progress = self.engine.resume(&mut self.world);
            self.record(progress, out);
        }
    }

    fn record(&mut self, progress: Progress, out: &mut Vec<Event>) {
        out.extend(
            self.engine
                .take_output()
                .into_iter()
                .map(|line| Event::ProgramOutput { line }),
        );

        match progress {
            Progress::Idle | Progress::Started => {}
            Progress::Moved { from, to, moves } => {
                out.push(Event::CursorMoved { from, to, moves });
            }
            Progress::Blocked { at, direction } => {
                out.push(Event::MoveBlocked { at, direction });
            }
            Progress::Finished(result) => {
                debug!(%result, "run finished");
                self.accumulator = Duration::ZERO;
                self.last_result = Some(result.clone());
                out.push(Event::RunFinished { result });
            }
        }
    }
}

/// Query functions that provide read-only access to the controller state.
pub mod query {
    use super::{Controller, LevelStore, Session};
    use maze_lab_core::RunResult;
    use maze_lab_world::{query as world_query, World};

    /// Current level and maze size.
    #[must_use]
    pub fn session<S: LevelStore>(controller: &Controller<S>) -> Session {
        controller.session
    }

    /// World holding the active maze and run state.
    #[must_use]
    pub fn world<S: LevelStore>(controller: &Controller<S>) -> &World {
        &controller.world
    }

    /// Result of the most recent finished run since the last reset.
    #[must_use]
    pub fn last_result<S: LevelStore>(controller: &Controller<S>) -> Option<&RunResult> {
        controller.last_result.as_ref()
    }

    /// Reports whether a run is waiting for ticks.
    #[must_use]
    pub fn is_running<S: LevelStore>(controller: &Controller<S>) -> bool {
        controller.engine.is_running()
    }

    /// Number of successful moves in the active or last run.
    #[must_use]
    pub fn move_count<S: LevelStore>(controller: &Controller<S>) -> u32 {
        world_query::move_count(&controller.world)
    }

    /// Level store backing the session.
    #[must_use]
    pub fn store<S: LevelStore>(controller: &Controller<S>) -> &S {
        &controller.store
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Execution engine that runs authored programs against a world.
//!
//! Programs are compiled by the script system and interpreted by a [`Vm`]
//! that suspends after every move capability. The [`Engine`] owns at most one
//! such run per world and classifies it once the interpreter stops; the
//! session controller resumes it on a timer while [`run_program`] drives it
//! to completion synchronously.

mod error;
mod ops;
mod value;
mod vm;

use maze_lab_core::{AuthoredProgram, CellCoord, Direction, RunResult, SyntaxTag};
use maze_lab_system_script::compile_program;
use maze_lab_world::{query, World};
use tracing::{debug, info};

pub use error::RuntimeError;
pub use vm::{Step, Vm};

/// Resource bounds applied to every run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Instructions a run may execute before it is stopped.
    pub instruction_budget: u64,
    /// Deepest permitted nesting of user function calls.
    pub max_call_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            instruction_budget: 5_000_000,
            max_call_depth: 200,
        }
    }
}

/// Observable progress of the engine after a start or resume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    /// No run is active.
    Idle,
    /// A run was compiled and is ready to resume.
    Started,
    /// The cursor advanced.
    Moved {
        /// Cell the cursor left.
        from: CellCoord,
        /// Cell the cursor now occupies.
        to: CellCoord,
        /// Successful moves in the run so far.
        moves: u32,
    },
    /// A move was absorbed by a wall.
    Blocked {
        /// Cell the cursor stayed on.
        at: CellCoord,
        /// Direction that was attempted.
        direction: Direction,
    },
    /// The run ended.
    Finished(RunResult),
}

/// Drives at most one run against a world.
#[derive(Debug)]
pub struct Engine {
    limits: ExecutionLimits,
    vm: Option<Vm>,
    output: Vec<String>,
}

impl Engine {
    /// Creates an idle engine.
    #[must_use]
    pub fn new(limits: ExecutionLimits) -> Self {
        Self {
            limits,
            vm: None,
            output: Vec::new(),
        }
    }

    /// Limits applied to runs started by this engine.
    #[must_use]
    pub const fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Reports whether a run is waiting to be resumed.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.vm.is_some()
    }

    /// Resets the world's run state and compiles `program`, replacing any active run.
    ///
    /// A program that does not parse finishes immediately as errored.
    pub fn start(&mut self, program: &AuthoredProgram, world: &mut World) -> Progress {
        self.cancel();
        world.reset_run();

        match compile_program(program) {
            Ok(unit) => {
                info!(
                    syntax = program.syntax().name(),
                    instructions = unit.instructions.len(),
                    functions = unit.functions.len(),
                    "run started"
                );
                self.vm = Some(Vm::new(unit, self.limits));
                Progress::Started
            }
            Err(error) => {
                info!(syntax = program.syntax().name(), %error, "program rejected");
                Progress::Finished(RunResult::Errored {
                    message: error.to_string(),
                })
            }
        }
    }

    /// Resumes the active run until its next move or its end.
    pub fn resume(&mut self, world: &mut World) -> Progress {
        let Some(vm) = self.vm.as_mut() else {
            return Progress::Idle;
        };

        let step = vm.resume(world);
        let executed = vm.executed();
        self.output.extend(vm.take_output());
        match step {
            Step::Moved { from, to, .. } => Progress::Moved {
                from,
                to,
                moves: query::move_count(world),
            },
            Step::Blocked { at, direction } => Progress::Blocked { at, direction },
            Step::Finished => self.conclude(classify(world), executed, world),
            Step::Errored(error) => self.conclude(
                RunResult::Errored {
                    message: error.to_string(),
                },
                executed,
                world,
            ),
            Step::BudgetExhausted { executed } => {
                self.conclude(RunResult::BudgetExhausted { executed }, executed, world)
            }
        }
    }

    /// Drops the active run, if any.
    pub fn cancel(&mut self) {
        if self.vm.take().is_some() {
            debug!("active run discarded");
        }
    }

    /// Drains lines printed by the program since the previous call.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    fn conclude(&mut self, result: RunResult, executed: u64, world: &World) -> Progress {
        self.vm = None;
        info!(
            %result,
            executed,
            moves = query::move_count(world),
            "run finished"
        );
        Progress::Finished(result)
    }
}

/// Classifies a program that ran to completion by where the cursor stopped.
#[must_use]
pub fn classify(world: &World) -> RunResult {
    if world.at_end() {
        RunResult::Win
    } else {
        RunResult::failed()
    }
}

/// Result of a synchronous run together with everything it printed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    /// Classification of the run.
    pub result: RunResult,
    /// Lines printed by the program, in order.
    pub output: Vec<String>,
}

/// Compiles and runs a program to completion without any move delay.
///
/// The world's run state is reset first; afterwards its trail and move
/// counter describe the run.
pub fn run_program(
    source: &str,
    syntax: SyntaxTag,
    world: &mut World,
    limits: &ExecutionLimits,
) -> RunOutcome {
    let mut engine = Engine::new(*limits);
    let program = AuthoredProgram::new(syntax, source);

    let mut progress = engine.start(&program, world);
    let result = loop {
        match progress {
            Progress::Finished(result) => break result,
            Progress::Idle => break classify(world),
            Progress::Started | Progress::Moved { .. } | Progress::Blocked { .. } => {
                progress = engine.resume(world);
            }
        }
    };

    RunOutcome {
        result,
        output: engine.take_output(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maze_lab_core::Grid;

    fn world() -> World {
        World::new(Grid::from_rows(&["#####", "#S..#", "###.#", "#E..#", "#####"]).expect("grid"))
    }

    const SOLUTION: &str = "\
move_right()
move_right()
move_down()
move_down()
move_left()
move_left()
";

    #[test]
    fn start_resets_the_previous_run() {
        let mut world = world();
        let _ = run_program("move_right()\n", SyntaxTag::Indented, &mut world, &ExecutionLimits::default());
        assert_eq!(query::move_count(&world), 1);

        let mut engine = Engine::new(ExecutionLimits::default());
        let program = AuthoredProgram::new(SyntaxTag::Indented, SOLUTION);
        assert_eq!(engine.start(&program, &mut world), Progress::Started);
        assert_eq!(query::move_count(&world), 0);
        assert!(engine.is_running());
    }

    #[test]
    fn resume_reports_each_move_then_the_result() {
        let mut world = world();
        let mut engine = Engine::new(ExecutionLimits::default());
        let _ = engine.start(&AuthoredProgram::new(SyntaxTag::Indented, SOLUTION), &mut world);

        let mut moves = Vec::new();
        let result = loop {
            match engine.resume(&mut world) {
                Progress::Moved { moves: count, .. } => moves.push(count),
                Progress::Finished(result) => break result,
                other => panic!("unexpected progress {other:?}"),
            }
        };

        assert_eq!(moves, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(result, RunResult::Win);
        assert!(!engine.is_running());
        assert_eq!(engine.resume(&mut world), Progress::Idle);
    }

    #[test]
    fn cancel_discards_the_run() {
        let mut world = world();
        let mut engine = Engine::new(ExecutionLimits::default());
        let _ = engine.start(&AuthoredProgram::new(SyntaxTag::Indented, SOLUTION), &mut world);

        engine.cancel();

        assert!(!engine.is_running());
        assert_eq!(engine.resume(&mut world), Progress::Idle);
    }

    #[test]
    fn syntax_errors_finish_without_running() {
        let mut world = world();
        let mut engine = Engine::new(ExecutionLimits::default());
        let progress =
            engine.start(&AuthoredProgram::new(SyntaxTag::PrimitiveCall, "let = 1;"), &mut world);

        let Progress::Finished(RunResult::Errored { message }) = progress else {
            panic!("expected an errored run, got {progress:?}");
        };
        assert!(message.starts_with("SyntaxError: line 1, column 5"), "{message}");
        assert!(!engine.is_running());
    }
}

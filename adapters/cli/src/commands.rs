//! Subcommand implementations.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::thread;

use anyhow::{Context, Result};
use maze_lab_core::{AuthoredProgram, CellKind, Command, Event, Grid, RunResult, SyntaxTag};
use maze_lab_system_execution::run_program;
use maze_lab_system_maze_generation::{generate_maze, MazeGenerator};
use maze_lab_system_script::normalize;
use maze_lab_system_session::{query as session_query, Controller};
use maze_lab_world::{query, World};
use tracing::{debug, info, trace};

use crate::config::LabConfig;
use crate::level_store::FileLevelStore;

const TRAIL_GLYPH: char = '*';

/// Prints a freshly generated maze.
pub(crate) fn generate(config: &LabConfig, size: u32, seed: Option<u64>) -> ExitCode {
    print!("{}", fresh_grid(size, seed.or(config.seed)));
    ExitCode::SUCCESS
}

/// Runs a program once on a fresh maze and prints its outcome.
pub(crate) fn run(
    config: &LabConfig,
    file: &Path,
    syntax: Option<SyntaxTag>,
    size: u32,
    seed: Option<u64>,
) -> Result<ExitCode> {
    let source = read_source(file)?;
    let syntax = syntax.unwrap_or_else(|| infer_syntax(file));
    let mut world = World::new(fresh_grid(size, seed.or(config.seed)));
    debug!(file = %file.display(), syntax = syntax.name(), size, "running program");

    let outcome = run_program(&source, syntax, &mut world, &config.limits());

    for line in &outcome.output {
        println!("{line}");
    }
    print!("{}", render_trail(&world));
    let trail: Vec<String> = query::trail(&world)
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("trail: {}", trail.join(" -> "));
    println!("moves: {}", query::move_count(&world));
    println!("result: {}", outcome.result);
    Ok(exit_code(&outcome.result))
}

/// Prints the primitive-call translation of an indented program.
pub(crate) fn normalize_file(file: &Path) -> Result<ExitCode> {
    let source = read_source(file)?;
    let translated =
        normalize(&source).with_context(|| format!("normalize {}", file.display()))?;
    print!("{translated}");
    Ok(ExitCode::SUCCESS)
}

/// Plays up to `levels` levels with one program, stopping at the first loss.
pub(crate) fn play(
    config: &LabConfig,
    file: &Path,
    syntax: Option<SyntaxTag>,
    levels: u32,
    realtime: bool,
) -> Result<ExitCode> {
    let source = read_source(file)?;
    let syntax = syntax.unwrap_or_else(|| infer_syntax(file));
    let program = AuthoredProgram::new(syntax, source);
    let session_config = config.session();
    let delay = session_config.move_delay;

    let store = FileLevelStore::new(config.level_file.clone());
    let mut controller = Controller::new(session_config, store);
    let mut events = Vec::new();

    for _ in 0..levels {
        let session = session_query::session(&controller);
        println!(
            "level {} ({size}x{size})",
            session.level(),
            size = session.size()
        );

        controller.apply(
            Command::SubmitProgram {
                program: program.clone(),
            },
            &mut events,
        );
        let result = loop {
            if let Some(result) = report(&mut events) {
                break result;
            }
            if realtime {
                thread::sleep(delay);
            }
            controller.apply(Command::Tick { dt: delay }, &mut events);
        };

        println!(
            "  moves: {}  result: {result}",
            session_query::move_count(&controller)
        );
        if !result.is_win() {
            return Ok(exit_code(&result));
        }

        controller.apply(Command::AdvanceLevel, &mut events);
        let _ = report(&mut events);
    }

    info!(
        level = session_query::session(&controller).level(),
        "session paused"
    );
    Ok(ExitCode::SUCCESS)
}

/// Prints and drains pending events, returning the result of a finished run.
fn report(events: &mut Vec<Event>) -> Option<RunResult> {
    let mut finished = None;
    for event in events.drain(..) {
        match event {
            Event::ProgramOutput { line } => println!("  | {line}"),
            Event::LevelAdvanced { level, size } => {
                println!("advanced to level {level} ({size}x{size})");
            }
            Event::RunFinished { result } => finished = Some(result),
            other => trace!(event = ?other, "session event"),
        }
    }
    finished
}

fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("read {}", file.display()))
}

fn infer_syntax(file: &Path) -> SyntaxTag {
    match file.extension().and_then(|extension| extension.to_str()) {
        Some("js" | "mjs") => SyntaxTag::PrimitiveCall,
        _ => SyntaxTag::Indented,
    }
}

fn fresh_grid(size: u32, seed: Option<u64>) -> Grid {
    match seed {
        Some(seed) => MazeGenerator::from_seed(seed).generate(1, size),
        None => generate_maze(size),
    }
}

fn exit_code(result: &RunResult) -> ExitCode {
    if result.is_win() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Renders the maze with visited open cells marked.
fn render_trail(world: &World) -> String {
    let grid = query::grid(world);
    let visited: HashSet<_> = query::trail(world).iter().copied().collect();
    let mut out = String::new();
    for cell in grid.cells() {
        let glyph = if cell.kind == CellKind::Empty && visited.contains(&cell.coord) {
            TRAIL_GLYPH
        } else {
            cell.kind.glyph()
        };
        out.push(glyph);
        if cell.coord.column() + 1 == grid.size() {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use maze_lab_core::MovementApi;
    use maze_lab_core::Direction;

    #[test]
    fn syntax_follows_the_file_extension() {
        assert_eq!(infer_syntax(Path::new("solver.js")), SyntaxTag::PrimitiveCall);
        assert_eq!(infer_syntax(Path::new("solver.py")), SyntaxTag::Indented);
        assert_eq!(infer_syntax(Path::new("solver")), SyntaxTag::Indented);
    }

    #[test]
    fn trail_marks_visited_corridor_cells() {
        let grid = Grid::from_rows(&["#####", "#S..#", "###.#", "#E..#", "#####"]).expect("grid");
        let mut world = World::new(grid);
        let _ = world.step(Direction::Right);
        let _ = world.step(Direction::Right);

        assert_eq!(
            render_trail(&world),
            "#####\n#S**#\n###.#\n#E..#\n#####\n"
        );
    }

    #[test]
    fn seeded_grids_repeat() {
        assert_eq!(fresh_grid(9, Some(3)), fresh_grid(9, Some(3)));
    }
}

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use maze_lab_core::{CellCoord, RunResult, SyntaxTag};
use maze_lab_system_execution::{run_program, ExecutionLimits};
use maze_lab_system_maze_generation::MazeGenerator;
use maze_lab_system_script::templates::Template;
use maze_lab_world::{query, World};

#[test]
fn deterministic_replay_produces_identical_runs() {
    let first = replay(0x5eed);
    let second = replay(0x5eed);

    assert_eq!(first, second, "replay diverged between runs");
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert!(first.runs.iter().all(|run| run.result == RunResult::Win));

    let other = replay(0x5eed + 1);
    assert_ne!(
        first.fingerprint(),
        other.fingerprint(),
        "different seeds should produce different mazes"
    );
}

fn replay(seed: u64) -> ReplayOutcome {
    let mut generator = MazeGenerator::from_seed(seed);
    let mut runs = Vec::new();

    for level in 1..=4 {
        let size = 5 + 2 * level;
        let mut world = World::new(generator.generate(level, size));
        for template in Template::ALL {
            for syntax in [SyntaxTag::Indented, SyntaxTag::PrimitiveCall] {
                let outcome = run_program(
                    template.source(syntax),
                    syntax,
                    &mut world,
                    &ExecutionLimits::default(),
                );
                runs.push(RunRecord {
                    template: template.name(),
                    result: outcome.result,
                    trail: query::trail(&world).to_vec(),
                    output: outcome.output,
                });
            }
        }
    }

    ReplayOutcome { runs }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ReplayOutcome {
    runs: Vec<RunRecord>,
}

impl ReplayOutcome {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct RunRecord {
    template: &'static str,
    result: RunResult,
    trail: Vec<CellCoord>,
    output: Vec<String>,
}

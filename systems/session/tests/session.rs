use std::time::Duration;

use maze_lab_core::{AuthoredProgram, Command, Event, RunResult, SyntaxTag};
use maze_lab_system_session::{
    query, Controller, LevelStore, MemoryLevelStore, SessionConfig,
};
use maze_lab_system_script::templates::Template;
use maze_lab_world::query as world_query;

const DELAY: Duration = Duration::from_millis(100);

fn config(seed: u64) -> SessionConfig {
    SessionConfig {
        move_delay: DELAY,
        seed: Some(seed),
        ..SessionConfig::default()
    }
}

fn controller(store: MemoryLevelStore) -> Controller<MemoryLevelStore> {
    Controller::new(config(11), store)
}

fn apply(controller: &mut Controller<MemoryLevelStore>, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    controller.apply(command, &mut events);
    events
}

fn submit(controller: &mut Controller<MemoryLevelStore>, program: AuthoredProgram) -> Vec<Event> {
    apply(controller, Command::SubmitProgram { program })
}

fn tick(controller: &mut Controller<MemoryLevelStore>, dt: Duration) -> Vec<Event> {
    apply(controller, Command::Tick { dt })
}

fn is_step(event: &Event) -> bool {
    matches!(event, Event::CursorMoved { .. } | Event::MoveBlocked { .. })
}

fn run_to_completion(controller: &mut Controller<MemoryLevelStore>) -> RunResult {
    for _ in 0..100_000 {
        for event in tick(controller, DELAY) {
            if let Event::RunFinished { result } = event {
                return result;
            }
        }
    }
    panic!("run did not finish");
}

#[test]
fn level_is_restored_from_the_store() {
    let controller = controller(MemoryLevelStore::with_level(3));

    assert_eq!(query::session(&controller).level(), 3);
    assert_eq!(query::session(&controller).size(), 11);
    assert_eq!(world_query::grid(query::world(&controller)).size(), 11);
}

#[test]
fn ticks_release_one_step_per_elapsed_delay() {
    let mut controller = controller(MemoryLevelStore::new());
    let program = AuthoredProgram::new(
        SyntaxTag::Indented,
        "print('go')\nmove_right()\nmove_left()\nmove_down()\n",
    );

    let events = submit(&mut controller, program);
    assert_eq!(
        events,
        vec![Event::RunStarted {
            syntax: SyntaxTag::Indented
        }]
    );
    assert!(query::is_running(&controller));

    assert!(tick(&mut controller, Duration::from_millis(50)).is_empty());

    let events = tick(&mut controller, Duration::from_millis(50));
    assert_eq!(
        events[0],
        Event::ProgramOutput {
            line: "go".to_owned()
        }
    );
    assert_eq!(events.iter().filter(|event| is_step(event)).count(), 1);

    let events = tick(&mut controller, Duration::from_millis(250));
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(is_step));

    let events = tick(&mut controller, Duration::from_millis(50));
    assert!(matches!(events.as_slice(), [Event::RunFinished { .. }]));
    assert!(!query::is_running(&controller));
    assert!(tick(&mut controller, DELAY).is_empty());
}

#[test]
fn advance_is_rejected_without_a_win() {
    let mut controller = controller(MemoryLevelStore::new());
    assert_eq!(
        apply(&mut controller, Command::AdvanceLevel),
        vec![Event::AdvanceRejected]
    );

    let _ = submit(
        &mut controller,
        AuthoredProgram::new(SyntaxTag::Indented, "move_up()\n"),
    );
    assert_eq!(run_to_completion(&mut controller), RunResult::failed());
    assert_eq!(
        apply(&mut controller, Command::AdvanceLevel),
        vec![Event::AdvanceRejected]
    );
    assert_eq!(query::session(&controller).level(), 1);
    assert_eq!(query::store(&controller).load(), None);
}

#[test]
fn winning_unlocks_the_next_level() {
    let mut controller = controller(MemoryLevelStore::new());
    let _ = submit(&mut controller, Template::BreadthFirst.program(SyntaxTag::PrimitiveCall));

    assert_eq!(run_to_completion(&mut controller), RunResult::Win);
    assert_eq!(query::last_result(&controller), Some(&RunResult::Win));

    let events = apply(&mut controller, Command::AdvanceLevel);
    assert_eq!(events[0], Event::LevelAdvanced { level: 2, size: 9 });
    assert!(matches!(
        events[1],
        Event::MazeGenerated {
            level: 2,
            size: 9,
            ..
        }
    ));
    assert_eq!(query::store(&controller).load(), Some(2));
    assert_eq!(query::move_count(&controller), 0);
    assert_eq!(query::last_result(&controller), None);

    assert_eq!(
        apply(&mut controller, Command::AdvanceLevel),
        vec![Event::AdvanceRejected]
    );
}

#[test]
fn reset_clears_the_run_but_keeps_the_maze() {
    let mut controller = controller(MemoryLevelStore::new());
    let before = world_query::grid(query::world(&controller)).clone();
    let _ = submit(&mut controller, Template::WallFollower.program(SyntaxTag::Indented));
    let _ = tick(&mut controller, DELAY * 3);

    assert_eq!(apply(&mut controller, Command::ResetRun), vec![Event::RunReset]);

    let world = query::world(&controller);
    assert!(!query::is_running(&controller));
    assert_eq!(world_query::grid(world), &before);
    assert_eq!(world_query::trail(world), &[before.start()]);
    assert!(tick(&mut controller, DELAY).is_empty());
}

#[test]
fn regenerate_keeps_the_level_and_drops_the_run() {
    let mut controller = controller(MemoryLevelStore::with_level(2));
    let _ = submit(&mut controller, Template::BreadthFirst.program(SyntaxTag::Indented));

    let events = apply(&mut controller, Command::RegenerateMaze);

    assert!(matches!(
        events.as_slice(),
        [Event::MazeGenerated {
            level: 2,
            size: 9,
            ..
        }]
    ));
    assert!(!query::is_running(&controller));
}

#[test]
fn syntax_errors_finish_the_run_immediately() {
    let mut controller = controller(MemoryLevelStore::new());
    let events = submit(
        &mut controller,
        AuthoredProgram::new(SyntaxTag::PrimitiveCall, "await moveUp()"),
    );

    assert_eq!(events.len(), 2);
    let Event::RunFinished {
        result: RunResult::Errored { message },
    } = &events[1]
    else {
        panic!("expected an errored run, got {events:?}");
    };
    assert!(message.starts_with("SyntaxError: line 1"), "{message}");
}

#[test]
fn equal_seeds_generate_equal_sessions() {
    let mut first = controller(MemoryLevelStore::new());
    let mut second = controller(MemoryLevelStore::new());

    for _ in 0..3 {
        assert_eq!(
            apply(&mut first, Command::RegenerateMaze),
            apply(&mut second, Command::RegenerateMaze)
        );
    }
}

use std::collections::{HashSet, VecDeque};

use maze_lab_core::{CellCoord, CellKind, Direction, Grid};
use maze_lab_system_maze_generation::{generate_maze, MazeGenerator};

fn reachable_from_start(grid: &Grid) -> HashSet<CellCoord> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    let _ = seen.insert(grid.start());
    queue.push_back(grid.start());

    while let Some(cell) = queue.pop_front() {
        for direction in Direction::ALL {
            let Some(next) = cell.neighbor(direction) else {
                continue;
            };
            if grid.is_wall(next) || !seen.insert(next) {
                continue;
            }
            queue.push_back(next);
        }
    }

    seen
}

#[test]
fn every_size_has_one_start_one_end_and_is_connected() {
    for size in 5..=31 {
        for _ in 0..10 {
            let grid = generate_maze(size);
            let starts = grid.cells().filter(|cell| cell.kind == CellKind::Start).count();
            let ends = grid.cells().filter(|cell| cell.kind == CellKind::End).count();
            assert_eq!(starts, 1, "size {size} start count");
            assert_eq!(ends, 1, "size {size} end count");

            let reachable = reachable_from_start(&grid);
            assert!(
                reachable.contains(&grid.end()),
                "size {size}: end unreachable in\n{grid}"
            );
            for cell in grid.cells().filter(|cell| cell.kind.is_open()) {
                assert!(
                    reachable.contains(&cell.coord),
                    "size {size}: open cell {} unreachable in\n{grid}",
                    cell.coord
                );
            }
        }
    }
}

#[test]
fn repeated_generation_varies_layouts() {
    let layouts: HashSet<Grid> = (0..20).map(|_| generate_maze(15)).collect();
    assert!(
        layouts.len() > 1,
        "twenty 15x15 mazes should not all share one layout"
    );
}

#[test]
fn seeded_generator_replays_identically() {
    let mut first = MazeGenerator::from_seed(0x5eed);
    let mut second = MazeGenerator::from_seed(0x5eed);

    for level in 1..=4 {
        assert_eq!(first.generate(level, 11), second.generate(level, 11));
    }
}

#[test]
fn seeded_generator_regenerates_new_layouts_for_the_same_level() {
    let mut generator = MazeGenerator::from_seed(99);
    let layouts: HashSet<Grid> = (0..8).map(|_| generator.generate(3, 13)).collect();
    assert!(layouts.len() > 1);
}

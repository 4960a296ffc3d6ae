//! Reference navigation programs shipped in both syntaxes.
//!
//! Each template exists as an indentation-syntax original and a hand-written
//! primitive-call counterpart that explores neighbours in the same order, so
//! both produce the same trail on any maze.

use maze_lab_core::{AuthoredProgram, SyntaxTag};

/// Shipped reference programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Template {
    /// Breadth-first search for the shortest route, then replay it.
    BreadthFirst,
    /// Right-hand wall follower.
    WallFollower,
}

impl Template {
    /// Every template in a stable order.
    pub const ALL: [Template; 2] = [Template::BreadthFirst, Template::WallFollower];

    /// Short identifier used by the CLI.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BreadthFirst => "bfs",
            Self::WallFollower => "wall-follower",
        }
    }

    /// Looks a template up by its identifier.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|template| template.name() == name)
    }

    /// Source text in the requested syntax.
    #[must_use]
    pub const fn source(self, syntax: SyntaxTag) -> &'static str {
        match (self, syntax) {
            (Self::BreadthFirst, SyntaxTag::Indented) => BREADTH_FIRST_INDENTED,
            (Self::BreadthFirst, SyntaxTag::PrimitiveCall) => BREADTH_FIRST_PRIMITIVE,
            (Self::WallFollower, SyntaxTag::Indented) => WALL_FOLLOWER_INDENTED,
            (Self::WallFollower, SyntaxTag::PrimitiveCall) => WALL_FOLLOWER_PRIMITIVE,
        }
    }

    /// Template packaged as an authored program.
    #[must_use]
    pub fn program(self, syntax: SyntaxTag) -> AuthoredProgram {
        AuthoredProgram::new(syntax, self.source(syntax))
    }
}

const BREADTH_FIRST_INDENTED: &str = r#"# Breadth-first search over open cells, then replay the shortest route.
def neighbours(x, y):
    found = []
    for dx, dy, name in [(0, -1, "up"), (0, 1, "down"), (-1, 0, "left"), (1, 0, "right")]:
        nx = x + dx
        ny = y + dy
        if not is_wall(nx, ny):
            found.append([nx, ny, name])
    return found

def find_route():
    pos = get_position()
    start = (pos["x"], pos["y"])
    queue = [start]
    came_from = {start: None}
    while len(queue) > 0:
        current = queue.pop(0)
        if is_end(current[0], current[1]):
            return walk_back(came_from, current)
        for nx, ny, name in neighbours(current[0], current[1]):
            step = (nx, ny)
            if step not in came_from:
                came_from[step] = [current, name]
                queue.append(step)
    return []

def walk_back(came_from, cell):
    route = []
    while came_from[cell] is not None:
        link = came_from[cell]
        route.insert(0, link[1])
        cell = link[0]
    return route

def follow(route):
    for name in route:
        if name == "up":
            move_up()
        elif name == "down":
            move_down()
        elif name == "left":
            move_left()
        else:
            move_right()

follow(find_route())
"#;

const BREADTH_FIRST_PRIMITIVE: &str = r#"// Breadth-first search over open cells, then replay the shortest route.
function neighbours(x, y) {
  const found = [];
  for (const [dx, dy, name] of [[0, -1, "up"], [0, 1, "down"], [-1, 0, "left"], [1, 0, "right"]]) {
    const nx = x + dx;
    const ny = y + dy;
    if (!isWall(nx, ny)) {
      found.push([nx, ny, name]);
    }
  }
  return found;
}

function findRoute() {
  const pos = getPosition();
  const start = [pos.x, pos.y];
  const queue = [start];
  const cameFrom = new Map([[start, null]]);
  while (queue.length > 0) {
    const current = queue.shift();
    if (isEnd(current[0], current[1])) {
      return walkBack(cameFrom, current);
    }
    for (const [nx, ny, name] of neighbours(current[0], current[1])) {
      const step = [nx, ny];
      if (!cameFrom.has(step)) {
        cameFrom.set(step, [current, name]);
        queue.push(step);
      }
    }
  }
  return [];
}

function walkBack(cameFrom, cell) {
  const route = [];
  while (cameFrom.get(cell) !== null) {
    const link = cameFrom.get(cell);
    route.unshift(link[1]);
    cell = link[0];
  }
  return route;
}

function follow(route) {
  for (const name of route) {
    if (name === "up") {
      await moveUp();
    } else if (name === "down") {
      await moveDown();
    } else if (name === "left") {
      await moveLeft();
    } else {
      await moveRight();
    }
  }
}

follow(findRoute());
"#;

const WALL_FOLLOWER_INDENTED: &str = r#"# Right-hand wall follower: keep a wall on the right until the exit.
HEADINGS = [(0, -1), (1, 0), (0, 1), (-1, 0)]

def step(heading):
    if heading == 0:
        move_up()
    elif heading == 1:
        move_right()
    elif heading == 2:
        move_down()
    else:
        move_left()

def open_towards(x, y, heading):
    offset = HEADINGS[heading]
    return not is_wall(x + offset[0], y + offset[1])

heading = 1
pos = get_position()
while not is_end(pos["x"], pos["y"]):
    for turn in [1, 0, 3, 2]:
        candidate = (heading + turn) % 4
        if open_towards(pos["x"], pos["y"], candidate):
            heading = candidate
            step(heading)
            break
    pos = get_position()
"#;

const WALL_FOLLOWER_PRIMITIVE: &str = r#"// Right-hand wall follower: keep a wall on the right until the exit.
const HEADINGS = [[0, -1], [1, 0], [0, 1], [-1, 0]];

function step(heading) {
  if (heading === 0) {
    await moveUp();
  } else if (heading === 1) {
    await moveRight();
  } else if (heading === 2) {
    await moveDown();
  } else {
    await moveLeft();
  }
}

function openTowards(x, y, heading) {
  const offset = HEADINGS[heading];
  return !isWall(x + offset[0], y + offset[1]);
}

let heading = 1;
let pos = getPosition();
while (!isEnd(pos.x, pos.y)) {
  for (const turn of [1, 0, 3, 2]) {
    const candidate = (heading + turn) % 4;
    if (openTowards(pos.x, pos.y, candidate)) {
      heading = candidate;
      step(heading);
      break;
    }
  }
  pos = getPosition();
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_parses_in_both_syntaxes() {
        for template in Template::ALL {
            for syntax in [SyntaxTag::Indented, SyntaxTag::PrimitiveCall] {
                let parsed = crate::parse(syntax, template.source(syntax));
                assert!(
                    parsed.is_ok(),
                    "{} ({}) failed: {:?}",
                    template.name(),
                    syntax.name(),
                    parsed.err()
                );
            }
        }
    }

    #[test]
    fn names_round_trip() {
        for template in Template::ALL {
            assert_eq!(Template::from_name(template.name()), Some(template));
        }
        assert_eq!(Template::from_name("dijkstra"), None);
    }
}

//! Stack machine that runs a [`CompiledUnit`] one move at a time.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use maze_lab_core::{CellCoord, Direction, MoveOutcome, MovementApi};
use maze_lab_system_script::ast::{Builtin, Capability};
use maze_lab_system_script::{CompiledUnit, Instruction};
use tracing::{trace, warn};

use crate::error::RuntimeError;
use crate::ops;
use crate::value::{Key, Value};
use crate::ExecutionLimits;

/// Result of resuming the interpreter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// A move capability advanced the cursor; the program is suspended.
    Moved {
        /// Cell the cursor left.
        from: CellCoord,
        /// Cell the cursor now occupies.
        to: CellCoord,
        /// Direction of the move.
        direction: Direction,
    },
    /// A move capability hit a wall; the program is suspended.
    Blocked {
        /// Cell the cursor stayed on.
        at: CellCoord,
        /// Direction that was attempted.
        direction: Direction,
    },
    /// The program ran to completion.
    Finished,
    /// The program raised an error.
    Errored(RuntimeError),
    /// The instruction budget ran out.
    BudgetExhausted {
        /// Instructions executed before stopping.
        executed: u64,
    },
}

impl Step {
    /// Reports whether the program can no longer be resumed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Moved { .. } | Self::Blocked { .. })
    }
}

#[derive(Debug)]
struct Binding {
    value: Value,
    constant: bool,
}

#[derive(Debug)]
struct Frame {
    return_ip: usize,
    stack_base: usize,
    locals: HashMap<String, Binding>,
    iterators: Vec<std::vec::IntoIter<Value>>,
}

impl Frame {
    fn new(return_ip: usize, stack_base: usize) -> Self {
        Self {
            return_ip,
            stack_base,
            locals: HashMap::new(),
            iterators: Vec::new(),
        }
    }
}

/// Interpreter state for one run.
///
/// The first frame holds top-level bindings; every user function call pushes
/// another. Execution only ever suspends inside a move capability.
#[derive(Debug)]
pub struct Vm {
    unit: Rc<CompiledUnit>,
    ip: usize,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    executed: u64,
    limits: ExecutionLimits,
    output: Vec<String>,
    terminal: Option<Step>,
}

impl Vm {
    /// Prepares a run of `unit` starting at its first instruction.
    #[must_use]
    pub fn new(unit: CompiledUnit, limits: ExecutionLimits) -> Self {
        Self {
            unit: Rc::new(unit),
            ip: 0,
            stack: Vec::new(),
            frames: vec![Frame::new(0, 0)],
            executed: 0,
            limits,
            output: Vec::new(),
            terminal: None,
        }
    }

    /// Number of instructions executed so far.
    #[must_use]
    pub const fn executed(&self) -> u64 {
        self.executed
    }

    /// Drains the lines printed since the previous call.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Runs until one move is performed or the program stops.
    ///
    /// Once a terminal step has been returned, later calls return it again
    /// without executing anything.
    pub fn resume(&mut self, api: &mut dyn MovementApi) -> Step {
        if let Some(step) = &self.terminal {
            return step.clone();
        }

        loop {
            if self.executed >= self.limits.instruction_budget {
                warn!(executed = self.executed, "instruction budget exhausted");
                return self.finish(Step::BudgetExhausted {
                    executed: self.executed,
                });
            }
            self.executed += 1;

            match self.execute(api) {
                Ok(None) => {}
                Ok(Some(step)) if step.is_terminal() => return self.finish(step),
                Ok(Some(step)) => return step,
                Err(error) => return self.finish(Step::Errored(error)),
            }
        }
    }

    fn finish(&mut self, step: Step) -> Step {
        self.stack.clear();
        self.frames.truncate(1);
        self.terminal = Some(step.clone());
        step
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        let split = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.stack.split_off(split))
    }

    fn peek(&self) -> Result<&Value, RuntimeError> {
        self.stack.last().ok_or(RuntimeError::StackUnderflow)
    }

    fn frame_mut(&mut self) -> Result<&mut Frame, RuntimeError> {
        self.frames.last_mut().ok_or(RuntimeError::StackUnderflow)
    }

    fn load(&self, name: &str) -> Result<Value, RuntimeError> {
        let local = self.frames.last().and_then(|frame| frame.locals.get(name));
        let global = || self.frames.first().and_then(|frame| frame.locals.get(name));
        local
            .or_else(global)
            .map(|binding| binding.value.clone())
            .ok_or_else(|| RuntimeError::Undefined(name.to_owned()))
    }

    fn store(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let in_frame = self
            .frames
            .last()
            .is_some_and(|frame| frame.locals.contains_key(name));
        let frame = if in_frame {
            self.frames.last_mut()
        } else {
            self.frames.first_mut()
        };
        let binding = frame
            .and_then(|frame| frame.locals.get_mut(name))
            .ok_or_else(|| RuntimeError::Undeclared(name.to_owned()))?;
        if binding.constant {
            return Err(RuntimeError::ConstantAssignment(name.to_owned()));
        }
        binding.value = value;
        Ok(())
    }

    fn execute(&mut self, api: &mut dyn MovementApi) -> Result<Option<Step>, RuntimeError> {
        let unit = Rc::clone(&self.unit);
        let Some(instruction) = unit.instructions.get(self.ip) else {
            return Ok(Some(Step::Finished));
        };
        self.ip += 1;

        match instruction {
            Instruction::Push(literal) => self.stack.push(Value::from_literal(literal)),
            Instruction::Load(name) => {
                let value = self.load(name)?;
                self.stack.push(value);
            }
            Instruction::Declare { name, constant } => {
                let value = self.pop()?;
                let binding = Binding {
                    value,
                    constant: *constant,
                };
                let _ = self.frame_mut()?.locals.insert(name.clone(), binding);
            }
            Instruction::Store(name) => {
                let value = self.pop()?;
                self.store(name, value)?;
            }
            Instruction::Unpack(count) => {
                let value = self.pop()?;
                let items = value.elements()?;
                if items.len() != *count {
                    return Err(RuntimeError::Unpack {
                        expected: *count,
                        found: items.len(),
                    });
                }
                self.stack.extend(items.into_iter().rev());
            }
            Instruction::LoadIndex => {
                let index = self.pop()?;
                let object = self.pop()?;
                self.stack.push(ops::load_index(&object, &index)?);
            }
            Instruction::StoreIndex => {
                let value = self.pop()?;
                let index = self.pop()?;
                let object = self.pop()?;
                ops::store_index(&object, &index, value)?;
            }
            Instruction::DuplicatePair => {
                let top = self.stack.len();
                if top < 2 {
                    return Err(RuntimeError::StackUnderflow);
                }
                self.stack.extend_from_within(top - 2..);
            }
            Instruction::LoadAttribute(name) => {
                let object = self.pop()?;
                self.stack.push(ops::load_attribute(&object, name)?);
            }
            Instruction::Unary(op) => {
                let operand = self.pop()?;
                self.stack.push(ops::unary(*op, &operand)?);
            }
            Instruction::Binary(op) => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.stack.push(ops::binary(*op, &lhs, &rhs)?);
            }
            Instruction::Jump(target) => self.ip = *target,
            Instruction::JumpIfFalse(target) => {
                if !self.pop()?.truthy() {
                    self.ip = *target;
                }
            }
            Instruction::JumpIfFalseElsePop(target) => {
                if self.peek()?.truthy() {
                    let _ = self.pop()?;
                } else {
                    self.ip = *target;
                }
            }
            Instruction::JumpIfTrueElsePop(target) => {
                if self.peek()?.truthy() {
                    self.ip = *target;
                } else {
                    let _ = self.pop()?;
                }
            }
            Instruction::BuildList(count) => {
                let items = self.pop_n(*count)?;
                self.stack.push(Value::list(items));
            }
            Instruction::BuildSet => {
                let source = self.pop()?;
                self.stack.push(ops::build_set(&source)?);
            }
            Instruction::BuildMap => {
                let source = self.pop()?;
                self.stack.push(ops::build_map(&source)?);
            }
            Instruction::IterStart => {
                let items = self.pop()?.elements()?;
                self.frame_mut()?.iterators.push(items.into_iter());
            }
            Instruction::IterNext(exit) => {
                let frame = self.frame_mut()?;
                let next = frame
                    .iterators
                    .last_mut()
                    .ok_or(RuntimeError::StackUnderflow)?
                    .next();
                match next {
                    Some(item) => self.stack.push(item),
                    None => {
                        let _ = frame.iterators.pop();
                        self.ip = *exit;
                    }
                }
            }
            Instruction::IterDrop => {
                let _ = self.frame_mut()?.iterators.pop();
            }
            Instruction::Call { function, argc } => self.call(&unit, *function, *argc)?,
            Instruction::CallUndefined(name) => {
                return Err(RuntimeError::Undefined(name.clone()));
            }
            Instruction::Builtin { builtin, argc } => {
                let args = self.pop_n(*argc)?;
                let result = if *builtin == Builtin::Print {
                    self.print(&args);
                    Value::Null
                } else {
                    ops::builtin(*builtin, args)?
                };
                self.stack.push(result);
            }
            Instruction::Method { method, argc } => {
                let args = self.pop_n(*argc)?;
                let receiver = self.pop()?;
                self.stack.push(ops::call_method(&receiver, method, args)?);
            }
            Instruction::Capability { capability, argc } => {
                let args = self.pop_n(*argc)?;
                return self.capability(*capability, &args, api);
            }
            Instruction::Pop => {
                let _ = self.pop()?;
            }
            Instruction::Return => {
                let value = self.pop()?;
                if self.frames.len() <= 1 {
                    return Err(RuntimeError::StackUnderflow);
                }
                let frame = self.frames.pop().ok_or(RuntimeError::StackUnderflow)?;
                self.stack.truncate(frame.stack_base);
                self.stack.push(value);
                self.ip = frame.return_ip;
            }
            Instruction::Throw => {
                let message = self.pop()?;
                return Err(RuntimeError::Raised(message.to_string()));
            }
            Instruction::Halt => return Ok(Some(Step::Finished)),
        }

        Ok(None)
    }

    fn call(
        &mut self,
        unit: &CompiledUnit,
        function: usize,
        argc: usize,
    ) -> Result<(), RuntimeError> {
        let entry = unit
            .functions
            .get(function)
            .ok_or(RuntimeError::StackUnderflow)?;
        if entry.params.len() != argc {
            return Err(RuntimeError::Arity {
                name: entry.name.clone(),
                expected: entry.params.len().to_string(),
                given: argc,
            });
        }
        if self.frames.len() > self.limits.max_call_depth {
            return Err(RuntimeError::RecursionDepth);
        }

        let args = self.pop_n(argc)?;
        let mut frame = Frame::new(self.ip, self.stack.len());
        for (param, value) in entry.params.iter().zip(args) {
            let binding = Binding {
                value,
                constant: false,
            };
            let _ = frame.locals.insert(param.clone(), binding);
        }
        self.frames.push(frame);
        self.ip = entry.entry;
        Ok(())
    }

    fn print(&mut self, args: &[Value]) {
        let line = args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        trace!(%line, "program output");
        self.output.push(line);
    }

    fn capability(
        &mut self,
        capability: Capability,
        args: &[Value],
        api: &mut dyn MovementApi,
    ) -> Result<Option<Step>, RuntimeError> {
        let name = capability.primitive_name();
        if args.len() != capability.arity() {
            return Err(RuntimeError::Arity {
                name: name.to_owned(),
                expected: capability.arity().to_string(),
                given: args.len(),
            });
        }

        if let Some(direction) = capability.direction() {
            self.stack.push(Value::Null);
            let step = match api.step(direction) {
                MoveOutcome::Moved { from, to } => Step::Moved {
                    from,
                    to,
                    direction,
                },
                MoveOutcome::Blocked { at } => Step::Blocked { at, direction },
            };
            trace!(?step, executed = self.executed, "program suspended on move");
            return Ok(Some(step));
        }

        let result = match (capability, args) {
            (Capability::IsWall | Capability::IsEnd, [x, y]) => {
                let column = coordinate(name, x)?;
                let row = coordinate(name, y)?;
                let flag = if capability == Capability::IsWall {
                    api.is_wall(column, row)
                } else {
                    api.is_end(column, row)
                };
                Value::Bool(flag)
            }
            _ => {
                let position = api.position();
                let mut entries = BTreeMap::new();
                let _ = entries.insert(
                    Key::Str(Rc::from("x")),
                    Value::Int(i64::from(position.column())),
                );
                let _ = entries.insert(
                    Key::Str(Rc::from("y")),
                    Value::Int(i64::from(position.row())),
                );
                Value::map(entries)
            }
        };
        self.stack.push(result);
        Ok(None)
    }
}

fn coordinate(name: &'static str, value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(number) => Ok(*number),
        other => Err(RuntimeError::ArgumentType {
            name,
            expected: "int",
            found: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maze_lab_core::{AuthoredProgram, Grid, SyntaxTag};
    use maze_lab_system_script::ast::Literal;
    use maze_lab_system_script::{compile_program, CompiledUnit, Instruction};
    use maze_lab_world::{query, World};

    fn world() -> World {
        World::new(Grid::from_rows(&["#####", "#S..#", "###.#", "#E..#", "#####"]).expect("grid"))
    }

    fn vm(source: &str, limits: ExecutionLimits) -> Vm {
        let program = AuthoredProgram::new(SyntaxTag::Indented, source);
        Vm::new(compile_program(&program).expect("compiles"), limits)
    }

    #[test]
    fn return_without_a_caller_is_an_internal_error() {
        let unit = CompiledUnit {
            instructions: vec![Instruction::Push(Literal::Null), Instruction::Return],
            functions: Vec::new(),
        };
        let mut machine = Vm::new(unit, ExecutionLimits::default());

        assert_eq!(
            machine.resume(&mut world()),
            Step::Errored(RuntimeError::StackUnderflow)
        );
    }

    #[test]
    fn suspends_once_per_move() {
        let mut world = world();
        let mut machine = vm("move_right()\nmove_up()\nx = 1\n", ExecutionLimits::default());

        assert_eq!(
            machine.resume(&mut world),
            Step::Moved {
                from: CellCoord::new(1, 1),
                to: CellCoord::new(2, 1),
                direction: Direction::Right,
            }
        );
        assert_eq!(
            machine.resume(&mut world),
            Step::Blocked {
                at: CellCoord::new(2, 1),
                direction: Direction::Up,
            }
        );
        assert_eq!(machine.resume(&mut world), Step::Finished);
        assert_eq!(machine.resume(&mut world), Step::Finished);
        assert_eq!(query::move_count(&world), 1);
    }

    #[test]
    fn budget_counts_every_instruction() {
        let mut world = world();
        let limits = ExecutionLimits {
            instruction_budget: 50,
            ..ExecutionLimits::default()
        };
        let mut machine = vm("while True:\n    pass\n", limits);

        assert_eq!(
            machine.resume(&mut world),
            Step::BudgetExhausted { executed: 50 }
        );
        assert_eq!(machine.executed(), 50);
    }

    #[test]
    fn recursion_is_bounded() {
        let mut world = world();
        let limits = ExecutionLimits {
            max_call_depth: 10,
            ..ExecutionLimits::default()
        };
        let mut machine = vm("def f(n):\n    return f(n + 1)\nf(0)\n", limits);

        assert_eq!(
            machine.resume(&mut world),
            Step::Errored(RuntimeError::RecursionDepth)
        );
    }

    #[test]
    fn functions_see_top_level_bindings() {
        let mut world = world();
        let source = "\
limit = 3
def count():
    total = 0
    for i in range(limit):
        total += i
    return total
print(count(), limit)
";
        let mut machine = vm(source, ExecutionLimits::default());

        assert_eq!(machine.resume(&mut world), Step::Finished);
        assert_eq!(machine.take_output(), vec!["3 3".to_owned()]);
    }

    #[test]
    fn assignment_to_a_constant_fails() {
        let mut world = world();
        let program = AuthoredProgram::new(SyntaxTag::PrimitiveCall, "const a = 1;\na = 2;\n");
        let mut machine = Vm::new(
            compile_program(&program).expect("compiles"),
            ExecutionLimits::default(),
        );

        assert_eq!(
            machine.resume(&mut world),
            Step::Errored(RuntimeError::ConstantAssignment("a".to_owned()))
        );
    }

    #[test]
    fn position_is_a_map_with_x_and_y() {
        let mut world = world();
        let source = "pos = get_position()\nprint(pos['x'], pos['y'], is_wall(0, 0), is_end(1, 3))\n";
        let mut machine = vm(source, ExecutionLimits::default());

        assert_eq!(machine.resume(&mut world), Step::Finished);
        assert_eq!(machine.take_output(), vec!["1 1 true true".to_owned()]);
    }

    #[test]
    fn break_inside_nested_loops_only_leaves_the_inner_one() {
        let mut world = world();
        let source = "\
seen = []
for a in [1, 2]:
    for b in [10, 20]:
        if b == 20:
            break
        seen.append(a + b)
print(seen)
";
        let mut machine = vm(source, ExecutionLimits::default());

        assert_eq!(machine.resume(&mut world), Step::Finished);
        assert_eq!(machine.take_output(), vec!["[11, 12]".to_owned()]);
    }
}

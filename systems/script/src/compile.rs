//! Lowering of syntax trees into a flat stack-machine instruction list.

use std::collections::HashMap;

use crate::ast::{
    BinaryOp, Builtin, Capability, Expr, FunctionDef, Literal, LogicalOp, Method, Pattern,
    Program, Stmt, Target, UnaryOp,
};

/// Instruction executed by the interpreter.
///
/// Jump targets are absolute indices into [`CompiledUnit::instructions`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Pushes a constant.
    Push(Literal),
    /// Pushes the value bound to a name, falling back to top-level bindings.
    Load(String),
    /// Pops a value and binds it in the current frame.
    Declare {
        /// Name being bound.
        name: String,
        /// Whether later assignments are rejected.
        constant: bool,
    },
    /// Pops a value and assigns it to an existing binding.
    Store(String),
    /// Pops a list and pushes its elements so the first is on top.
    Unpack(usize),
    /// Pops index and collection, pushes the element.
    LoadIndex,
    /// Pops value, index and collection, writes the element.
    StoreIndex,
    /// Duplicates the two topmost values.
    DuplicatePair,
    /// Pops a map and pushes the entry keyed by the attribute name.
    LoadAttribute(String),
    /// Applies a prefix operator to the top value.
    Unary(UnaryOp),
    /// Pops two operands and pushes the result.
    Binary(BinaryOp),
    /// Unconditional jump.
    Jump(usize),
    /// Pops the condition and jumps when it is falsy.
    JumpIfFalse(usize),
    /// Jumps keeping the top value when it is falsy, otherwise pops it.
    JumpIfFalseElsePop(usize),
    /// Jumps keeping the top value when it is truthy, otherwise pops it.
    JumpIfTrueElsePop(usize),
    /// Pops `n` values into a new list.
    BuildList(usize),
    /// Pops an iterable (or `null`) into a new set.
    BuildSet,
    /// Pops an iterable of pairs (or `null`) into a new map.
    BuildMap,
    /// Pops a collection and starts iterating over a snapshot of it.
    IterStart,
    /// Pushes the next element, or drops the iterator and jumps when done.
    IterNext(usize),
    /// Drops the innermost iterator of the current frame.
    IterDrop,
    /// Calls a user function by index into [`CompiledUnit::functions`].
    Call {
        /// Function index.
        function: usize,
        /// Number of arguments on the stack.
        argc: usize,
    },
    /// Raises the error for a call to a name with no definition.
    CallUndefined(String),
    /// Calls a builtin.
    Builtin {
        /// Builtin being called.
        builtin: Builtin,
        /// Number of arguments on the stack.
        argc: usize,
    },
    /// Calls a method on the receiver below the arguments.
    Method {
        /// Method being called.
        method: Method,
        /// Number of arguments on the stack.
        argc: usize,
    },
    /// Calls a movement capability; moves suspend the interpreter.
    Capability {
        /// Capability being called.
        capability: Capability,
        /// Number of arguments on the stack.
        argc: usize,
    },
    /// Discards the top value.
    Pop,
    /// Returns the top value to the caller.
    Return,
    /// Pops a message and raises it as an authored error.
    Throw,
    /// Ends the program.
    Halt,
}

/// Entry in the function table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionEntry {
    /// Function name.
    pub name: String,
    /// Parameter names in order.
    pub params: Vec<String>,
    /// Index of the first instruction of the body.
    pub entry: usize,
}

/// Program lowered into instructions; execution starts at index 0.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompiledUnit {
    /// Instruction list holding the top level followed by every function body.
    pub instructions: Vec<Instruction>,
    /// Hoisted user functions.
    pub functions: Vec<FunctionEntry>,
}

/// Lowers a parsed program.
///
/// Structural errors (misplaced `break`, duplicate functions) are rejected by
/// the parsers, so lowering itself cannot fail.
#[must_use]
pub fn compile(program: &Program) -> CompiledUnit {
    let mut definitions = Vec::new();
    collect_functions(&program.body, &mut definitions);

    let mut compiler = Compiler {
        instructions: Vec::new(),
        function_index: definitions
            .iter()
            .enumerate()
            .map(|(index, function)| (function.name.clone(), index))
            .collect(),
        loops: Vec::new(),
    };

    compiler.block(&program.body);
    let _ = compiler.emit(Instruction::Halt);

    let mut functions = Vec::with_capacity(definitions.len());
    for definition in definitions {
        let entry = compiler.instructions.len();
        compiler.loops.clear();
        compiler.block(&definition.body);
        let _ = compiler.emit(Instruction::Push(Literal::Null));
        let _ = compiler.emit(Instruction::Return);
        functions.push(FunctionEntry {
            name: definition.name.clone(),
            params: definition.params.clone(),
            entry,
        });
    }

    CompiledUnit {
        instructions: compiler.instructions,
        functions,
    }
}

fn collect_functions<'a>(body: &'a [Stmt], out: &mut Vec<&'a FunctionDef>) {
    for stmt in body {
        match stmt {
            Stmt::Function(function) => {
                out.push(function);
                collect_functions(&function.body, out);
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    collect_functions(&branch.body, out);
                }
                if let Some(otherwise) = otherwise {
                    collect_functions(otherwise, out);
                }
            }
            Stmt::While { body, .. } | Stmt::ForEach { body, .. } => {
                collect_functions(body, out);
            }
            _ => {}
        }
    }
}

struct LoopContext {
    continue_target: usize,
    iterates: bool,
    breaks: Vec<usize>,
}

struct Compiler {
    instructions: Vec<Instruction>,
    function_index: HashMap<String, usize>,
    loops: Vec<LoopContext>,
}

impl Compiler {
    fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    fn here(&self) -> usize {
        self.instructions.len()
    }

    fn patch(&mut self, at: usize, target: usize) {
        match &mut self.instructions[at] {
            Instruction::Jump(slot)
            | Instruction::JumpIfFalse(slot)
            | Instruction::JumpIfFalseElsePop(slot)
            | Instruction::JumpIfTrueElsePop(slot)
            | Instruction::IterNext(slot) => *slot = target,
            other => debug_assert!(false, "patched a non-jump instruction {other:?}"),
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn bind(&mut self, pattern: &Pattern, constant: bool) {
        match pattern {
            Pattern::Name(name) => {
                let _ = self.emit(Instruction::Declare {
                    name: name.clone(),
                    constant,
                });
            }
            Pattern::Tuple(names) => {
                let _ = self.emit(Instruction::Unpack(names.len()));
                for name in names {
                    let _ = self.emit(Instruction::Declare {
                        name: name.clone(),
                        constant,
                    });
                }
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Comment(_) | Stmt::Function(_) => {}
            Stmt::Declare {
                pattern,
                value,
                constant,
            } => {
                match value {
                    Some(value) => self.expr(value),
                    None => {
                        let _ = self.emit(Instruction::Push(Literal::Null));
                    }
                }
                self.bind(pattern, *constant);
            }
            Stmt::Assign { target, op, value } => self.assign(target, *op, value),
            Stmt::Expr(value) => {
                self.expr(value);
                let _ = self.emit(Instruction::Pop);
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                let mut exits = Vec::new();
                for branch in branches {
                    self.expr(&branch.condition);
                    let skip = self.emit(Instruction::JumpIfFalse(0));
                    self.block(&branch.body);
                    exits.push(self.emit(Instruction::Jump(0)));
                    let next = self.here();
                    self.patch(skip, next);
                }
                if let Some(otherwise) = otherwise {
                    self.block(otherwise);
                }
                let end = self.here();
                for exit in exits {
                    self.patch(exit, end);
                }
            }
            Stmt::While { condition, body } => {
                let head = self.here();
                self.expr(condition);
                let exit = self.emit(Instruction::JumpIfFalse(0));
                self.loop_body(head, false, body);
                let _ = self.emit(Instruction::Jump(head));
                let end = self.here();
                self.patch(exit, end);
                self.close_loop(end);
            }
            Stmt::ForEach {
                pattern,
                iterable,
                body,
            } => {
                self.expr(iterable);
                let _ = self.emit(Instruction::IterStart);
                let head = self.emit(Instruction::IterNext(0));
                self.bind(pattern, false);
                self.loop_body(head, true, body);
                let _ = self.emit(Instruction::Jump(head));
                let end = self.here();
                self.patch(head, end);
                self.close_loop(end);
            }
            Stmt::Return(value) => {
                match value {
                    Some(value) => self.expr(value),
                    None => {
                        let _ = self.emit(Instruction::Push(Literal::Null));
                    }
                }
                let _ = self.emit(Instruction::Return);
            }
            Stmt::Break => {
                let iterates = self.loops.last().is_some_and(|context| context.iterates);
                if iterates {
                    let _ = self.emit(Instruction::IterDrop);
                }
                let jump = self.emit(Instruction::Jump(0));
                if let Some(context) = self.loops.last_mut() {
                    context.breaks.push(jump);
                }
            }
            Stmt::Continue => {
                let target = self
                    .loops
                    .last()
                    .map_or(0, |context| context.continue_target);
                let _ = self.emit(Instruction::Jump(target));
            }
            Stmt::Throw { message, .. } => {
                self.expr(message);
                let _ = self.emit(Instruction::Throw);
            }
        }
    }

    fn loop_body(&mut self, continue_target: usize, iterates: bool, body: &[Stmt]) {
        self.loops.push(LoopContext {
            continue_target,
            iterates,
            breaks: Vec::new(),
        });
        self.block(body);
    }

    fn close_loop(&mut self, end: usize) {
        if let Some(context) = self.loops.pop() {
            for jump in context.breaks {
                self.patch(jump, end);
            }
        }
    }

    fn assign(&mut self, target: &Target, op: Option<BinaryOp>, value: &Expr) {
        match target {
            Target::Name(name) => {
                if let Some(op) = op {
                    let _ = self.emit(Instruction::Load(name.clone()));
                    self.expr(value);
                    let _ = self.emit(Instruction::Binary(op));
                } else {
                    self.expr(value);
                }
                let _ = self.emit(Instruction::Store(name.clone()));
            }
            Target::Index { object, index } => {
                self.expr(object);
                self.expr(index);
                if let Some(op) = op {
                    let _ = self.emit(Instruction::DuplicatePair);
                    let _ = self.emit(Instruction::LoadIndex);
                    self.expr(value);
                    let _ = self.emit(Instruction::Binary(op));
                } else {
                    self.expr(value);
                }
                let _ = self.emit(Instruction::StoreIndex);
            }
            Target::Tuple(names) => {
                self.expr(value);
                let _ = self.emit(Instruction::Unpack(names.len()));
                for name in names {
                    let _ = self.emit(Instruction::Store(name.clone()));
                }
            }
        }
    }

    fn arguments(&mut self, args: &[Expr]) -> usize {
        for arg in args {
            self.expr(arg);
        }
        args.len()
    }

    fn expr(&mut self, value: &Expr) {
        match value {
            Expr::Literal(literal) => {
                let _ = self.emit(Instruction::Push(literal.clone()));
            }
            Expr::Name(name) => {
                let _ = self.emit(Instruction::Load(name.clone()));
            }
            Expr::List(items) => {
                let count = self.arguments(items);
                let _ = self.emit(Instruction::BuildList(count));
            }
            Expr::NewSet(source) | Expr::NewMap(source) => {
                match source {
                    Some(source) => self.expr(source),
                    None => {
                        let _ = self.emit(Instruction::Push(Literal::Null));
                    }
                }
                let build = if matches!(value, Expr::NewSet(_)) {
                    Instruction::BuildSet
                } else {
                    Instruction::BuildMap
                };
                let _ = self.emit(build);
            }
            Expr::Unary { op, operand } => {
                self.expr(operand);
                let _ = self.emit(Instruction::Unary(*op));
            }
            Expr::Binary { op, lhs, rhs } => {
                self.expr(lhs);
                self.expr(rhs);
                let _ = self.emit(Instruction::Binary(*op));
            }
            Expr::Logical { op, lhs, rhs } => {
                self.expr(lhs);
                let jump = self.emit(match op {
                    LogicalOp::And => Instruction::JumpIfFalseElsePop(0),
                    LogicalOp::Or => Instruction::JumpIfTrueElsePop(0),
                });
                self.expr(rhs);
                let end = self.here();
                self.patch(jump, end);
            }
            Expr::Call { name, args } => match self.function_index.get(name).copied() {
                Some(function) => {
                    let argc = self.arguments(args);
                    let _ = self.emit(Instruction::Call { function, argc });
                }
                None => {
                    let _ = self.emit(Instruction::CallUndefined(name.clone()));
                }
            },
            Expr::Builtin { builtin, args } => {
                let argc = self.arguments(args);
                let _ = self.emit(Instruction::Builtin {
                    builtin: *builtin,
                    argc,
                });
            }
            Expr::Capability { capability, args } => {
                let argc = self.arguments(args);
                let _ = self.emit(Instruction::Capability {
                    capability: *capability,
                    argc,
                });
            }
            Expr::Method {
                receiver,
                method,
                args,
            } => {
                self.expr(receiver);
                let argc = self.arguments(args);
                let _ = self.emit(Instruction::Method {
                    method: method.clone(),
                    argc,
                });
            }
            Expr::Index { object, index } => {
                self.expr(object);
                self.expr(index);
                let _ = self.emit(Instruction::LoadIndex);
            }
            Expr::Attribute { object, name } => {
                self.expr(object);
                let _ = self.emit(Instruction::LoadAttribute(name.clone()));
            }
        }
    }
}

//! Syntax tree shared by both authoring syntaxes.
//!
//! Each front end maps its own spelling (snake_case or camelCase names,
//! `append` or `push`, `x in c` or `c.has(x)`) onto the same canonical nodes,
//! so the compiler, the interpreter and the normalizer never need to know
//! which syntax a program came from.

use maze_lab_core::Direction;

/// Parsed program: top-level statements executed in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    /// Statements at module level.
    pub body: Vec<Stmt>,
}

/// Statement node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// Full-line comment carried for the normalizer; no runtime effect.
    Comment(String),
    /// Function definition, hoisted by the compiler.
    Function(FunctionDef),
    /// Binds names in the current function scope.
    Declare {
        /// Names being bound.
        pattern: Pattern,
        /// Initial value; `None` binds `null`.
        value: Option<Expr>,
        /// Whether later assignments are rejected.
        constant: bool,
    },
    /// Assigns to an existing binding, list slot or map entry.
    Assign {
        /// Place receiving the value.
        target: Target,
        /// Operator for augmented assignments such as `+=`.
        op: Option<BinaryOp>,
        /// Value assigned (or combined with the current value).
        value: Expr,
    },
    /// Expression evaluated for its effects.
    Expr(Expr),
    /// Conditional chain.
    If {
        /// `if` and `else if` arms in source order.
        branches: Vec<Branch>,
        /// Trailing `else` arm.
        otherwise: Option<Vec<Stmt>>,
    },
    /// Pre-tested loop.
    While {
        /// Loop condition.
        condition: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// Iteration over a snapshot of a collection.
    ForEach {
        /// Names bound for every element.
        pattern: Pattern,
        /// Collection being iterated.
        iterable: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// Returns from the enclosing function.
    Return(Option<Expr>),
    /// Leaves the innermost loop.
    Break,
    /// Skips to the next iteration of the innermost loop.
    Continue,
    /// Raises an authored error whose message is surfaced verbatim.
    Throw {
        /// Error class named in the source, kept for normalization.
        class: String,
        /// Message expression.
        message: Expr,
    },
}

/// User-defined function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDef {
    /// Function name.
    pub name: String,
    /// Parameter names in order.
    pub params: Vec<String>,
    /// Function body.
    pub body: Vec<Stmt>,
}

/// One arm of a conditional chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    /// Condition guarding the arm.
    pub condition: Expr,
    /// Statements run when the condition is truthy.
    pub body: Vec<Stmt>,
}

/// Binding pattern used by declarations and loops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    /// Single name.
    Name(String),
    /// Positional unpacking of a list.
    Tuple(Vec<String>),
}

impl Pattern {
    /// Names bound by the pattern in order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::Name(name) => std::slice::from_ref(name),
            Self::Tuple(names) => names,
        }
    }
}

/// Assignable place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Existing binding.
    Name(String),
    /// List slot or map entry.
    Index {
        /// Collection being written.
        object: Expr,
        /// Index or key.
        index: Expr,
    },
    /// Positional unpacking into existing bindings.
    Tuple(Vec<String>),
}

/// Expression node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    /// Constant value.
    Literal(Literal),
    /// Variable read.
    Name(String),
    /// List display (tuples become lists).
    List(Vec<Expr>),
    /// Set construction from an optional iterable.
    NewSet(Option<Box<Expr>>),
    /// Map construction from an optional iterable of `[key, value]` pairs.
    NewMap(Option<Box<Expr>>),
    /// Prefix operator.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Strict binary operator.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Short-circuiting operator yielding one of its operands.
    Logical {
        /// Operator.
        op: LogicalOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand, evaluated only when needed.
        rhs: Box<Expr>,
    },
    /// Call of a user-defined function.
    Call {
        /// Function name.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Call of a language builtin.
    Builtin {
        /// Builtin being called.
        builtin: Builtin,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Call of a movement capability.
    Capability {
        /// Capability being called.
        capability: Capability,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Method call on a collection or string.
    Method {
        /// Receiver.
        receiver: Box<Expr>,
        /// Method being called.
        method: Method,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Subscript read.
    Index {
        /// Collection being read.
        object: Box<Expr>,
        /// Index or key.
        index: Box<Expr>,
    },
    /// Attribute read, resolved as a string-keyed map lookup.
    Attribute {
        /// Map being read.
        object: Box<Expr>,
        /// Key name.
        name: String,
    },
}

/// Constant value embedded in source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    /// `None` / `null`.
    Null,
    /// Boolean constant.
    Bool(bool),
    /// Integer constant.
    Int(i64),
    /// String constant.
    Str(String),
}

/// Prefix operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation.
    Not,
    /// Arithmetic negation.
    Negate,
}

/// Strict binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// Addition, string or list concatenation.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Floor division.
    Div,
    /// Remainder with the sign of the divisor.
    Rem,
    /// Structural equality.
    Eq,
    /// Structural inequality.
    NotEq,
    /// Less than.
    Less,
    /// Less than or equal.
    LessEq,
    /// Greater than.
    Greater,
    /// Greater than or equal.
    GreaterEq,
}

impl BinaryOp {
    /// Operator spelling used in runtime error messages.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
        }
    }
}

/// Short-circuiting operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    /// Yields the left operand when falsy, otherwise the right.
    And,
    /// Yields the left operand when truthy, otherwise the right.
    Or,
}

/// Builtin functions available in both syntaxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    /// Length of a string or collection.
    Len,
    /// String conversion.
    Str,
    /// Eager integer range.
    Range,
    /// Absolute value.
    Abs,
    /// Smallest argument or element.
    Min,
    /// Largest argument or element.
    Max,
    /// Appends a line to the run output.
    Print,
}

impl Builtin {
    /// Name used in runtime error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Str => "str",
            Self::Range => "range",
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Print => "print",
        }
    }
}

/// Movement capabilities, the only operations that reach the maze.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// Step toward decreasing rows.
    MoveUp,
    /// Step toward increasing rows.
    MoveDown,
    /// Step toward decreasing columns.
    MoveLeft,
    /// Step toward increasing columns.
    MoveRight,
    /// Current cursor as a map with `x` and `y` keys.
    GetPosition,
    /// Whether `(x, y)` is a wall or outside the maze.
    IsWall,
    /// Whether `(x, y)` is the exit.
    IsEnd,
}

impl Capability {
    const ALL: [Capability; 7] = [
        Capability::MoveUp,
        Capability::MoveDown,
        Capability::MoveLeft,
        Capability::MoveRight,
        Capability::GetPosition,
        Capability::IsWall,
        Capability::IsEnd,
    ];

    /// Spelling in the indentation syntax.
    #[must_use]
    pub const fn indented_name(self) -> &'static str {
        match self {
            Self::MoveUp => "move_up",
            Self::MoveDown => "move_down",
            Self::MoveLeft => "move_left",
            Self::MoveRight => "move_right",
            Self::GetPosition => "get_position",
            Self::IsWall => "is_wall",
            Self::IsEnd => "is_end",
        }
    }

    /// Spelling in the primitive-call syntax.
    #[must_use]
    pub const fn primitive_name(self) -> &'static str {
        match self {
            Self::MoveUp => "moveUp",
            Self::MoveDown => "moveDown",
            Self::MoveLeft => "moveLeft",
            Self::MoveRight => "moveRight",
            Self::GetPosition => "getPosition",
            Self::IsWall => "isWall",
            Self::IsEnd => "isEnd",
        }
    }

    /// Looks up a capability by its indentation-syntax name.
    #[must_use]
    pub fn from_indented(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|capability| capability.indented_name() == name)
    }

    /// Looks up a capability by its primitive-call name.
    #[must_use]
    pub fn from_primitive(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|capability| capability.primitive_name() == name)
    }

    /// Number of arguments the capability takes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::IsWall | Self::IsEnd => 2,
            _ => 0,
        }
    }

    /// Direction of travel for move capabilities.
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::MoveUp => Some(Direction::Up),
            Self::MoveDown => Some(Direction::Down),
            Self::MoveLeft => Some(Direction::Left),
            Self::MoveRight => Some(Direction::Right),
            Self::GetPosition | Self::IsWall | Self::IsEnd => None,
        }
    }
}

/// Collection and string methods, named by what they do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Method {
    /// Append to the back of a list.
    Push,
    /// Remove from the back of a list.
    Pop,
    /// Remove from the front of a list.
    Shift,
    /// Insert at the front of a list.
    Unshift,
    /// Membership test (list element, set member, map key, substring).
    Has,
    /// Insert into a set.
    Add,
    /// Remove a list element, set member or map key that must be present.
    Remove,
    /// Remove a list element, set member or map key if present.
    Discard,
    /// Map lookup with an optional default.
    Get,
    /// Map insertion.
    Put,
    /// Map keys as a list.
    Keys,
    /// Map values as a list.
    Values,
    /// Shallow copy.
    Copy,
    /// Position of an element, `-1` when absent.
    IndexOf,
    /// Method name no collection understands; fails when called.
    Other(String),
}

impl Method {
    /// Spelling in the primitive-call syntax.
    #[must_use]
    pub fn primitive_name(&self) -> &str {
        match self {
            Self::Push => "push",
            Self::Pop => "pop",
            Self::Shift => "shift",
            Self::Unshift => "unshift",
            Self::Has => "has",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Discard => "delete",
            Self::Get => "get",
            Self::Put => "set",
            Self::Keys => "keys",
            Self::Values => "values",
            Self::Copy => "slice",
            Self::IndexOf => "indexOf",
            Self::Other(name) => name,
        }
    }
}

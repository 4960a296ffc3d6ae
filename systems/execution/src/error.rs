use thiserror::Error;

/// Fault raised while a compiled program runs.
///
/// The display text is surfaced verbatim as the message of an errored run.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Read of, or call to, a name with no binding.
    #[error("name '{0}' is not defined")]
    Undefined(String),
    /// Assignment to a name that was never declared.
    #[error("assignment to undeclared variable '{0}'")]
    Undeclared(String),
    /// Assignment to a constant binding.
    #[error("assignment to constant variable '{0}'")]
    ConstantAssignment(String),
    /// Binary operator applied to unsupported operand types.
    #[error("unsupported operand types for {op}: {lhs} and {rhs}")]
    OperandTypes {
        /// Operator spelling.
        op: &'static str,
        /// Type of the left operand.
        lhs: &'static str,
        /// Type of the right operand.
        rhs: &'static str,
    },
    /// Arithmetic negation of a non-integer.
    #[error("bad operand type for unary -: {0}")]
    NegateOperand(&'static str),
    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Integer result outside the 64-bit range.
    #[error("integer overflow")]
    Overflow,
    /// List or string index outside the valid range.
    #[error("index {0} out of range")]
    IndexOutOfRange(i64),
    /// Map lookup of a key that is not present.
    #[error("key {0} not found")]
    MissingKey(String),
    /// Subscript applied to a value without elements.
    #[error("'{0}' value is not subscriptable")]
    NotSubscriptable(&'static str),
    /// Item assignment on a value that does not support it.
    #[error("'{0}' value does not support item assignment")]
    NotAssignable(&'static str),
    /// Sequence index of the wrong type.
    #[error("{container} indices must be integers, not {found}")]
    IndexType {
        /// Type being indexed.
        container: &'static str,
        /// Type of the index.
        found: &'static str,
    },
    /// Iteration over a value without elements.
    #[error("'{0}' value is not iterable")]
    NotIterable(&'static str),
    /// Mutable collection used as a set member or map key.
    #[error("unhashable type: '{0}'")]
    Unhashable(&'static str),
    /// Method not provided by the receiver type.
    #[error("cannot call method '{method}' on {type_name}")]
    NoMethod {
        /// Method name.
        method: String,
        /// Type of the receiver.
        type_name: &'static str,
    },
    /// Attribute read on a value that is not a map.
    #[error("'{type_name}' value has no attribute '{name}'")]
    NoAttribute {
        /// Attribute name.
        name: String,
        /// Type of the receiver.
        type_name: &'static str,
    },
    /// Wrong number of arguments.
    #[error("{name}() takes {expected} arguments but {given} were given")]
    Arity {
        /// Callee name.
        name: String,
        /// Accepted argument count, e.g. `2` or `1 to 3`.
        expected: String,
        /// Argument count supplied.
        given: usize,
    },
    /// Argument of the wrong type.
    #[error("{name}() expected {expected} argument, got {found}")]
    ArgumentType {
        /// Callee name.
        name: &'static str,
        /// Expected type.
        expected: &'static str,
        /// Supplied type.
        found: &'static str,
    },
    /// Length requested for a value without one.
    #[error("object of type '{0}' has no length")]
    NoLength(&'static str),
    /// Destructuring with a mismatched element count.
    #[error("cannot unpack {found} values into {expected} names")]
    Unpack {
        /// Number of names in the pattern.
        expected: usize,
        /// Number of elements in the value.
        found: usize,
    },
    /// Map construction from something other than `[key, value]` pairs.
    #[error("map entries must be [key, value] pairs")]
    MapEntry,
    /// Removal from an empty list.
    #[error("pop from empty list")]
    EmptyPop,
    /// Removal of a list element that is not present.
    #[error("value not found in list")]
    NotFound,
    /// Removal of a set member that is not present.
    #[error("value not found in set")]
    NotMember,
    /// `min` or `max` of nothing.
    #[error("{0}() arg is an empty sequence")]
    EmptySequence(&'static str),
    /// `range` with a zero step.
    #[error("range() step must not be zero")]
    ZeroStep,
    /// `range` that would allocate too many elements.
    #[error("range of {0} elements is too large")]
    RangeTooLarge(i128),
    /// Collections nested too deeply, or cyclically, to compare or hash.
    #[error("maximum nesting depth exceeded")]
    NestingDepth,
    /// Call nesting beyond the configured depth.
    #[error("maximum recursion depth exceeded")]
    RecursionDepth,
    /// Error raised by the program itself.
    #[error("{0}")]
    Raised(String),
    /// Interpreter invariant violated by a malformed instruction list.
    #[error("internal error: operand stack underflow")]
    StackUnderflow,
}

//! Recursive-descent parser for the indentation-delimited syntax.

use std::collections::HashSet;

use maze_lab_core::SyntaxTag;

use crate::ast::{
    BinaryOp, Branch, Builtin, Capability, Expr, FunctionDef, Literal, LogicalOp, Method,
    Pattern, Program, Stmt, Target, UnaryOp,
};
use crate::error::SyntaxError;
use crate::lexer::{tokenize, TokenKind, TokenStream};

const KEYWORDS: &[&str] = &[
    "def", "for", "in", "while", "if", "elif", "else", "return", "break", "continue", "pass",
    "and", "or", "not", "is", "True", "False", "None", "raise",
];

const AUGMENTED: &[(&str, BinaryOp)] = &[
    ("+=", BinaryOp::Add),
    ("-=", BinaryOp::Sub),
    ("*=", BinaryOp::Mul),
    ("//=", BinaryOp::Div),
    ("/=", BinaryOp::Div),
    ("%=", BinaryOp::Rem),
];

pub(crate) fn parse(source: &str) -> Result<Program, SyntaxError> {
    let tokens = tokenize(source, SyntaxTag::Indented)?;
    let mut parser = Parser {
        tokens: TokenStream::new(tokens),
        loop_depth: 0,
        in_function: false,
        functions: HashSet::new(),
    };

    let mut body = Vec::new();
    while !parser.tokens.at_eof() {
        parser.statement(&mut body)?;
    }
    Ok(Program { body })
}

struct Parser {
    tokens: TokenStream,
    loop_depth: usize,
    in_function: bool,
    functions: HashSet<String>,
}

impl Parser {
    fn statement(&mut self, out: &mut Vec<Stmt>) -> Result<(), SyntaxError> {
        match self.tokens.peek_kind().clone() {
            TokenKind::Comment(text) => {
                let _ = self.tokens.advance();
                out.push(Stmt::Comment(text));
            }
            TokenKind::Newline => {
                let _ = self.tokens.advance();
            }
            TokenKind::Indent => return Err(self.tokens.error_here("unexpected indent")),
            TokenKind::Name(word) => match word.as_str() {
                "def" => out.push(self.function()?),
                "for" => out.push(self.for_each()?),
                "while" => out.push(self.while_loop()?),
                "if" => out.push(self.conditional()?),
                "elif" | "else" => {
                    return Err(self
                        .tokens
                        .error_here(format!("'{word}' without a matching 'if'")))
                }
                _ => self.simple_line(out)?,
            },
            _ => self.simple_line(out)?,
        }
        Ok(())
    }

    fn simple_line(&mut self, out: &mut Vec<Stmt>) -> Result<(), SyntaxError> {
        if let Some(stmt) = self.simple()? {
            out.push(stmt);
        }
        match self.tokens.peek_kind() {
            TokenKind::Newline => {
                let _ = self.tokens.advance();
                Ok(())
            }
            TokenKind::Eof | TokenKind::Dedent => Ok(()),
            _ => Err(self.tokens.error_here(format!(
                "expected end of line but found {}",
                self.tokens.describe()
            ))),
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mark = self.tokens.depth();
        self.tokens.expect_op(":")?;
        self.tokens.descend()?;
        let body = self.suite()?;
        self.tokens.restore(mark);
        Ok(body)
    }

    fn suite(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();

        if !matches!(self.tokens.peek_kind(), TokenKind::Newline) {
            self.simple_line(&mut body)?;
            return Ok(body);
        }
        let _ = self.tokens.advance();

        while let TokenKind::Comment(text) = self.tokens.peek_kind().clone() {
            let _ = self.tokens.advance();
            body.push(Stmt::Comment(text));
        }
        if !matches!(self.tokens.peek_kind(), TokenKind::Indent) {
            return Err(self.tokens.error_here("expected an indented block"));
        }
        let _ = self.tokens.advance();

        while !matches!(self.tokens.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
            self.statement(&mut body)?;
        }
        if matches!(self.tokens.peek_kind(), TokenKind::Dedent) {
            let _ = self.tokens.advance();
        }
        Ok(body)
    }

    fn function(&mut self) -> Result<Stmt, SyntaxError> {
        let _ = self.tokens.advance();
        let (line, column) = self.tokens.position();
        let name = self.tokens.expect_identifier(KEYWORDS)?;
        if !self.functions.insert(name.clone()) {
            return Err(SyntaxError::new(
                line,
                column,
                format!("function '{name}' is defined more than once"),
            ));
        }

        self.tokens.expect_op("(")?;
        let mut params = Vec::new();
        while !self.tokens.check_op(")") {
            let param = self.tokens.expect_identifier(KEYWORDS)?;
            if params.contains(&param) {
                return Err(self
                    .tokens
                    .error_here(format!("duplicate parameter '{param}'")));
            }
            params.push(param);
            if !self.tokens.eat_op(",") {
                break;
            }
        }
        self.tokens.expect_op(")")?;

        let saved = (self.loop_depth, self.in_function);
        self.loop_depth = 0;
        self.in_function = true;
        let body = self.block();
        (self.loop_depth, self.in_function) = saved;

        Ok(Stmt::Function(FunctionDef {
            name,
            params,
            body: body?,
        }))
    }

    fn for_each(&mut self) -> Result<Stmt, SyntaxError> {
        let _ = self.tokens.advance();
        let pattern = self.targets()?;
        self.tokens.expect_word("in")?;
        let iterable = self.expr()?;
        let body = self.loop_body()?;
        Ok(Stmt::ForEach {
            pattern,
            iterable,
            body,
        })
    }

    fn while_loop(&mut self) -> Result<Stmt, SyntaxError> {
        let _ = self.tokens.advance();
        let condition = self.expr()?;
        let body = self.loop_body()?;
        Ok(Stmt::While { condition, body })
    }

    fn loop_body(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        body
    }

    fn conditional(&mut self) -> Result<Stmt, SyntaxError> {
        let _ = self.tokens.advance();
        let mut branches = vec![Branch {
            condition: self.expr()?,
            body: self.block()?,
        }];
        let mut otherwise = None;

        loop {
            if self.tokens.eat_word("elif") {
                branches.push(Branch {
                    condition: self.expr()?,
                    body: self.block()?,
                });
            } else if self.tokens.eat_word("else") {
                otherwise = Some(self.block()?);
                break;
            } else {
                break;
            }
        }

        Ok(Stmt::If {
            branches,
            otherwise,
        })
    }

    fn targets(&mut self) -> Result<Pattern, SyntaxError> {
        let first = self.tokens.expect_identifier(KEYWORDS)?;
        if !self.tokens.check_op(",") {
            return Ok(Pattern::Name(first));
        }
        let mut names = vec![first];
        while self.tokens.eat_op(",") {
            names.push(self.tokens.expect_identifier(KEYWORDS)?);
        }
        Ok(Pattern::Tuple(names))
    }

    fn simple(&mut self) -> Result<Option<Stmt>, SyntaxError> {
        if self.tokens.eat_word("pass") {
            return Ok(None);
        }
        if self.tokens.check_word("break") || self.tokens.check_word("continue") {
            if self.loop_depth == 0 {
                return Err(self
                    .tokens
                    .error_here(format!("{} outside loop", self.tokens.describe())));
            }
            let is_break = self.tokens.check_word("break");
            let _ = self.tokens.advance();
            return Ok(Some(if is_break { Stmt::Break } else { Stmt::Continue }));
        }
        if self.tokens.check_word("return") {
            if !self.in_function {
                return Err(self.tokens.error_here("'return' outside function"));
            }
            let _ = self.tokens.advance();
            if matches!(
                self.tokens.peek_kind(),
                TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent
            ) {
                return Ok(Some(Stmt::Return(None)));
            }
            return Ok(Some(Stmt::Return(Some(self.expr_list()?))));
        }
        if self.tokens.eat_word("raise") {
            let class = self.tokens.expect_identifier(KEYWORDS)?;
            self.tokens.expect_op("(")?;
            let message = self.expr()?;
            self.tokens.expect_op(")")?;
            return Ok(Some(Stmt::Throw { class, message }));
        }

        let (line, column) = self.tokens.position();
        let first = self.expr()?;

        if self.tokens.check_op(",") {
            let Expr::Name(name) = first else {
                return Err(self.tokens.error_here("cannot unpack into an expression"));
            };
            let mut names = vec![name];
            while self.tokens.eat_op(",") {
                names.push(self.tokens.expect_identifier(KEYWORDS)?);
            }
            self.tokens.expect_op("=")?;
            let value = self.expr_list()?;
            return Ok(Some(Stmt::Declare {
                pattern: Pattern::Tuple(names),
                value: Some(value),
                constant: false,
            }));
        }

        if self.tokens.eat_op("=") {
            let value = self.expr_list()?;
            return match first {
                Expr::Name(name) => Ok(Some(Stmt::Declare {
                    pattern: Pattern::Name(name),
                    value: Some(value),
                    constant: false,
                })),
                Expr::Index { object, index } => Ok(Some(Stmt::Assign {
                    target: Target::Index {
                        object: *object,
                        index: *index,
                    },
                    op: None,
                    value,
                })),
                _ => Err(SyntaxError::new(
                    line,
                    column,
                    "cannot assign to expression",
                )),
            };
        }

        for &(symbol, op) in AUGMENTED {
            if self.tokens.eat_op(symbol) {
                let value = self.expr()?;
                let target = match first {
                    Expr::Name(name) => Target::Name(name),
                    Expr::Index { object, index } => Target::Index {
                        object: *object,
                        index: *index,
                    },
                    _ => {
                        return Err(SyntaxError::new(
                            line,
                            column,
                            "cannot assign to expression",
                        ))
                    }
                };
                return Ok(Some(Stmt::Assign {
                    target,
                    op: Some(op),
                    value,
                }));
            }
        }

        Ok(Some(Stmt::Expr(first)))
    }

    fn expr_list(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.expr()?;
        if !self.tokens.check_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.tokens.eat_op(",") {
            if matches!(
                self.tokens.peek_kind(),
                TokenKind::Newline | TokenKind::Eof
            ) {
                break;
            }
            items.push(self.expr()?);
        }
        Ok(Expr::List(items))
    }

    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        let mark = self.tokens.depth();
        self.tokens.descend()?;
        let mut lhs = self.and()?;
        while self.tokens.eat_word("or") {
            self.tokens.descend()?;
            let rhs = self.and()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.tokens.restore(mark);
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, SyntaxError> {
        let mark = self.tokens.depth();
        let mut lhs = self.not()?;
        while self.tokens.eat_word("and") {
            self.tokens.descend()?;
            let rhs = self.not()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.tokens.restore(mark);
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, SyntaxError> {
        if self.tokens.eat_word("not") {
            let mark = self.tokens.depth();
            self.tokens.descend()?;
            let operand = self.not()?;
            self.tokens.restore(mark);
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison_op(&mut self) -> Option<Comparison> {
        let op = match self.tokens.peek_kind() {
            TokenKind::Op("==") => Comparison::Binary(BinaryOp::Eq),
            TokenKind::Op("!=") => Comparison::Binary(BinaryOp::NotEq),
            TokenKind::Op("<") => Comparison::Binary(BinaryOp::Less),
            TokenKind::Op("<=") => Comparison::Binary(BinaryOp::LessEq),
            TokenKind::Op(">") => Comparison::Binary(BinaryOp::Greater),
            TokenKind::Op(">=") => Comparison::Binary(BinaryOp::GreaterEq),
            TokenKind::Name(word) if word == "in" => Comparison::In,
            TokenKind::Name(word) if word == "not" => {
                if !matches!(self.tokens.peek_second(), TokenKind::Name(next) if next == "in") {
                    return None;
                }
                let _ = self.tokens.advance();
                Comparison::NotIn
            }
            TokenKind::Name(word) if word == "is" => {
                let _ = self.tokens.advance();
                if self.tokens.check_word("not") {
                    Comparison::Binary(BinaryOp::NotEq)
                } else {
                    return Some(Comparison::Binary(BinaryOp::Eq));
                }
            }
            _ => return None,
        };
        let _ = self.tokens.advance();
        Some(op)
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let lhs = self.sum()?;
        let Some(op) = self.comparison_op() else {
            return Ok(lhs);
        };
        let rhs = self.sum()?;
        if self.comparison_op().is_some() {
            return Err(self.tokens.error_here("chained comparisons are not supported"));
        }

        Ok(match op {
            Comparison::Binary(op) => Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Comparison::In => membership(lhs, rhs),
            Comparison::NotIn => Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(membership(lhs, rhs)),
            },
        })
    }

    fn sum(&mut self) -> Result<Expr, SyntaxError> {
        let mark = self.tokens.depth();
        let mut lhs = self.term()?;
        loop {
            let op = if self.tokens.eat_op("+") {
                BinaryOp::Add
            } else if self.tokens.eat_op("-") {
                BinaryOp::Sub
            } else {
                self.tokens.restore(mark);
                return Ok(lhs);
            };
            self.tokens.descend()?;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let mark = self.tokens.depth();
        let mut lhs = self.unary()?;
        loop {
            let op = if self.tokens.eat_op("*") {
                BinaryOp::Mul
            } else if self.tokens.eat_op("//") || self.tokens.eat_op("/") {
                BinaryOp::Div
            } else if self.tokens.eat_op("%") {
                BinaryOp::Rem
            } else {
                self.tokens.restore(mark);
                return Ok(lhs);
            };
            self.tokens.descend()?;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let negated = if self.tokens.eat_op("-") {
            true
        } else if self.tokens.eat_op("+") {
            false
        } else {
            return self.postfix();
        };
        let mark = self.tokens.depth();
        self.tokens.descend()?;
        let operand = self.unary()?;
        self.tokens.restore(mark);
        Ok(if negated { negate(operand) } else { operand })
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mark = self.tokens.depth();
        let mut expr = self.atom()?;
        loop {
            if self.tokens.check_op("(") || self.tokens.check_op("[") || self.tokens.check_op(".")
            {
                self.tokens.descend()?;
            }
            if self.tokens.check_op("(") {
                let position = self.tokens.position();
                let args = self.arguments()?;
                expr = call(expr, args, position)?;
            } else if self.tokens.eat_op("[") {
                let index = self.expr()?;
                self.tokens.expect_op("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.tokens.eat_op(".") {
                let name = self.tokens.expect_identifier(&[])?;
                expr = Expr::Attribute {
                    object: Box::new(expr),
                    name,
                };
            } else {
                self.tokens.restore(mark);
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.tokens.expect_op("(")?;
        let mut args = Vec::new();
        while !self.tokens.check_op(")") {
            args.push(self.expr()?);
            if !self.tokens.eat_op(",") {
                break;
            }
        }
        self.tokens.expect_op(")")?;
        Ok(args)
    }

    fn atom(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.tokens.peek().clone();
        match token.kind {
            TokenKind::Int(value) => {
                let _ = self.tokens.advance();
                Ok(Expr::Literal(Literal::Int(value)))
            }
            TokenKind::Str(text) => {
                let _ = self.tokens.advance();
                Ok(Expr::Literal(Literal::Str(text)))
            }
            TokenKind::Name(word) => {
                let literal = match word.as_str() {
                    "True" => Some(Literal::Bool(true)),
                    "False" => Some(Literal::Bool(false)),
                    "None" => Some(Literal::Null),
                    _ => None,
                };
                if let Some(literal) = literal {
                    let _ = self.tokens.advance();
                    return Ok(Expr::Literal(literal));
                }
                if KEYWORDS.contains(&word.as_str()) {
                    return Err(self
                        .tokens
                        .error_here(format!("unexpected keyword '{word}'")));
                }
                let _ = self.tokens.advance();
                Ok(Expr::Name(word))
            }
            TokenKind::Op("(") => {
                let _ = self.tokens.advance();
                if self.tokens.eat_op(")") {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.expr()?;
                if self.tokens.eat_op(")") {
                    return Ok(first);
                }
                let mut items = vec![first];
                while self.tokens.eat_op(",") {
                    if self.tokens.check_op(")") {
                        break;
                    }
                    items.push(self.expr()?);
                }
                self.tokens.expect_op(")")?;
                Ok(Expr::List(items))
            }
            TokenKind::Op("[") => {
                let _ = self.tokens.advance();
                let items = self.items("]")?;
                Ok(Expr::List(items))
            }
            TokenKind::Op("{") => {
                let _ = self.tokens.advance();
                if self.tokens.eat_op("}") {
                    return Ok(Expr::NewMap(None));
                }
                let first = self.expr()?;
                if self.tokens.eat_op(":") {
                    let mut entries = vec![Expr::List(vec![first, self.expr()?])];
                    while self.tokens.eat_op(",") {
                        if self.tokens.check_op("}") {
                            break;
                        }
                        let key = self.expr()?;
                        self.tokens.expect_op(":")?;
                        entries.push(Expr::List(vec![key, self.expr()?]));
                    }
                    self.tokens.expect_op("}")?;
                    return Ok(Expr::NewMap(Some(Box::new(Expr::List(entries)))));
                }
                let mut items = vec![first];
                if self.tokens.eat_op(",") {
                    items.extend(self.items("}")?);
                } else {
                    self.tokens.expect_op("}")?;
                }
                Ok(Expr::NewSet(Some(Box::new(Expr::List(items)))))
            }
            _ => Err(self.tokens.error_here(format!(
                "expected an expression but found {}",
                self.tokens.describe()
            ))),
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn items(&mut self, close: &str) -> Result<Vec<Expr>, SyntaxError> {
        let mut items = Vec::new();
        while !self.tokens.check_op(close) {
            items.push(self.expr()?);
            if !self.tokens.eat_op(",") {
                break;
            }
        }
        self.tokens.expect_op(close)?;
        Ok(items)
    }
}

enum Comparison {
    Binary(BinaryOp),
    In,
    NotIn,
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub(crate) fn negate(operand: Expr) -> Expr {
    match operand {
        Expr::Literal(Literal::Int(value)) if value != i64::MIN => {
            Expr::Literal(Literal::Int(-value))
        }
        operand => Expr::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(operand),
        },
    }
}

fn call(callee: Expr, mut args: Vec<Expr>, position: (u32, u32)) -> Result<Expr, SyntaxError> {
    match callee {
        Expr::Name(name) => {
            if let Some(capability) = Capability::from_indented(&name) {
                check_arity(position, capability.indented_name(), capability.arity(), &args)?;
                return Ok(Expr::Capability { capability, args });
            }
            let builtin = match name.as_str() {
                "len" => Some(Builtin::Len),
                "str" => Some(Builtin::Str),
                "range" => Some(Builtin::Range),
                "abs" => Some(Builtin::Abs),
                "min" => Some(Builtin::Min),
                "max" => Some(Builtin::Max),
                "print" => Some(Builtin::Print),
                _ => None,
            };
            if let Some(builtin) = builtin {
                return Ok(Expr::Builtin { builtin, args });
            }
            match name.as_str() {
                "set" if args.len() <= 1 => Ok(Expr::NewSet(args.pop().map(Box::new))),
                "dict" if args.is_empty() => Ok(Expr::NewMap(None)),
                "list" if args.len() == 1 => Ok(Expr::Method {
                    receiver: Box::new(args.remove(0)),
                    method: Method::Copy,
                    args: Vec::new(),
                }),
                _ => Ok(Expr::Call { name, args }),
            }
        }
        Expr::Attribute { object, name } => {
            let (method, args) = method_for(&name, args);
            Ok(Expr::Method {
                receiver: object,
                method,
                args,
            })
        }
        _ => Err(SyntaxError::new(
            position.0,
            position.1,
            "expression is not callable",
        )),
    }
}

fn membership(element: Expr, collection: Expr) -> Expr {
    Expr::Method {
        receiver: Box::new(collection),
        method: Method::Has,
        args: vec![element],
    }
}

fn is_zero(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(Literal::Int(0)))
}

fn method_for(name: &str, mut args: Vec<Expr>) -> (Method, Vec<Expr>) {
    let method = match name {
        "append" => Method::Push,
        "pop" if args.len() == 1 && is_zero(&args[0]) => {
            args.clear();
            Method::Shift
        }
        "pop" => Method::Pop,
        "insert" if args.len() == 2 && is_zero(&args[0]) => {
            let _ = args.remove(0);
            Method::Unshift
        }
        "add" => Method::Add,
        "remove" => Method::Remove,
        "discard" => Method::Discard,
        "get" => Method::Get,
        "keys" => Method::Keys,
        "values" => Method::Values,
        "copy" => Method::Copy,
        "index" => Method::IndexOf,
        other => Method::Other(other.to_owned()),
    };
    (method, args)
}

pub(crate) fn check_arity(
    (line, column): (u32, u32),
    name: &str,
    expected: usize,
    args: &[Expr],
) -> Result<(), SyntaxError> {
    if args.len() == expected {
        return Ok(());
    }
    Err(SyntaxError::new(
        line,
        column,
        format!(
            "{name}() takes {expected} arguments but {} were given",
            args.len()
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse(source).expect("program parses")
    }

    #[test]
    fn assignment_declares_and_subscript_assigns() {
        let program = parse_ok("x = 1\nitems = [x]\nitems[0] += 2\n");
        assert!(matches!(
            &program.body[0],
            Stmt::Declare { pattern: Pattern::Name(name), constant: false, .. } if name == "x"
        ));
        assert!(matches!(
            &program.body[2],
            Stmt::Assign {
                target: Target::Index { .. },
                op: Some(BinaryOp::Add),
                ..
            }
        ));
    }

    #[test]
    fn tuple_assignment_unpacks() {
        let program = parse_ok("a, b = 1, 2\n");
        assert_eq!(
            program.body[0],
            Stmt::Declare {
                pattern: Pattern::Tuple(vec!["a".to_owned(), "b".to_owned()]),
                value: Some(Expr::List(vec![
                    Expr::Literal(Literal::Int(1)),
                    Expr::Literal(Literal::Int(2)),
                ])),
                constant: false,
            }
        );
    }

    #[test]
    fn membership_becomes_a_has_call() {
        let program = parse_ok("x not in seen\n");
        let Stmt::Expr(Expr::Unary {
            op: UnaryOp::Not,
            operand,
        }) = &program.body[0]
        else {
            panic!("expected negated membership, got {:?}", program.body[0]);
        };
        assert!(matches!(
            operand.as_ref(),
            Expr::Method { method: Method::Has, args, .. } if args.len() == 1
        ));
    }

    #[test]
    fn list_methods_are_canonicalized() {
        let program = parse_ok("q.pop(0)\nq.insert(0, 5)\nq.append(1)\nq.pop()\n");
        let methods: Vec<_> = program
            .body
            .iter()
            .map(|stmt| match stmt {
                Stmt::Expr(Expr::Method { method, args, .. }) => (method.clone(), args.len()),
                other => panic!("unexpected statement {other:?}"),
            })
            .collect();
        assert_eq!(
            methods,
            vec![
                (Method::Shift, 0),
                (Method::Unshift, 1),
                (Method::Push, 1),
                (Method::Pop, 0)
            ]
        );
    }

    #[test]
    fn elif_chains_collect_into_one_statement() {
        let program = parse_ok(
            "if a:\n    move_up()\nelif b:\n    move_down()\nelse:\n    move_left()\n",
        );
        assert_eq!(program.body.len(), 1);
        let Stmt::If {
            branches,
            otherwise,
        } = &program.body[0]
        else {
            panic!("expected conditional");
        };
        assert_eq!(branches.len(), 2);
        assert!(otherwise.is_some());
    }

    #[test]
    fn set_and_dict_literals() {
        let program = parse_ok("s = {1, 2}\nd = {}\nm = {'a': 1}\n");
        let values: Vec<_> = program
            .body
            .iter()
            .map(|stmt| match stmt {
                Stmt::Declare { value: Some(value), .. } => value.clone(),
                other => panic!("unexpected statement {other:?}"),
            })
            .collect();
        assert!(matches!(values[0], Expr::NewSet(Some(_))));
        assert_eq!(values[1], Expr::NewMap(None));
        assert!(matches!(values[2], Expr::NewMap(Some(_))));
    }

    #[test]
    fn capability_arity_is_checked() {
        let error = parse("move_up(1)\n").expect_err("too many arguments");
        assert_eq!(error.line(), 1);
        assert!(error.message().contains("move_up() takes 0 arguments"));
    }

    #[test]
    fn missing_block_reports_position() {
        let error = parse("while True:\nmove_up()\n").expect_err("no indented block");
        assert_eq!(error.line(), 2);
        assert_eq!(error.message(), "expected an indented block");
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let error = parse("def f():\n    break\n").expect_err("break outside loop");
        assert!(error.message().contains("outside loop"));
    }

    #[test]
    fn return_outside_function_is_rejected() {
        let error = parse("return 1\n").expect_err("top-level return");
        assert_eq!(error.message(), "'return' outside function");
    }

    #[test]
    fn duplicate_functions_are_rejected() {
        let error = parse("def f():\n    pass\ndef f():\n    pass\n").expect_err("duplicate");
        assert_eq!(error.line(), 3);
    }

    #[test]
    fn single_line_suites_are_accepted() {
        let program = parse_ok("while True: move_right()\n");
        assert!(matches!(&program.body[0], Stmt::While { body, .. } if body.len() == 1));
    }

    #[test]
    fn raise_builds_a_throw() {
        let program = parse_ok("def f():\n    raise ValueError('stuck')\n");
        let Stmt::Function(function) = &program.body[0] else {
            panic!("expected function");
        };
        assert_eq!(
            function.body,
            vec![Stmt::Throw {
                class: "ValueError".to_owned(),
                message: Expr::Literal(Literal::Str("stuck".to_owned())),
            }]
        );
    }
}

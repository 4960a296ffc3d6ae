//! Recursive-descent parser for the brace-delimited primitive-call syntax.

use std::collections::HashSet;

use maze_lab_core::SyntaxTag;

use crate::ast::{
    BinaryOp, Branch, Builtin, Capability, Expr, FunctionDef, Literal, LogicalOp, Method,
    Pattern, Program, Stmt, Target, UnaryOp,
};
use crate::error::SyntaxError;
use crate::indented::{check_arity, negate};
use crate::lexer::{tokenize, TokenKind, TokenStream};

const KEYWORDS: &[&str] = &[
    "function", "let", "const", "var", "for", "of", "while", "if", "else", "return", "break",
    "continue", "true", "false", "null", "undefined", "new", "await", "throw",
];

const ASSIGNMENT: &[(&str, Option<BinaryOp>)] = &[
    ("=", None),
    ("+=", Some(BinaryOp::Add)),
    ("-=", Some(BinaryOp::Sub)),
    ("*=", Some(BinaryOp::Mul)),
    ("/=", Some(BinaryOp::Div)),
    ("%=", Some(BinaryOp::Rem)),
];

pub(crate) fn parse(source: &str) -> Result<Program, SyntaxError> {
    let tokens = tokenize(source, SyntaxTag::PrimitiveCall)?;
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
        if self.tokens.eat_op(";") {
            return Ok(());
        }
        if self.tokens.check_op("{") {
            out.extend(self.braced()?);
            return Ok(());
        }

        let word = match self.tokens.peek_kind() {
            TokenKind::Name(word) => word.clone(),
            _ => String::new(),
        };
        match word.as_str() {
            "function" => out.push(self.function()?),
            "let" | "const" | "var" => self.declaration(out)?,
            "for" => out.push(self.for_each()?),
            "while" => {
                let _ = self.tokens.advance();
                let condition = self.condition()?;
                let body = self.loop_body()?;
                out.push(Stmt::While { condition, body });
            }
            "if" => out.push(self.conditional()?),
            "return" => {
                if !self.in_function {
                    return Err(self.tokens.error_here("'return' outside function"));
                }
                let _ = self.tokens.advance();
                let value = if self.tokens.check_op(";") || self.tokens.check_op("}") {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.end_statement()?;
                out.push(Stmt::Return(value));
            }
            "break" | "continue" => {
                if self.loop_depth == 0 {
                    return Err(self.tokens.error_here(format!("'{word}' outside loop")));
                }
                let _ = self.tokens.advance();
                self.end_statement()?;
                out.push(if word == "break" {
                    Stmt::Break
                } else {
                    Stmt::Continue
                });
            }
            "throw" => {
                let _ = self.tokens.advance();
                let stmt = if self.tokens.eat_word("new") {
                    let class = self.tokens.expect_identifier(KEYWORDS)?;
                    self.tokens.expect_op("(")?;
                    let message = self.expr()?;
                    self.tokens.expect_op(")")?;
                    Stmt::Throw { class, message }
                } else {
                    Stmt::Throw {
                        class: "Error".to_owned(),
                        message: self.expr()?,
                    }
                };
                self.end_statement()?;
                out.push(stmt);
            }
            "else" => return Err(self.tokens.error_here("'else' without a matching 'if'")),
            _ => {
                let stmt = self.expression_statement()?;
                self.end_statement()?;
                out.push(stmt);
            }
        }
        Ok(())
    }

    fn end_statement(&mut self) -> Result<(), SyntaxError> {
        if self.tokens.eat_op(";") {
            return Ok(());
        }
        Err(self.tokens.error_here(format!(
            "expected ';' but found {}",
            self.tokens.describe()
        )))
    }

    fn braced(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mark = self.tokens.depth();
        self.tokens.expect_op("{")?;
        self.tokens.descend()?;
        let mut body = Vec::new();
        while !self.tokens.check_op("}") {
            if self.tokens.at_eof() {
                return Err(self.tokens.error_here("expected '}' but found end of input"));
            }
            self.statement(&mut body)?;
        }
        self.tokens.expect_op("}")?;
        self.tokens.restore(mark);
        Ok(body)
    }

    fn body(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        if self.tokens.check_op("{") {
            return self.braced();
        }
        let mark = self.tokens.depth();
        self.tokens.descend()?;
        let mut body = Vec::new();
        self.statement(&mut body)?;
        self.tokens.restore(mark);
        Ok(body)
    }

    fn loop_body(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.loop_depth += 1;
        let body = self.body();
        self.loop_depth -= 1;
        body
    }

    fn condition(&mut self) -> Result<Expr, SyntaxError> {
        self.tokens.expect_op("(")?;
        let condition = self.expr()?;
        self.tokens.expect_op(")")?;
        Ok(condition)
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
        let body = self.braced();
        (self.loop_depth, self.in_function) = saved;

        Ok(Stmt::Function(FunctionDef {
            name,
            params,
            body: body?,
        }))
    }

    fn pattern(&mut self) -> Result<Pattern, SyntaxError> {
        if !self.tokens.eat_op("[") {
            return Ok(Pattern::Name(self.tokens.expect_identifier(KEYWORDS)?));
        }
        let mut names = Vec::new();
        while !self.tokens.check_op("]") {
            names.push(self.tokens.expect_identifier(KEYWORDS)?);
            if !self.tokens.eat_op(",") {
                break;
            }
        }
        self.tokens.expect_op("]")?;
        Ok(Pattern::Tuple(names))
    }

    fn declaration(&mut self, out: &mut Vec<Stmt>) -> Result<(), SyntaxError> {
        let constant = self.tokens.check_word("const");
        let _ = self.tokens.advance();

        loop {
            let pattern = self.pattern()?;
            let value = if self.tokens.eat_op("=") {
                Some(self.expr()?)
            } else if constant || matches!(pattern, Pattern::Tuple(_)) {
                return Err(self.tokens.error_here("missing initializer in declaration"));
            } else {
                None
            };
            out.push(Stmt::Declare {
                pattern,
                value,
                constant,
            });
            if !self.tokens.eat_op(",") {
                break;
            }
        }
        self.end_statement()
    }

    fn for_each(&mut self) -> Result<Stmt, SyntaxError> {
        let _ = self.tokens.advance();
        self.tokens.expect_op("(")?;
        if !(self.tokens.eat_word("const") || self.tokens.eat_word("let")) {
            return Err(self.tokens.error_here(format!(
                "expected 'const' or 'let' but found {}",
                self.tokens.describe()
            )));
        }
        let pattern = self.pattern()?;
        self.tokens.expect_word("of")?;
        let iterable = self.expr()?;
        self.tokens.expect_op(")")?;
        let body = self.loop_body()?;
        Ok(Stmt::ForEach {
            pattern,
            iterable,
            body,
        })
    }

    /// Parses `if (...) body` and folds any `else if` chain into one arm list.
    fn conditional(&mut self) -> Result<Stmt, SyntaxError> {
        let mut branches = Vec::new();
        let otherwise = loop {
            let _ = self.tokens.advance();
            let condition = self.condition()?;
            branches.push(Branch {
                condition,
                body: self.body()?,
            });

            if !self.tokens.eat_word("else") {
                break None;
            }
            if !self.tokens.check_word("if") {
                break Some(self.body()?);
            }
        };
        Ok(Stmt::If {
            branches,
            otherwise,
        })
    }

    fn expression_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let (line, column) = self.tokens.position();
        let first = self.expr()?;

        for &(symbol, op) in ASSIGNMENT {
            if !self.tokens.eat_op(symbol) {
                continue;
            }
            let value = self.expr()?;
            let target = match first {
                Expr::Name(name) => Target::Name(name),
                Expr::Index { object, index } => Target::Index {
                    object: *object,
                    index: *index,
                },
                Expr::List(items) if op.is_none() => {
                    let names = items
                        .into_iter()
                        .map(|item| match item {
                            Expr::Name(name) => Ok(name),
                            _ => Err(SyntaxError::new(line, column, "invalid destructuring target")),
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Target::Tuple(names)
                }
                _ => {
                    return Err(SyntaxError::new(
                        line,
                        column,
                        "invalid assignment target",
                    ))
                }
            };
            return Ok(Stmt::Assign {
                target,
                op,
                value,
            });
        }

        Ok(Stmt::Expr(first))
    }

    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        let mark = self.tokens.depth();
        self.tokens.descend()?;
        let mut lhs = self.and()?;
        while self.tokens.eat_op("||") {
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
        let mut lhs = self.equality()?;
        while self.tokens.eat_op("&&") {
            self.tokens.descend()?;
            let rhs = self.equality()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.tokens.restore(mark);
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, SyntaxError> {
        let mark = self.tokens.depth();
        let mut lhs = self.relational()?;
        loop {
            let op = if self.tokens.eat_op("===") || self.tokens.eat_op("==") {
                BinaryOp::Eq
            } else if self.tokens.eat_op("!==") || self.tokens.eat_op("!=") {
                BinaryOp::NotEq
            } else {
                self.tokens.restore(mark);
                return Ok(lhs);
            };
            self.tokens.descend()?;
            let rhs = self.relational()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn relational(&mut self) -> Result<Expr, SyntaxError> {
        let mark = self.tokens.depth();
        let mut lhs = self.sum()?;
        loop {
            let op = if self.tokens.eat_op("<=") {
                BinaryOp::LessEq
            } else if self.tokens.eat_op(">=") {
                BinaryOp::GreaterEq
            } else if self.tokens.eat_op("<") {
                BinaryOp::Less
            } else if self.tokens.eat_op(">") {
                BinaryOp::Greater
            } else {
                self.tokens.restore(mark);
                return Ok(lhs);
            };
            self.tokens.descend()?;
            let rhs = self.sum()?;
            lhs = binary(op, lhs, rhs);
        }
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
            } else if self.tokens.eat_op("/") {
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
        let prefix = if self.tokens.eat_op("!") {
            Some(UnaryOp::Not)
        } else if self.tokens.eat_op("-") {
            Some(UnaryOp::Negate)
        } else if self.tokens.eat_word("await") {
            None
        } else {
            return self.postfix();
        };
        let mark = self.tokens.depth();
        self.tokens.descend()?;
        let operand = self.unary()?;
        self.tokens.restore(mark);
        Ok(match prefix {
            Some(UnaryOp::Not) => Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
            Some(UnaryOp::Negate) => negate(operand),
            None => operand,
        })
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
                expr = if name == "length" && !self.tokens.check_op("(") {
                    Expr::Builtin {
                        builtin: Builtin::Len,
                        args: vec![expr],
                    }
                } else {
                    Expr::Attribute {
                        object: Box::new(expr),
                        name,
                    }
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
            TokenKind::Name(word) => self.word(word),
            TokenKind::Op("(") => {
                let _ = self.tokens.advance();
                let inner = self.expr()?;
                self.tokens.expect_op(")")?;
                Ok(inner)
            }
            TokenKind::Op("[") => {
                let _ = self.tokens.advance();
                let mut items = Vec::new();
                while !self.tokens.check_op("]") {
                    items.push(self.expr()?);
                    if !self.tokens.eat_op(",") {
                        break;
                    }
                }
                self.tokens.expect_op("]")?;
                Ok(Expr::List(items))
            }
            TokenKind::Op("{") => {
                let _ = self.tokens.advance();
                self.tokens.expect_op("}")?;
                Ok(Expr::NewMap(None))
            }
            _ => Err(self.tokens.error_here(format!(
                "expected an expression but found {}",
                self.tokens.describe()
            ))),
        }
    }

    fn word(&mut self, word: String) -> Result<Expr, SyntaxError> {
        let literal = match word.as_str() {
            "true" => Some(Literal::Bool(true)),
            "false" => Some(Literal::Bool(false)),
            "null" | "undefined" => Some(Literal::Null),
            _ => None,
        };
        if let Some(literal) = literal {
            let _ = self.tokens.advance();
            return Ok(Expr::Literal(literal));
        }

        match word.as_str() {
            "new" => {
                let _ = self.tokens.advance();
                let class = self.tokens.expect_identifier(KEYWORDS)?;
                self.tokens.expect_op("(")?;
                let source = if self.tokens.check_op(")") {
                    None
                } else {
                    Some(Box::new(self.expr()?))
                };
                self.tokens.expect_op(")")?;
                match class.as_str() {
                    "Set" => Ok(Expr::NewSet(source)),
                    "Map" => Ok(Expr::NewMap(source)),
                    _ => Err(self
                        .tokens
                        .error_here(format!("'new {class}' is only supported after 'throw'"))),
                }
            }
            "Math" | "console" => {
                let _ = self.tokens.advance();
                self.tokens.expect_op(".")?;
                let (line, column) = self.tokens.position();
                let member = self.tokens.expect_identifier(&[])?;
                let builtin = match (word.as_str(), member.as_str()) {
                    ("Math", "abs") => Builtin::Abs,
                    ("Math", "min") => Builtin::Min,
                    ("Math", "max") => Builtin::Max,
                    ("console", "log") => Builtin::Print,
                    _ => {
                        return Err(SyntaxError::new(
                            line,
                            column,
                            format!("unknown member '{word}.{member}'"),
                        ))
                    }
                };
                let args = self.arguments()?;
                Ok(Expr::Builtin { builtin, args })
            }
            _ if KEYWORDS.contains(&word.as_str()) => Err(self
                .tokens
                .error_here(format!("unexpected keyword '{word}'"))),
            _ => {
                let _ = self.tokens.advance();
                Ok(Expr::Name(word))
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn call(callee: Expr, args: Vec<Expr>, position: (u32, u32)) -> Result<Expr, SyntaxError> {
    match callee {
        Expr::Name(name) => {
            if let Some(capability) = Capability::from_primitive(&name) {
                check_arity(position, capability.primitive_name(), capability.arity(), &args)?;
                return Ok(Expr::Capability { capability, args });
            }
            match name.as_str() {
                "String" => Ok(Expr::Builtin {
                    builtin: Builtin::Str,
                    args,
                }),
                "range" => Ok(Expr::Builtin {
                    builtin: Builtin::Range,
                    args,
                }),
                _ => Ok(Expr::Call { name, args }),
            }
        }
        Expr::Attribute { object, name } => {
            let method = match name.as_str() {
                "push" => Method::Push,
                "pop" => Method::Pop,
                "shift" => Method::Shift,
                "unshift" => Method::Unshift,
                "has" | "includes" => Method::Has,
                "add" => Method::Add,
                "remove" => Method::Remove,
                "delete" => Method::Discard,
                "get" => Method::Get,
                "set" => Method::Put,
                "keys" => Method::Keys,
                "values" => Method::Values,
                "slice" if args.is_empty() => Method::Copy,
                "indexOf" => Method::IndexOf,
                _ => Method::Other(name),
            };
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse(source).expect("program parses")
    }

    #[test]
    fn await_is_transparent() {
        let program = parse_ok("await moveUp();");
        assert_eq!(
            program.body,
            vec![Stmt::Expr(Expr::Capability {
                capability: Capability::MoveUp,
                args: Vec::new(),
            })]
        );
    }

    #[test]
    fn let_list_declares_each_name_without_value() {
        let program = parse_ok("let a, b;");
        assert_eq!(program.body.len(), 2);
        assert!(program
            .body
            .iter()
            .all(|stmt| matches!(stmt, Stmt::Declare { value: None, constant: false, .. })));
    }

    #[test]
    fn const_requires_an_initializer() {
        let error = parse("const x;").expect_err("missing initializer");
        assert_eq!(error.message(), "missing initializer in declaration");
    }

    #[test]
    fn destructuring_assignment_targets_names() {
        let program = parse_ok("let a, b; [a, b] = [1, 2];");
        assert!(matches!(
            &program.body[2],
            Stmt::Assign { target: Target::Tuple(names), op: None, .. } if names.len() == 2
        ));
    }

    #[test]
    fn else_if_chains_flatten() {
        let program = parse_ok(
            "if (a) { moveUp(); } else if (b) { moveDown(); } else if (c) moveLeft(); else { moveRight(); }",
        );
        let Stmt::If {
            branches,
            otherwise,
        } = &program.body[0]
        else {
            panic!("expected conditional");
        };
        assert_eq!(branches.len(), 3);
        assert_eq!(otherwise.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn length_and_namespaced_builtins() {
        let program = parse_ok("console.log(Math.max(xs.length, 1));");
        let Stmt::Expr(Expr::Builtin {
            builtin: Builtin::Print,
            args,
        }) = &program.body[0]
        else {
            panic!("expected console.log");
        };
        assert!(matches!(
            &args[0],
            Expr::Builtin { builtin: Builtin::Max, args } if matches!(
                args[0],
                Expr::Builtin { builtin: Builtin::Len, .. }
            )
        ));
    }

    #[test]
    fn missing_semicolon_is_reported_at_the_next_token() {
        let error = parse("let x = 1\nmoveUp();").expect_err("missing semicolon");
        assert_eq!((error.line(), error.column()), (2, 1));
        assert_eq!(error.message(), "expected ';' but found 'moveUp'");
    }

    #[test]
    fn throw_new_error_keeps_the_class() {
        let program = parse_ok("function f() { throw new Error(\"stuck\"); }");
        let Stmt::Function(function) = &program.body[0] else {
            panic!("expected function");
        };
        assert!(matches!(
            &function.body[0],
            Stmt::Throw { class, .. } if class == "Error"
        ));
    }

    #[test]
    fn unknown_math_member_is_a_syntax_error() {
        let error = parse("Math.floor(3);").expect_err("unsupported member");
        assert_eq!(error.message(), "unknown member 'Math.floor'");
    }
}

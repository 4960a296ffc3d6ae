//! Rendering of syntax trees as primitive-call source.

use std::mem;

use crate::ast::{
    BinaryOp, Builtin, Capability, Expr, Literal, LogicalOp, Pattern, Program, Stmt, Target,
    UnaryOp,
};
use crate::error::SyntaxError;
use crate::indented;

const INDENT: &str = "  ";

const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_EQUALITY: u8 = 3;
const PREC_RELATIONAL: u8 = 4;
const PREC_SUM: u8 = 5;
const PREC_TERM: u8 = 6;
const PREC_UNARY: u8 = 7;
const PREC_POSTFIX: u8 = 8;

/// Translates indentation-syntax source into equivalent primitive-call source.
///
/// # Errors
///
/// Returns the [`SyntaxError`] raised while parsing `source`.
pub fn normalize(source: &str) -> Result<String, SyntaxError> {
    let program = indented::parse(source)?;
    Ok(render_primitive(&program))
}

/// Pretty-prints a syntax tree in primitive-call syntax.
///
/// A binding is rendered as a `let` declaration unless the name is certainly
/// bound in the current frame already, in which case it becomes a plain
/// assignment. Both forms then rebind the same local, and a name that may
/// still be unbound keeps falling back to the top-level binding when read.
#[must_use]
pub fn render_primitive(program: &Program) -> String {
    let mut printer = Printer {
        out: String::new(),
        depth: 0,
        bound: Vec::new(),
    };
    printer.scope(&program.body, &[]);
    printer.out
}

struct Printer {
    out: String,
    depth: usize,
    /// Names bound in the current frame on every path reaching this point.
    bound: Vec<String>,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Prints an indented block and returns the names bound at its end.
    fn nested(&mut self, body: &[Stmt]) -> Vec<String> {
        let entry = self.bound.clone();
        self.depth += 1;
        for stmt in body {
            self.stmt(stmt);
        }
        self.depth -= 1;
        mem::replace(&mut self.bound, entry)
    }

    fn scope(&mut self, body: &[Stmt], params: &[String]) {
        let outer = mem::replace(&mut self.bound, params.to_vec());
        for stmt in body {
            self.stmt(stmt);
        }
        self.bound = outer;
    }

    /// Records `names` as bound, reporting whether any was not bound before.
    fn bind(&mut self, names: &[String]) -> bool {
        let mut fresh = false;
        for name in names {
            if !self.bound.contains(name) {
                self.bound.push(name.clone());
                fresh = true;
            }
        }
        fresh
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Comment(text) => self.line(&format!("//{text}")),
            Stmt::Function(function) => {
                self.line(&format!(
                    "function {}({}) {{",
                    function.name,
                    function.params.join(", ")
                ));
                self.depth += 1;
                self.scope(&function.body, &function.params);
                self.depth -= 1;
                self.line("}");
            }
            Stmt::Declare {
                pattern,
                value: Some(value),
                constant: true,
            } => {
                let _ = self.bind(pattern.names());
                self.line(&format!(
                    "const {} = {};",
                    pattern_text(pattern),
                    expr(value)
                ));
            }
            Stmt::Declare {
                pattern,
                value: Some(value),
                constant: false,
            } => {
                let keyword = if self.bind(pattern.names()) { "let " } else { "" };
                self.line(&format!(
                    "{keyword}{} = {};",
                    pattern_text(pattern),
                    expr(value)
                ));
            }
            Stmt::Declare {
                pattern,
                value: None,
                ..
            } => {
                let _ = self.bind(pattern.names());
                self.line(&format!("let {};", pattern.names().join(", ")));
            }
            Stmt::Assign { target, op, value } => {
                let target = match target {
                    Target::Name(name) => name.clone(),
                    Target::Index { object, index } => {
                        format!("{}[{}]", expr_at(object, PREC_POSTFIX), expr(index))
                    }
                    Target::Tuple(names) => format!("[{}]", names.join(", ")),
                };
                let op = op.map_or("=", |op| match op {
                    BinaryOp::Add => "+=",
                    BinaryOp::Sub => "-=",
                    BinaryOp::Mul => "*=",
                    BinaryOp::Div => "/=",
                    BinaryOp::Rem => "%=",
                    _ => "=",
                });
                self.line(&format!("{target} {op} {};", expr(value)));
            }
            Stmt::Expr(value) => self.line(&format!("{};", expr(value))),
            Stmt::If {
                branches,
                otherwise,
            } => {
                let mut common: Option<Vec<String>> = None;
                for (index, branch) in branches.iter().enumerate() {
                    let keyword = if index == 0 { "if" } else { "} else if" };
                    self.line(&format!("{keyword} ({}) {{", expr(&branch.condition)));
                    common = Some(meet(common, self.nested(&branch.body)));
                }
                if let Some(otherwise) = otherwise {
                    self.line("} else {");
                    let after = self.nested(otherwise);
                    self.bound = meet(common, after);
                }
                self.line("}");
            }
            Stmt::While { condition, body } => {
                self.line(&format!("while ({}) {{", expr(condition)));
                let _ = self.nested(body);
                self.line("}");
            }
            Stmt::ForEach {
                pattern,
                iterable,
                body,
            } => {
                self.line(&format!(
                    "for (const {} of {}) {{",
                    pattern_text(pattern),
                    expr(iterable)
                ));
                let entry = self.bound.clone();
                let _ = self.bind(pattern.names());
                let _ = self.nested(body);
                self.bound = entry;
                self.line("}");
            }
            Stmt::Return(None) => self.line("return;"),
            Stmt::Return(Some(value)) => self.line(&format!("return {};", expr(value))),
            Stmt::Break => self.line("break;"),
            Stmt::Continue => self.line("continue;"),
            Stmt::Throw { class, message } => {
                self.line(&format!("throw new {class}({});", expr(message)));
            }
        }
    }
}

/// Names bound on every path: the intersection of `acc` and `next`.
fn meet(acc: Option<Vec<String>>, next: Vec<String>) -> Vec<String> {
    match acc {
        None => next,
        Some(mut acc) => {
            acc.retain(|name| next.contains(name));
            acc
        }
    }
}

fn pattern_text(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Name(name) => name.clone(),
        Pattern::Tuple(names) => format!("[{}]", names.join(", ")),
    }
}

fn precedence(value: &Expr) -> u8 {
    match value {
        Expr::Logical {
            op: LogicalOp::Or, ..
        } => PREC_OR,
        Expr::Logical {
            op: LogicalOp::And,
            ..
        } => PREC_AND,
        Expr::Binary { op, .. } => match op {
            BinaryOp::Eq | BinaryOp::NotEq => PREC_EQUALITY,
            BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
                PREC_RELATIONAL
            }
            BinaryOp::Add | BinaryOp::Sub => PREC_SUM,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => PREC_TERM,
        },
        Expr::Unary { .. } => PREC_UNARY,
        Expr::Literal(Literal::Int(value)) if *value < 0 => PREC_UNARY,
        Expr::Capability { capability, .. } if capability.direction().is_some() => PREC_UNARY,
        _ => PREC_POSTFIX,
    }
}

fn expr(value: &Expr) -> String {
    expr_at(value, 0)
}

fn expr_at(value: &Expr, min: u8) -> String {
    let text = raw(value);
    if precedence(value) < min {
        format!("({text})")
    } else {
        text
    }
}

fn list(items: &[Expr]) -> String {
    items.iter().map(expr).collect::<Vec<_>>().join(", ")
}

fn raw(value: &Expr) -> String {
    match value {
        Expr::Literal(literal) => match literal {
            Literal::Null => "null".to_owned(),
            Literal::Bool(flag) => flag.to_string(),
            Literal::Int(number) => number.to_string(),
            Literal::Str(text) => quote(text),
        },
        Expr::Name(name) => name.clone(),
        Expr::List(items) => format!("[{}]", list(items)),
        Expr::NewSet(source) => format!("new Set({})", source.as_deref().map_or(String::new(), expr)),
        Expr::NewMap(source) => format!("new Map({})", source.as_deref().map_or(String::new(), expr)),
        Expr::Unary { op, operand } => {
            let symbol = match op {
                UnaryOp::Not => "!",
                UnaryOp::Negate => "-",
            };
            format!("{symbol}{}", expr_at(operand, PREC_UNARY))
        }
        Expr::Binary { op, lhs, rhs } => {
            let level = precedence(value);
            let symbol = match op {
                BinaryOp::Eq => "===",
                BinaryOp::NotEq => "!==",
                other => other.symbol(),
            };
            format!(
                "{} {symbol} {}",
                expr_at(lhs, level),
                expr_at(rhs, level + 1)
            )
        }
        Expr::Logical { op, lhs, rhs } => {
            let level = precedence(value);
            let symbol = match op {
                LogicalOp::And => "&&",
                LogicalOp::Or => "||",
            };
            format!(
                "{} {symbol} {}",
                expr_at(lhs, level),
                expr_at(rhs, level + 1)
            )
        }
        Expr::Call { name, args } => format!("{name}({})", list(args)),
        Expr::Builtin { builtin, args } => match (builtin, args.as_slice()) {
            (Builtin::Len, [target]) => format!("{}.length", expr_at(target, PREC_POSTFIX)),
            (Builtin::Len, _) => format!("len({})", list(args)),
            (Builtin::Str, _) => format!("String({})", list(args)),
            (Builtin::Range, _) => format!("range({})", list(args)),
            (Builtin::Abs, _) => format!("Math.abs({})", list(args)),
            (Builtin::Min, _) => format!("Math.min({})", list(args)),
            (Builtin::Max, _) => format!("Math.max({})", list(args)),
            (Builtin::Print, _) => format!("console.log({})", list(args)),
        },
        Expr::Capability { capability, args } => capability_call(*capability, args),
        Expr::Method {
            receiver,
            method,
            args,
        } => format!(
            "{}.{}({})",
            expr_at(receiver, PREC_POSTFIX),
            method.primitive_name(),
            list(args)
        ),
        Expr::Index { object, index } => {
            format!("{}[{}]", expr_at(object, PREC_POSTFIX), expr(index))
        }
        Expr::Attribute { object, name } => {
            format!("{}.{name}", expr_at(object, PREC_POSTFIX))
        }
    }
}

fn capability_call(capability: Capability, args: &[Expr]) -> String {
    let call = format!("{}({})", capability.primitive_name(), list(args));
    if capability.direction().is_some() {
        format!("await {call}")
    } else {
        call
    }
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            '\0' => quoted.push_str("\\0"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive;

    #[test]
    fn translates_blocks_bindings_and_tokens() {
        let source = "\
# walk right until blocked
def walk(steps):
    count = 0
    while count < steps and not is_wall(get_position()[\"x\"] + 1, get_position()[\"y\"]):
        move_right()
        count += 1
    return count

total = walk(3)
if total == 3:
    print(\"walked \" + str(total))
elif total in {0, 1}:
    pass
else:
    raise RuntimeError(\"short\")
";
        let expected = "\
// walk right until blocked
function walk(steps) {
  let count = 0;
  while (count < steps && !isWall(getPosition()[\"x\"] + 1, getPosition()[\"y\"])) {
    await moveRight();
    count += 1;
  }
  return count;
}
let total = walk(3);
if (total === 3) {
  console.log(\"walked \" + String(total));
} else if (new Set([0, 1]).has(total)) {
} else {
  throw new RuntimeError(\"short\");
}
";
        assert_eq!(normalize(source).expect("normalizes"), expected);
    }

    #[test]
    fn tuples_become_arrays_and_destructuring() {
        let source = "\
for dx, dy in [(1, 0), (0, -1)]:
    x, y = dx, dy
";
        let expected = "\
for (const [dx, dy] of [[1, 0], [0, -1]]) {
  let [x, y] = [dx, dy];
}
";
        assert_eq!(normalize(source).expect("normalizes"), expected);
    }

    #[test]
    fn parameters_are_not_redeclared() {
        let normalized = normalize("def f(a):\n    a = a + 1\n    b = a\n    return b\n")
            .expect("normalizes");
        assert!(normalized.contains("  a = a + 1;\n"));
        assert!(normalized.contains("  let b = a;\n"));
        assert!(!normalized.contains("let a"));
    }

    #[test]
    fn bindings_on_some_paths_stay_declarations() {
        let normalized = normalize("flag = False\nif flag:\n    y = 1\ny = 2\n").expect("normalizes");
        assert_eq!(
            normalized,
            "let flag = false;\nif (flag) {\n  let y = 1;\n}\nlet y = 2;\n"
        );
    }

    #[test]
    fn bindings_on_every_branch_become_assignments() {
        let normalized = normalize("if a:\n    y = 1\nelif b:\n    y = 2\n    z = 0\nelse:\n    y = 3\ny = 4\nz = 5\n")
            .expect("normalizes");
        assert!(normalized.ends_with("}\ny = 4;\nlet z = 5;\n"), "{normalized}");
    }

    #[test]
    fn function_bodies_start_with_only_their_parameters_bound() {
        let normalized =
            normalize("x = 5\ndef f():\n    print(x)\n    x = 1\nf()\n").expect("normalizes");
        assert!(normalized.contains("  console.log(x);\n  let x = 1;\n"), "{normalized}");
    }

    #[test]
    fn parenthesizes_by_precedence() {
        let normalized =
            normalize("x = (1 + 2) * 3\ny = -(x - 1)\nz = len(q + [1])\n").expect("normalizes");
        assert!(normalized.contains("x = (1 + 2) * 3;"));
        assert!(normalized.contains("y = -(x - 1);"));
        assert!(normalized.contains("z = (q + [1]).length;"));
    }

    #[test]
    fn collection_methods_are_renamed() {
        let normalized = normalize(
            "q = [start]\nq.append(1)\nq.insert(0, 2)\nhead = q.pop(0)\nseen = set()\nseen.add(head)\nd = {}\nv = d.get(1, 0)\n",
        )
        .expect("normalizes");
        for fragment in [
            "q.push(1);",
            "q.unshift(2);",
            "head = q.shift();",
            "seen = new Set();",
            "seen.add(head);",
            "d = new Map();",
            "v = d.get(1, 0);",
        ] {
            assert!(
                normalized.contains(fragment),
                "missing {fragment} in\n{normalized}"
            );
        }
    }

    #[test]
    fn normalized_output_parses_to_the_same_tree_modulo_declarations() {
        let source = "\
def route(limit):
    steps = []
    for i in range(limit):
        if i % 2 == 0 or i > 5:
            steps.append(i // 2)
        else:
            continue
    return steps
";
        let normalized = normalize(source).expect("normalizes");
        let reparsed = primitive::parse(&normalized).expect("normalized output parses");
        assert_eq!(render_primitive(&reparsed), normalized);
    }

    #[test]
    fn syntax_errors_pass_through() {
        let error = normalize("if x\n    move_up()\n").expect_err("missing colon");
        assert_eq!(error.line(), 1);
    }
}

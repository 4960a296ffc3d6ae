//! Runtime values shared by both authoring syntaxes.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};
use std::mem;
use std::rc::Rc;

use maze_lab_system_script::ast::Literal;

use crate::error::RuntimeError;

const MAX_RENDER_DEPTH: usize = 16;
const MAX_RENDER_LEN: usize = 4096;

/// Deepest collection nesting compared or hashed before the run faults.
pub(crate) const MAX_NESTING_DEPTH: usize = 256;

/// Dynamically typed value. Collections are shared references.
#[derive(Clone, Debug)]
pub(crate) enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Set(Rc<RefCell<BTreeSet<Key>>>),
    Map(Rc<RefCell<BTreeMap<Key, Value>>>),
}

/// Immutable structural snapshot of a value, used for set members and map keys.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Key {
    Null,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    List(Vec<Key>),
}

impl Value {
    pub(crate) fn from_literal(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Self::Null,
            Literal::Bool(flag) => Self::Bool(*flag),
            Literal::Int(number) => Self::Int(*number),
            Literal::Str(text) => Self::str(text),
        }
    }

    pub(crate) fn str(text: &str) -> Self {
        Self::Str(Rc::from(text))
    }

    pub(crate) fn list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    pub(crate) fn set(members: BTreeSet<Key>) -> Self {
        Self::Set(Rc::new(RefCell::new(members)))
    }

    pub(crate) fn map(entries: BTreeMap<Key, Value>) -> Self {
        Self::Map(Rc::new(RefCell::new(entries)))
    }

    pub(crate) const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    /// `false`, `null`, `0`, the empty string and empty collections are falsy.
    pub(crate) fn truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(flag) => *flag,
            Self::Int(number) => *number != 0,
            Self::Str(text) => !text.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Set(members) => !members.borrow().is_empty(),
            Self::Map(entries) => !entries.borrow().is_empty(),
        }
    }

    pub(crate) fn to_key(&self) -> Result<Key, RuntimeError> {
        self.key_at(0)
    }

    fn key_at(&self, depth: usize) -> Result<Key, RuntimeError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(RuntimeError::NestingDepth);
        }
        Ok(match self {
            Self::Null => Key::Null,
            Self::Bool(flag) => Key::Bool(*flag),
            Self::Int(number) => Key::Int(*number),
            Self::Str(text) => Key::Str(Rc::clone(text)),
            Self::List(items) => Key::List(
                items
                    .borrow()
                    .iter()
                    .map(|item| item.key_at(depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Set(_) | Self::Map(_) => return Err(RuntimeError::Unhashable(self.type_name())),
        })
    }

    /// Structural equality; values of different types are never equal.
    pub(crate) fn equals(&self, other: &Value) -> Result<bool, RuntimeError> {
        self.equals_at(other, 0)
    }

    fn equals_at(&self, other: &Value, depth: usize) -> Result<bool, RuntimeError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(RuntimeError::NestingDepth);
        }
        Ok(match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.equals_at(y, depth + 1)? {
                        return Ok(false);
                    }
                }
                true
            }
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Self::Map(a), Self::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    if ka != kb || !va.equals_at(vb, depth + 1)? {
                        return Ok(false);
                    }
                }
                true
            }
            _ => false,
        })
    }

    /// Snapshot of the elements visited when iterating; maps yield their keys.
    pub(crate) fn elements(&self) -> Result<Vec<Value>, RuntimeError> {
        match self {
            Self::List(items) => Ok(items.borrow().clone()),
            Self::Set(members) => Ok(members.borrow().iter().map(Key::to_value).collect()),
            Self::Map(entries) => Ok(entries.borrow().keys().map(Key::to_value).collect()),
            Self::Str(text) => Ok(text
                .chars()
                .map(|ch| Self::str(ch.encode_utf8(&mut [0; 4])))
                .collect()),
            _ => Err(RuntimeError::NotIterable(self.type_name())),
        }
    }

    fn write_nested(&self, out: &mut Rendered, depth: usize) -> fmt::Result {
        if depth > MAX_RENDER_DEPTH {
            return out.write_str("...");
        }
        match self {
            Self::Null => out.write_str("null"),
            Self::Bool(flag) => write!(out, "{flag}"),
            Self::Int(number) => write!(out, "{number}"),
            Self::Str(text) => write!(
                out,
                "\"{}\"",
                text.replace('\\', "\\\\").replace('"', "\\\"")
            ),
            Self::List(items) => {
                out.write_str("[")?;
                for (index, item) in items.borrow().iter().enumerate() {
                    if index > 0 {
                        out.write_str(", ")?;
                    }
                    item.write_nested(out, depth + 1)?;
                }
                out.write_str("]")
            }
            Self::Set(members) => {
                out.write_str("{")?;
                for (index, member) in members.borrow().iter().enumerate() {
                    if index > 0 {
                        out.write_str(", ")?;
                    }
                    member.to_value().write_nested(out, depth + 1)?;
                }
                out.write_str("}")
            }
            Self::Map(entries) => {
                out.write_str("{")?;
                for (index, (key, value)) in entries.borrow().iter().enumerate() {
                    if index > 0 {
                        out.write_str(", ")?;
                    }
                    key.to_value().write_nested(out, depth + 1)?;
                    out.write_str(": ")?;
                    value.write_nested(out, depth + 1)?;
                }
                out.write_str("}")
            }
        }
    }

    /// Moves the contents of a uniquely owned collection into `pending`.
    fn detach(&mut self, pending: &mut Vec<Value>) {
        match self {
            Self::List(items) if Rc::strong_count(items) == 1 => {
                if let Ok(mut items) = items.try_borrow_mut() {
                    pending.append(&mut items);
                }
            }
            Self::Map(entries) if Rc::strong_count(entries) == 1 => {
                if let Ok(mut entries) = entries.try_borrow_mut() {
                    pending.extend(mem::take(&mut *entries).into_values());
                }
            }
            _ => {}
        }
    }
}

/// Tears nested collections down iteratively so deep nesting cannot exhaust the stack.
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach(&mut pending);
        while let Some(mut value) = pending.pop() {
            value.detach(&mut pending);
        }
    }
}

/// Text sink that refuses writes past [`MAX_RENDER_LEN`] bytes.
#[derive(Default)]
struct Rendered {
    text: String,
}

impl fmt::Write for Rendered {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.text.len() + s.len() > MAX_RENDER_LEN {
            return Err(fmt::Error);
        }
        self.text.push_str(s);
        Ok(())
    }
}

/// Strings render raw at the top level and quoted inside collections.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(text) => f.write_str(text),
            other => {
                let mut out = Rendered::default();
                let complete = other.write_nested(&mut out, 0).is_ok();
                f.write_str(&out.text)?;
                if complete {
                    Ok(())
                } else {
                    f.write_str("...")
                }
            }
        }
    }
}

impl Key {
    pub(crate) fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Int(number) => Value::Int(*number),
            Self::Str(text) => Value::Str(Rc::clone(text)),
            Self::List(items) => Value::list(items.iter().map(Key::to_value).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn truthiness_follows_the_shared_rule() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(!Value::str("").truthy());
        assert!(!ints(&[]).truthy());
        assert!(!Value::map(BTreeMap::new()).truthy());
        assert!(Value::Int(-1).truthy());
        assert!(ints(&[0]).truthy());
    }

    #[test]
    fn equality_is_structural_and_type_strict() {
        assert_eq!(ints(&[1, 2]).equals(&ints(&[1, 2])), Ok(true));
        assert_eq!(ints(&[1, 2]).equals(&ints(&[2, 1])), Ok(false));
        assert_eq!(Value::Int(1).equals(&Value::Bool(true)), Ok(false));
        assert_eq!(Value::Int(0).equals(&Value::Null), Ok(false));
    }

    #[test]
    fn lists_become_keys_but_maps_do_not() {
        let key = ints(&[3, 4]).to_key().expect("lists are hashable");
        assert_eq!(key, Key::List(vec![Key::Int(3), Key::Int(4)]));
        assert_eq!(
            Value::map(BTreeMap::new()).to_key(),
            Err(RuntimeError::Unhashable("map"))
        );
    }

    #[test]
    fn collections_are_shared_references() {
        let first = ints(&[1]);
        let alias = first.clone();
        if let Value::List(items) = &alias {
            items.borrow_mut().push(Value::Int(2));
        }
        assert_eq!(first.equals(&ints(&[1, 2])), Ok(true));
    }

    #[test]
    fn rendering_quotes_nested_strings_only() {
        let mut entries = BTreeMap::new();
        let _ = entries.insert(Key::Str(Rc::from("x")), Value::Int(1));
        let nested = Value::list(vec![Value::str("a"), Value::map(entries), Value::Null]);

        assert_eq!(Value::str("plain").to_string(), "plain");
        assert_eq!(nested.to_string(), r#"["a", {"x": 1}, null]"#);
        assert_eq!(Value::Bool(true).to_string(), "true");
    }

    fn self_referential() -> Value {
        let list = ints(&[]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        list
    }

    #[test]
    fn cyclic_lists_fault_instead_of_recursing() {
        let (a, b) = (self_referential(), self_referential());

        assert_eq!(a.equals(&a), Ok(true));
        assert_eq!(a.equals(&b), Err(RuntimeError::NestingDepth));
        assert_eq!(a.to_key(), Err(RuntimeError::NestingDepth));
    }

    #[test]
    fn rendering_is_bounded_in_depth_and_width() {
        let deep = self_referential().to_string();
        assert!(deep.starts_with("[[[["));
        assert!(deep.contains("..."));

        let wide = ints(&[]);
        if let Value::List(items) = &wide {
            let mut items = items.borrow_mut();
            items.push(wide.clone());
            items.push(wide.clone());
        }
        let rendered = wide.to_string();
        assert!(rendered.len() <= MAX_RENDER_LEN + 3);
        assert!(rendered.ends_with("..."));
    }

    #[test]
    fn deeply_nested_values_drop_without_recursion() {
        let mut value = Value::Null;
        for _ in 0..200_000 {
            value = Value::list(vec![value]);
        }
        let mut entries = BTreeMap::new();
        let _ = entries.insert(Key::Int(0), value);
        drop(Value::map(entries));
    }
}

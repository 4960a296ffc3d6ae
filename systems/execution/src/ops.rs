//! Operators, builtins and collection methods.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use maze_lab_system_script::ast::{BinaryOp, Builtin, Method, UnaryOp};

use crate::error::RuntimeError;
use crate::value::{Key, Value};

/// Upper bound on the number of elements `range` may produce.
const MAX_RANGE_LEN: i128 = 1_000_000;

pub(crate) fn unary(op: UnaryOp, operand: &Value) -> Result<Value, RuntimeError> {
    match (op, operand) {
        (UnaryOp::Not, operand) => Ok(Value::Bool(!operand.truthy())),
        (UnaryOp::Negate, Value::Int(number)) => number
            .checked_neg()
            .map(Value::Int)
            .ok_or(RuntimeError::Overflow),
        (UnaryOp::Negate, other) => Err(RuntimeError::NegateOperand(other.type_name())),
    }
}

fn operand_error(op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::OperandTypes {
        op: op.symbol(),
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Ordering, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => Err(operand_error(op, lhs, rhs)),
    }
}

/// Floor division and remainder with the sign of the divisor.
fn divide(op: BinaryOp, a: i64, b: i64) -> Result<i64, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    let quotient = a.checked_div(b).ok_or(RuntimeError::Overflow)?;
    let remainder = a.checked_rem(b).ok_or(RuntimeError::Overflow)?;
    let adjust = remainder != 0 && (remainder < 0) != (b < 0);
    Ok(match (op, adjust) {
        (BinaryOp::Div, true) => quotient - 1,
        (BinaryOp::Rem, true) => remainder + b,
        (BinaryOp::Div, false) => quotient,
        _ => remainder,
    })
}

pub(crate) fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(lhs.equals(rhs)?)),
        BinaryOp::NotEq => Ok(Value::Bool(!lhs.equals(rhs)?)),
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            let ordering = compare(op, lhs, rhs)?;
            Ok(Value::Bool(match op {
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEq => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_add(*b).map(Value::Int).ok_or(RuntimeError::Overflow)
            }
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::str(&format!("{lhs}{rhs}"))),
            (Value::List(a), Value::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::list(items))
            }
            _ => Err(operand_error(op, lhs, rhs)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (Value::Int(a), Value::Int(b)) = (lhs, rhs) else {
                return Err(operand_error(op, lhs, rhs));
            };
            let result = match op {
                BinaryOp::Sub => a.checked_sub(*b).ok_or(RuntimeError::Overflow)?,
                BinaryOp::Mul => a.checked_mul(*b).ok_or(RuntimeError::Overflow)?,
                _ => divide(op, *a, *b)?,
            };
            Ok(Value::Int(result))
        }
    }
}

/// Resolves a possibly negative sequence index against `len`.
fn position(index: i64, len: usize) -> Result<usize, RuntimeError> {
    let len = i64::try_from(len).map_err(|_| RuntimeError::Overflow)?;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).map_err(|_| RuntimeError::IndexOutOfRange(index))
    } else {
        Err(RuntimeError::IndexOutOfRange(index))
    }
}

fn sequence_index(container: &Value, index: &Value) -> Result<i64, RuntimeError> {
    match index {
        Value::Int(number) => Ok(*number),
        other => Err(RuntimeError::IndexType {
            container: container.type_name(),
            found: other.type_name(),
        }),
    }
}

fn missing_key(key: &Value) -> RuntimeError {
    let rendered = match key {
        Value::Str(text) => format!("\"{text}\""),
        other => other.to_string(),
    };
    RuntimeError::MissingKey(rendered)
}

pub(crate) fn load_index(object: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            let slot = position(sequence_index(object, index)?, items.len())?;
            Ok(items[slot].clone())
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let slot = position(sequence_index(object, index)?, chars.len())?;
            Ok(Value::str(chars[slot].encode_utf8(&mut [0; 4])))
        }
        Value::Map(entries) => entries
            .borrow()
            .get(&index.to_key()?)
            .cloned()
            .ok_or_else(|| missing_key(index)),
        other => Err(RuntimeError::NotSubscriptable(other.type_name())),
    }
}

pub(crate) fn store_index(object: &Value, index: &Value, value: Value) -> Result<(), RuntimeError> {
    match object {
        Value::List(items) => {
            let slot = position(sequence_index(object, index)?, items.borrow().len())?;
            items.borrow_mut()[slot] = value;
            Ok(())
        }
        Value::Map(entries) => {
            let key = index.to_key()?;
            let _ = entries.borrow_mut().insert(key, value);
            Ok(())
        }
        other => Err(RuntimeError::NotAssignable(other.type_name())),
    }
}

pub(crate) fn load_attribute(object: &Value, name: &str) -> Result<Value, RuntimeError> {
    match object {
        Value::Map(entries) => {
            let key = Key::Str(Rc::from(name));
            entries
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| missing_key(&Value::str(name)))
        }
        other => Err(RuntimeError::NoAttribute {
            name: name.to_owned(),
            type_name: other.type_name(),
        }),
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), RuntimeError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else {
        format!("{min} to {max}")
    };
    Err(RuntimeError::Arity {
        name: name.to_owned(),
        expected,
        given: args.len(),
    })
}

fn int_argument(name: &'static str, value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(number) => Ok(*number),
        other => Err(RuntimeError::ArgumentType {
            name,
            expected: "int",
            found: other.type_name(),
        }),
    }
}

/// Index of the first element structurally equal to `needle`.
fn find(items: &[Value], needle: &Value) -> Result<Option<usize>, RuntimeError> {
    for (slot, item) in items.iter().enumerate() {
        if item.equals(needle)? {
            return Ok(Some(slot));
        }
    }
    Ok(None)
}

/// Evaluates every builtin except `print`, which the interpreter owns.
pub(crate) fn builtin(builtin: Builtin, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let name = builtin.name();
    match builtin {
        Builtin::Len => {
            arity(name, &args, 1, 1)?;
            let len = match &args[0] {
                Value::Str(text) => text.chars().count(),
                Value::List(items) => items.borrow().len(),
                Value::Set(members) => members.borrow().len(),
                Value::Map(entries) => entries.borrow().len(),
                other => return Err(RuntimeError::NoLength(other.type_name())),
            };
            i64::try_from(len)
                .map(Value::Int)
                .map_err(|_| RuntimeError::Overflow)
        }
        Builtin::Str => {
            arity(name, &args, 1, 1)?;
            Ok(Value::str(&args[0].to_string()))
        }
        Builtin::Range => {
            arity(name, &args, 1, 3)?;
            let bounds = args
                .iter()
                .map(|arg| int_argument(name, arg))
                .collect::<Result<Vec<_>, _>>()?;
            let (start, stop, step) = match bounds.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => (0, 0, 1),
            };
            range(start, stop, step)
        }
        Builtin::Abs => {
            arity(name, &args, 1, 1)?;
            int_argument(name, &args[0])?
                .checked_abs()
                .map(Value::Int)
                .ok_or(RuntimeError::Overflow)
        }
        Builtin::Min | Builtin::Max => {
            arity(name, &args, 1, usize::MAX)?;
            let candidates = if args.len() == 1 {
                args[0].elements()?
            } else {
                args
            };
            extreme(builtin, candidates)
        }
        Builtin::Print => Ok(Value::Null),
    }
}

fn range(start: i64, stop: i64, step: i64) -> Result<Value, RuntimeError> {
    if step == 0 {
        return Err(RuntimeError::ZeroStep);
    }
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let span = if step > 0 { stop - start } else { start - stop };
    let count = if span <= 0 {
        0
    } else {
        (span + step.abs() - 1) / step.abs()
    };
    if count > MAX_RANGE_LEN {
        return Err(RuntimeError::RangeTooLarge(count));
    }

    let mut items = Vec::new();
    let mut current = start;
    for _ in 0..count {
        let value = i64::try_from(current).map_err(|_| RuntimeError::Overflow)?;
        items.push(Value::Int(value));
        current += step;
    }
    Ok(Value::list(items))
}

fn extreme(builtin: Builtin, candidates: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut candidates = candidates.into_iter();
    let Some(mut best) = candidates.next() else {
        return Err(RuntimeError::EmptySequence(builtin.name()));
    };
    for candidate in candidates {
        let ordering = compare(BinaryOp::Less, &candidate, &best)?;
        let better = match builtin {
            Builtin::Min => ordering.is_lt(),
            _ => ordering.is_gt(),
        };
        if better {
            best = candidate;
        }
    }
    Ok(best)
}

/// Calls a collection or string method.
pub(crate) fn call_method(
    receiver: &Value,
    method: &Method,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let name = method.primitive_name();
    let unsupported = || RuntimeError::NoMethod {
        method: name.to_owned(),
        type_name: receiver.type_name(),
    };

    match receiver {
        Value::List(items) => match method {
            Method::Push => {
                arity(name, &args, 1, 1)?;
                items.borrow_mut().extend(args);
                Ok(Value::Null)
            }
            Method::Pop => {
                arity(name, &args, 0, 0)?;
                items.borrow_mut().pop().ok_or(RuntimeError::EmptyPop)
            }
            Method::Shift => {
                arity(name, &args, 0, 0)?;
                let mut items = items.borrow_mut();
                if items.is_empty() {
                    return Err(RuntimeError::EmptyPop);
                }
                Ok(items.remove(0))
            }
            Method::Unshift => {
                arity(name, &args, 1, 1)?;
                let mut args = args;
                items.borrow_mut().insert(0, args.remove(0));
                Ok(Value::Null)
            }
            Method::Has => {
                arity(name, &args, 1, 1)?;
                let found = find(&items.borrow(), &args[0])?;
                Ok(Value::Bool(found.is_some()))
            }
            Method::IndexOf => {
                arity(name, &args, 1, 1)?;
                let found = find(&items.borrow(), &args[0])?;
                match found {
                    Some(slot) => i64::try_from(slot)
                        .map(Value::Int)
                        .map_err(|_| RuntimeError::Overflow),
                    None => Ok(Value::Int(-1)),
                }
            }
            Method::Remove | Method::Discard => {
                arity(name, &args, 1, 1)?;
                let found = find(&items.borrow(), &args[0])?;
                match (found, method) {
                    (Some(slot), _) => {
                        let _ = items.borrow_mut().remove(slot);
                    }
                    (None, Method::Remove) => return Err(RuntimeError::NotFound),
                    (None, _) => {}
                }
                Ok(Value::Null)
            }
            Method::Copy => {
                arity(name, &args, 0, 0)?;
                Ok(Value::list(items.borrow().clone()))
            }
            _ => Err(unsupported()),
        },
        Value::Set(members) => match method {
            Method::Add => {
                arity(name, &args, 1, 1)?;
                let key = args[0].to_key()?;
                let _ = members.borrow_mut().insert(key);
                Ok(Value::Null)
            }
            Method::Has => {
                arity(name, &args, 1, 1)?;
                let key = args[0].to_key()?;
                Ok(Value::Bool(members.borrow().contains(&key)))
            }
            Method::Remove | Method::Discard => {
                arity(name, &args, 1, 1)?;
                let key = args[0].to_key()?;
                let removed = members.borrow_mut().remove(&key);
                if !removed && matches!(method, Method::Remove) {
                    return Err(RuntimeError::NotMember);
                }
                Ok(Value::Null)
            }
            Method::Copy => {
                arity(name, &args, 0, 0)?;
                Ok(Value::set(members.borrow().clone()))
            }
            _ => Err(unsupported()),
        },
        Value::Map(entries) => match method {
            Method::Get => {
                arity(name, &args, 1, 2)?;
                let key = args[0].to_key()?;
                let fallback = args.get(1).cloned().unwrap_or(Value::Null);
                Ok(entries.borrow().get(&key).cloned().unwrap_or(fallback))
            }
            Method::Put => {
                arity(name, &args, 2, 2)?;
                let key = args[0].to_key()?;
                let _ = entries.borrow_mut().insert(key, args[1].clone());
                Ok(Value::Null)
            }
            Method::Has => {
                arity(name, &args, 1, 1)?;
                let key = args[0].to_key()?;
                Ok(Value::Bool(entries.borrow().contains_key(&key)))
            }
            Method::Remove | Method::Discard => {
                arity(name, &args, 1, 1)?;
                let key = args[0].to_key()?;
                let removed = entries.borrow_mut().remove(&key);
                if removed.is_none() && matches!(method, Method::Remove) {
                    return Err(missing_key(&args[0]));
                }
                Ok(Value::Null)
            }
            Method::Keys => {
                arity(name, &args, 0, 0)?;
                Ok(Value::list(entries.borrow().keys().map(Key::to_value).collect()))
            }
            Method::Values => {
                arity(name, &args, 0, 0)?;
                Ok(Value::list(entries.borrow().values().cloned().collect()))
            }
            Method::Copy => {
                arity(name, &args, 0, 0)?;
                Ok(Value::map(entries.borrow().clone()))
            }
            _ => Err(unsupported()),
        },
        Value::Str(text) => match (method, args.as_slice()) {
            (Method::Has, [Value::Str(needle)]) => Ok(Value::Bool(text.contains(&**needle))),
            (Method::IndexOf, [Value::Str(needle)]) => Ok(Value::Int(
                text.find(&**needle)
                    .and_then(|byte| i64::try_from(text[..byte].chars().count()).ok())
                    .unwrap_or(-1),
            )),
            (Method::Has | Method::IndexOf, [other]) => Err(RuntimeError::ArgumentType {
                name: if matches!(method, Method::Has) {
                    "has"
                } else {
                    "indexOf"
                },
                expected: "str",
                found: other.type_name(),
            }),
            (Method::Has | Method::IndexOf, _) => {
                arity(name, &args, 1, 1)?;
                Err(unsupported())
            }
            _ => Err(unsupported()),
        },
        _ => Err(unsupported()),
    }
}

/// Builds a set from an iterable, or an empty set from `null`.
pub(crate) fn build_set(source: &Value) -> Result<Value, RuntimeError> {
    let mut members = BTreeSet::new();
    if !matches!(source, Value::Null) {
        for item in source.elements()? {
            let _ = members.insert(item.to_key()?);
        }
    }
    Ok(Value::set(members))
}

/// Builds a map from an iterable of `[key, value]` pairs, or an empty map from `null`.
pub(crate) fn build_map(source: &Value) -> Result<Value, RuntimeError> {
    let mut entries = BTreeMap::new();
    if !matches!(source, Value::Null) {
        for entry in source.elements()? {
            let Value::List(pair) = &entry else {
                return Err(RuntimeError::MapEntry);
            };
            let pair = pair.borrow();
            let [key, value] = pair.as_slice() else {
                return Err(RuntimeError::MapEntry);
            };
            let _ = entries.insert(key.to_key()?, value.clone());
        }
    }
    Ok(Value::map(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: &Value) -> i64 {
        match value {
            Value::Int(number) => *number,
            other => panic!("expected int, got {other}"),
        }
    }

    #[test]
    fn division_floors_toward_negative_infinity() {
        let div = |a, b| int(&binary(BinaryOp::Div, &Value::Int(a), &Value::Int(b)).expect("divides"));
        let rem = |a, b| int(&binary(BinaryOp::Rem, &Value::Int(a), &Value::Int(b)).expect("divides"));

        assert_eq!(div(7, 2), 3);
        assert_eq!(div(-7, 2), -4);
        assert_eq!(rem(-7, 2), 1);
        assert_eq!(rem(7, -2), -1);
    }

    #[test]
    fn arithmetic_faults_are_errors() {
        assert_eq!(
            binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).err(),
            Some(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            binary(BinaryOp::Add, &Value::Int(i64::MAX), &Value::Int(1)).err(),
            Some(RuntimeError::Overflow)
        );
        assert_eq!(
            binary(BinaryOp::Sub, &Value::str("a"), &Value::Int(1))
                .err()
                .map(|error| error.to_string()),
            Some("unsupported operand types for -: str and int".to_owned())
        );
    }

    #[test]
    fn string_concatenation_renders_the_other_operand() {
        let joined = binary(BinaryOp::Add, &Value::str("moves: "), &Value::Int(4)).expect("joins");
        assert_eq!(joined.to_string(), "moves: 4");
    }

    #[test]
    fn range_matches_half_open_semantics() {
        let rendered = |args: Vec<Value>| builtin(Builtin::Range, args).expect("range").to_string();
        assert_eq!(rendered(vec![Value::Int(3)]), "[0, 1, 2]");
        assert_eq!(rendered(vec![Value::Int(5), Value::Int(0), Value::Int(-2)]), "[5, 3, 1]");
        assert_eq!(rendered(vec![Value::Int(2), Value::Int(2)]), "[]");
        assert_eq!(
            builtin(Builtin::Range, vec![Value::Int(0), Value::Int(1), Value::Int(0)]).err(),
            Some(RuntimeError::ZeroStep)
        );
    }

    #[test]
    fn negative_indices_count_from_the_back() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(int(&load_index(&list, &Value::Int(-1)).expect("in range")), 3);
        assert_eq!(
            load_index(&list, &Value::Int(5)).err().map(|error| error.to_string()),
            Some("index 5 out of range".to_owned())
        );
    }

    #[test]
    fn list_methods_mutate_in_place() {
        let list = Value::list(Vec::new());
        let _ = call_method(&list, &Method::Push, vec![Value::Int(1)]).expect("push");
        let _ = call_method(&list, &Method::Unshift, vec![Value::Int(0)]).expect("unshift");
        assert_eq!(list.to_string(), "[0, 1]");
        assert_eq!(int(&call_method(&list, &Method::Shift, Vec::new()).expect("shift")), 0);
        assert_eq!(int(&call_method(&list, &Method::Pop, Vec::new()).expect("pop")), 1);
        assert_eq!(
            call_method(&list, &Method::Pop, Vec::new()).err(),
            Some(RuntimeError::EmptyPop)
        );
    }

    #[test]
    fn unknown_methods_name_the_receiver_type() {
        let error = call_method(&Value::Int(3), &Method::Push, vec![Value::Int(1)])
            .expect_err("ints have no methods");
        assert_eq!(error.to_string(), "cannot call method 'push' on int");
    }

    #[test]
    fn maps_use_structural_keys() {
        let map = build_map(&Value::list(vec![Value::list(vec![
            Value::list(vec![Value::Int(1), Value::Int(1)]),
            Value::str("start"),
        ])]))
        .expect("map builds");
        let lookup = Value::list(vec![Value::Int(1), Value::Int(1)]);

        let found = call_method(&map, &Method::Has, vec![lookup.clone()]).expect("has");
        assert!(found.truthy());
        assert_eq!(load_index(&map, &lookup).expect("present").to_string(), "start");
        assert_eq!(
            load_index(&map, &Value::str("x")).err().map(|error| error.to_string()),
            Some("key \"x\" not found".to_owned())
        );
    }

    #[test]
    fn min_and_max_accept_a_collection_or_arguments() {
        let list = Value::list(vec![Value::Int(4), Value::Int(-2), Value::Int(9)]);
        assert_eq!(int(&builtin(Builtin::Min, vec![list]).expect("min")), -2);
        assert_eq!(
            int(&builtin(Builtin::Max, vec![Value::Int(1), Value::Int(7)]).expect("max")),
            7
        );
        assert_eq!(
            builtin(Builtin::Max, vec![Value::list(Vec::new())]).err(),
            Some(RuntimeError::EmptySequence("max"))
        );
    }
}

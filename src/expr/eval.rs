//! Expression evaluation over an explicit snapshot
//!
//! Semantics follow the usual scripting conventions: `+` concatenates when
//! a side is a string, comparisons work on numbers or strings, `&&`/`||`
//! return operand values. Type mismatches evaluate to `null`, never panic.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use super::ast::{BinaryOp, Expr, UnaryOp};
use crate::path::{lookup, step};

/// Host functions reachable from call expressions (`remove(item)`)
///
/// Enables dependency injection: components register their methods,
/// tests register recording closures.
pub trait Actions {
    /// Invoke `name` (the dotted callee path) with evaluated arguments
    fn invoke(&self, name: &str, args: &[Value]) -> Value;
}

type ActionFn = Rc<dyn Fn(&[Value]) -> Value>;

/// Closure registry implementing [`Actions`]
#[derive(Clone, Default)]
pub struct ActionTable {
    actions: FxHashMap<String, ActionFn>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an action
    pub fn register(&mut self, name: impl Into<String>, action: impl Fn(&[Value]) -> Value + 'static) {
        self.actions.insert(name.into(), Rc::new(action));
    }

    /// Builder form of [`ActionTable::register`]
    pub fn with(mut self, name: impl Into<String>, action: impl Fn(&[Value]) -> Value + 'static) -> Self {
        self.register(name, action);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Actions for ActionTable {
    fn invoke(&self, name: &str, args: &[Value]) -> Value {
        match self.actions.get(name) {
            Some(action) => action(args),
            None => {
                tracing::warn!(action = name, "call to unregistered action");
                Value::Null
            }
        }
    }
}

impl fmt::Debug for ActionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.actions.keys().collect();
        names.sort();
        f.debug_struct("ActionTable").field("actions", &names).finish()
    }
}

/// Evaluation environment: snapshot, arrow locals, optional host actions
pub struct Env<'a> {
    snapshot: &'a Value,
    locals: Vec<(String, Value)>,
    actions: Option<&'a dyn Actions>,
}

impl<'a> Env<'a> {
    pub fn new(snapshot: &'a Value) -> Self {
        Self {
            snapshot,
            locals: Vec::new(),
            actions: None,
        }
    }

    /// Enable call expressions
    pub fn with_actions(mut self, actions: &'a dyn Actions) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn with_local(mut self, name: impl Into<String>, value: Value) -> Self {
        self.locals.push((name.into(), value));
        self
    }

    fn local(&self, name: &str) -> Value {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null)
    }
}

/// Build a JSON number, keeping integral values as integers
pub fn number(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Numeric view of a value (`null` and non-numeric strings have none)
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse().ok()
            }
        }
        _ => None,
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Display form used when writing values into text and attributes
///
/// `null` renders empty, lists join with `,`, objects render as JSON.
pub fn to_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i128),
            (_, _, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(to_display).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn strict_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| strict_eq(v, other)))
        }
        _ => lhs == rhs,
    }
}

fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    if strict_eq(lhs, rhs) {
        return true;
    }
    match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_) | Value::Bool(_), Value::String(_) | Value::Bool(_))
        | (Value::String(_) | Value::Bool(_), Value::Number(_) | Value::Bool(_)) => {
            match (to_number(lhs), to_number(rhs)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => false,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => to_number(lhs)?.partial_cmp(&to_number(rhs)?),
    }
}

fn add(lhs: &Value, rhs: &Value) -> Value {
    let textual = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if textual(lhs) || textual(rhs) {
        return Value::String(to_display(lhs) + &to_display(rhs));
    }
    match (to_number(lhs), to_number(rhs)) {
        (Some(a), Some(b)) => number(a + b),
        _ => Value::Null,
    }
}

fn arithmetic(lhs: &Value, rhs: &Value, apply: fn(f64, f64) -> f64) -> Value {
    match (to_number(lhs), to_number(rhs)) {
        (Some(a), Some(b)) => number(apply(a, b)),
        _ => Value::Null,
    }
}

/// Key used for computed member access
fn property_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) => Some(to_display(value)),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Evaluate an expression. Functions are not values: a bare arrow
/// evaluates to `null`, calls need actions in the environment.
pub fn evaluate(expr: &Expr, env: &Env<'_>) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Path(path) => lookup(env.snapshot, path.segments()).unwrap_or(Value::Null),
        Expr::Local(name) => env.local(name),
        Expr::Member { object, property } => {
            step(&evaluate(object, env), property).unwrap_or(Value::Null)
        }
        Expr::Index { object, index } => {
            let object = evaluate(object, env);
            property_key(&evaluate(index, env))
                .and_then(|key| step(&object, &key))
                .unwrap_or(Value::Null)
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, env);
            match op {
                UnaryOp::Not => Value::Bool(!truthy(&value)),
                UnaryOp::Neg => to_number(&value).map(|n| number(-n)).unwrap_or(Value::Null),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let left = evaluate(lhs, env);
            match op {
                BinaryOp::And => {
                    if truthy(&left) {
                        evaluate(rhs, env)
                    } else {
                        left
                    }
                }
                BinaryOp::Or => {
                    if truthy(&left) {
                        left
                    } else {
                        evaluate(rhs, env)
                    }
                }
                _ => {
                    let right = evaluate(rhs, env);
                    match op {
                        BinaryOp::Add => add(&left, &right),
                        BinaryOp::Sub => arithmetic(&left, &right, |a, b| a - b),
                        BinaryOp::Mul => arithmetic(&left, &right, |a, b| a * b),
                        BinaryOp::Div => arithmetic(&left, &right, |a, b| a / b),
                        BinaryOp::Rem => arithmetic(&left, &right, |a, b| a % b),
                        BinaryOp::Eq => Value::Bool(loose_eq(&left, &right)),
                        BinaryOp::NotEq => Value::Bool(!loose_eq(&left, &right)),
                        BinaryOp::StrictEq => Value::Bool(strict_eq(&left, &right)),
                        BinaryOp::StrictNotEq => Value::Bool(!strict_eq(&left, &right)),
                        BinaryOp::Lt => Value::Bool(compare(&left, &right) == Some(Ordering::Less)),
                        BinaryOp::Le => Value::Bool(matches!(
                            compare(&left, &right),
                            Some(Ordering::Less | Ordering::Equal)
                        )),
                        BinaryOp::Gt => {
                            Value::Bool(compare(&left, &right) == Some(Ordering::Greater))
                        }
                        BinaryOp::Ge => Value::Bool(matches!(
                            compare(&left, &right),
                            Some(Ordering::Greater | Ordering::Equal)
                        )),
                        BinaryOp::And | BinaryOp::Or => left,
                    }
                }
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if truthy(&evaluate(test, env)) {
                evaluate(consequent, env)
            } else {
                evaluate(alternate, env)
            }
        }
        Expr::Object(fields) => {
            let map: Map<String, Value> = fields
                .iter()
                .map(|(key, value)| (key.clone(), evaluate(value, env)))
                .collect();
            Value::Object(map)
        }
        Expr::Array(items) => Value::Array(items.iter().map(|item| evaluate(item, env)).collect()),
        Expr::Call { callee, args } => {
            let Expr::Path(name) = callee.as_ref() else {
                tracing::debug!("call on a computed callee evaluates to null");
                return Value::Null;
            };
            let Some(actions) = env.actions else {
                tracing::debug!(action = %name, "call outside an event handler evaluates to null");
                return Value::Null;
            };
            let args: Vec<Value> = args.iter().map(|arg| evaluate(arg, env)).collect();
            actions.invoke(name.as_str(), &args)
        }
        Expr::Lambda { .. } => Value::Null,
    }
}

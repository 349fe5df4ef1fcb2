//! Expression compiler
//!
//! `compile` turns expression text into either a literal (computed once) or
//! an [`Expression`] carrying its dependency [`KeySet`] and an AST evaluated
//! against an explicit snapshot.
//!
//! ```
//! use lsdom::expr::{compile, Compiled};
//! use serde_json::json;
//!
//! let Compiled::Dynamic(expr) = compile("a + 1").unwrap() else { unreachable!() };
//! assert!(expr.keys().contains("a"));
//! assert_eq!(expr.evaluate(&json!({"a": 2})), json!(3));
//! ```

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::Result;
use crate::path::Path;
use ast::{Expr, KeySet};
use eval::{evaluate, Actions, Env};

/// Item-alias substitutions active while compiling (`item -> todos.3`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    aliases: Vec<(String, Path)>,
}

impl Scope {
    /// A nested scope; the new alias shadows any outer one with the same name
    pub fn with_alias(&self, alias: &str, path: Path) -> Scope {
        let mut aliases = self.aliases.clone();
        aliases.push((alias.to_string(), path));
        Scope { aliases }
    }

    pub fn resolve(&self, name: &str) -> Option<&Path> {
        self.aliases
            .iter()
            .rev()
            .find(|(alias, _)| alias == name)
            .map(|(_, path)| path)
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// A parsed expression with its dependency keys
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    ast: Rc<Expr>,
    keys: KeySet,
}

impl Expression {
    pub fn parse(source: &str, scope: &Scope) -> Result<Self> {
        let ast = parser::parse(source, scope)?;
        let mut keys = KeySet::new();
        ast.collect_keys(&mut keys);
        Ok(Self {
            source: source.to_string(),
            ast: Rc::new(ast),
            keys,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    pub fn evaluate(&self, snapshot: &Value) -> Value {
        evaluate(&self.ast, &Env::new(snapshot))
    }

    /// Evaluate with host actions enabled. An arrow expression binds its
    /// first parameter to `payload` and evaluates its body.
    pub fn evaluate_with(&self, snapshot: &Value, actions: &dyn Actions, payload: &Value) -> Value {
        let env = Env::new(snapshot).with_actions(actions);
        match self.ast.as_ref() {
            Expr::Lambda { params, body } => {
                let env = params.iter().enumerate().fold(env, |env, (i, name)| {
                    let value = if i == 0 { payload.clone() } else { Value::Null };
                    env.with_local(name.clone(), value)
                });
                evaluate(body, &env)
            }
            other => evaluate(other, &env),
        }
    }

    /// The static path this expression reads, if it is nothing more
    pub fn as_path(&self) -> Option<&Path> {
        match self.ast.as_ref() {
            Expr::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn is_pure(&self) -> bool {
        self.ast.is_pure()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Result of compiling expression text
#[derive(Debug, Clone)]
pub enum Compiled {
    /// No dependencies; evaluated once at compile time
    Literal(Value),
    Dynamic(Expression),
}

impl Compiled {
    pub fn keys(&self) -> KeySet {
        match self {
            Compiled::Literal(_) => KeySet::new(),
            Compiled::Dynamic(expr) => expr.keys().clone(),
        }
    }

    pub fn evaluate(&self, snapshot: &Value) -> Value {
        match self {
            Compiled::Literal(value) => value.clone(),
            Compiled::Dynamic(expr) => expr.evaluate(snapshot),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Compiled::Literal(_))
    }
}

pub fn compile(source: &str) -> Result<Compiled> {
    compile_in(source, &Scope::default())
}

/// Compile with item aliases substituted from `scope`
pub fn compile_in(source: &str, scope: &Scope) -> Result<Compiled> {
    let expr = Expression::parse(source, scope)?;
    if expr.keys.is_empty() && expr.is_pure() {
        return Ok(Compiled::Literal(evaluate(&expr.ast, &Env::new(&Value::Null))));
    }
    Ok(Compiled::Dynamic(expr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LsdomError;
    use eval::ActionTable;
    use serde_json::json;

    fn dynamic(source: &str) -> Expression {
        match compile(source).unwrap() {
            Compiled::Dynamic(expr) => expr,
            Compiled::Literal(v) => panic!("expected dynamic, got literal {v}"),
        }
    }

    fn key_list(keys: &KeySet) -> Vec<&str> {
        keys.iter().map(Path::as_str).collect()
    }

    #[test]
    fn compile_arithmetic_reads_its_key() {
        let expr = dynamic("a+1");
        assert_eq!(key_list(expr.keys()), vec!["a"]);
        assert_eq!(expr.evaluate(&json!({"a": 2})), json!(3));
    }

    #[test]
    fn quoted_colon_is_a_literal() {
        let compiled = compile("'literal:text'").unwrap();
        assert!(compiled.keys().is_empty());
        assert!(matches!(compiled, Compiled::Literal(Value::String(ref s)) if s == "literal:text"));
    }

    #[test]
    fn constant_arithmetic_folds() {
        assert!(matches!(compile("1 + 2 * 3").unwrap(), Compiled::Literal(v) if v == json!(7)));
    }

    #[test]
    fn ternary_yields_one_combined_key_set() {
        let expr = dynamic("done ? a.name : b + a.name");
        assert_eq!(key_list(expr.keys()), vec!["done", "a.name", "b"]);
    }

    #[test]
    fn object_keys_are_not_dependencies() {
        let expr = dynamic("{display: todos.length > 0 ? 'none' : 'inherit'}");
        assert_eq!(key_list(expr.keys()), vec!["todos.length"]);
        assert_eq!(
            expr.evaluate(&json!({"todos": []})),
            json!({"display": "inherit"})
        );
    }

    #[test]
    fn calls_never_fold_to_literals() {
        assert!(!compile("reset()").unwrap().is_literal());
        assert!(!compile("() => reset()").unwrap().is_literal());
    }

    #[test]
    fn scope_rewrites_alias_into_keys() {
        let scope = Scope::default().with_alias("todo", Path::parse("todos.1").unwrap());
        let Compiled::Dynamic(expr) = compile_in("todo.name + '!'", &scope).unwrap() else {
            panic!("expected dynamic");
        };
        assert_eq!(key_list(expr.keys()), vec!["todos.1.name"]);
        assert_eq!(
            expr.evaluate(&json!({"todos": [{"name": "a"}, {"name": "b"}]})),
            json!("b!")
        );
    }

    #[test]
    fn nested_scope_shadows_outer_alias() {
        let outer = Scope::default().with_alias("row", Path::parse("rows.0").unwrap());
        let inner = outer.with_alias("row", Path::parse("rows.0.children.2").unwrap());
        assert_eq!(inner.resolve("row").unwrap().as_str(), "rows.0.children.2");
        assert_eq!(outer.resolve("row").unwrap().as_str(), "rows.0");
    }

    #[test]
    fn as_path_only_for_bare_paths() {
        assert_eq!(dynamic("user.name").as_path().unwrap().as_str(), "user.name");
        assert!(dynamic("user.name + 1").as_path().is_none());
    }

    #[test]
    fn evaluate_with_binds_arrow_parameter() {
        let actions = ActionTable::new().with("add", |args: &[Value]| args[0].clone());
        let expr = dynamic("e => e.which == 13 ? add(text) : null");
        let snapshot = json!({"text": "buy milk"});

        assert_eq!(
            expr.evaluate_with(&snapshot, &actions, &json!({"which": 13})),
            json!("buy milk")
        );
        assert_eq!(
            expr.evaluate_with(&snapshot, &actions, &json!({"which": 40})),
            Value::Null
        );
    }

    #[test]
    fn syntax_errors_surface_at_compile_time() {
        let err = compile("a +").unwrap_err();
        assert!(matches!(err, LsdomError::ExpressionParse { .. }));
    }
}

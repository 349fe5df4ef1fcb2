//! Binding dispatcher
//!
//! Glues one compiled update to one render-tree target: writes it once,
//! then re-writes it on `set:<key>` for every dependency key.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::owner::Owner;
use crate::bus::ListenerId;
use crate::config::EngineConfig;
use crate::error::{LsdomError, Result};
use crate::expr::ast::KeySet;
use crate::expr::eval::{to_display, truthy, Actions};
use crate::expr::{Compiled, Expression};
use crate::interpolation::TemplateString;
use crate::model::Model;
use crate::tree::RenderTree;

/// Where an update is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    Text,
    Attribute(String),
    Style,
    Class,
    /// Form value (two-way `model` bindings)
    Value,
}

/// Anything with dependency keys that can be evaluated against a snapshot
pub trait Reactive {
    fn keys(&self) -> KeySet;
    fn evaluate(&self, snapshot: &Value) -> Value;
}

impl Reactive for Expression {
    fn keys(&self) -> KeySet {
        Expression::keys(self).clone()
    }

    fn evaluate(&self, snapshot: &Value) -> Value {
        Expression::evaluate(self, snapshot)
    }
}

impl Reactive for Compiled {
    fn keys(&self) -> KeySet {
        Compiled::keys(self)
    }

    fn evaluate(&self, snapshot: &Value) -> Value {
        Compiled::evaluate(self, snapshot)
    }
}

impl Reactive for TemplateString {
    fn keys(&self) -> KeySet {
        TemplateString::keys(self).clone()
    }

    fn evaluate(&self, snapshot: &Value) -> Value {
        Value::String(self.render(snapshot))
    }
}

/// Record of one established binding
#[derive(Debug, Clone)]
pub struct Binding {
    pub kind: BindingKind,
    /// Paths the update was subscribed under
    pub keys: KeySet,
    /// `None` when the update has no dependencies (written once)
    pub listener: Option<ListenerId>,
}

/// Shared mount context: tree, model, configuration and host actions
pub struct Binder<R: RenderTree> {
    tree: Rc<RefCell<R>>,
    model: Model,
    config: Rc<EngineConfig>,
    actions: Rc<dyn Actions>,
}

impl<R: RenderTree> Clone for Binder<R> {
    fn clone(&self) -> Self {
        Self {
            tree: Rc::clone(&self.tree),
            model: self.model.clone(),
            config: Rc::clone(&self.config),
            actions: Rc::clone(&self.actions),
        }
    }
}

impl<R: RenderTree> fmt::Debug for Binder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("model", &self.model)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<R: RenderTree + 'static> Binder<R> {
    pub fn new(tree: Rc<RefCell<R>>, model: Model, config: Rc<EngineConfig>, actions: Rc<dyn Actions>) -> Self {
        model.bus().set_reentry_guard(config.guard_reentrant_triggers);
        Self {
            tree,
            model,
            config,
            actions,
        }
    }

    pub fn tree(&self) -> &Rc<RefCell<R>> {
        &self.tree
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Write `update` to `node` now and on every change of its keys
    pub fn bind(&self, owner: &Owner, node: &R::Node, kind: BindingKind, update: Rc<dyn Reactive>) -> Binding {
        let keys = update.keys();
        let write = {
            let tree = Rc::clone(&self.tree);
            let model = self.model.clone();
            let node = node.clone();
            let kind = kind.clone();
            Rc::new(move || {
                let value = update.evaluate(&model.snapshot());
                apply(&mut *tree.borrow_mut(), &node, &kind, &value);
            })
        };
        write();

        if keys.is_empty() {
            return Binding {
                kind,
                keys,
                listener: None,
            };
        }

        let events = keys
            .iter()
            .map(|key| format!("set:{key}"))
            .collect::<Vec<_>>()
            .join(" ");
        let id = self.model.bus().listen(&events, move |_| write());
        owner.track(self.model.bus(), events, id);
        tracing::debug!(?node, ?kind, keys = keys.len(), "bound");

        Binding {
            kind,
            keys,
            listener: Some(id),
        }
    }

    /// Run `expr` with host actions when `event` fires on `node`.
    ///
    /// Handlers see a copy of the snapshot, so actions may mutate the model
    /// freely. Once `owner` is disposed the handler does nothing.
    pub fn bind_event(&self, owner: &Owner, node: &R::Node, event: &str, expr: Expression) {
        let alive = Rc::new(Cell::new(true));
        {
            let alive = Rc::clone(&alive);
            owner.on_dispose(move || alive.set(false));
        }

        let model = self.model.clone();
        let actions = Rc::clone(&self.actions);
        let name = event.to_string();
        let handler = move |payload: &Value| {
            if !alive.get() {
                return;
            }
            let snapshot = model.to_value();
            let result = expr.evaluate_with(&snapshot, actions.as_ref(), payload);
            tracing::trace!(event = %name, source = expr.source(), ?result, "event handler");
        };
        self.tree
            .borrow_mut()
            .add_event_listener(node, event, Rc::new(handler));
    }

    /// Two-way binding: the node's value follows `path`, and `input`
    /// events write the node's value back into the model
    pub fn bind_model(&self, owner: &Owner, node: &R::Node, expr: Expression) -> Result<Binding> {
        let Some(path) = expr.as_path().cloned() else {
            return Err(LsdomError::InvalidModelPath {
                expression: expr.source().to_string(),
            });
        };
        let binding = self.bind(owner, node, BindingKind::Value, Rc::new(expr));

        let alive = Rc::new(Cell::new(true));
        {
            let alive = Rc::clone(&alive);
            owner.on_dispose(move || alive.set(false));
        }
        let tree = Rc::clone(&self.tree);
        let model = self.model.clone();
        let target = node.clone();
        let handler = move |_: &Value| {
            if !alive.get() {
                return;
            }
            let value = tree.borrow().value(&target);
            if let Err(e) = model.set(path.as_str(), Value::String(value)) {
                tracing::error!(error = %e, %path, "model write failed");
            }
        };
        self.tree
            .borrow_mut()
            .add_event_listener(node, "input", Rc::new(handler));
        Ok(binding)
    }
}

/// Class value forms: string, list of names, or `{name: condition}`
fn class_name(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(to_display)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map
            .iter()
            .filter(|(_, on)| truthy(on))
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        other => to_display(other),
    }
}

/// Write one evaluated value to its target
pub fn apply<R: RenderTree>(tree: &mut R, node: &R::Node, kind: &BindingKind, value: &Value) {
    match kind {
        BindingKind::Text => tree.set_text(node, &to_display(value)),
        BindingKind::Attribute(name) => match value {
            Value::Null | Value::Bool(false) => tree.remove_attribute(node, name),
            Value::Bool(true) => tree.set_attribute(node, name, ""),
            other => tree.set_attribute(node, name, &to_display(other)),
        },
        BindingKind::Style => match value {
            Value::Object(style) => tree.set_style(node, style),
            other => tracing::debug!(value = %other, "style binding needs an object"),
        },
        BindingKind::Class => tree.set_class(node, &class_name(value)),
        BindingKind::Value => tree.set_value(node, &to_display(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::compile;
    use crate::expr::eval::ActionTable;
    use crate::interpolation::{split, Interpolated};
    use crate::tree::MemoryTree;
    use serde_json::json;

    fn binder(data: Value) -> Binder<MemoryTree> {
        Binder::new(
            Rc::new(RefCell::new(MemoryTree::new())),
            Model::new(data),
            Rc::new(EngineConfig::default()),
            Rc::new(ActionTable::new()),
        )
    }

    fn template(source: &str) -> Rc<dyn Reactive> {
        match split(source).unwrap() {
            Interpolated::Dynamic(t) => Rc::new(t),
            Interpolated::Static(s) => panic!("expected dynamic template, got {s:?}"),
        }
    }

    #[test]
    fn text_binding_writes_now_and_on_change() {
        let b = binder(json!({"a": 1, "b": 2}));
        let node = b.tree().borrow_mut().create_text("");
        let owner = Owner::new();

        let binding = b.bind(&owner, &node, BindingKind::Text, template("{a} of {b}"));
        assert_eq!(b.tree().borrow().text(&node), "1 of 2");
        assert_eq!(binding.keys.len(), 2);

        b.model().set("b", json!(5)).unwrap();
        assert_eq!(b.tree().borrow().text(&node), "1 of 5");
    }

    #[test]
    fn quoted_key_with_space_subscribes_to_its_parent() {
        let b = binder(json!({"a": {"b c": "x"}}));
        let node = b.tree().borrow_mut().create_text("");
        let owner = Owner::new();

        b.bind(&owner, &node, BindingKind::Text, template("{a['b c']}"));
        assert_eq!(b.tree().borrow().text(&node), "x");
        assert_eq!(b.model().bus().listener_count("set:a"), 1);
        assert_eq!(b.model().bus().listener_count("set:a.b"), 0);
        assert_eq!(b.model().bus().total_listeners(), 1);

        b.model().set("a", json!({"b c": "y"})).unwrap();
        assert_eq!(b.tree().borrow().text(&node), "y");
    }

    #[test]
    fn literal_binding_is_written_once() {
        let b = binder(json!({}));
        let node = b.tree().borrow_mut().create_element("p");
        let owner = Owner::new();
        let binding = b.bind(
            &owner,
            &node,
            BindingKind::Attribute("title".into()),
            Rc::new(compile("'fixed'").unwrap()),
        );
        assert!(binding.listener.is_none());
        assert_eq!(b.tree().borrow().attribute(&node, "title").as_deref(), Some("fixed"));
        assert_eq!(b.model().bus().total_listeners(), 0);
    }

    #[test]
    fn boolean_attribute_toggles_presence() {
        let b = binder(json!({"done": true}));
        let node = b.tree().borrow_mut().create_element("input");
        let owner = Owner::new();
        b.bind(
            &owner,
            &node,
            BindingKind::Attribute("checked".into()),
            Rc::new(compile("done").unwrap()),
        );
        assert_eq!(b.tree().borrow().attribute(&node, "checked").as_deref(), Some(""));
        b.model().set("done", json!(false)).unwrap();
        assert_eq!(b.tree().borrow().attribute(&node, "checked"), None);
    }

    #[test]
    fn style_and_class_bindings() {
        let b = binder(json!({"todos": [], "tab": "all"}));
        let node = b.tree().borrow_mut().create_element("footer");
        let owner = Owner::new();
        b.bind(
            &owner,
            &node,
            BindingKind::Style,
            Rc::new(compile("{display: todos.length ? 'block' : 'none'}").unwrap()),
        );
        b.bind(
            &owner,
            &node,
            BindingKind::Class,
            Rc::new(compile("{selected: tab == 'all', hidden: !todos.length}").unwrap()),
        );
        assert_eq!(b.tree().borrow().attribute(&node, "style").as_deref(), Some("display: none"));
        assert_eq!(b.tree().borrow().attribute(&node, "class").as_deref(), Some("hidden selected"));

        b.model().push("todos", json!("x")).unwrap();
        assert_eq!(b.tree().borrow().attribute(&node, "style").as_deref(), Some("display: block"));
        assert_eq!(b.tree().borrow().attribute(&node, "class").as_deref(), Some("selected"));
    }

    #[test]
    fn disposing_owner_stops_updates() {
        let b = binder(json!({"a": 1}));
        let node = b.tree().borrow_mut().create_text("");
        let owner = Owner::new();
        b.bind(&owner, &node, BindingKind::Text, template("{a}"));

        owner.dispose();
        b.model().set("a", json!(2)).unwrap();
        assert_eq!(b.tree().borrow().text(&node), "1");
        assert_eq!(b.model().bus().total_listeners(), 0);
    }

    #[test]
    fn model_binding_is_two_way() {
        let b = binder(json!({"form": {"name": "Ann"}}));
        let input = b.tree().borrow_mut().create_element("input");
        let owner = Owner::new();
        let Compiled::Dynamic(expr) = compile("form.name").unwrap() else {
            panic!("expected dynamic");
        };
        b.bind_model(&owner, &input, expr).unwrap();
        assert_eq!(b.tree().borrow().value(&input), "Ann");

        MemoryTree::input(b.tree(), input, "Bob");
        assert_eq!(b.model().get("form.name"), Some(json!("Bob")));

        b.model().set("form.name", json!("Cy")).unwrap();
        assert_eq!(b.tree().borrow().value(&input), "Cy");
    }

    #[test]
    fn model_binding_rejects_computed_expressions() {
        let b = binder(json!({}));
        let input = b.tree().borrow_mut().create_element("input");
        let Compiled::Dynamic(expr) = compile("a + b").unwrap() else {
            panic!("expected dynamic");
        };
        let err = b.bind_model(&Owner::new(), &input, expr).unwrap_err();
        assert!(matches!(err, LsdomError::InvalidModelPath { .. }));
    }

    #[test]
    fn event_binding_calls_actions_with_payload() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let actions = ActionTable::new().with("submit", move |args: &[Value]| {
            sink.borrow_mut().extend_from_slice(args);
            Value::Null
        });
        let b = Binder::new(
            Rc::new(RefCell::new(MemoryTree::new())),
            Model::new(json!({"text": "milk"})),
            Rc::new(EngineConfig::default()),
            Rc::new(actions),
        );
        let node = b.tree().borrow_mut().create_element("input");
        let owner = Owner::new();
        let Compiled::Dynamic(expr) = compile("e => e.which == 13 && submit(text)").unwrap() else {
            panic!("expected dynamic");
        };
        b.bind_event(&owner, &node, "keypress", expr);

        MemoryTree::dispatch_event(b.tree(), node, "keypress", &json!({"which": 10}));
        MemoryTree::dispatch_event(b.tree(), node, "keypress", &json!({"which": 13}));
        assert_eq!(*seen.borrow(), vec![json!("milk")]);

        owner.dispose();
        MemoryTree::dispatch_event(b.tree(), node, "keypress", &json!({"which": 13}));
        assert_eq!(seen.borrow().len(), 1);
    }
}

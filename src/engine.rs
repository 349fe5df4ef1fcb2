//! Template walker
//!
//! Reads the directive surface of a mounted subtree and hands every
//! occurrence to the binder or the list reconciler:
//!
//! | Source                     | Binding                          |
//! |----------------------------|----------------------------------|
//! | `for="item in list"`       | [`ListBinding`]                  |
//! | `style="{...}"`            | style map                        |
//! | `classname="expr"`         | class                            |
//! | `model="path"`             | two-way form value               |
//! | event attribute            | handler with host actions        |
//! | `attr="..{expr}.."`        | attribute (prefix stripped)      |
//! | text with `{expr}`         | text                             |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::binding::{Binder, BindingKind, ForDirective, ListBinding, Mounter, Owner, Reactive};
use crate::config::EngineConfig;
use crate::error::{LsdomError, Result};
use crate::expr::eval::{to_number, truthy, ActionTable, Actions};
use crate::expr::ast::KeySet;
use crate::expr::{compile_in, Expression, Scope};
use crate::interpolation::{split_in, Interpolated, Segment, TemplateString};
use crate::model::Model;
use crate::tree::{markup, MemoryTree, NodeId, NodeKind, RenderTree};

const FOR: &str = "for";
const STYLE: &str = "style";
const CLASSNAME: &str = "classname";
const MODEL: &str = "model";

/// Binding engine over one render tree and one model
pub struct Engine<R: RenderTree> {
    binder: Binder<R>,
}

impl<R: RenderTree> Clone for Engine<R> {
    fn clone(&self) -> Self {
        Self {
            binder: self.binder.clone(),
        }
    }
}

impl<R: RenderTree> fmt::Debug for Engine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").field("binder", &self.binder).finish()
    }
}

/// A mounted subtree; unmounting releases every subscription it made
#[derive(Debug)]
pub struct View<N> {
    root: N,
    owner: Rc<Owner>,
}

impl<N> View<N> {
    pub fn root(&self) -> &N {
        &self.root
    }

    pub fn owner(&self) -> &Rc<Owner> {
        &self.owner
    }

    pub fn unmount(&self) {
        self.owner.dispose();
    }

    pub fn is_mounted(&self) -> bool {
        !self.owner.is_disposed()
    }
}

impl<R: RenderTree + 'static> Engine<R> {
    /// Engine with the built-in model actions (see [`builtin_actions`])
    pub fn new(tree: Rc<RefCell<R>>, model: Model, config: EngineConfig) -> Self {
        let actions = Rc::new(builtin_actions(&model));
        Self::with_actions(tree, model, config, actions)
    }

    pub fn with_actions(tree: Rc<RefCell<R>>, model: Model, config: EngineConfig, actions: Rc<dyn Actions>) -> Self {
        Self {
            binder: Binder::new(tree, model, Rc::new(config), actions),
        }
    }

    pub fn binder(&self) -> &Binder<R> {
        &self.binder
    }

    pub fn tree(&self) -> &Rc<RefCell<R>> {
        self.binder.tree()
    }

    pub fn model(&self) -> &Model {
        self.binder.model()
    }

    pub fn config(&self) -> &EngineConfig {
        self.binder.config()
    }

    /// Bind `root` and everything below it.
    ///
    /// On failure the bindings made so far are released before the error
    /// is returned.
    pub fn mount_view(&self, root: R::Node) -> Result<View<R::Node>> {
        let owner = Rc::new(Owner::new());
        if let Err(e) = self.mount(&root, &Scope::default(), &owner) {
            owner.dispose();
            return Err(e);
        }
        tracing::debug!(?root, subscriptions = owner.len(), "mounted view");
        Ok(View { root, owner })
    }

    fn mount_node(&self, node: &R::Node, scope: &Scope, owner: &Rc<Owner>) -> Result<()> {
        let kind = self.tree().borrow().kind(node);
        match kind {
            NodeKind::Comment => Ok(()),
            NodeKind::Text => self.mount_text(node, scope, owner),
            NodeKind::Fragment => self.mount_children(node, scope, owner),
            NodeKind::Element => {
                let directive = self.tree().borrow().attribute(node, FOR);
                if let Some(directive) = directive {
                    let mounter: Rc<dyn Mounter<R>> = Rc::new(self.clone());
                    ListBinding::attach(&self.binder, mounter, owner, node, &directive, scope)?;
                    return Ok(());
                }
                self.mount_attributes(node, scope, owner)?;
                self.mount_children(node, scope, owner)
            }
        }
    }

    fn mount_children(&self, node: &R::Node, scope: &Scope, owner: &Rc<Owner>) -> Result<()> {
        // collected up front: list directives replace their node with anchors
        let children = self.tree().borrow().children(node);
        for child in &children {
            self.mount_node(child, scope, owner)?;
        }
        Ok(())
    }

    fn mount_attributes(&self, node: &R::Node, scope: &Scope, owner: &Rc<Owner>) -> Result<()> {
        let attributes = self.tree().borrow().attributes(node);
        for (name, source) in attributes {
            match name.as_str() {
                STYLE if is_object_literal(&source) => {
                    let compiled = compile_in(&source, scope)?;
                    self.tree().borrow_mut().remove_attribute(node, STYLE);
                    self.binder.bind(owner, node, BindingKind::Style, Rc::new(compiled));
                }
                CLASSNAME => {
                    let compiled = compile_in(&source, scope)?;
                    self.tree().borrow_mut().remove_attribute(node, CLASSNAME);
                    self.binder.bind(owner, node, BindingKind::Class, Rc::new(compiled));
                }
                MODEL => {
                    let expr = Expression::parse(&source, scope)?;
                    self.tree().borrow_mut().remove_attribute(node, MODEL);
                    self.binder.bind_model(owner, node, expr)?;
                }
                event if self.config().is_event_attribute(event) => {
                    let expr = Expression::parse(&source, scope)?;
                    self.tree().borrow_mut().remove_attribute(node, event);
                    self.binder.bind_event(owner, node, event, expr);
                }
                _ if source.contains('{') => self.mount_attribute(node, &name, &source, scope, owner)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn mount_attribute(&self, node: &R::Node, name: &str, source: &str, scope: &Scope, owner: &Rc<Owner>) -> Result<()> {
        let target = self.config().target_attribute(name).to_string();
        let interpolated = split_in(source, scope)?;
        if target != name {
            self.tree().borrow_mut().remove_attribute(node, name);
        }

        match interpolated {
            Interpolated::Static(text) => {
                if target != name || text != source {
                    self.tree().borrow_mut().set_attribute(node, &target, &text);
                }
            }
            Interpolated::Dynamic(template) => {
                self.binder
                    .bind(owner, node, BindingKind::Attribute(target), reactive(template));
            }
        }
        Ok(())
    }

    fn mount_text(&self, node: &R::Node, scope: &Scope, owner: &Rc<Owner>) -> Result<()> {
        let source = self.tree().borrow().text(node);
        if source.trim().is_empty() || !source.contains('{') {
            return Ok(());
        }
        match split_in(&source, scope)? {
            Interpolated::Static(text) => {
                if text != source {
                    self.tree().borrow_mut().set_text(node, &text);
                }
            }
            Interpolated::Dynamic(template) => {
                self.binder
                    .bind(owner, node, BindingKind::Text, Rc::new(template));
            }
        }
        Ok(())
    }

    /// Compile every directive below `node` under `scope`, recording each
    /// one with its dependency keys
    fn inspect_node(&self, node: &R::Node, scope: &Scope, out: &mut Vec<Directive>) -> Result<()> {
        let kind = self.tree().borrow().kind(node);
        match kind {
            NodeKind::Comment => Ok(()),
            NodeKind::Text => {
                let source = self.tree().borrow().text(node);
                if !source.trim().is_empty() && source.contains('{') {
                    let keys = match split_in(&source, scope)? {
                        Interpolated::Static(_) => KeySet::new(),
                        Interpolated::Dynamic(template) => template.keys().clone(),
                    };
                    out.push(Directive::new("#text", "text", source.trim(), &keys));
                }
                Ok(())
            }
            NodeKind::Fragment => self.inspect_children(node, scope, out),
            NodeKind::Element => {
                let directive = self.tree().borrow().attribute(node, FOR);
                match directive {
                    Some(directive) => {
                        let parsed = ForDirective::parse(&directive, scope)?;
                        let mut keys = KeySet::new();
                        keys.insert(parsed.list.clone());
                        out.push(Directive::new(&self.tag(node), FOR, &directive, &keys));
                        self.inspect_element(node, &parsed.item_scope(scope, 0), out)
                    }
                    None => self.inspect_element(node, scope, out),
                }
            }
        }
    }

    fn inspect_element(&self, node: &R::Node, scope: &Scope, out: &mut Vec<Directive>) -> Result<()> {
        let tag = self.tag(node);
        let attributes = self.tree().borrow().attributes(node);
        for (name, source) in attributes {
            let keys = match name.as_str() {
                FOR => continue,
                STYLE if is_object_literal(&source) => compile_in(&source, scope)?.keys(),
                CLASSNAME => compile_in(&source, scope)?.keys(),
                MODEL => {
                    let expr = Expression::parse(&source, scope)?;
                    if expr.as_path().is_none() {
                        return Err(LsdomError::InvalidModelPath { expression: source });
                    }
                    expr.keys().clone()
                }
                event if self.config().is_event_attribute(event) => Expression::parse(&source, scope)?.keys().clone(),
                _ if source.contains('{') => match split_in(&source, scope)? {
                    Interpolated::Static(_) => KeySet::new(),
                    Interpolated::Dynamic(template) => template.keys().clone(),
                },
                _ => continue,
            };
            out.push(Directive::new(&tag, &name, &source, &keys));
        }
        self.inspect_children(node, scope, out)
    }

    fn inspect_children(&self, node: &R::Node, scope: &Scope, out: &mut Vec<Directive>) -> Result<()> {
        let children = self.tree().borrow().children(node);
        children.iter().try_for_each(|child| self.inspect_node(child, scope, out))
    }

    fn tag(&self, node: &R::Node) -> String {
        self.tree().borrow().tag_name(node).unwrap_or_default()
    }
}

/// One directive found by [`Engine::check_markup`]
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Tag of the carrying element, `#text` for text nodes
    pub location: String,
    pub name: String,
    pub source: String,
    pub keys: Vec<String>,
}

impl Directive {
    fn new(location: &str, name: &str, source: &str, keys: &KeySet) -> Self {
        Self {
            location: location.to_string(),
            name: name.to_string(),
            source: source.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl<R: RenderTree + 'static> Mounter<R> for Engine<R> {
    fn mount(&self, node: &R::Node, scope: &Scope, owner: &Rc<Owner>) -> Result<()> {
        self.mount_node(node, scope, owner)
    }

    fn validate(&self, node: &R::Node, scope: &Scope) -> Result<()> {
        self.inspect_node(node, scope, &mut Vec::new())
    }
}

impl Engine<MemoryTree> {
    /// Parse `source` into a detached fragment and mount it
    pub fn mount_markup(&self, source: &str) -> Result<View<NodeId>> {
        let root = markup::parse(&mut self.tree().borrow_mut(), source)?;
        self.mount_view(root)
    }

    /// Parse `source` and compile every directive without binding anything
    pub fn check_markup(&self, source: &str) -> Result<Vec<Directive>> {
        let root = markup::parse(&mut self.tree().borrow_mut(), source)?;
        let mut directives = Vec::new();
        self.inspect_node(&root, &Scope::default(), &mut directives)?;
        Ok(directives)
    }

    /// Current markup of a mounted view
    pub fn render(&self, view: &View<NodeId>) -> String {
        markup::serialize(&self.tree().borrow(), *view.root())
    }
}

/// A template that is exactly one `{expr}` binds the raw value, so booleans
/// and nulls reach the attribute writer unchanged
fn reactive(template: TemplateString) -> Rc<dyn Reactive> {
    if let [Segment::Expr(expr)] = template.segments() {
        return Rc::new(expr.clone());
    }
    Rc::new(template)
}

fn is_object_literal(source: &str) -> bool {
    source.trim_start().starts_with('{')
}

/// Actions mutating `model`, callable from event expressions.
///
/// Paths are passed as strings:
/// - `set('path', value)`
/// - `toggle('path')`
/// - `push('list', item)`
/// - `insert('list', index, item)`
/// - `remove('list', index[, count])` returns the removed items
/// - `removeItem('list', item)` returns the removed index or null
pub fn builtin_actions(model: &Model) -> ActionTable {
    let mut table = ActionTable::new();

    let m = model.clone();
    table.register("set", move |args| {
        if let Some(path) = path_arg(args) {
            report("set", m.set(path, arg(args, 1)));
        }
        Value::Null
    });

    let m = model.clone();
    table.register("toggle", move |args| {
        if let Some(path) = path_arg(args) {
            let current = m.get(path).unwrap_or(Value::Null);
            report("toggle", m.set(path, Value::Bool(!truthy(&current))));
        }
        Value::Null
    });

    let m = model.clone();
    table.register("push", move |args| {
        if let Some(path) = path_arg(args) {
            report("push", m.push(path, arg(args, 1)));
        }
        Value::Null
    });

    let m = model.clone();
    table.register("insert", move |args| {
        if let Some(path) = path_arg(args) {
            report("insert", m.insert(path, index_arg(args, 1), vec![arg(args, 2)]));
        }
        Value::Null
    });

    let m = model.clone();
    table.register("remove", move |args| {
        let Some(path) = path_arg(args) else {
            return Value::Null;
        };
        let count = if args.len() > 2 { index_arg(args, 2) } else { 1 };
        match m.remove(path, index_arg(args, 1), count) {
            Ok(removed) => Value::Array(removed),
            Err(e) => {
                tracing::warn!(error = %e, action = "remove", "action failed");
                Value::Null
            }
        }
    });

    let m = model.clone();
    table.register("removeItem", move |args| {
        let Some(path) = path_arg(args) else {
            return Value::Null;
        };
        match m.remove_item(path, &arg(args, 1)) {
            Ok(index) => index.map_or(Value::Null, Value::from),
            Err(e) => {
                tracing::warn!(error = %e, action = "removeItem", "action failed");
                Value::Null
            }
        }
    });

    table
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Null)
}

fn path_arg(args: &[Value]) -> Option<&str> {
    let path = args.first().and_then(Value::as_str);
    if path.is_none() {
        tracing::warn!(?args, "model action needs a path string as first argument");
    }
    path
}

fn index_arg(args: &[Value], i: usize) -> usize {
    args.get(i)
        .and_then(to_number)
        .filter(|n| n.is_finite() && *n > 0.0)
        .map_or(0, |n| n as usize)
}

fn report(action: &str, outcome: Result<()>) {
    if let Err(e) = outcome {
        tracing::warn!(error = %e, action, "action failed");
    }
}

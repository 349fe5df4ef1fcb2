//! List reconciler for `for="item in list"`
//!
//! The directive element becomes a template: it is replaced by two comment
//! anchors, and one deep clone per list item is kept between them. Each
//! clone is mounted with `item` aliased to `list.<i>`, so its bindings
//! listen on positional paths.
//!
//! Splices are applied mutate-then-refresh:
//! - `add:{index, length}` appends fragments for the new tail positions,
//!   then re-triggers `set:list.<i>` for `index..prior` (shifted items)
//! - `delete:{index, length}` disposes and detaches trailing fragments,
//!   then re-triggers `set:list.<i>` for `index..len`
//!
//! `set:list` (wholesale replacement, or an ancestor refresh) resyncs the
//! fragment count and refreshes every position.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::dispatch::Binder;
use super::owner::Owner;
use crate::bus::Payload;
use crate::error::{LsdomError, Result};
use crate::expr::{Expression, Scope};
use crate::path::{resolve, Path};
use crate::tree::RenderTree;

static FOR_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_$][A-Za-z0-9_$]*)\s+in\s+(\S.*?)\s*$").expect("valid regex")
});

/// Parsed `for` directive
#[derive(Debug, Clone, PartialEq)]
pub struct ForDirective {
    pub alias: String,
    /// Data path of the list, aliases of enclosing scopes resolved
    pub list: Path,
}

impl ForDirective {
    pub fn parse(directive: &str, scope: &Scope) -> Result<Self> {
        let caps = FOR_DIRECTIVE
            .captures(directive)
            .ok_or_else(|| LsdomError::MalformedFor {
                directive: directive.to_string(),
            })?;
        let alias = caps[1].to_string();
        let source = &caps[2];

        let expr = Expression::parse(source, scope)?;
        let list = expr
            .as_path()
            .filter(|path| !path.is_root())
            .cloned()
            .ok_or_else(|| LsdomError::ForRequiresPath {
                expression: source.to_string(),
            })?;
        Ok(Self { alias, list })
    }

    /// Scope for the fragment at position `index`
    pub fn item_scope(&self, outer: &Scope, index: usize) -> Scope {
        outer.with_alias(&self.alias, self.list.index(index))
    }
}

/// Walks and binds a subtree; implemented by the engine
pub trait Mounter<R: RenderTree> {
    /// Bind everything below and including `node`
    fn mount(&self, node: &R::Node, scope: &Scope, owner: &Rc<Owner>) -> Result<()>;

    /// Compile every directive and expression below `node` without binding
    fn validate(&self, node: &R::Node, scope: &Scope) -> Result<()>;
}

struct Fragment<N> {
    node: N,
    owner: Rc<Owner>,
}

/// One mounted `for` directive
pub struct ListBinding<R: RenderTree> {
    binder: Binder<R>,
    mounter: Rc<dyn Mounter<R>>,
    directive: ForDirective,
    scope: Scope,
    template: R::Node,
    anchor_start: R::Node,
    anchor_end: R::Node,
    fragments: RefCell<Vec<Fragment<R::Node>>>,
}

impl<R: RenderTree + 'static> ListBinding<R> {
    /// Turn `node` (carrying `for="<directive>"`) into a live list.
    ///
    /// Fails before touching the tree when the directive is malformed, the
    /// node has no parent, or the template does not compile.
    pub fn attach(
        binder: &Binder<R>,
        mounter: Rc<dyn Mounter<R>>,
        owner: &Rc<Owner>,
        node: &R::Node,
        directive: &str,
        scope: &Scope,
    ) -> Result<Rc<Self>> {
        let parsed = ForDirective::parse(directive, scope)?;
        let tree = binder.tree();
        let parent = tree
            .borrow()
            .parent(node)
            .ok_or(LsdomError::ForWithoutParent)?;

        tree.borrow_mut().remove_attribute(node, "for");
        if let Err(e) = mounter.validate(node, &parsed.item_scope(scope, 0)) {
            tree.borrow_mut().set_attribute(node, "for", directive);
            return Err(e);
        }

        let (anchor_start, anchor_end) = {
            let mut tree = tree.borrow_mut();
            let anchors = &binder.config().anchors;
            let start = tree.create_comment(&anchors.start);
            let end = tree.create_comment(&anchors.end);
            tree.insert_before(&parent, &start, Some(node));
            tree.insert_before(&parent, &end, Some(node));
            tree.remove_child(&parent, node);
            (start, end)
        };

        let list = Rc::new(Self {
            binder: binder.clone(),
            mounter,
            directive: parsed,
            scope: scope.clone(),
            template: node.clone(),
            anchor_start,
            anchor_end,
            fragments: RefCell::new(Vec::new()),
        });
        list.subscribe(owner);

        let initial = list.current_len();
        tracing::debug!(list = %list.directive.list, alias = %list.directive.alias, initial, "attach list");
        list.on_add(&Payload::Splice {
            index: 0,
            length: initial,
        });
        Ok(list)
    }

    fn subscribe(self: &Rc<Self>, owner: &Rc<Owner>) {
        let path = self.directive.list.clone();
        self.listen(owner, format!("add:{path}"), Self::on_add);
        self.listen(owner, format!("delete:{path}"), Self::on_delete);
        self.listen(owner, format!("set:{path}"), |list, _| list.resync());

        // the owner keeps the list alive; disposing it disposes every fragment
        let list = Rc::clone(self);
        owner.on_dispose(move || list.dispose_fragments());
    }

    fn listen(self: &Rc<Self>, owner: &Owner, event: String, handler: fn(&Self, &Payload)) {
        let bus = self.binder.model().bus();
        let weak: Weak<Self> = Rc::downgrade(self);
        let id = bus.listen(&event, move |payload| {
            if let Some(list) = weak.upgrade() {
                handler(&list, payload);
            }
        });
        owner.track(bus, event, id);
    }

    pub fn directive(&self) -> &ForDirective {
        &self.directive
    }

    /// Rendered fragment count
    pub fn len(&self) -> usize {
        self.fragments.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.borrow().is_empty()
    }

    /// Root node of every rendered fragment, in list order
    pub fn fragment_nodes(&self) -> Vec<R::Node> {
        self.fragments.borrow().iter().map(|f| f.node.clone()).collect()
    }

    pub fn anchors(&self) -> (&R::Node, &R::Node) {
        (&self.anchor_start, &self.anchor_end)
    }

    fn current_len(&self) -> usize {
        let snapshot = self.binder.model().snapshot();
        resolve(&snapshot, &self.directive.list)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    fn on_add(&self, payload: &Payload) {
        let prior = self.len();
        let (index, length) = payload.splice().unwrap_or((prior, 0));
        let len = self.current_len();
        if len != prior + length {
            tracing::warn!(
                list = %self.directive.list,
                prior,
                length,
                actual = len,
                "add payload disagrees with list length"
            );
        }

        for i in prior..len {
            if let Err(e) = self.append_fragment(i) {
                tracing::error!(error = %e, list = %self.directive.list, index = i, "failed to mount list item");
                return;
            }
        }
        self.refresh(index..prior.min(len));
    }

    fn on_delete(&self, payload: &Payload) {
        let len = self.current_len();
        let (index, length) = payload.splice().unwrap_or((len, 0));
        let prior = self.len();
        if prior != len + length {
            tracing::warn!(
                list = %self.directive.list,
                prior,
                length,
                actual = len,
                "delete payload disagrees with list length"
            );
        }

        self.truncate(len);
        self.refresh(index..len);
    }

    /// Match the fragment count to the list and refresh every position
    fn resync(&self) {
        let prior = self.len();
        let len = self.current_len();
        tracing::debug!(list = %self.directive.list, prior, len, "resync list");
        if len > prior {
            for i in prior..len {
                if let Err(e) = self.append_fragment(i) {
                    tracing::error!(error = %e, list = %self.directive.list, index = i, "failed to mount list item");
                    return;
                }
            }
        } else {
            self.truncate(len);
        }
        self.refresh(0..prior.min(len));
    }

    fn append_fragment(&self, index: usize) -> Result<()> {
        let tree = self.binder.tree();
        let node = tree.borrow_mut().clone_deep(&self.template);
        let parent = tree.borrow().parent(&self.anchor_end);
        let Some(parent) = parent else {
            tracing::debug!(list = %self.directive.list, "list anchors detached, skipping mount");
            return Ok(());
        };
        tree.borrow_mut()
            .insert_before(&parent, &node, Some(&self.anchor_end));

        let owner = Rc::new(Owner::new());
        let scope = self.directive.item_scope(&self.scope, index);
        let mounted = self.mounter.mount(&node, &scope, &owner);
        self.fragments.borrow_mut().push(Fragment { node, owner });
        mounted
    }

    /// Dispose and detach fragments from the end down to `len`
    fn truncate(&self, len: usize) {
        loop {
            let fragment = {
                let mut fragments = self.fragments.borrow_mut();
                if fragments.len() <= len {
                    break;
                }
                fragments.pop()
            };
            let Some(Fragment { node, owner }) = fragment else {
                break;
            };
            owner.dispose();
            self.binder.tree().borrow_mut().release(&node);
        }
    }

    fn refresh(&self, positions: std::ops::Range<usize>) {
        let bus = self.binder.model().bus();
        for i in positions {
            bus.trigger(&format!("set:{}", self.directive.list.index(i)), Payload::None);
        }
    }

    fn dispose_fragments(&self) {
        let fragments = std::mem::take(&mut *self.fragments.borrow_mut());
        for fragment in fragments.into_iter().rev() {
            fragment.owner.dispose();
        }
        self.binder.tree().borrow_mut().release(&self.template);
    }
}

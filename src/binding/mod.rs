//! Binding Module - compiled updates wired to render-tree targets
//!
//! - `dispatch`: one update to one target (text, attribute, style, class, value)
//! - `list`: `for` directives, fragments between two comment anchors
//! - `owner`: subscription ownership and disposal
//!
//! Data flow:
//! ```text
//! Model::set("a.b") ─► trigger("set:a.b") ─► Binding re-evaluates ─► RenderTree write
//! Model::insert     ─► trigger("add:list") ─► ListBinding mounts / refreshes fragments
//! ```

pub mod dispatch;
pub mod list;
pub mod owner;

pub use dispatch::{apply, Binder, Binding, BindingKind, Reactive};
pub use list::{ForDirective, ListBinding, Mounter};
pub use owner::{Cleanup, Owner};

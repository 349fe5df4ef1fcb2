//! lsdom - reactive template binding
//!
//! Templates carry `{expr}` interpolations and a handful of directives
//! (`for`, `style`, `classname`, `model`, event attributes). Mounting one
//! compiles every expression once, writes the initial values into a
//! [`RenderTree`], and subscribes each write to the data paths it reads.
//! Mutations made through [`Model`] trigger `set:`/`add:`/`delete:` events
//! on the [`EventBus`] and only the affected targets are rewritten.
//!
//! ```
//! use std::{cell::RefCell, rc::Rc};
//! use lsdom::{Engine, EngineConfig, MemoryTree, Model};
//! use serde_json::json;
//!
//! let model = Model::new(json!({"todos": [{"text": "milk"}]}));
//! let engine = Engine::new(Rc::new(RefCell::new(MemoryTree::new())), model.clone(), EngineConfig::default());
//! let view = engine.mount_markup(r#"<ul><li for="todo in todos">{todo.text}</li></ul>"#).unwrap();
//!
//! model.push("todos", json!({"text": "eggs"})).unwrap();
//! assert_eq!(engine.render(&view), "<ul><!--for--><li>milk</li><li>eggs</li><!--end--></ul>");
//! ```

pub mod binding;
pub mod bus;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod interpolation;
pub mod model;
pub mod path;
pub mod tree;

pub use binding::{Binder, Binding, BindingKind, ForDirective, ListBinding, Owner};
pub use bus::{EventBus, ListenerId, Payload};
pub use config::EngineConfig;
pub use engine::{builtin_actions, Directive, Engine, View};
pub use error::{FixSuggestion, LsdomError, Result};
pub use expr::eval::{ActionTable, Actions};
pub use expr::{compile, Compiled, Expression, Scope};
pub use interpolation::{split, Interpolated, TemplateString};
pub use model::Model;
pub use path::{get_path, set_path, Path};
pub use tree::{MemoryTree, NodeId, RenderTree};

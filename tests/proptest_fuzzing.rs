//! Property-based tests
//!
//! Coverage targets:
//! - Path round trips (path.rs)
//! - Expression and interpolation parsing (expr/, interpolation.rs)
//! - Markup parsing (tree/markup.rs)
//! - List reconciliation under random splices (binding/list.rs)

use proptest::prelude::*;
use serde_json::{json, Value};

// =============================================================================
// Paths
// =============================================================================

mod path_fuzzing {
    use super::*;
    use lsdom::{get_path, set_path, Path};

    prop_compose! {
        fn arb_segment()(segment in r"[a-z_][a-z0-9_]{0,8}") -> String {
            segment
        }
    }

    fn arb_path() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(
            arb_segment().prop_filter("length is synthesized", |s| s != "length"),
            1..5,
        )
    }

    proptest! {
        /// Property: a value written on an empty structure reads back
        #[test]
        fn set_then_get_round_trips(segments in arb_path(), n in any::<i64>()) {
            let path = segments.join(".");
            let mut data = json!({});
            set_path(&mut data, &path, json!(n)).unwrap();
            prop_assert_eq!(get_path(&data, &path), Some(json!(n)));
        }

        /// Property: writing one path never disturbs a sibling
        #[test]
        fn sibling_survives_write(segments in arb_path(), n in any::<i32>()) {
            let path = segments.join(".");
            let mut data = json!({"Keep": true});
            set_path(&mut data, &path, json!(n)).unwrap();
            prop_assert_eq!(get_path(&data, "Keep"), Some(json!(true)));
        }

        /// Property: dotted identifier paths parse to themselves
        #[test]
        fn dotted_paths_are_normalized_already(segments in arb_path()) {
            let raw = segments.join(".");
            let path = Path::parse(&raw).unwrap();
            prop_assert_eq!(path.as_str(), raw.as_str());
            prop_assert_eq!(path.segments().count(), segments.len());
        }

        /// Property: path parsing never panics
        #[test]
        fn path_parse_never_panics(raw in ".*") {
            let _ = Path::parse(&raw);
        }
    }
}

// =============================================================================
// Expressions and interpolation
// =============================================================================

mod parse_fuzzing {
    use super::*;
    use lsdom::{compile, split};

    proptest! {
        /// Property: compiling arbitrary text returns Ok or Err, never panics
        #[test]
        fn compile_never_panics(source in ".*") {
            let _ = compile(&source);
        }

        /// Property: splitting arbitrary text never panics
        #[test]
        fn split_never_panics(template in ".*") {
            let _ = split(&template);
        }

        /// Property: brace-free text is static and unchanged
        #[test]
        fn brace_free_text_is_static(text in "[^{}]*") {
            match split(&text).unwrap() {
                lsdom::Interpolated::Static(out) => prop_assert_eq!(out, text),
                lsdom::Interpolated::Dynamic(_) => prop_assert!(false, "expected static"),
            }
        }

        /// Property: integer arithmetic matches Rust
        #[test]
        fn addition_matches(a in -10_000i64..10_000, b in -10_000i64..10_000) {
            let compiled = compile("a + b").unwrap();
            let out = compiled.evaluate(&json!({"a": a, "b": b}));
            prop_assert_eq!(out.as_f64(), Some((a + b) as f64));
        }
    }
}

// =============================================================================
// Markup
// =============================================================================

mod markup_fuzzing {
    use super::*;
    use lsdom::tree::markup;
    use lsdom::{Engine, EngineConfig, MemoryTree, Model};
    use std::cell::RefCell;
    use std::rc::Rc;

    proptest! {
        /// Property: parsing arbitrary template text never panics
        #[test]
        fn markup_parse_never_panics(source in ".*") {
            let mut tree = MemoryTree::new();
            let _ = markup::parse(&mut tree, &source);
        }

        /// Property: tag soup built from markup fragments never panics
        #[test]
        fn markup_fragments_never_panic(
            parts in prop::collection::vec(
                prop_oneof![
                    Just("<"), Just(">"), Just("</"), Just("/>"), Just("<!--"), Just("-->"),
                    Just("<p"), Just("</p>"), Just("<li for=\"t in ts\">"), Just("</li>"),
                    Just("=\""), Just("'"), Just("{"), Just("}"), Just("&amp;"), Just("é"), Just(" "),
                ],
                0..24,
            )
        ) {
            let source = parts.concat();
            let mut tree = MemoryTree::new();
            let _ = markup::parse(&mut tree, &source);

            let engine = Engine::new(
                Rc::new(RefCell::new(MemoryTree::new())),
                Model::new(json!({})),
                EngineConfig::default(),
            );
            let _ = engine.check_markup(&source);
        }
    }
}

// =============================================================================
// List reconciliation
// =============================================================================

mod list_fuzzing {
    use super::*;
    use lsdom::{Engine, EngineConfig, MemoryTree, Model};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone)]
    enum Op {
        Insert { index: usize, values: Vec<u8> },
        Remove { index: usize, count: usize },
        Set { index: usize, value: u8 },
        Replace { values: Vec<u8> },
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0usize..8, prop::collection::vec(any::<u8>(), 1..4))
                .prop_map(|(index, values)| Op::Insert { index, values }),
            3 => (0usize..8, 1usize..3).prop_map(|(index, count)| Op::Remove { index, count }),
            2 => (0usize..8, any::<u8>()).prop_map(|(index, value)| Op::Set { index, value }),
            1 => prop::collection::vec(any::<u8>(), 0..5).prop_map(|values| Op::Replace { values }),
        ]
    }

    proptest! {
        /// Property: after any splice sequence the rendered items equal the list
        #[test]
        fn rendered_items_track_the_list(ops in prop::collection::vec(arb_op(), 0..24)) {
            let model = Model::new(json!({"items": []}));
            let engine = Engine::new(
                Rc::new(RefCell::new(MemoryTree::new())),
                model.clone(),
                EngineConfig::default(),
            );
            let view = engine
                .mount_markup(r#"<ul><li for="item in items">{item}</li></ul>"#)
                .unwrap();

            for op in ops {
                let len = model.get("items.length").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                match op {
                    Op::Insert { index, values } => {
                        let values = values.into_iter().map(Value::from).collect();
                        model.insert("items", index, values).unwrap();
                    }
                    Op::Remove { index, count } => {
                        model.remove("items", index, count).unwrap();
                    }
                    Op::Set { index, value } if index < len => {
                        model.set(&format!("items.{index}"), json!(value)).unwrap();
                    }
                    Op::Set { .. } => {}
                    Op::Replace { values } => {
                        model.set("items", json!(values)).unwrap();
                    }
                }
            }

            let expected: Vec<String> = match model.get("items") {
                Some(Value::Array(items)) => items.iter().map(|v| v.to_string()).collect(),
                _ => Vec::new(),
            };
            let tree = engine.tree().borrow();
            let rendered: Vec<String> = tree
                .elements_by_tag(*view.root(), "li")
                .into_iter()
                .map(|n| tree.text_content(n))
                .collect();
            prop_assert_eq!(rendered, expected.clone());

            // one text listener per rendered position, none beyond
            let bus = model.bus();
            for i in 0..expected.len() {
                prop_assert_eq!(bus.listener_count(&format!("set:items.{i}")), 1);
            }
            prop_assert_eq!(bus.listener_count(&format!("set:items.{}", expected.len())), 0);
        }
    }
}

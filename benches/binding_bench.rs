//! Quick benchmark for compilation, dispatch and list reconciliation

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use lsdom::{compile, split, Engine, EngineConfig, EventBus, MemoryTree, Model, Payload};
use serde_json::json;

fn main() {
    let expressions = vec![
        "done",
        "todos.length",
        "todos.0.text + ' (' + todos.0.tags.length + ')'",
        "filter == 'all' || (filter == 'done' && todo.done)",
        "{display: todos.length ? 'block' : 'none'}",
    ];

    println!("Expression Compilation");
    println!("======================\n");

    for source in &expressions {
        let iterations = 100_000;
        let start = Instant::now();
        for _ in 0..iterations {
            let _ = compile(source);
        }
        let elapsed = start.elapsed();

        println!("Expression: {:60}", format!("\"{}\"", source));
        println!("  Time for {} iterations: {:?}", iterations, elapsed);
        println!("  Per operation: {:?}\n", elapsed / iterations);
    }

    println!("Interpolation Render");
    println!("====================\n");

    let snapshot = json!({"user": {"name": "Ann"}, "todos": [1, 2, 3]});
    if let Ok(lsdom::Interpolated::Dynamic(template)) = split("Hi {user.name}, {todos.length} todos left") {
        let iterations = 200_000;
        let start = Instant::now();
        for _ in 0..iterations {
            let _ = template.render(&snapshot);
        }
        let elapsed = start.elapsed();
        println!("  Time for {} renders: {:?}", iterations, elapsed);
        println!("  Per operation: {:?}\n", elapsed / iterations);
    }

    println!("Event Bus Dispatch");
    println!("==================\n");

    let bus = EventBus::new();
    for i in 0..1_000 {
        bus.listen(&format!("set:items.{i}.text set:items.{i}.done"), |_| {});
    }
    let iterations = 1_000u32;
    let start = Instant::now();
    for _ in 0..iterations {
        bus.trigger("set:items", Payload::None);
    }
    let elapsed = start.elapsed();
    println!("  2000 descendant listeners x {} triggers: {:?}", iterations, elapsed);
    println!("  Per trigger: {:?}\n", elapsed / iterations);

    println!("List Reconciliation");
    println!("===================\n");

    for size in [100usize, 1_000] {
        let model = Model::new(json!({"todos": []}));
        let engine = Engine::new(
            Rc::new(RefCell::new(MemoryTree::new())),
            model.clone(),
            EngineConfig::default(),
        );
        let Ok(_view) = engine.mount_markup(
            r#"<ul><li for="todo in todos" classname="{done: todo.done}">{todo.text}</li></ul>"#,
        ) else {
            eprintln!("mount failed");
            return;
        };

        let start = Instant::now();
        for i in 0..size {
            let _ = model.push("todos", json!({"text": format!("item {i}"), "done": i % 2 == 0}));
        }
        let grow = start.elapsed();

        let start = Instant::now();
        while model.remove("todos", 0, 1).map(|r| !r.is_empty()).unwrap_or(false) {}
        let shrink = start.elapsed();

        println!("  {} items", size);
        println!("    push one by one:   {:?}", grow);
        println!("    remove from front: {:?}\n", shrink);
    }
}

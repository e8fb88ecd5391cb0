use anyhow::Context;
use dualgraph::{AttributeSpec, ElementType, Graph, GraphChangeEvent, GraphChangeListener, StoreConfig, ValueKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

const WRITERS: usize = 4;
const INCREMENTS: usize = 250;

#[derive(Default)]
struct CountingListener(AtomicUsize);

impl GraphChangeListener for CountingListener {
    fn graph_changed(&self, _event: &GraphChangeEvent) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => StoreConfig::from_file(&path).with_context(|| format!("loading {}", path))?,
        None => StoreConfig::default(),
    };

    println!("Dualgraph v{}", dualgraph::version());
    println!("==========================================");
    println!();

    let graph = Graph::with_config(config);
    let listener = Arc::new(CountingListener::default());
    graph.add_change_listener(listener.clone());

    demo_build(&graph)?;
    demo_concurrent_writers(&graph)?;
    demo_undo(&graph)?;

    let stats = graph.stats();
    println!("\n=== Statistics ===");
    println!("  Generation:       {}", stats.generation);
    println!("  Live generations: {}", stats.live_generations);
    println!("  Cores reclaimed:  {}", stats.cores_reclaimed);
    println!("  Cores forked:     {}", stats.cores_forked);
    println!("  Undo entries:     {}", stats.undo_entries);
    println!("  Redo entries:     {}", stats.redo_entries);
    println!("  Undo bytes:       {}", stats.undo_bytes);
    println!("  Change events:    {}", listener.0.load(Ordering::Relaxed));
    Ok(())
}

fn demo_build(graph: &Graph) -> anyhow::Result<()> {
    println!("=== Demo 1: Vertices and transactions ===");
    let mut wg = graph.write("Build graph")?;
    let name = wg.add_attribute(AttributeSpec::new(ElementType::Vertex, "name", ValueKind::String))?;
    let amount = wg.add_attribute(
        AttributeSpec::new(ElementType::Transaction, "amount", ValueKind::Double).with_description("Transfer amount"),
    )?;
    wg.add_attribute(AttributeSpec::new(ElementType::Graph, "counter", ValueKind::Int))?;

    let mut vertices = Vec::new();
    for person in ["Alice", "Bob", "Charlie"] {
        let vertex = wg.add_vertex()?;
        wg.set_value(name, vertex.as_u32(), person)?;
        vertices.push(vertex);
    }
    let t1 = wg.add_transaction(vertices[0], vertices[1], true)?;
    let t2 = wg.add_transaction(vertices[1], vertices[0], true)?;
    let t3 = wg.add_transaction(vertices[1], vertices[2], false)?;
    wg.set_double_value(amount, t1.as_u32(), 12.5)?;
    wg.set_double_value(amount, t2.as_u32(), 3.0)?;
    wg.set_double_value(amount, t3.as_u32(), 7.25)?;
    let generation = wg.commit("Build graph")?;

    let rg = graph.read()?;
    println!("✓ Committed generation {}", generation);
    println!("  Vertices:     {}", rg.vertex_count());
    println!("  Transactions: {}", rg.transaction_count());
    println!("  Edges:        {}", rg.edge_count());
    println!("  Links:        {}", rg.link_count());
    for vertex in rg.vertices() {
        let label = rg.get_string_value(name, vertex.as_u32())?.unwrap_or_default();
        println!("  {} has {} neighbours", label, rg.neighbours(vertex).len());
    }
    Ok(())
}

fn demo_concurrent_writers(graph: &Graph) -> anyhow::Result<()> {
    println!("\n=== Demo 2: Concurrent writers ===");
    let counter = graph
        .read()?
        .attribute(ElementType::Graph, "counter")
        .context("counter attribute missing")?;

    let workers: Vec<_> = (0..WRITERS)
        .map(|worker| {
            let graph = graph.clone();
            thread::spawn(move || -> anyhow::Result<()> {
                for _ in 0..INCREMENTS {
                    let mut wg = graph.write_insignificant(format!("Increment from worker {}", worker))?;
                    let value = wg.get_int_value(counter, 0)?;
                    wg.set_int_value(counter, 0, value + 1)?;
                    wg.commit("Increment counter")?;
                }
                Ok(())
            })
        })
        .collect();
    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
    }

    let value = graph.read()?.get_int_value(counter, 0)?;
    println!("✓ {} writers x {} increments = {}", WRITERS, INCREMENTS, value);
    Ok(())
}

fn demo_undo(graph: &Graph) -> anyhow::Result<()> {
    println!("\n=== Demo 3: Undo and redo ===");
    let before = graph.read()?.vertex_count();

    let mut wg = graph.write("Add vertex")?;
    wg.add_vertex()?;
    wg.commit("Add vertex")?;
    println!("✓ After commit: {} vertices", graph.read()?.vertex_count());

    graph.undo()?;
    println!("✓ After undo:   {} vertices (was {})", graph.read()?.vertex_count(), before);

    graph.redo()?;
    println!("✓ After redo:   {} vertices", graph.read()?.vertex_count());
    Ok(())
}

//! Undo and redo across committed transactions

use dualgraph::{
    AttributeSpec, ElementType, Graph, GraphChangeEvent, GraphChangeListener, GraphError, StoreConfig,
    UndoConfig, UndoRedoAction, UndoRedoReport, UndoRedoReportListener, ValueKind,
};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct Reports(Mutex<Vec<(UndoRedoAction, String)>>);

impl UndoRedoReportListener for Reports {
    fn add_new_undo_redo_report(&self, report: &UndoRedoReport) {
        self.0
            .lock()
            .push((report.action_type, report.action_description.clone()));
    }
}

#[derive(Default)]
struct Events(Mutex<Vec<GraphChangeEvent>>);

impl GraphChangeListener for Events {
    fn graph_changed(&self, event: &GraphChangeEvent) -> anyhow::Result<()> {
        self.0.lock().push(event.clone());
        Ok(())
    }
}

#[test]
fn test_undo_restores_values_and_counts() {
    let graph = Graph::new();
    let mut wg = graph.write("Schema").unwrap();
    let weight = wg
        .add_attribute(AttributeSpec::new(ElementType::Transaction, "weight", ValueKind::Double))
        .unwrap();
    let label = wg
        .add_attribute(AttributeSpec::new(ElementType::Vertex, "label", ValueKind::String))
        .unwrap();
    let a = wg.add_vertex().unwrap();
    wg.set_value(label, a.as_u32(), "a").unwrap();
    wg.commit("Schema").unwrap();

    let mut wg = graph.write("Grow").unwrap();
    let b = wg.add_vertex().unwrap();
    let c = wg.add_vertex().unwrap();
    let t = wg.add_transaction(a, b, true).unwrap();
    wg.add_transaction(b, c, false).unwrap();
    wg.set_double_value(weight, t.as_u32(), 2.5).unwrap();
    wg.set_value(label, a.as_u32(), "renamed").unwrap();
    wg.remove_vertex(c).unwrap();
    wg.commit("Grow").unwrap();

    {
        let rg = graph.read().unwrap();
        assert_eq!(rg.vertex_count(), 2);
        assert_eq!(rg.transaction_count(), 1);
        assert_eq!(rg.get_double_value(weight, t.as_u32()).unwrap(), 2.5);
    }

    graph.undo().unwrap();
    let rg = graph.read().unwrap();
    assert_eq!(rg.vertex_count(), 1);
    assert_eq!(rg.transaction_count(), 0);
    assert_eq!(rg.edge_count(), 0);
    assert_eq!(rg.link_count(), 0);
    assert_eq!(rg.get_string_value(label, a.as_u32()).unwrap().as_deref(), Some("a"));
}

#[test]
fn test_redo_reproduces_committed_state() {
    let graph = Graph::new();
    let mut wg = graph.write("Build").unwrap();
    let size = wg
        .add_attribute(AttributeSpec::new(ElementType::Vertex, "size", ValueKind::Int))
        .unwrap();
    let a = wg.add_vertex().unwrap();
    let b = wg.add_vertex().unwrap();
    let t = wg.add_transaction(a, b, false).unwrap();
    wg.set_int_value(size, b.as_u32(), 7).unwrap();
    wg.commit("Build").unwrap();

    let (edge, link) = {
        let rg = graph.read().unwrap();
        (rg.transaction_edge(t).unwrap(), rg.transaction_link(t).unwrap())
    };

    graph.undo().unwrap();
    assert_eq!(graph.read().unwrap().vertex_count(), 0);
    graph.redo().unwrap();

    let rg = graph.read().unwrap();
    assert_eq!(rg.vertex_count(), 2);
    assert_eq!(rg.get_int_value(size, b.as_u32()).unwrap(), 7);
    assert_eq!(rg.transaction_edge(t).unwrap(), edge);
    assert_eq!(rg.transaction_link(t).unwrap(), link);
    assert_eq!(rg.link_between(b, a), Some(link));
}

#[test]
fn test_new_commit_clears_redo() {
    let graph = Graph::new();
    let mut wg = graph.write("First").unwrap();
    wg.add_vertex().unwrap();
    wg.commit("First").unwrap();
    graph.undo().unwrap();
    assert!(graph.can_redo());

    let mut wg = graph.write("Second").unwrap();
    wg.add_vertex().unwrap();
    wg.commit("Second").unwrap();
    assert!(!graph.can_redo());
    assert_eq!(graph.redo(), Err(GraphError::NothingToRedo));
}

#[test]
fn test_insignificant_commits_fold_into_previous_entry() {
    let graph = Graph::new();
    let mut wg = graph.write("Add vertex").unwrap();
    let v = wg.add_vertex().unwrap();
    let score = wg
        .add_attribute(AttributeSpec::new(ElementType::Vertex, "score", ValueKind::Float))
        .unwrap();
    wg.commit("Add vertex").unwrap();

    let mut wg = graph.write_insignificant("Tweak").unwrap();
    wg.set_float_value(score, v.as_u32(), 0.5).unwrap();
    wg.commit("Tweak").unwrap();

    assert_eq!(graph.undo_name().as_deref(), Some("Add vertex"));
    assert_eq!(graph.stats().undo_entries, 1);
    graph.undo().unwrap();
    assert_eq!(graph.read().unwrap().vertex_count(), 0);
}

#[test]
fn test_history_is_bounded() {
    let config = StoreConfig {
        undo: UndoConfig {
            max_entries: 3,
            ..UndoConfig::default()
        },
        ..StoreConfig::default()
    };
    let graph = Graph::with_config(config);
    for i in 0..5 {
        let mut wg = graph.write(format!("Step {}", i)).unwrap();
        wg.add_vertex().unwrap();
        wg.commit(format!("Step {}", i)).unwrap();
    }
    assert_eq!(graph.stats().undo_entries, 3);
    for _ in 0..3 {
        graph.undo().unwrap();
    }
    assert_eq!(graph.undo(), Err(GraphError::NothingToUndo));
    assert_eq!(graph.read().unwrap().vertex_count(), 2);
}

#[test]
fn test_disabled_history_records_nothing() {
    let config = StoreConfig {
        undo: UndoConfig {
            enabled: false,
            ..UndoConfig::default()
        },
        ..StoreConfig::default()
    };
    let graph = Graph::with_config(config);
    let mut wg = graph.write("Add").unwrap();
    wg.add_vertex().unwrap();
    wg.commit("Add").unwrap();
    assert!(!graph.can_undo());
}

#[test]
fn test_reports_and_events_on_undo_redo() {
    let graph = Graph::new();
    let reports = Arc::new(Reports::default());
    let events = Arc::new(Events::default());
    graph.add_undo_redo_report_listener(reports.clone());
    graph.add_change_listener(events.clone());

    let mut wg = graph.write("Add vertex").unwrap();
    wg.add_vertex().unwrap();
    wg.commit("Add vertex").unwrap();
    graph.undo().unwrap();
    graph.redo().unwrap();

    assert_eq!(
        *reports.0.lock(),
        vec![
            (UndoRedoAction::Undo, "Add vertex".to_string()),
            (UndoRedoAction::Redo, "Add vertex".to_string()),
        ]
    );
    let events = events.0.lock();
    assert_eq!(events.len(), 3);
    assert_eq!(
        events.iter().map(|e| e.generation).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(events.iter().all(|e| e.structure_changed && e.graph_id == graph.id()));
}

#[test]
fn test_change_event_lists_changed_attributes() {
    let graph = Graph::new();
    let events = Arc::new(Events::default());
    let mut wg = graph.write("Schema").unwrap();
    let v = wg.add_vertex().unwrap();
    let a = wg
        .add_attribute(AttributeSpec::new(ElementType::Vertex, "a", ValueKind::Int))
        .unwrap();
    let b = wg
        .add_attribute(AttributeSpec::new(ElementType::Vertex, "b", ValueKind::Int))
        .unwrap();
    wg.commit("Schema").unwrap();

    let listener: Arc<dyn GraphChangeListener> = events.clone();
    graph.add_change_listener(Arc::clone(&listener));
    let mut wg = graph.write("Set b").unwrap();
    wg.set_int_value(b, v.as_u32(), 1).unwrap();
    wg.commit("Set b").unwrap();

    {
        let recorded = events.0.lock();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].changed_attributes, vec![b]);
        assert!(!recorded[0].changed_attributes.contains(&a));
        assert!(!recorded[0].structure_changed);
        assert_eq!(recorded[0].description, "Set b");
    }

    assert!(graph.remove_change_listener(&listener));
    graph.undo().unwrap();
    assert_eq!(events.0.lock().len(), 1);
}

fn vertex_order(core: &dualgraph::GraphCore) -> Vec<dualgraph::VertexId> {
    (0..core.vertex_count()).filter_map(|p| core.vertex(p)).collect()
}

#[test]
fn test_undo_keeps_vertex_positions() {
    let graph = Graph::new();
    let mut wg = graph.write("Build").unwrap();
    let vertices: Vec<_> = (0..4).map(|_| wg.add_vertex().unwrap()).collect();
    wg.add_transaction(vertices[0], vertices[3], true).unwrap();
    wg.commit("Build").unwrap();
    let original = vertex_order(&graph.read().unwrap());

    let mut wg = graph.write("Remove").unwrap();
    wg.remove_vertex(vertices[0]).unwrap();
    wg.commit("Remove").unwrap();
    assert_ne!(vertex_order(&graph.read().unwrap()), original);

    graph.undo().unwrap();
    let rg = graph.read().unwrap();
    assert_eq!(vertex_order(&rg), original);
    assert_eq!(rg.vertex_position(vertices[0]), Some(0));
}

#[test]
fn test_writer_after_rollback_sees_published_positions() {
    let graph = Graph::new();
    let mut wg = graph.write("Build").unwrap();
    let vertices: Vec<_> = (0..5).map(|_| wg.add_vertex().unwrap()).collect();
    wg.commit("Build").unwrap();

    let mut wg = graph.write("Discarded").unwrap();
    wg.remove_vertex(vertices[1]).unwrap();
    wg.remove_vertex(vertices[2]).unwrap();
    wg.roll_back();

    let published = vertex_order(&graph.read().unwrap());
    let wg = graph.write("Inspect").unwrap();
    assert_eq!(vertex_order(&wg), published);
    for (position, vertex) in published.iter().enumerate() {
        assert_eq!(wg.vertex(position), Some(*vertex));
    }
}

#[test]
fn test_undo_restores_transaction_endpoints() {
    let graph = Graph::new();
    let mut wg = graph.write("Build").unwrap();
    let a = wg.add_vertex().unwrap();
    let b = wg.add_vertex().unwrap();
    let c = wg.add_vertex().unwrap();
    let t = wg.add_transaction(a, b, true).unwrap();
    wg.commit("Build").unwrap();
    let (edge, link) = {
        let rg = graph.read().unwrap();
        (rg.transaction_edge(t).unwrap(), rg.transaction_link(t).unwrap())
    };

    let mut wg = graph.write("Redirect").unwrap();
    wg.set_transaction_destination(t, c).unwrap();
    wg.commit("Redirect").unwrap();
    let moved_edge = {
        let rg = graph.read().unwrap();
        assert_eq!(rg.transaction_destination(t).unwrap(), c);
        assert_eq!(rg.link_between(a, b), None);
        rg.transaction_edge(t).unwrap()
    };

    graph.undo().unwrap();
    {
        let rg = graph.read().unwrap();
        assert_eq!(rg.transaction_destination(t).unwrap(), b);
        assert_eq!(rg.transaction_edge(t).unwrap(), edge);
        assert_eq!(rg.transaction_link(t).unwrap(), link);
        assert_eq!(rg.link_between(a, c), None);
    }

    graph.redo().unwrap();
    let rg = graph.read().unwrap();
    assert_eq!(rg.transaction_destination(t).unwrap(), c);
    assert_eq!(rg.transaction_edge(t).unwrap(), moved_edge);
    assert_eq!(rg.link_count(), 1);
}

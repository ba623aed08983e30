mod common;

use std::sync::Arc;

use flowdag::dsl::{Node, Workflow};
use flowdag::error::{BindingError, NodeError, WorkflowError};
use flowdag::runtime::config::ExecutorConfig;
use flowdag::runtime::event::EventType;
use flowdag::runtime::executor::Executor;
use flowdag::runtime::registry::Registry;
use flowdag::runtime::scope::BindingPolicy;
use serde_json::json;

use common::{FailingTool, RecordingTool, inputs};

#[tokio::test]
async fn test_expr_feeds_end_output() {
    // 1. Define Workflow: start -> expr -> end
    let workflow = Workflow::new("scenario-1", "increment")
        .link([
            Node::start("start"),
            Node::expr("expr", "inputs.x + 1"),
            Node::end("end").output("result", "{{expr}}"),
        ])
        .build();

    // 2. Execute
    let executor = Executor::new(&workflow, Arc::new(Registry::new())).expect("Compilation failed");
    let result = executor.execute(inputs(json!({ "x": 1 }))).await.expect("Run failed");

    // 3. Verify
    assert_eq!(result.outputs, json!({ "result": 2 }).as_object().cloned().unwrap());
    assert_eq!(result.scope.get("expr"), Some(&json!(2)));
    assert_eq!(result.scope.get("start"), Some(&json!({ "x": 1 })));
}

#[tokio::test]
async fn test_every_node_executes_exactly_once() {
    let recorder = Arc::new(RecordingTool::new("record", "ok"));
    let registry = Registry::new();
    registry.register_tool(recorder.clone());

    // start fans out to three tools which all join on `end`
    let mut builder = Workflow::new("fan", "fan out");
    builder.add_node(Node::start("start")).add_node(Node::end("end"));
    for id in ["t1", "t2", "t3"] {
        builder
            .add_node(Node::tool(id, "record").input("from", id))
            .connect("start", id)
            .connect(id, "end");
    }
    let workflow = builder.build();

    let executor = Executor::new(&workflow, Arc::new(registry)).unwrap();
    let result = executor.execute(inputs(json!({}))).await.unwrap();

    assert_eq!(result.scope.len(), 5);
    let mut seen: Vec<String> = recorder
        .calls()
        .iter()
        .map(|args| args["from"].as_str().unwrap().to_string())
        .collect();
    seen.sort();
    assert_eq!(seen, vec!["t1", "t2", "t3"]);
}

#[tokio::test]
async fn test_nested_bindings_resolve_against_tool_results() {
    let registry = Registry::new();
    registry.register_tool(Arc::new(RecordingTool::new(
        "search",
        r#"{"items": [{"title": "rust"}, {"title": "tokio"}]}"#,
    )));

    let workflow = Workflow::new("nested", "nested paths")
        .link([
            Node::start("start"),
            Node::tool("search", "search").input("q", "{{inputs.query}}"),
            Node::end("end")
                .output("first", "{{search.result.items.0.title}}")
                .output("items", "{{search.result.items}}")
                .output("summary", "top hit for {{inputs.query}}: {{search.result.items.1.title}}"),
        ])
        .build();

    let executor = Executor::new(&workflow, Arc::new(registry)).unwrap();
    let result = executor.execute(inputs(json!({ "query": "async" }))).await.unwrap();

    assert_eq!(result.outputs["first"], json!("rust"));
    assert_eq!(result.outputs["items"], json!([{ "title": "rust" }, { "title": "tokio" }]));
    assert_eq!(result.outputs["summary"], json!("top hit for async: tokio"));
}

#[tokio::test]
async fn test_node_failure_reports_node_and_kind() {
    let registry = Registry::new();
    registry.register_tool(Arc::new(FailingTool));

    let workflow = Workflow::new("failing", "failing tool")
        .link([Node::start("start"), Node::tool("explode", "explode"), Node::end("end")])
        .build();

    let executor = Executor::new(&workflow, Arc::new(registry)).unwrap();
    let err = executor.execute(inputs(json!({}))).await.unwrap_err();

    match err {
        WorkflowError::Node { node_id, kind, source } => {
            assert_eq!(node_id, "explode");
            assert_eq!(kind.as_str(), "tool");
            assert!(matches!(source, NodeError::Tool(_)));
            assert!(source.to_string().contains("boom"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_tool_is_a_hard_failure() {
    let workflow = Workflow::new("no-tool", "missing tool")
        .link([Node::start("start"), Node::tool("call", "nowhere"), Node::end("end")])
        .build();

    let executor = Executor::new(&workflow, Arc::new(Registry::new())).unwrap();
    let err = executor.execute(inputs(json!({}))).await.unwrap_err();

    assert_eq!(err.node_id(), Some("call"));
    assert!(matches!(
        err,
        WorkflowError::Node { source: NodeError::ToolNotFound { .. }, .. }
    ));
}

fn unresolved_reference_workflow() -> Workflow {
    Workflow::new("scenario-4", "dangling reference")
        .link([
            Node::start("start"),
            Node::tool("call", "record").input("arg", "{{inputs.missing.path}}"),
            Node::end("end"),
        ])
        .build()
}

#[tokio::test]
async fn test_unresolved_binding_fails_before_invocation() {
    let recorder = Arc::new(RecordingTool::new("record", "ok"));
    let registry = Registry::new();
    registry.register_tool(recorder.clone());

    let executor = Executor::new(&unresolved_reference_workflow(), Arc::new(registry)).unwrap();
    let err = executor.execute(inputs(json!({}))).await.unwrap_err();

    match err {
        WorkflowError::Node {
            node_id,
            source: NodeError::Binding(binding),
            ..
        } => {
            assert_eq!(node_id, "call");
            assert_eq!(binding, BindingError::Unresolved("inputs.missing.path".into()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_lenient_binding_passes_null_argument() {
    let recorder = Arc::new(RecordingTool::new("record", "ok"));
    let registry = Registry::new();
    registry.register_tool(recorder.clone());

    let config = ExecutorConfig::default().with_binding_policy(BindingPolicy::Lenient);
    let executor = Executor::new(&unresolved_reference_workflow(), Arc::new(registry))
        .unwrap()
        .with_config(config);
    let result = executor.execute(inputs(json!({}))).await.unwrap();

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["arg"], json!(null));
    assert_eq!(result.scope.get("call"), Some(&json!({ "result": "ok" })));
}

#[tokio::test]
async fn test_same_output_from_two_end_nodes_conflicts() {
    // start forks into two end nodes that both bind `answer`
    let mut builder = Workflow::new("conflict", "conflicting outputs");
    builder
        .add_node(Node::start("start"))
        .add_node(Node::fork_gateway("fork"))
        .add_node(Node::end("end_a").output("answer", "a"))
        .add_node(Node::end("end_b").output("answer", "b"))
        .connect("start", "fork")
        .connect("fork", "end_a")
        .connect("fork", "end_b");
    let workflow = builder.build();

    let executor = Executor::new(&workflow, Arc::new(Registry::new())).unwrap();
    let err = executor.execute(inputs(json!({}))).await.unwrap_err();

    match err {
        WorkflowError::ConflictingOutput { name, first, second } => {
            assert_eq!(name, "answer");
            assert_eq!((first.as_str(), second.as_str()), ("end_a", "end_b"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_spawned_run_publishes_lifecycle_events() {
    let workflow = Workflow::new("events", "events")
        .link([
            Node::start("start"),
            Node::expr("double", "inputs.n * 2"),
            Node::end("end").output("value", "{{double}}"),
        ])
        .build();

    let executor = Executor::new(&workflow, Arc::new(Registry::new())).unwrap();
    let (events, result) = executor.spawn(inputs(json!({ "n": 21 }))).collect().await;
    let result = result.expect("Run failed");

    assert_eq!(result.outputs["value"], json!(42));

    let started: Vec<&str> = events
        .iter()
        .filter(|e| e.kind == EventType::NodeStarted)
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(started, vec!["start", "double", "end"]);

    let output = events
        .iter()
        .find(|e| e.kind == EventType::Output)
        .expect("no output event");
    assert_eq!(output.name, "value");
    assert_eq!(output.data, json!(42));

    let last = events.last().expect("no events");
    assert_eq!(last.kind, EventType::NodeFinished);
    assert_eq!(last.name, "end");
    assert!(events.iter().any(|e| e.kind == EventType::End && e.data == json!({ "value": 42 })));
}

#[tokio::test]
async fn test_node_timeout() {
    let registry = Registry::new();
    registry.register_tool(Arc::new(common::SleepTool::new("slow", 2_000)));

    let workflow = Workflow::new("timeout", "slow tool")
        .link([Node::start("start"), Node::tool("slow", "slow"), Node::end("end")])
        .build();

    let executor = Executor::new(&workflow, Arc::new(registry))
        .unwrap()
        .with_config(ExecutorConfig::default().with_node_timeout_secs(1));
    let err = executor.execute(inputs(json!({}))).await.unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Node { source: NodeError::Timeout(_), .. }
    ));
}

#[tokio::test]
async fn test_compiled_workflow_runs_repeatedly() {
    let workflow = Workflow::new("reuse", "reuse")
        .link([
            Node::start("start"),
            Node::expr("sum", "inputs.a + inputs.b"),
            Node::end("end").output("sum", "{{sum}}"),
        ])
        .build();
    let executor = Executor::new(&workflow, Arc::new(Registry::new())).unwrap();

    let first = executor.execute(inputs(json!({ "a": 1, "b": 2 }))).await.unwrap();
    let second = executor.execute(inputs(json!({ "a": 10, "b": 5 }))).await.unwrap();

    assert_eq!(first.outputs["sum"], json!(3));
    assert_eq!(second.outputs["sum"], json!(15));
    assert_ne!(first.run_id, second.run_id);
}

mod common;

use std::sync::Arc;

use flowdag::dsl::{Node, Workflow};
use flowdag::error::{NodeError, WorkflowError};
use flowdag::runtime::event::EventType;
use flowdag::runtime::executor::Executor;
use flowdag::runtime::registry::Registry;
use serde_json::json;

use common::{RecordingTool, inputs};

fn routing_workflow() -> Workflow {
    let mut builder = Workflow::new("router", "answer or search");
    builder
        .link([
            Node::start("start"),
            Node::exclusive_gateway("route").input("decision", "{{inputs.decision}}"),
        ])
        .link_with_condition(
            "route",
            r#"decision == "direct""#,
            Node::expr("answer", r#""answered directly""#),
            [Node::end("end").output("path", "{{route.next.0}}")],
        )
        .link_with_condition(
            "route",
            r#"decision == "search""#,
            Node::tool("search", "search").input("q", "{{inputs.question}}"),
            [Node::expr("summarize", "search.result"), Node::end("end")],
        );
    builder.build()
}

fn search_registry() -> Arc<Registry> {
    let registry = Registry::new();
    registry.register_tool(Arc::new(RecordingTool::new("search", "three results")));
    Arc::new(registry)
}

#[tokio::test]
async fn test_only_selected_branch_executes() {
    let executor = Executor::new(&routing_workflow(), search_registry()).unwrap();
    let result = executor
        .execute(inputs(json!({ "decision": "search", "question": "what is a DAG?" })))
        .await
        .unwrap();

    let executed: Vec<&str> = result.scope.node_ids().collect();
    assert_eq!(executed, vec!["end", "route", "search", "start", "summarize"]);
    assert!(!result.scope.contains("answer"));
    assert_eq!(result.scope.get("route"), Some(&json!({ "next": ["search"] })));
    assert_eq!(result.scope.get("summarize"), Some(&json!("three results")));
    assert_eq!(result.outputs["path"], json!("search"));
}

#[tokio::test]
async fn test_other_branch_skips_search() {
    let executor = Executor::new(&routing_workflow(), search_registry()).unwrap();
    let (events, result) = executor
        .spawn(inputs(json!({ "decision": "direct", "question": "hi" })))
        .collect()
        .await;
    let result = result.unwrap();

    assert_eq!(result.scope.get("answer"), Some(&json!("answered directly")));
    assert_eq!(result.outputs["path"], json!("answer"));

    let skipped: Vec<&str> = events
        .iter()
        .filter(|e| e.kind == EventType::NodeSkipped)
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(skipped, vec!["search", "summarize"]);
}

fn threshold_workflow() -> Workflow {
    let mut builder = Workflow::new("threshold", "threshold");
    builder
        .link([Node::start("start"), Node::exclusive_gateway("gw")])
        .link_with_condition("gw", "inputs.n > 0", Node::expr("positive", "1"), [Node::end("end")])
        .link_with_condition("gw", "inputs.n > 10", Node::expr("large", "2"), [Node::end("end")])
        .link_with_condition("gw", "", Node::expr("fallback", "3"), [Node::end("end")]);
    builder.build()
}

#[tokio::test]
async fn test_first_true_condition_wins() {
    let executor = Executor::new(&threshold_workflow(), Arc::new(Registry::new())).unwrap();
    let result = executor.execute(inputs(json!({ "n": 50 }))).await.unwrap();

    assert!(result.scope.contains("positive"));
    assert!(!result.scope.contains("large"));
    assert!(!result.scope.contains("fallback"));
    assert!(result.scope.contains("end"));
}

#[tokio::test]
async fn test_default_branch_when_nothing_matches() {
    let executor = Executor::new(&threshold_workflow(), Arc::new(Registry::new())).unwrap();
    let result = executor.execute(inputs(json!({ "n": -1 }))).await.unwrap();

    assert_eq!(result.scope.get("gw"), Some(&json!({ "next": ["fallback"] })));
    assert!(result.scope.contains("fallback"));
    assert!(!result.scope.contains("positive"));
}

#[tokio::test]
async fn test_no_matching_branch_without_default() {
    let mut builder = Workflow::new("strict-gw", "no default");
    builder
        .link([Node::start("start"), Node::exclusive_gateway("gw")])
        .link_with_condition("gw", "inputs.n == 1", Node::end("one"), Vec::new())
        .link_with_condition("gw", "inputs.n == 2", Node::end("two"), Vec::new());
    let workflow = builder.build();

    let executor = Executor::new(&workflow, Arc::new(Registry::new())).unwrap();
    let err = executor.execute(inputs(json!({ "n": 3 }))).await.unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Node { ref node_id, source: NodeError::NoMatchingBranch, .. } if node_id == "gw"
    ));
}

#[tokio::test]
async fn test_condition_on_missing_variable_fails() {
    let executor = Executor::new(&threshold_workflow(), Arc::new(Registry::new())).unwrap();
    let err = executor.execute(inputs(json!({}))).await.unwrap_err();

    match err {
        WorkflowError::Node {
            node_id,
            source: NodeError::Expression { expr, .. },
            ..
        } => {
            assert_eq!(node_id, "gw");
            assert_eq!(expr, "inputs.n > 0");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_parallel_fork_runs_every_branch() {
    let mut builder = Workflow::new("fork", "parallel");
    builder
        .link([Node::start("start"), Node::fork_gateway("fork")])
        .link_with_condition("fork", "", Node::expr("left", "inputs.v + 1"), [Node::end("end")])
        .link_with_condition("fork", "", Node::expr("right", "inputs.v * 10"), [Node::end("end")]);
    let mut workflow = builder.build();
    let end = workflow.nodes.iter_mut().find(|n| n.id == "end").unwrap();
    end.outputs.insert("left".into(), flowdag::dsl::Parameter::new("{{left}}"));
    end.outputs.insert("right".into(), flowdag::dsl::Parameter::new("{{right}}"));

    let executor = Executor::new(&workflow, Arc::new(Registry::new())).unwrap();
    let result = executor.execute(inputs(json!({ "v": 4 }))).await.unwrap();

    assert_eq!(result.outputs["left"], json!(5));
    assert_eq!(result.outputs["right"], json!(40));
    assert_eq!(result.scope.get("fork"), Some(&json!({ "next": ["left", "right"] })));
}

#[tokio::test]
async fn test_inclusive_fork_takes_matching_and_unconditional_branches() {
    let mut builder = Workflow::new("inclusive", "inclusive");
    builder
        .link([Node::start("start"), Node::inclusive_gateway("gw")])
        .link_with_condition("gw", "inputs.n > 0", Node::expr("a", "1"), [Node::end("end")])
        .link_with_condition("gw", "inputs.n > 100", Node::expr("b", "2"), [Node::end("end")])
        .link_with_condition("gw", "", Node::expr("c", "3"), [Node::end("end")]);
    let workflow = builder.build();

    let executor = Executor::new(&workflow, Arc::new(Registry::new())).unwrap();
    let result = executor.execute(inputs(json!({ "n": 5 }))).await.unwrap();

    assert!(result.scope.contains("a"));
    assert!(!result.scope.contains("b"));
    assert!(result.scope.contains("c"));
    assert!(result.scope.contains("end"));
}

#[tokio::test]
async fn test_fork_routes_to_a_shared_target_once() {
    // two conditional edges lead to `a`, declared around the edge to `b`
    let mut builder = Workflow::new("shared-target", "shared target");
    builder
        .add_node(Node::start("start"))
        .add_node(Node::inclusive_gateway("gw"))
        .add_node(Node::expr("a", "1"))
        .add_node(Node::expr("b", "2"))
        .add_node(Node::end("end"))
        .connect("start", "gw")
        .connect_if("gw", "a", "true")
        .connect("gw", "b")
        .connect_if("gw", "a", "inputs.n > 0")
        .connect("a", "end")
        .connect("b", "end");
    let workflow = builder.build();

    let executor = Executor::new(&workflow, Arc::new(Registry::new())).unwrap();
    let result = executor.execute(inputs(json!({ "n": 1 }))).await.unwrap();

    assert_eq!(result.scope.get("gw"), Some(&json!({ "next": ["a", "b"] })));
    assert_eq!(result.scope.get("a"), Some(&json!(1)));
    assert!(result.scope.contains("end"));
}

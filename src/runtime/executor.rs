use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tokio::time::timeout;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::compiler::core::Compiler;
use crate::compiler::graph::NodeIndex;
use crate::dsl::Workflow;
use crate::error::{NodeError, WorkflowError};
use crate::runtime::blueprint::{Blueprint, CompiledNode};
use crate::runtime::config::ExecutorConfig;
use crate::runtime::context::ExecRequest;
use crate::runtime::event::{Event, EventSink, EventType};
use crate::runtime::node::Outcome;
use crate::runtime::registry::Registry;
use crate::runtime::scope::{BindingPolicy, Scope, ScopeSnapshot, resolve_inputs};
use crate::runtime::state::RunState;

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: Uuid,
    /// Union of the outputs of every end node that executed.
    pub outputs: Map<String, Value>,
    /// Final scope: caller inputs plus one entry per executed node.
    pub scope: Scope,
}

/// A run started with [`Executor::spawn`].
#[derive(Debug)]
pub struct RunHandle {
    events: mpsc::Receiver<Event>,
    handle: JoinHandle<Result<RunResult, WorkflowError>>,
}

impl RunHandle {
    pub fn events(&mut self) -> &mut mpsc::Receiver<Event> {
        &mut self.events
    }

    /// Waits for the run, discarding events not yet read.
    pub async fn wait(self) -> Result<RunResult, WorkflowError> {
        let RunHandle { events, handle } = self;
        drop(events);
        handle.await.map_err(|e| WorkflowError::Aborted(e.to_string()))?
    }

    /// Reads every event until the run ends, then returns them with the result.
    pub async fn collect(mut self) -> (Vec<Event>, Result<RunResult, WorkflowError>) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let result = match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(WorkflowError::Aborted(e.to_string())),
        };
        (events, result)
    }
}

/// 工作流执行器
///
/// Runs a compiled [`Blueprint`] level by level: every ready node of a level
/// is spawned on its own task against the same scope snapshot, and results are
/// merged by this controller once the whole level has joined.
#[derive(Debug, Clone)]
pub struct Executor {
    blueprint: Arc<Blueprint>,
    registry: Arc<Registry>,
    config: ExecutorConfig,
}

impl Executor {
    /// Compiles `workflow`; definition errors surface here.
    pub fn new(workflow: &Workflow, registry: Arc<Registry>) -> Result<Self, WorkflowError> {
        let blueprint = Compiler::new().compile(workflow)?;
        Ok(Self::from_blueprint(Arc::new(blueprint), registry))
    }

    pub fn from_blueprint(blueprint: Arc<Blueprint>, registry: Arc<Registry>) -> Self {
        Self {
            blueprint,
            registry,
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub async fn execute(&self, inputs: HashMap<String, Value>) -> Result<RunResult, WorkflowError> {
        self.run(inputs, EventSink::disabled()).await
    }

    /// Executes while publishing events to `tx`. A full channel applies
    /// backpressure to the publishing node.
    pub async fn execute_with_events(
        &self,
        inputs: HashMap<String, Value>,
        tx: mpsc::Sender<Event>,
    ) -> Result<RunResult, WorkflowError> {
        self.run(inputs, EventSink::new(tx)).await
    }

    /// Starts the run on a background task and hands back its event stream.
    pub fn spawn(&self, inputs: HashMap<String, Value>) -> RunHandle {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let executor = self.clone();
        let handle = tokio::spawn(async move { executor.execute_with_events(inputs, tx).await });
        RunHandle { events: rx, handle }
    }

    async fn run(&self, inputs: HashMap<String, Value>, events: EventSink) -> Result<RunResult, WorkflowError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("workflow", workflow_id = %self.blueprint.id, run_id = %run_id);
        self.drive(run_id, inputs, events).instrument(span).await
    }

    async fn drive(
        &self,
        run_id: Uuid,
        inputs: HashMap<String, Value>,
        events: EventSink,
    ) -> Result<RunResult, WorkflowError> {
        let graph = &self.blueprint.graph;
        let mut scope = Scope::new(inputs.into_iter().collect());
        let mut state = RunState::new(graph);
        let mut executed_ends = Vec::new();
        let started = Instant::now();

        info!(nodes = graph.len(), "workflow started");

        let mut level_no = 0usize;
        loop {
            let level = state.take_ready();
            if level.is_empty() {
                break;
            }
            level_no += 1;
            debug!(level = level_no, width = level.len(), "level started");

            let outcomes = {
                let snapshot = Arc::new(scope.snapshot());
                self.run_level(run_id, &level, &snapshot, &events).await?
            };

            // Single writer: merge in topological order so runs are deterministic.
            for (index, outcome) in outcomes {
                let node = self.blueprint.node(index);
                let chosen = match outcome {
                    Outcome::Value(value) => {
                        self.record(&mut scope, &node.id, value);
                        None
                    }
                    Outcome::Route(targets) => {
                        let chosen: Vec<NodeIndex> =
                            targets.iter().filter_map(|t| graph.node_index(t)).collect();
                        self.record(&mut scope, &node.id, json!({ "next": targets }));
                        Some(chosen)
                    }
                };
                if node.node.is_end() {
                    executed_ends.push(index);
                }

                for skipped in state.complete(index, chosen.as_deref()) {
                    let skipped_id = graph.node_id(skipped);
                    debug!(node_id = %skipped_id, "node skipped");
                    events
                        .emit(Event::new(skipped_id, Value::Null, EventType::NodeSkipped))
                        .await;
                }
            }
        }

        let pending = state.unresolved();
        if !pending.is_empty() {
            let pending: Vec<String> = pending.into_iter().map(|i| graph.node_id(i).to_string()).collect();
            error!(pending = ?pending, "workflow stalled");
            return Err(WorkflowError::Stalled { pending });
        }

        let outputs = self.collect_outputs(&scope, executed_ends)?;
        info!(
            levels = level_no,
            executed = scope.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "workflow finished"
        );

        Ok(RunResult {
            run_id,
            outputs,
            scope,
        })
    }

    fn record(&self, scope: &mut Scope, node_id: &str, value: Value) {
        if !scope.insert(node_id, value) {
            warn!(node_id, "node result already recorded, keeping the first");
        }
    }

    /// Spawns every node of the level and joins them all. The first failure
    /// aborts the remaining siblings.
    async fn run_level(
        &self,
        run_id: Uuid,
        level: &[NodeIndex],
        snapshot: &Arc<ScopeSnapshot>,
        events: &EventSink,
    ) -> Result<Vec<(NodeIndex, Outcome)>, WorkflowError> {
        let mut set = JoinSet::new();
        let mut tasks: HashMap<Id, NodeIndex> = HashMap::with_capacity(level.len());

        for &index in level {
            let node = Arc::clone(self.blueprint.node(index));
            let span = info_span!("node", node_id = %node.id, kind = %node.kind);
            let task = execute_node(
                node,
                run_id,
                Arc::clone(snapshot),
                events.clone(),
                Arc::clone(&self.registry),
                self.config.binding_policy,
                self.config.node_timeout(),
            );
            let handle = set.spawn(task.instrument(span));
            tasks.insert(handle.id(), index);
        }

        let mut outcomes = Vec::with_capacity(level.len());
        while let Some(joined) = set.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(join_error) => (join_error.id(), Err(NodeError::Panicked(panic_message(join_error)))),
            };
            let index = tasks
                .get(&id)
                .copied()
                .ok_or_else(|| WorkflowError::Aborted(format!("unknown node task {}", id)))?;

            match result {
                Ok(outcome) => outcomes.push((index, outcome)),
                Err(source) => {
                    set.abort_all();
                    let node = self.blueprint.node(index);
                    error!(node_id = %node.id, kind = %node.kind, error = %source, "node failed");
                    return Err(WorkflowError::Node {
                        node_id: node.id.clone(),
                        kind: node.kind,
                        source,
                    });
                }
            }
        }

        let graph = &self.blueprint.graph;
        outcomes.sort_by_key(|(index, _)| graph.topo_position(*index));
        Ok(outcomes)
    }

    /// Merges the outputs of the executed end nodes in topological order.
    fn collect_outputs(
        &self,
        scope: &Scope,
        mut executed_ends: Vec<NodeIndex>,
    ) -> Result<Map<String, Value>, WorkflowError> {
        let graph = &self.blueprint.graph;
        executed_ends.sort_by_key(|&i| graph.topo_position(i));

        let mut outputs = Map::new();
        let mut bound_by: HashMap<String, String> = HashMap::new();
        for index in executed_ends {
            let end_id = graph.node_id(index);
            let Some(Value::Object(values)) = scope.get(end_id) else {
                continue;
            };
            for (name, value) in values {
                if let Some(first) = bound_by.get(name) {
                    return Err(WorkflowError::ConflictingOutput {
                        name: name.clone(),
                        first: first.clone(),
                        second: end_id.to_string(),
                    });
                }
                bound_by.insert(name.clone(), end_id.to_string());
                outputs.insert(name.clone(), value.clone());
            }
        }
        Ok(outputs)
    }
}

async fn execute_node(
    node: Arc<CompiledNode>,
    run_id: Uuid,
    scope: Arc<ScopeSnapshot>,
    events: EventSink,
    registry: Arc<Registry>,
    policy: BindingPolicy,
    limit: Option<Duration>,
) -> Result<Outcome, NodeError> {
    let started = Instant::now();
    events
        .emit(Event::new(node.id.clone(), json!({ "kind": node.kind }), EventType::NodeStarted))
        .await;

    let inputs = resolve_inputs(&node.inputs, &scope, policy)?;
    let req = ExecRequest {
        run_id,
        node_id: node.id.clone(),
        inputs,
        scope,
        events,
        registry,
        policy,
    };

    let outcome = match limit {
        Some(limit) => timeout(limit, node.node.execute(&req))
            .await
            .map_err(|_| NodeError::Timeout(limit))??,
        None => node.node.execute(&req).await?,
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    debug!(elapsed_ms, "node finished");
    let data = match &outcome {
        Outcome::Value(value) => value.clone(),
        Outcome::Route(targets) => json!({ "next": targets }),
    };
    req.emit(json!({ "result": data, "elapsed_ms": elapsed_ms }), EventType::NodeFinished)
        .await;
    Ok(outcome)
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

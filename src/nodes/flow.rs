use tracing::debug;

use crate::dsl::Edge;
use crate::error::{DefinitionError, NodeError};
use crate::nodes::expr::{Expression, build_context};
use crate::runtime::context::ExecRequest;
use crate::runtime::node::Outcome;

#[derive(Debug)]
struct Branch {
    target: String,
    condition: Option<Expression>,
}

fn compile_branches(kind: &'static str, outgoing: &[&Edge]) -> Result<Vec<Branch>, DefinitionError> {
    if outgoing.len() < 2 {
        return Err(DefinitionError::TooFewBranches {
            kind,
            found: outgoing.len(),
        });
    }
    outgoing
        .iter()
        .map(|edge| -> Result<Branch, DefinitionError> {
            let condition = edge.condition().map(Expression::compile).transpose()?;
            Ok(Branch {
                target: edge.target.clone(),
                condition,
            })
        })
        .collect()
}

// --- EXCLUSIVE GATEWAY ---

/// Selects exactly one branch: the first conditional edge (in declared order)
/// that evaluates to true, otherwise the unconditional default edge.
#[derive(Debug)]
pub struct ExclusiveGateway {
    branches: Vec<Branch>,
    default: Option<String>,
}

impl ExclusiveGateway {
    pub fn prepare(outgoing: &[&Edge]) -> Result<Self, DefinitionError> {
        let mut branches = Vec::new();
        let mut default = None;

        for branch in compile_branches("exclusive", outgoing)? {
            if branch.condition.is_some() {
                branches.push(branch);
            } else if default.is_some() {
                return Err(DefinitionError::MultipleDefaults);
            } else {
                default = Some(branch.target);
            }
        }

        Ok(Self { branches, default })
    }

    pub async fn execute(&self, req: &ExecRequest) -> Result<Outcome, NodeError> {
        let ctx = build_context(&req.inputs)?;

        for branch in &self.branches {
            let Some(condition) = &branch.condition else {
                continue;
            };
            if condition.eval_boolean(&ctx)? {
                debug!(target_node = %branch.target, condition = condition.source(), "branch selected");
                return Ok(Outcome::Route(vec![branch.target.clone()]));
            }
        }

        match &self.default {
            Some(target) => {
                debug!(target_node = %target, "default branch selected");
                Ok(Outcome::Route(vec![target.clone()]))
            }
            None => Err(NodeError::NoMatchingBranch),
        }
    }
}

// --- FORK GATEWAY ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkMode {
    /// Every outgoing branch.
    Parallel,
    /// Every branch whose condition holds; unconditional branches always.
    Inclusive,
}

#[derive(Debug)]
pub struct ForkGateway {
    mode: ForkMode,
    branches: Vec<Branch>,
}

impl ForkGateway {
    pub fn prepare(mode: ForkMode, outgoing: &[&Edge]) -> Result<Self, DefinitionError> {
        let kind = match mode {
            ForkMode::Parallel => "parallel",
            ForkMode::Inclusive => "inclusive",
        };
        let branches = compile_branches(kind, outgoing)?;
        Ok(Self { mode, branches })
    }

    pub async fn execute(&self, req: &ExecRequest) -> Result<Outcome, NodeError> {
        let ctx = match self.mode {
            ForkMode::Parallel => None,
            ForkMode::Inclusive => Some(build_context(&req.inputs)?),
        };

        let mut targets: Vec<String> = Vec::with_capacity(self.branches.len());
        for branch in &self.branches {
            let taken = match (&ctx, &branch.condition) {
                (Some(ctx), Some(condition)) => condition.eval_boolean(ctx)?,
                _ => true,
            };
            // several edges may lead to the same target; route to it once
            if taken && !targets.contains(&branch.target) {
                targets.push(branch.target.clone());
            }
        }

        if targets.is_empty() {
            return Err(NodeError::NoMatchingBranch);
        }
        Ok(Outcome::Route(targets))
    }
}

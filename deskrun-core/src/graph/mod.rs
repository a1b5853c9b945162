pub mod budgets;
mod node;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use uuid::Uuid;

use crate::error::{GraphBuildError, GraphMutationError};
use crate::types::{Method, Plan, PlanStep};

pub use node::{StepNode, StepStatus};

/// Dependency graph of a plan's steps.
///
/// Built once from the plan, validated (unknown dependencies, cycles), then frozen for the
/// duration of a run. A frozen graph only accepts per-node status changes.
#[derive(Debug, Clone, Serialize)]
pub struct StepGraph {
    nodes: Vec<StepNode>,
    #[serde(skip)]
    index: BTreeMap<String, usize>,
    frozen: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rolled_back: usize,
}

impl StepGraph {
    pub fn from_plan(plan: &Plan) -> Result<Self, GraphBuildError> {
        Self::from_steps(&plan.steps)
    }

    pub fn from_steps(steps: &[PlanStep]) -> Result<Self, GraphBuildError> {
        if steps.is_empty() {
            return Err(GraphBuildError::EmptyPlan);
        }
        let nodes = build_nodes(steps, 1, None);
        let mut graph = Self {
            nodes,
            index: BTreeMap::new(),
            frozen: false,
        };
        graph.reindex()?;
        graph.validate()?;
        Ok(graph)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn assert_mutable(&self) -> Result<(), GraphMutationError> {
        if self.frozen {
            Err(GraphMutationError::Frozen)
        } else {
            Ok(())
        }
    }

    /// Appends a step. Without explicit dependencies it chains onto the current last node.
    pub fn add_node(&mut self, step: &PlanStep) -> Result<String, GraphMutationError> {
        self.assert_mutable()?;
        let prev = self.nodes.last().map(|n| n.id.clone());
        let seq = self.nodes.len() + 1;
        let mut added = build_nodes(std::slice::from_ref(step), seq, prev);
        let node = added.remove(0);
        let id = node.id.clone();

        let before = self.nodes.clone();
        self.nodes.push(node);
        if let Err(e) = self.reindex().and_then(|_| self.validate()) {
            self.nodes = before;
            self.reindex()?;
            return Err(e.into());
        }
        Ok(id)
    }

    pub fn remove_node(&mut self, id: &str) -> Result<StepNode, GraphMutationError> {
        self.assert_mutable()?;
        let pos = self.position(id)?;
        let before = self.nodes.clone();
        let removed = self.nodes.remove(pos);
        self.renumber();
        if let Err(e) = self.reindex().and_then(|_| self.validate()) {
            self.nodes = before;
            self.reindex()?;
            return Err(e.into());
        }
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Option<&StepNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Per-node runtime state stays writable after freezing.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut StepNode> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.nodes[i]),
            None => None,
        }
    }

    pub fn nodes(&self) -> &[StepNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// PENDING nodes whose predecessors are all done: the execution frontier.
    pub fn pending_nodes(&self) -> Vec<&StepNode> {
        self.nodes
            .iter()
            .filter(|n| n.status == StepStatus::Pending)
            .filter(|n| {
                n.depends_on
                    .iter()
                    .all(|d| self.get(d).map(|p| p.is_done()).unwrap_or(false))
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.nodes.iter().all(|n| n.is_done())
    }

    pub fn has_failed(&self) -> bool {
        self.nodes.iter().any(|n| n.status == StepStatus::Failed)
    }

    pub fn failed_nodes(&self) -> Vec<&StepNode> {
        self.nodes
            .iter()
            .filter(|n| n.status == StepStatus::Failed)
            .collect()
    }

    /// `(done, total)` where done counts SUCCESS and SKIPPED nodes.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.nodes.iter().filter(|n| n.is_done()).count();
        (done, self.nodes.len())
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.nodes.iter().filter(|n| n.status == status).count()
    }

    /// Resets every node from `id` onward (in plan order) to PENDING.
    ///
    /// Returns how many nodes were reset. The frozen flag is restored afterwards.
    pub fn replan_from(&mut self, id: &str) -> Result<usize, GraphMutationError> {
        let pos = self.position(id)?;
        let was_frozen = self.frozen;
        self.frozen = false;
        let mut reset = 0;
        for node in &mut self.nodes[pos..] {
            node.reset();
            reset += 1;
        }
        self.frozen = was_frozen;
        tracing::info!(from = id, reset, "graph suffix reset for replan");
        Ok(reset)
    }

    /// Replaces the suffix starting at `id` with a fresh sub-plan.
    ///
    /// The first new step inherits the replaced node's predecessors unless it declares its
    /// own. On a validation error the graph is left exactly as it was.
    pub fn splice_from(
        &mut self,
        id: &str,
        steps: &[PlanStep],
    ) -> Result<Vec<String>, GraphMutationError> {
        if steps.is_empty() {
            return Err(GraphBuildError::EmptyPlan.into());
        }
        let pos = self.position(id)?;
        let was_frozen = self.frozen;
        self.frozen = false;

        let before = self.nodes.clone();
        let inherited = self.nodes[pos].depends_on.clone();
        self.nodes.truncate(pos);

        let mut fresh = build_nodes(steps, pos + 1, None);
        if let Some(first) = fresh.first_mut() {
            if steps[0].depends_on.is_none() {
                first.depends_on = inherited;
            }
        }
        let ids: Vec<String> = fresh.iter().map(|n| n.id.clone()).collect();
        self.nodes.extend(fresh);

        let outcome = self.reindex().and_then(|_| self.validate());
        if let Err(e) = outcome {
            self.nodes = before;
            self.reindex()?;
            self.frozen = was_frozen;
            return Err(e.into());
        }
        self.frozen = was_frozen;
        tracing::info!(from = id, added = ids.len(), "sub-plan spliced into graph");
        Ok(ids)
    }

    pub fn summary(&self) -> GraphSummary {
        let mut s = GraphSummary {
            total: self.nodes.len(),
            ..Default::default()
        };
        for n in &self.nodes {
            match n.status {
                StepStatus::Pending => s.pending += 1,
                StepStatus::Running => s.running += 1,
                StepStatus::Success => s.success += 1,
                StepStatus::Failed => s.failed += 1,
                StepStatus::Skipped => s.skipped += 1,
                StepStatus::RolledBack => s.rolled_back += 1,
            }
        }
        s
    }

    pub fn to_dot(&self, task: &str) -> String {
        let mut out = String::new();
        out.push_str("digraph deskrun {\n");
        out.push_str(&format!("  label=\"task: {}\";\n", task.replace('"', "'")));
        out.push_str("  labelloc=t;\n");
        out.push_str("  rankdir=LR;\n");
        for n in &self.nodes {
            out.push_str(&format!(
                "  \"{}\" [label=\"{}. {} ({})\"];\n",
                n.id,
                n.seq,
                n.action,
                n.status.as_str()
            ));
            for dep in &n.depends_on {
                out.push_str(&format!("  \"{dep}\" -> \"{}\";\n", n.id));
            }
        }
        out.push_str("}\n");
        out
    }

    fn position(&self, id: &str) -> Result<usize, GraphMutationError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphMutationError::UnknownNode(id.to_string()))
    }

    fn renumber(&mut self) {
        for (i, n) in self.nodes.iter_mut().enumerate() {
            n.seq = i + 1;
        }
    }

    fn reindex(&mut self) -> Result<(), GraphBuildError> {
        let mut index = BTreeMap::new();
        for (i, n) in self.nodes.iter().enumerate() {
            if index.insert(n.id.clone(), i).is_some() {
                return Err(GraphBuildError::DuplicateId(n.id.clone()));
            }
        }
        self.index = index;
        Ok(())
    }

    fn validate(&self) -> Result<(), GraphBuildError> {
        if self.nodes.is_empty() {
            return Err(GraphBuildError::EmptyPlan);
        }
        for n in &self.nodes {
            for d in &n.depends_on {
                if !self.index.contains_key(d) {
                    return Err(GraphBuildError::UnknownDependency {
                        node: n.id.clone(),
                        dependency: d.clone(),
                    });
                }
            }
        }

        let mut visited = BTreeSet::new();
        let mut stack = BTreeSet::new();
        for n in &self.nodes {
            self.visit(&n.id, &mut visited, &mut stack)?;
        }
        Ok(())
    }

    // DFS with a recursion stack; a back edge into the stack is a cycle.
    fn visit<'a>(
        &'a self,
        id: &'a str,
        visited: &mut BTreeSet<&'a str>,
        stack: &mut BTreeSet<&'a str>,
    ) -> Result<(), GraphBuildError> {
        if stack.contains(id) {
            return Err(GraphBuildError::Cycle(id.to_string()));
        }
        if !visited.insert(id) {
            return Ok(());
        }
        stack.insert(id);
        if let Some(node) = self.get(id) {
            for dep in &node.depends_on {
                self.visit(dep, visited, stack)?;
            }
        }
        stack.remove(id);
        Ok(())
    }
}

fn build_nodes(steps: &[PlanStep], first_seq: usize, prev: Option<String>) -> Vec<StepNode> {
    let mut prev = prev;
    let mut out = Vec::with_capacity(steps.len());
    for (offset, step) in steps.iter().enumerate() {
        let seq = first_seq + offset;
        let id = step
            .id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| generate_id(seq));
        let depends_on = match &step.depends_on {
            Some(deps) => deps.clone(),
            None => prev.iter().cloned().collect(),
        };
        let action = step.action.trim().to_string();
        let rollback_action = step
            .rollback
            .clone()
            .or_else(|| budgets::rollback_action(&action).map(str::to_string));

        out.push(StepNode {
            id: id.clone(),
            seq,
            value: step.value.clone(),
            method: Method::parse_lenient(&step.method),
            depends_on,
            timeout_ms: budgets::action_timeout(&action).as_millis() as u64,
            max_retries: budgets::action_max_retries(&action),
            rollback_action,
            action,
            status: StepStatus::Pending,
            attempts: 0,
            error: None,
            started_at: None,
            finished_at: None,
            method_used: None,
        });
        prev = Some(id);
    }
    out
}

fn generate_id(seq: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("s{seq}_{}", &hex[..6])
}

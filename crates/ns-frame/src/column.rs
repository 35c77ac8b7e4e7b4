//! Named column definitions and dependency resolution.
//!
//! A [`ColumnGraph`] maps column names to nodes of two kinds:
//!
//! - **index-sourced** nodes receive the row index and read external storage
//!   (e.g. an [`EventStore`](crate::event::EventStore));
//! - **derived** nodes receive only the resolved values of their declared
//!   dependencies, in declaration order.
//!
//! Dependencies may be declared in any order. Unknown names and cycles are
//! reported by [`ColumnGraph::validate`] (run when a pipeline is constructed)
//! and by [`ColumnGraph::plan`], before any row is evaluated.

use std::collections::HashMap;

use crate::error::{FrameError, GraphError, Result};
use crate::lorentz::LorentzVector;

/// A single cell value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnValue {
    /// Real number.
    Scalar(f64),
    /// Four-momentum.
    Vector(LorentzVector),
}

impl ColumnValue {
    /// The scalar payload, or an evaluation error for a vector.
    #[inline]
    pub fn as_scalar(&self) -> Result<f64> {
        match self {
            ColumnValue::Scalar(x) => Ok(*x),
            ColumnValue::Vector(v) => {
                Err(FrameError::Evaluation(format!("expected scalar, found four-vector {v:?}")))
            }
        }
    }

    /// The four-vector payload, or an evaluation error for a scalar.
    #[inline]
    pub fn as_vector(&self) -> Result<LorentzVector> {
        match self {
            ColumnValue::Vector(v) => Ok(*v),
            ColumnValue::Scalar(x) => {
                Err(FrameError::Evaluation(format!("expected four-vector, found scalar {x}")))
            }
        }
    }
}

impl From<f64> for ColumnValue {
    fn from(x: f64) -> Self {
        ColumnValue::Scalar(x)
    }
}

impl From<LorentzVector> for ColumnValue {
    fn from(v: LorentzVector) -> Self {
        ColumnValue::Vector(v)
    }
}

type IndexFn<'a> = Box<dyn Fn(usize) -> Result<ColumnValue> + 'a>;
type DeriveFn<'a> = Box<dyn Fn(&[ColumnValue]) -> Result<ColumnValue> + 'a>;

enum Evaluator<'a> {
    IndexSourced(IndexFn<'a>),
    Derived(DeriveFn<'a>),
}

/// Node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Reads external storage by row index.
    IndexSourced,
    /// Pure function of other columns.
    Derived,
}

struct ColumnNode<'a> {
    name: String,
    dependencies: Vec<String>,
    evaluator: Evaluator<'a>,
}

/// Registry of named column definitions.
///
/// The lifetime `'a` bounds whatever the evaluators borrow (event storage,
/// reference frames).
#[derive(Default)]
pub struct ColumnGraph<'a> {
    nodes: Vec<ColumnNode<'a>>,
    name_to_index: HashMap<String, usize>,
}

impl std::fmt::Debug for ColumnGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnGraph").field("columns", &self.column_names()).finish()
    }
}

impl<'a> ColumnGraph<'a> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self { nodes: Vec::new(), name_to_index: HashMap::new() }
    }

    /// Register an index-sourced column.
    ///
    /// The evaluator fails when the row does not exist in its storage.
    pub fn define_indexed<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn(usize) -> Result<ColumnValue> + 'a,
    {
        self.insert(name, Vec::new(), Evaluator::IndexSourced(Box::new(f)))
    }

    /// Register a derived column computed from `dependencies`.
    ///
    /// The evaluator receives the dependency values in the order given here.
    pub fn define<F>(&mut self, name: &str, dependencies: &[&str], f: F) -> Result<()>
    where
        F: Fn(&[ColumnValue]) -> Result<ColumnValue> + 'a,
    {
        if dependencies.contains(&name) {
            return Err(GraphError::CyclicDependency(vec![name.to_string(), name.to_string()])
                .into());
        }
        let deps = dependencies.iter().map(|d| d.to_string()).collect();
        self.insert(name, deps, Evaluator::Derived(Box::new(f)))
    }

    fn insert(
        &mut self,
        name: &str,
        dependencies: Vec<String>,
        evaluator: Evaluator<'a>,
    ) -> Result<()> {
        if self.name_to_index.contains_key(name) {
            return Err(GraphError::DuplicateColumn(name.to_string()).into());
        }
        self.name_to_index.insert(name.to_string(), self.nodes.len());
        self.nodes.push(ColumnNode { name: name.to_string(), dependencies, evaluator });
        Ok(())
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Registered column names, in registration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// Number of registered columns.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no column is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Kind of a registered column.
    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.name_to_index.get(name).map(|&i| match self.nodes[i].evaluator {
            Evaluator::IndexSourced(_) => ColumnKind::IndexSourced,
            Evaluator::Derived(_) => ColumnKind::Derived,
        })
    }

    /// Declared dependencies of a registered column.
    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.name_to_index.get(name).map(|&i| self.nodes[i].dependencies.as_slice())
    }

    /// Check that every dependency resolves and that the graph is acyclic.
    pub fn validate(&self) -> Result<()> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack = Vec::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        for idx in 0..self.nodes.len() {
            self.visit(idx, &mut marks, &mut stack, &mut order)?;
        }
        Ok(())
    }

    /// Compile an evaluation plan for `requested` columns.
    ///
    /// The plan holds the transitive dependency closure in topological order;
    /// each column appears exactly once regardless of how many dependents it has.
    pub fn plan(&self, requested: &[&str]) -> Result<EvaluationPlan> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack = Vec::new();
        let mut order = Vec::new();
        for name in requested {
            let idx = self
                .name_to_index
                .get(*name)
                .copied()
                .ok_or_else(|| GraphError::UnknownColumn(name.to_string()))?;
            self.visit(idx, &mut marks, &mut stack, &mut order)?;
        }

        let mut slot_of = vec![usize::MAX; self.nodes.len()];
        for (slot, &node) in order.iter().enumerate() {
            slot_of[node] = slot;
        }

        let steps = order
            .iter()
            .map(|&node| PlanStep {
                node,
                inputs: self.nodes[node]
                    .dependencies
                    .iter()
                    .map(|d| slot_of[self.name_to_index[d.as_str()]])
                    .collect(),
            })
            .collect();

        let outputs = requested.iter().map(|name| slot_of[self.name_to_index[*name]]).collect();

        Ok(EvaluationPlan { steps, outputs })
    }

    /// Depth-first post-order visit with cycle detection.
    fn visit(
        &self,
        idx: usize,
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[idx] {
            Mark::Done => return Ok(()),
            Mark::Active => {
                let start = stack.iter().position(|&i| i == idx).unwrap_or(0);
                let mut path: Vec<String> =
                    stack[start..].iter().map(|&i| self.nodes[i].name.clone()).collect();
                path.push(self.nodes[idx].name.clone());
                return Err(GraphError::CyclicDependency(path).into());
            }
            Mark::Unvisited => {}
        }

        marks[idx] = Mark::Active;
        stack.push(idx);
        for dep in &self.nodes[idx].dependencies {
            let dep_idx = self.name_to_index.get(dep.as_str()).copied().ok_or_else(|| {
                GraphError::UnknownDependency {
                    column: self.nodes[idx].name.clone(),
                    dependency: dep.clone(),
                }
            })?;
            self.visit(dep_idx, marks, stack, order)?;
        }
        stack.pop();
        marks[idx] = Mark::Done;
        order.push(idx);
        Ok(())
    }

    /// Evaluate one plan step for `row`, reading inputs from `slots`.
    #[inline]
    pub(crate) fn evaluate_step(
        &self,
        step: &PlanStep,
        row: usize,
        slots: &[ColumnValue],
        scratch: &mut Vec<ColumnValue>,
    ) -> Result<ColumnValue> {
        let node = &self.nodes[step.node];
        let value = match &node.evaluator {
            Evaluator::IndexSourced(f) => f(row),
            Evaluator::Derived(f) => {
                scratch.clear();
                scratch.extend(step.inputs.iter().map(|&s| slots[s]));
                f(scratch)
            }
        };
        value.map_err(|e| match e {
            FrameError::Evaluation(msg) => {
                FrameError::Evaluation(format!("column '{}' (row {row}): {msg}", node.name))
            }
            other => other,
        })
    }

    pub(crate) fn name_of(&self, step: &PlanStep) -> &str {
        &self.nodes[step.node].name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

/// One evaluation step: a node and the slots holding its inputs.
#[derive(Debug, Clone)]
pub struct PlanStep {
    node: usize,
    inputs: Vec<usize>,
}

/// Topologically ordered evaluation steps for a set of requested columns.
///
/// Slot `i` holds the value computed by step `i`; inputs always refer to
/// earlier slots.
#[derive(Debug, Clone)]
pub struct EvaluationPlan {
    steps: Vec<PlanStep>,
    outputs: Vec<usize>,
}

impl EvaluationPlan {
    /// Steps in evaluation order.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Slot of each requested column, in request order.
    pub fn outputs(&self) -> &[usize] {
        &self.outputs
    }

    /// Number of columns evaluated per row.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no column is evaluated.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

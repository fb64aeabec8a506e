// src/fragment.rs

//! Fragment payloads and the opaque task bodies they point at.
//!
//! A fragment is an atomic, independently schedulable unit of work. The
//! scheduler only sees [`FragmentData`]; the actual work is a [`TaskBody`]
//! looked up by name in a [`TaskRegistry`], so the subprocess backend can
//! resolve the same body on the other side of the exchange artifact.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dag::Dag;
use crate::result::ResultRecord;

/// Input environment of a fragment: opaque key/value pairs the body needs.
pub type TaskEnv = BTreeMap<String, Value>;

/// Immutable snapshot of predecessor return values, keyed by the
/// predecessors' unqualified names.
pub type PreviousValues = BTreeMap<String, Value>;

/// Payload stored in the DAG for one fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentData {
    /// Globally unique fragment id, e.g. `"mytest.run"`.
    pub uid: String,

    /// Unqualified fragment name, e.g. `"run"`. Dependents see this
    /// fragment's return value under this key.
    pub name: String,

    /// Name of the task body to invoke, resolved through a [`TaskRegistry`].
    pub callback: String,

    #[serde(default)]
    pub env: TaskEnv,
}

impl FragmentData {
    pub fn new(
        uid: impl Into<String>,
        name: impl Into<String>,
        callback: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            callback: callback.into(),
            env: TaskEnv::new(),
        }
    }

    pub fn with_env(mut self, env: TaskEnv) -> Self {
        self.env = env;
        self
    }
}

/// Everything a task body gets to see while executing.
#[derive(Debug)]
pub struct TaskContext<'a> {
    pub uid: &'a str,
    pub env: &'a TaskEnv,
    pub previous_values: &'a PreviousValues,
    /// Slot the executing worker occupies; useful to partition scratch
    /// resources between concurrent fragments.
    pub slot: usize,
}

/// What a task body produces: result records for the report, plus a return
/// value made visible to dependent fragments (in-process backend only).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutput {
    pub results: Vec<ResultRecord>,
    pub value: Value,
}

impl TaskOutput {
    pub fn new(results: Vec<ResultRecord>) -> Self {
        Self {
            results,
            value: Value::Null,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }
}

/// An opaque fragment body.
///
/// Bodies may panic; both backends convert a panic into a single synthetic
/// failure result instead of letting it reach the scheduler.
pub trait TaskBody: Send + Sync {
    fn execute(&self, ctx: &TaskContext<'_>) -> TaskOutput;
}

impl<F> TaskBody for F
where
    F: Fn(&TaskContext<'_>) -> TaskOutput + Send + Sync,
{
    fn execute(&self, ctx: &TaskContext<'_>) -> TaskOutput {
        self(ctx)
    }
}

/// Name → body mapping shared by both execution backends.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    bodies: HashMap<String, Arc<dyn TaskBody>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, body: impl TaskBody + 'static) {
        self.bodies.insert(name.into(), Arc::new(body));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskBody>> {
        self.bodies.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bodies.contains_key(name)
    }
}

/// Return values of completed fragments, keyed by fragment id.
///
/// Owned by the scheduling thread: it is only written from the collection
/// callback and only read when building the snapshot handed to a newly
/// dispatched worker, both of which run inside the polling loop.
#[derive(Debug, Default)]
pub struct ValueStore {
    values: HashMap<String, Value>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uid: impl Into<String>, value: Value) {
        self.values.insert(uid.into(), value);
    }

    pub fn get(&self, uid: &str) -> Option<&Value> {
        self.values.get(uid)
    }

    /// Snapshot of the return values of `uid`'s predecessors, keyed by their
    /// unqualified names. The snapshot is a deep copy: mutating it cannot
    /// affect the store. Predecessors without a recorded value (e.g. run by
    /// the subprocess backend, which does not propagate values) are omitted.
    pub fn snapshot(&self, dag: &Dag<FragmentData>, uid: &str) -> PreviousValues {
        dag.predecessors(uid)
            .iter()
            .filter_map(|pred| {
                let data = dag.payload(pred)?;
                let value = self.values.get(pred)?.clone();
                Some((data.name.clone(), value))
            })
            .collect()
    }
}

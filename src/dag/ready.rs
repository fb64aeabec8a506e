// src/dag/ready.rs

use indexmap::IndexMap;
use tracing::debug;

use crate::dag::Dag;

/// Per-run state of a fragment, from the iterator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    /// Not yielded yet; may still be blocked on predecessors.
    Waiting,
    /// Yielded to the caller and presumably dispatched; not completed.
    Busy,
    /// [`ReadyIter::leave`] was called for it.
    Completed,
}

/// Outcome of one pull on the ready iterator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pull<'d, P> {
    /// A fragment whose predecessors have all completed. Yielded exactly
    /// once per fragment.
    Ready(&'d str, &'d P),
    /// Fragments remain, but every one of them waits on a busy predecessor.
    /// Callers must keep polling; this is not exhaustion.
    Blocked,
    /// Every fragment has been yielded.
    Exhausted,
}

/// Iterator over the fragments of a [`Dag`] in dependency order.
///
/// Candidates are scanned in DAG insertion order, so dispatch order is
/// deterministic for a fixed graph. A fragment becomes ready once every
/// predecessor has been passed to [`ReadyIter::leave`]; completion is always
/// explicit, whether the fragment succeeded or failed.
#[derive(Debug)]
pub struct ReadyIter<'d, P> {
    dag: &'d Dag<P>,
    states: IndexMap<String, NodeState>,
    yielded: usize,
}

impl<'d, P> ReadyIter<'d, P> {
    pub fn new(dag: &'d Dag<P>) -> Self {
        let states = dag
            .ids()
            .map(|uid| (uid.to_string(), NodeState::Waiting))
            .collect();
        Self {
            dag,
            states,
            yielded: 0,
        }
    }

    /// Pull the next dispatchable fragment, if any.
    pub fn next_ready(&mut self) -> Pull<'d, P> {
        if self.yielded == self.states.len() {
            return Pull::Exhausted;
        }

        // Two-phase scan: pick the candidate first, then flip its state.
        let mut found: Option<String> = None;
        for (uid, state) in self.states.iter() {
            if *state == NodeState::Waiting && self.preds_completed(uid) {
                found = Some(uid.clone());
                break;
            }
        }

        match found {
            Some(uid) => {
                if let Some(state) = self.states.get_mut(&uid) {
                    *state = NodeState::Busy;
                }
                self.yielded += 1;
                debug!(fragment = %uid, "fragment ready");
                match self.dag.entry(&uid) {
                    Some((key, data)) => Pull::Ready(key, data),
                    // states is built from the dag, so the entry exists.
                    None => unreachable!("ready fragment '{uid}' missing from DAG"),
                }
            }
            None => Pull::Blocked,
        }
    }

    /// Mark a previously yielded fragment as completed, unblocking
    /// successors whose last pending predecessor it was.
    ///
    /// # Panics
    ///
    /// Calling this twice for the same id, or for an id that was never
    /// yielded, is a caller bug and panics.
    pub fn leave(&mut self, uid: &str) {
        match self.states.get_mut(uid) {
            Some(state @ NodeState::Busy) => {
                *state = NodeState::Completed;
                debug!(fragment = %uid, "fragment left");
            }
            Some(NodeState::Waiting) => {
                panic!("leave called for fragment '{uid}' that was never yielded")
            }
            Some(NodeState::Completed) => {
                panic!("leave called twice for fragment '{uid}'")
            }
            None => panic!("leave called for unknown fragment '{uid}'"),
        }
    }

    /// Whether every fragment has been yielded.
    pub fn is_exhausted(&self) -> bool {
        self.yielded == self.states.len()
    }

    pub fn completed_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| **s == NodeState::Completed)
            .count()
    }

    fn preds_completed(&self, uid: &str) -> bool {
        self.dag
            .predecessors(uid)
            .iter()
            .all(|pred| self.states.get(pred) == Some(&NodeState::Completed))
    }
}

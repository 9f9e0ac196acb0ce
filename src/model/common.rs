use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub type Id = String;

/// Deduplicated set of backend node identifiers
pub type NodeIdSet = BTreeSet<Id>;

/// Node identifier -> business code, as returned by the generic hierarchy resolver.
/// The key space doubles as the deduplicated id set.
pub type CodesById = HashMap<Id, String>;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Collect the key space of a [`CodesById`] map into an id set
pub fn id_set(codes_by_id: &CodesById) -> NodeIdSet {
    codes_by_id.keys().cloned().collect()
}

/// Identifies one instance hierarchy: the pair (instance, dimension)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HierarchyKey {
    pub instance_id: Id,
    pub dimension_name: String,
}

impl HierarchyKey {
    pub fn new(instance_id: impl Into<Id>, dimension_name: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            dimension_name: dimension_name.into(),
        }
    }
}

/// Per-call context threaded through every driver operation.
///
/// Carries a request id for log correlation and an optional deadline. The
/// deadline is honoured best-effort: work that has not been dispatched yet is
/// skipped once it has passed, a store call already in flight is left alone.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub request_id: String,
    pub deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            request_id: generate_id(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            request_id: generate_id(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

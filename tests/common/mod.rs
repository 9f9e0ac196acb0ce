#![allow(dead_code)]

use hierarchy_store::seed;
use hierarchy_store::store::query::Statement;
use hierarchy_store::{EdgeRecord, GraphError, GraphResult, GraphStore, MemoryGraph, NodeRecord};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const INSTANCE: &str = "cpih-2021-1";
pub const DIMENSION: &str = "aggregate";
pub const WITH_DATA: &str = "cpih1dim1S90401";

/// Seeded graph where only `WITH_DATA` carries observations
pub async fn seeded_graph() -> MemoryGraph {
    let graph = MemoryGraph::new();
    seed::load_seed_data(&graph).await;
    seed::load_instance_data(&graph, INSTANCE, DIMENSION, &[WITH_DATA]).await;
    graph
}

/// Wraps a store and records every statement it receives
pub struct RecordingStore {
    inner: Arc<dyn GraphStore>,
    statements: Mutex<Vec<Statement>>,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn GraphStore>) -> Self {
        Self {
            inner,
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.statements.lock().len()
    }

    pub fn op_names(&self) -> Vec<&'static str> {
        self.statements.lock().iter().map(|s| s.op.name()).collect()
    }

    fn record(&self, statement: &Statement) {
        self.statements.lock().push(statement.clone());
    }
}

#[async_trait::async_trait]
impl GraphStore for RecordingStore {
    async fn run_mutation(&self, statement: &Statement) -> GraphResult<()> {
        self.record(statement);
        self.inner.run_mutation(statement).await
    }

    async fn run_count(&self, statement: &Statement) -> GraphResult<i64> {
        self.record(statement);
        self.inner.run_count(statement).await
    }

    async fn run_string_list(&self, statement: &Statement) -> GraphResult<Vec<String>> {
        self.record(statement);
        self.inner.run_string_list(statement).await
    }

    async fn run_node_query(&self, statement: &Statement) -> GraphResult<Vec<NodeRecord>> {
        self.record(statement);
        self.inner.run_node_query(statement).await
    }

    async fn run_edge_query(&self, statement: &Statement) -> GraphResult<Vec<EdgeRecord>> {
        self.record(statement);
        self.inner.run_edge_query(statement).await
    }

    async fn run_tabular_query(&self, statement: &Statement) -> GraphResult<Vec<Value>> {
        self.record(statement);
        self.inner.run_tabular_query(statement).await
    }
}

/// Fails the first `failures` mutations with the scripted error, then delegates
pub struct FailingStore {
    inner: Arc<dyn GraphStore>,
    failures: usize,
    error: fn() -> GraphError,
    mutations: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn GraphStore>, failures: usize, error: fn() -> GraphError) -> Self {
        Self {
            inner,
            failures,
            error,
            mutations: AtomicUsize::new(0),
        }
    }

    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GraphStore for FailingStore {
    async fn run_mutation(&self, statement: &Statement) -> GraphResult<()> {
        let seen = self.mutations.fetch_add(1, Ordering::SeqCst);
        if seen < self.failures {
            return Err((self.error)());
        }
        self.inner.run_mutation(statement).await
    }

    async fn run_count(&self, statement: &Statement) -> GraphResult<i64> {
        self.inner.run_count(statement).await
    }

    async fn run_string_list(&self, statement: &Statement) -> GraphResult<Vec<String>> {
        self.inner.run_string_list(statement).await
    }

    async fn run_node_query(&self, statement: &Statement) -> GraphResult<Vec<NodeRecord>> {
        self.inner.run_node_query(statement).await
    }

    async fn run_edge_query(&self, statement: &Statement) -> GraphResult<Vec<EdgeRecord>> {
        self.inner.run_edge_query(statement).await
    }

    async fn run_tabular_query(&self, statement: &Statement) -> GraphResult<Vec<Value>> {
        self.inner.run_tabular_query(statement).await
    }
}

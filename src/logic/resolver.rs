use crate::logic::batch::BatchScheduler;
use crate::model::{CallContext, CodesById, NodeIdCode};
use crate::store::error::{GraphError, GraphResult};
use crate::store::query::{Dialect, Op, Statement};
use crate::store::traits::GraphStore;
use log::info;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Finds the generic hierarchy nodes an instance hierarchy needs.
///
/// Codes are deduplicated, split into reader-sized batches and resolved
/// concurrently; per-batch (id -> code) pairs are merged into one map keyed by
/// node id, so a node reached from several codes is reported once.
pub struct GenericHierarchyResolver {
    store: Arc<dyn GraphStore>,
    dialect: Arc<dyn Dialect>,
    scheduler: BatchScheduler,
}

impl GenericHierarchyResolver {
    pub fn new(
        store: Arc<dyn GraphStore>,
        dialect: Arc<dyn Dialect>,
        scheduler: BatchScheduler,
    ) -> Self {
        Self {
            store,
            dialect,
            scheduler,
        }
    }

    /// Generic nodes of the code list whose code is one of `codes`
    pub async fn resolve_node_ids(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        codes: &[String],
    ) -> GraphResult<CodesById> {
        self.resolve(ctx, code_list_id, codes, false).await
    }

    /// Every ancestor (transitively, through `hasParent`) of the generic nodes
    /// whose code is one of `codes`. The matched nodes themselves are not
    /// included unless they are an ancestor of another match.
    pub async fn resolve_ancestor_ids(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        codes: &[String],
    ) -> GraphResult<CodesById> {
        self.resolve(ctx, code_list_id, codes, true).await
    }

    async fn resolve(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        codes: &[String],
        ancestries: bool,
    ) -> GraphResult<CodesById> {
        if codes.is_empty() {
            return Ok(CodesById::new());
        }

        let unique: BTreeSet<String> = codes.iter().cloned().collect();
        let phase = if ancestries {
            "get_generic_hierarchy_ancestries_ids"
        } else {
            "get_generic_hierarchy_node_ids"
        };
        info!(
            "[{}] {}: code_list_id={} num_codes={} batch_size={} max_workers={}",
            ctx.request_id,
            phase,
            code_list_id,
            unique.len(),
            self.scheduler.batch_size(),
            self.scheduler.max_workers()
        );

        let store = Arc::clone(&self.store);
        let dialect = Arc::clone(&self.dialect);
        let code_list_id = code_list_id.to_string();

        let outcome = self
            .scheduler
            .run(ctx, unique, move |chunk: Vec<String>| {
                let store = Arc::clone(&store);
                let code_list_id = code_list_id.clone();
                let op = if ancestries {
                    Op::GetGenericHierarchyAncestryIds {
                        code_list_id,
                        codes: chunk,
                    }
                } else {
                    Op::GetGenericHierarchyNodeIds {
                        code_list_id,
                        codes: chunk,
                    }
                };
                let statement = Statement::new(dialect.as_ref(), op);

                async move {
                    let batches = store
                        .run_tabular_query(&statement)
                        .await
                        .map_err(|e| e.with_statement(&statement.text))?;
                    decode_id_code_batches(batches).map_err(|e| e.with_statement(&statement.text))
                }
            })
            .await;

        outcome.into_result(ctx, phase)
    }
}

/// Decode raw response batches, each a list of `{node_id, node_code}` records
pub fn decode_id_code_batches(batches: Vec<Value>) -> GraphResult<CodesById> {
    let mut codes_by_id = CodesById::new();
    for batch in batches {
        let rows: Vec<NodeIdCode> = serde_json::from_value(batch)
            .map_err(|e| GraphError::Decode(format!("expected (node_id, node_code) records: {}", e)))?;
        for row in rows {
            codes_by_id.insert(row.node_id, row.node_code);
        }
    }
    Ok(codes_by_id)
}

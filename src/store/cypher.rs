use crate::logic::reader::HierarchyQueries;
use crate::logic::retry::RetryPolicy;
use crate::model::{CallContext, CodeEntry, CodesById, HierarchyResponse, NodeIdSet};
use crate::store::error::{GraphError, GraphResult};
use crate::store::query::{Cypher, Dialect, Op, Statement};
use crate::store::traits::{
    CodeListReader, GraphStore, HierarchyReader, HierarchyStore, HierarchyWriter,
};
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Driver for the legacy query-language backend.
///
/// Only the bulk pipeline is available. Each phase is a single statement, and
/// every mutating statement is retried under the configured [`RetryPolicy`].
pub struct CypherHierarchyStore {
    store: Arc<dyn GraphStore>,
    dialect: Arc<dyn Dialect>,
    queries: HierarchyQueries,
    retry: RetryPolicy,
}

impl CypherHierarchyStore {
    pub fn new(store: Arc<dyn GraphStore>, retry: RetryPolicy) -> Self {
        let dialect: Arc<dyn Dialect> = Arc::new(Cypher);
        Self {
            queries: HierarchyQueries::new(Arc::clone(&store), Arc::clone(&dialect)),
            store,
            dialect,
            retry,
        }
    }

    async fn mutate(&self, ctx: &CallContext, op: Op) -> GraphResult<()> {
        let statement = Statement::new(self.dialect.as_ref(), op);
        let (store, current) = (&self.store, &statement);
        self.retry
            .run(ctx, &statement, move |_attempt| store.run_mutation(current))
            .await
    }
}

fn not_implemented(ctx: &CallContext, op: &'static str) -> GraphError {
    warn!("[{}] {} is not supported by the cypher backend", ctx.request_id, op);
    GraphError::NotImplemented(op)
}

#[async_trait::async_trait]
impl HierarchyWriter for CypherHierarchyStore {
    async fn create_instance_hierarchy_constraints(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()> {
        info!(
            "[{}] creating instance hierarchy constraint: instance_id={} dimension_name={}",
            ctx.request_id, instance_id, dimension_name
        );
        self.mutate(
            ctx,
            Op::CreateHierarchyConstraint {
                instance_id: instance_id.to_string(),
                dimension_name: dimension_name.to_string(),
            },
        )
        .await
    }

    async fn clone_nodes(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        code_list_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()> {
        info!(
            "[{}] cloning nodes from the generic hierarchy: instance_id={} code_list_id={} dimension_name={}",
            ctx.request_id, instance_id, code_list_id, dimension_name
        );
        self.mutate(
            ctx,
            Op::CloneNodes {
                instance_id: instance_id.to_string(),
                code_list_id: code_list_id.to_string(),
                dimension_name: dimension_name.to_string(),
            },
        )
        .await
    }

    async fn clone_nodes_from_ids(
        &self,
        ctx: &CallContext,
        _instance_id: &str,
        _code_list_id: &str,
        _dimension_name: &str,
        _ids: &NodeIdSet,
        _has_data: bool,
    ) -> GraphResult<()> {
        Err(not_implemented(ctx, "clone_nodes_from_ids"))
    }

    async fn clone_relationships(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        code_list_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()> {
        info!(
            "[{}] cloning relationships from the generic hierarchy: instance_id={} code_list_id={} dimension_name={}",
            ctx.request_id, instance_id, code_list_id, dimension_name
        );
        self.mutate(
            ctx,
            Op::CloneRelationships {
                instance_id: instance_id.to_string(),
                code_list_id: code_list_id.to_string(),
                dimension_name: dimension_name.to_string(),
            },
        )
        .await
    }

    async fn clone_relationships_from_ids(
        &self,
        ctx: &CallContext,
        _instance_id: &str,
        _dimension_name: &str,
        _ids: &NodeIdSet,
    ) -> GraphResult<()> {
        Err(not_implemented(ctx, "clone_relationships_from_ids"))
    }

    async fn clone_order_from_ids(
        &self,
        ctx: &CallContext,
        _code_list_id: &str,
        _ids: &NodeIdSet,
    ) -> GraphResult<()> {
        Err(not_implemented(ctx, "clone_order_from_ids"))
    }

    async fn create_has_code_edges(
        &self,
        ctx: &CallContext,
        _code_list_id: &str,
        _codes_by_id: &CodesById,
    ) -> GraphResult<()> {
        Err(not_implemented(ctx, "create_has_code_edges"))
    }

    async fn remove_clone_edges(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()> {
        info!(
            "[{}] removing clone_of edges: instance_id={} dimension_name={}",
            ctx.request_id, instance_id, dimension_name
        );
        self.mutate(
            ctx,
            Op::RemoveCloneEdges {
                instance_id: instance_id.to_string(),
                dimension_name: dimension_name.to_string(),
            },
        )
        .await
    }

    async fn remove_clone_edges_from_source_ids(
        &self,
        ctx: &CallContext,
        _ids: &NodeIdSet,
    ) -> GraphResult<()> {
        Err(not_implemented(ctx, "remove_clone_edges_from_source_ids"))
    }

    async fn set_number_of_children(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()> {
        info!(
            "[{}] setting number of children: instance_id={} dimension_name={}",
            ctx.request_id, instance_id, dimension_name
        );
        self.mutate(
            ctx,
            Op::SetNumberOfChildren {
                instance_id: instance_id.to_string(),
                dimension_name: dimension_name.to_string(),
            },
        )
        .await
    }

    async fn set_number_of_children_from_ids(
        &self,
        ctx: &CallContext,
        _ids: &NodeIdSet,
    ) -> GraphResult<()> {
        Err(not_implemented(ctx, "set_number_of_children_from_ids"))
    }

    async fn set_has_data(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()> {
        let codes = self
            .queries
            .codes_with_data(ctx, instance_id, dimension_name)
            .await?;
        if codes.is_empty() {
            warn!(
                "[{}] no codes with data, hasData left unset: instance_id={} dimension_name={}",
                ctx.request_id, instance_id, dimension_name
            );
            return Ok(());
        }

        info!(
            "[{}] setting hasData on {} codes: instance_id={} dimension_name={}",
            ctx.request_id,
            codes.len(),
            instance_id,
            dimension_name
        );
        self.mutate(
            ctx,
            Op::SetHasData {
                instance_id: instance_id.to_string(),
                dimension_name: dimension_name.to_string(),
                codes,
            },
        )
        .await
    }

    async fn mark_nodes_to_remain(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()> {
        info!(
            "[{}] marking nodes to remain after trimming sparse nodes: instance_id={} dimension_name={}",
            ctx.request_id, instance_id, dimension_name
        );
        self.mutate(
            ctx,
            Op::MarkNodesToRemain {
                instance_id: instance_id.to_string(),
                dimension_name: dimension_name.to_string(),
            },
        )
        .await
    }

    async fn remove_nodes_not_marked_to_remain(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()> {
        info!(
            "[{}] removing nodes not marked to remain: instance_id={} dimension_name={}",
            ctx.request_id, instance_id, dimension_name
        );
        self.mutate(
            ctx,
            Op::RemoveNodesNotMarkedToRemain {
                instance_id: instance_id.to_string(),
                dimension_name: dimension_name.to_string(),
            },
        )
        .await
    }

    async fn remove_remain_marker(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()> {
        info!(
            "[{}] removing the remain property from nodes that remain: instance_id={} dimension_name={}",
            ctx.request_id, instance_id, dimension_name
        );
        self.mutate(
            ctx,
            Op::RemoveRemainMarker {
                instance_id: instance_id.to_string(),
                dimension_name: dimension_name.to_string(),
            },
        )
        .await
    }
}

#[async_trait::async_trait]
impl HierarchyReader for CypherHierarchyStore {
    async fn count_nodes(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<i64> {
        self.queries.count_nodes(ctx, instance_id, dimension_name).await
    }

    async fn get_codes_with_data(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<Vec<String>> {
        self.queries
            .codes_with_data(ctx, instance_id, dimension_name)
            .await
    }

    async fn get_generic_hierarchy_node_ids(
        &self,
        ctx: &CallContext,
        _code_list_id: &str,
        _codes: &[String],
    ) -> GraphResult<CodesById> {
        Err(not_implemented(ctx, "get_generic_hierarchy_node_ids"))
    }

    async fn get_generic_hierarchy_ancestries_ids(
        &self,
        ctx: &CallContext,
        _code_list_id: &str,
        _codes: &[String],
    ) -> GraphResult<CodesById> {
        Err(not_implemented(ctx, "get_generic_hierarchy_ancestries_ids"))
    }

    async fn get_hierarchy_node_ids(
        &self,
        ctx: &CallContext,
        _instance_id: &str,
        _dimension_name: &str,
    ) -> GraphResult<NodeIdSet> {
        Err(not_implemented(ctx, "get_hierarchy_node_ids"))
    }

    async fn hierarchy_exists(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<bool> {
        self.queries
            .hierarchy_exists(ctx, instance_id, dimension_name)
            .await
    }

    async fn get_hierarchy_codelist(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<String> {
        self.queries
            .hierarchy_codelist(ctx, instance_id, dimension_name)
            .await
    }

    async fn get_hierarchy_root(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<HierarchyResponse> {
        self.queries
            .hierarchy_root(ctx, instance_id, dimension_name)
            .await
    }

    async fn get_hierarchy_element(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
        code: &str,
    ) -> GraphResult<HierarchyResponse> {
        self.queries
            .hierarchy_element(ctx, instance_id, dimension_name, code)
            .await
    }
}

#[async_trait::async_trait]
impl CodeListReader for CypherHierarchyStore {
    async fn count_codes(&self, ctx: &CallContext, code_list_id: &str) -> GraphResult<i64> {
        self.queries.count_codes(ctx, code_list_id).await
    }

    async fn get_codes(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
    ) -> GraphResult<Vec<CodeEntry>> {
        self.queries.codes(ctx, code_list_id).await
    }

    async fn get_code(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        code: &str,
    ) -> GraphResult<CodeEntry> {
        self.queries.code(ctx, code_list_id, code).await
    }

    async fn get_codes_order(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        codes: &[String],
    ) -> GraphResult<BTreeMap<String, Option<i64>>> {
        self.queries.codes_order(ctx, code_list_id, codes).await
    }
}

impl HierarchyStore for CypherHierarchyStore {
    fn supports_id_driven(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGraph;
    use std::time::Duration;

    fn store() -> CypherHierarchyStore {
        CypherHierarchyStore::new(
            Arc::new(MemoryGraph::new()),
            RetryPolicy::new(3, Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_id_driven_operations_are_not_implemented() {
        let store = store();
        let ctx = CallContext::new();
        let ids = NodeIdSet::from(["x".to_string()]);

        let err = store.set_number_of_children_from_ids(&ctx, &ids).await.unwrap_err();
        assert!(matches!(err, GraphError::NotImplemented("set_number_of_children_from_ids")));
        assert!(matches!(
            store.clone_order_from_ids(&ctx, "cl", &ids).await,
            Err(GraphError::NotImplemented(_))
        ));
        assert!(matches!(
            store
                .get_generic_hierarchy_node_ids(&ctx, "cl", &["A0".to_string()])
                .await,
            Err(GraphError::NotImplemented(_))
        ));
        assert!(!store.supports_id_driven());
    }

    #[tokio::test]
    async fn test_constraint_statement_runs() {
        let store = store();
        store
            .create_instance_hierarchy_constraints(&CallContext::new(), "i", "d")
            .await
            .unwrap();
        assert!(!store.hierarchy_exists(&CallContext::new(), "i", "d").await.unwrap());
    }
}

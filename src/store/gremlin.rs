use crate::config::BatchConfig;
use crate::logic::batch::BatchScheduler;
use crate::logic::reader::HierarchyQueries;
use crate::logic::resolver::GenericHierarchyResolver;
use crate::model::{CallContext, CodeEntry, CodesById, HierarchyResponse, Id, NodeIdSet};
use crate::store::error::GraphResult;
use crate::store::query::{Dialect, Gremlin, Op, Statement};
use crate::store::traits::{
    CodeListReader, GraphStore, HierarchyReader, HierarchyStore, HierarchyWriter,
};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Driver for graph-traversal backends.
///
/// Supports the ID-driven pipeline: id sets are split into batches and run on
/// a bounded worker pool. Statements are not retried here; a failing batch
/// fails its phase and the whole build is restarted instead.
pub struct GremlinHierarchyStore {
    store: Arc<dyn GraphStore>,
    dialect: Arc<dyn Dialect>,
    queries: HierarchyQueries,
    resolver: GenericHierarchyResolver,
    writer: BatchScheduler,
}

impl GremlinHierarchyStore {
    pub fn new(store: Arc<dyn GraphStore>, batch: &BatchConfig) -> Self {
        let dialect: Arc<dyn Dialect> = Arc::new(Gremlin);
        Self {
            queries: HierarchyQueries::new(Arc::clone(&store), Arc::clone(&dialect)),
            resolver: GenericHierarchyResolver::new(
                Arc::clone(&store),
                Arc::clone(&dialect),
                batch.reader(),
            ),
            writer: batch.writer(),
            store,
            dialect,
        }
    }

    fn statement(&self, op: Op) -> Statement {
        Statement::new(self.dialect.as_ref(), op)
    }

    async fn mutate(&self, ctx: &CallContext, op: Op) -> GraphResult<()> {
        let statement = self.statement(op);
        debug!("[{}] {}: {}", ctx.request_id, statement.op.name(), statement);
        self.store
            .run_mutation(&statement)
            .await
            .map_err(|e| e.with_statement(&statement.text))
    }

    /// Run one statement per batch of `ids` on the writer pool.
    /// `make_op` builds the statement for a batch; edge-returning statements
    /// are issued as edge queries.
    async fn run_id_batches<F>(
        &self,
        ctx: &CallContext,
        phase: &str,
        ids: &NodeIdSet,
        make_op: F,
    ) -> GraphResult<()>
    where
        F: Fn(Vec<Id>) -> Op + Send + Sync + 'static,
    {
        if ids.is_empty() {
            debug!("[{}] {}: no ids, nothing to do", ctx.request_id, phase);
            return Ok(());
        }

        info!(
            "[{}] {}: num_ids={} batch_size={} max_workers={}",
            ctx.request_id,
            phase,
            ids.len(),
            self.writer.batch_size(),
            self.writer.max_workers()
        );

        let store = Arc::clone(&self.store);
        let dialect = Arc::clone(&self.dialect);
        let outcome = self
            .writer
            .run(ctx, ids.iter().cloned(), move |chunk: Vec<Id>| {
                let store = Arc::clone(&store);
                let statement = Statement::new(dialect.as_ref(), make_op(chunk));
                async move {
                    let result = match statement.op {
                        Op::CloneRelationshipsFromIds { .. } => {
                            store.run_edge_query(&statement).await.map(|_| ())
                        }
                        _ => store.run_mutation(&statement).await,
                    };
                    result.map_err(|e| e.with_statement(&statement.text))?;
                    Ok(HashMap::<(), ()>::new())
                }
            })
            .await;

        outcome.into_result(ctx, phase).map(|_| ())
    }
}

#[async_trait::async_trait]
impl HierarchyWriter for GremlinHierarchyStore {
    async fn create_instance_hierarchy_constraints(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()> {
        debug!(
            "[{}] constraints are not supported by this backend, skipping: instance_id={} dimension_name={}",
            ctx.request_id, instance_id, dimension_name
        );
        Ok(())
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
        instance_id: &str,
        code_list_id: &str,
        dimension_name: &str,
        ids: &NodeIdSet,
        has_data: bool,
    ) -> GraphResult<()> {
        let (instance_id, code_list_id, dimension_name) = (
            instance_id.to_string(),
            code_list_id.to_string(),
            dimension_name.to_string(),
        );
        self.run_id_batches(ctx, "clone_nodes_from_ids", ids, move |batch| {
            Op::CloneNodesFromIds {
                instance_id: instance_id.clone(),
                code_list_id: code_list_id.clone(),
                dimension_name: dimension_name.clone(),
                ids: batch,
                has_data,
            }
        })
        .await
    }

    async fn clone_relationships(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        code_list_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()> {
        let statement = self.statement(Op::CloneRelationships {
            instance_id: instance_id.to_string(),
            code_list_id: code_list_id.to_string(),
            dimension_name: dimension_name.to_string(),
        });
        info!(
            "[{}] cloning relationships from the generic hierarchy: instance_id={} code_list_id={} dimension_name={}",
            ctx.request_id, instance_id, code_list_id, dimension_name
        );

        let created = self
            .store
            .run_edge_query(&statement)
            .await
            .map_err(|e| e.with_statement(&statement.text))?;
        debug!("[{}] created {} hasParent edges", ctx.request_id, created.len());
        Ok(())
    }

    async fn clone_relationships_from_ids(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
        ids: &NodeIdSet,
    ) -> GraphResult<()> {
        let (instance_id, dimension_name) = (instance_id.to_string(), dimension_name.to_string());
        self.run_id_batches(ctx, "clone_relationships_from_ids", ids, move |batch| {
            Op::CloneRelationshipsFromIds {
                instance_id: instance_id.clone(),
                dimension_name: dimension_name.clone(),
                ids: batch,
            }
        })
        .await
    }

    async fn clone_order_from_ids(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        ids: &NodeIdSet,
    ) -> GraphResult<()> {
        let code_list_id = code_list_id.to_string();
        self.run_id_batches(ctx, "clone_order_from_ids", ids, move |batch| {
            Op::CloneOrderFromIds {
                code_list_id: code_list_id.clone(),
                ids: batch,
            }
        })
        .await
    }

    async fn create_has_code_edges(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        codes_by_id: &CodesById,
    ) -> GraphResult<()> {
        if codes_by_id.is_empty() {
            return Ok(());
        }

        // one edge per statement
        let scheduler = self.writer.with_batch_size(1);
        info!(
            "[{}] create_has_code_edges: code_list_id={} num_nodes={} max_workers={}",
            ctx.request_id,
            code_list_id,
            codes_by_id.len(),
            scheduler.max_workers()
        );

        let store = Arc::clone(&self.store);
        let dialect = Arc::clone(&self.dialect);
        let code_list_id = code_list_id.to_string();
        let items: Vec<(Id, String)> = codes_by_id
            .iter()
            .map(|(id, code)| (id.clone(), code.clone()))
            .collect();

        let outcome = scheduler
            .run(ctx, items, move |chunk: Vec<(Id, String)>| {
                let store = Arc::clone(&store);
                let statements: Vec<Statement> = chunk
                    .into_iter()
                    .map(|(node_id, code)| {
                        Statement::new(
                            dialect.as_ref(),
                            Op::CreateHasCodeEdge {
                                code_list_id: code_list_id.clone(),
                                node_id,
                                code,
                            },
                        )
                    })
                    .collect();
                async move {
                    for statement in &statements {
                        store
                            .run_mutation(statement)
                            .await
                            .map_err(|e| e.with_statement(&statement.text))?;
                    }
                    Ok(HashMap::<(), ()>::new())
                }
            })
            .await;

        outcome.into_result(ctx, "create_has_code_edges").map(|_| ())
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
        ids: &NodeIdSet,
    ) -> GraphResult<()> {
        self.run_id_batches(ctx, "remove_clone_edges_from_source_ids", ids, |batch| {
            Op::RemoveCloneEdgesFromSourceIds { ids: batch }
        })
        .await
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
        ids: &NodeIdSet,
    ) -> GraphResult<()> {
        self.run_id_batches(ctx, "set_number_of_children_from_ids", ids, |batch| {
            Op::SetNumberOfChildrenFromIds { ids: batch }
        })
        .await
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
impl HierarchyReader for GremlinHierarchyStore {
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
        code_list_id: &str,
        codes: &[String],
    ) -> GraphResult<CodesById> {
        self.resolver.resolve_node_ids(ctx, code_list_id, codes).await
    }

    async fn get_generic_hierarchy_ancestries_ids(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        codes: &[String],
    ) -> GraphResult<CodesById> {
        self.resolver
            .resolve_ancestor_ids(ctx, code_list_id, codes)
            .await
    }

    async fn get_hierarchy_node_ids(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<NodeIdSet> {
        self.queries
            .hierarchy_node_ids(ctx, instance_id, dimension_name)
            .await
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
impl CodeListReader for GremlinHierarchyStore {
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

impl HierarchyStore for GremlinHierarchyStore {
    fn supports_id_driven(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{edges, props, NodeRecord};
    use crate::store::query::{generic_label, hierarchy_label};
    use crate::store::MemoryGraph;

    async fn seeded() -> (MemoryGraph, GremlinHierarchyStore) {
        let graph = MemoryGraph::new();
        for (id, code) in [("cl--A0", "A0"), ("cl--B1", "B1"), ("cl--B2", "B2")] {
            graph
                .add_node(
                    NodeRecord::new(id, generic_label("cl"))
                        .with_property(props::CODE, code)
                        .with_property(props::LABEL, code),
                )
                .await;
        }
        graph.add_edge(edges::HAS_PARENT, "cl--B1", "cl--A0").await;
        graph.add_edge(edges::HAS_PARENT, "cl--B2", "cl--A0").await;

        let batch = BatchConfig {
            reader_batch_size: 1,
            writer_batch_size: 2,
            max_workers: 2,
        };
        let store = GremlinHierarchyStore::new(Arc::new(graph.clone()), &batch);
        (graph, store)
    }

    #[tokio::test]
    async fn test_id_phases_build_a_hierarchy() {
        let (graph, store) = seeded().await;
        let ctx = CallContext::new();
        let ids: NodeIdSet = ["cl--A0", "cl--B1", "cl--B2"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        store
            .clone_nodes_from_ids(&ctx, "i", "cl", "d", &ids, false)
            .await
            .unwrap();
        store
            .clone_relationships_from_ids(&ctx, "i", "d", &ids)
            .await
            .unwrap();
        store.remove_clone_edges_from_source_ids(&ctx, &ids).await.unwrap();

        let clone_ids = store.get_hierarchy_node_ids(&ctx, "i", "d").await.unwrap();
        assert_eq!(clone_ids.len(), 3);
        store
            .set_number_of_children_from_ids(&ctx, &clone_ids)
            .await
            .unwrap();

        assert!(graph.edges_with_label(edges::CLONE_OF).await.is_empty());
        let root = store.get_hierarchy_root(&ctx, "i", "d").await.unwrap();
        assert_eq!(root.id, "A0");
        assert_eq!(root.no_of_children, 2);
        assert_eq!(root.children.len(), 2);
        assert_eq!(
            store.get_hierarchy_codelist(&ctx, "i", "d").await.unwrap(),
            "cl"
        );
        assert_eq!(graph.nodes_with_label(&hierarchy_label("i", "d")).await.len(), 3);
    }

    #[tokio::test]
    async fn test_set_has_data_without_codes_is_a_no_op() {
        let (graph, store) = seeded().await;
        let ctx = CallContext::new();
        store.clone_nodes(&ctx, "i", "cl", "d").await.unwrap();
        store.set_has_data(&ctx, "i", "d").await.unwrap();

        let clones = graph.nodes_with_label(&hierarchy_label("i", "d")).await;
        assert!(clones
            .iter()
            .all(|n| n.bool_property(props::HAS_DATA) == Some(false)));
    }

    #[tokio::test]
    async fn test_generic_ids_are_resolved_in_reader_batches() {
        let (_graph, store) = seeded().await;
        let ctx = CallContext::new();
        let codes = vec!["B1".to_string(), "B2".to_string(), "B1".to_string(), "ZZ".to_string()];

        let found = store
            .get_generic_hierarchy_node_ids(&ctx, "cl", &codes)
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found.get("cl--B2").map(String::as_str), Some("B2"));

        let ancestors = store
            .get_generic_hierarchy_ancestries_ids(&ctx, "cl", &codes)
            .await
            .unwrap();
        assert_eq!(ancestors.len(), 1);
        assert!(ancestors.contains_key("cl--A0"));
    }
}

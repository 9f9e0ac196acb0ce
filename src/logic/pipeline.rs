use crate::model::{id_set, CallContext, HierarchyKey, NodeIdSet};
use crate::store::error::GraphResult;
use crate::store::traits::HierarchyStore;
use log::info;
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Link generic nodes to their codes and copy code-list order onto the
    /// clones (ID-driven builds only)
    pub clone_order: bool,
}

/// Summary of a finished build
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildReport {
    pub key: HierarchyKey,
    pub code_list_id: String,
    pub id_driven: bool,
    pub codes_with_data: usize,
    /// Generic nodes cloned; `None` for bulk builds, which clone the whole code list
    pub cloned_nodes: Option<usize>,
    pub node_count: i64,
}

/// Runs the ordered phases that turn a generic hierarchy into an instance
/// hierarchy, picking the ID-driven sequence when the backend supports it.
pub struct HierarchyBuilder<'a> {
    store: &'a dyn HierarchyStore,
    options: BuildOptions,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(store: &'a dyn HierarchyStore) -> Self {
        Self {
            store,
            options: BuildOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn build(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        code_list_id: &str,
        dimension_name: &str,
    ) -> GraphResult<BuildReport> {
        let started = Instant::now();
        let report = if self.store.supports_id_driven() {
            self.build_from_ids(ctx, instance_id, code_list_id, dimension_name)
                .await?
        } else {
            self.build_bulk(ctx, instance_id, code_list_id, dimension_name)
                .await?
        };

        info!(
            "[{}] instance hierarchy built in {:?}: instance_id={} dimension_name={} nodes={}",
            ctx.request_id, started.elapsed(), instance_id, dimension_name, report.node_count
        );
        Ok(report)
    }

    /// Clone the whole code list, then prune the clones that lead to no data
    pub async fn build_bulk(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        code_list_id: &str,
        dimension_name: &str,
    ) -> GraphResult<BuildReport> {
        let store = self.store;
        store
            .create_instance_hierarchy_constraints(ctx, instance_id, dimension_name)
            .await?;
        store
            .clone_nodes(ctx, instance_id, code_list_id, dimension_name)
            .await?;
        store
            .clone_relationships(ctx, instance_id, code_list_id, dimension_name)
            .await?;
        store
            .remove_clone_edges(ctx, instance_id, dimension_name)
            .await?;
        store.set_has_data(ctx, instance_id, dimension_name).await?;
        store
            .mark_nodes_to_remain(ctx, instance_id, dimension_name)
            .await?;
        store
            .remove_nodes_not_marked_to_remain(ctx, instance_id, dimension_name)
            .await?;
        store
            .remove_remain_marker(ctx, instance_id, dimension_name)
            .await?;
        // counted after pruning so only surviving children are reported
        store
            .set_number_of_children(ctx, instance_id, dimension_name)
            .await?;

        let codes_with_data = store
            .get_codes_with_data(ctx, instance_id, dimension_name)
            .await?
            .len();
        let node_count = store.count_nodes(ctx, instance_id, dimension_name).await?;

        Ok(BuildReport {
            key: HierarchyKey::new(instance_id, dimension_name),
            code_list_id: code_list_id.to_string(),
            id_driven: false,
            codes_with_data,
            cloned_nodes: None,
            node_count,
        })
    }

    /// Clone only the generic nodes with data and their ancestors
    pub async fn build_from_ids(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        code_list_id: &str,
        dimension_name: &str,
    ) -> GraphResult<BuildReport> {
        let store = self.store;
        let codes = store
            .get_codes_with_data(ctx, instance_id, dimension_name)
            .await?;

        let leaves = store
            .get_generic_hierarchy_node_ids(ctx, code_list_id, &codes)
            .await?;
        let mut ancestors = store
            .get_generic_hierarchy_ancestries_ids(ctx, code_list_id, &codes)
            .await?;
        // a node with data that is also an ancestor is cloned as a leaf
        ancestors.retain(|id, _| !leaves.contains_key(id));

        let leaf_ids = id_set(&leaves);
        let ancestor_ids = id_set(&ancestors);
        info!(
            "[{}] cloning {} nodes with data and {} ancestors: instance_id={} code_list_id={} dimension_name={}",
            ctx.request_id,
            leaf_ids.len(),
            ancestor_ids.len(),
            instance_id,
            code_list_id,
            dimension_name
        );

        store
            .clone_nodes_from_ids(ctx, instance_id, code_list_id, dimension_name, &leaf_ids, true)
            .await?;
        store
            .clone_nodes_from_ids(
                ctx,
                instance_id,
                code_list_id,
                dimension_name,
                &ancestor_ids,
                false,
            )
            .await?;

        let generic_ids: NodeIdSet = leaf_ids.union(&ancestor_ids).cloned().collect();
        store
            .clone_relationships_from_ids(ctx, instance_id, dimension_name, &generic_ids)
            .await?;

        if self.options.clone_order {
            let mut codes_by_id = leaves;
            codes_by_id.extend(ancestors);
            store
                .create_has_code_edges(ctx, code_list_id, &codes_by_id)
                .await?;
            store
                .clone_order_from_ids(ctx, code_list_id, &generic_ids)
                .await?;
        }

        store
            .remove_clone_edges_from_source_ids(ctx, &generic_ids)
            .await?;

        let clone_ids = store
            .get_hierarchy_node_ids(ctx, instance_id, dimension_name)
            .await?;
        store
            .set_number_of_children_from_ids(ctx, &clone_ids)
            .await?;

        let node_count = store.count_nodes(ctx, instance_id, dimension_name).await?;
        Ok(BuildReport {
            key: HierarchyKey::new(instance_id, dimension_name),
            code_list_id: code_list_id.to_string(),
            id_driven: true,
            codes_with_data: codes.len(),
            cloned_nodes: Some(generic_ids.len()),
            node_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use crate::logic::retry::RetryPolicy;
    use crate::seed;
    use crate::store::{CypherHierarchyStore, GremlinHierarchyStore, MemoryGraph};
    use std::sync::Arc;

    const INSTANCE: &str = "inst";
    const DIMENSION: &str = "aggregate";

    async fn graph() -> MemoryGraph {
        let graph = MemoryGraph::new();
        seed::load_seed_data(&graph).await;
        seed::load_instance_data(&graph, INSTANCE, DIMENSION, &["cpih1dim1S90401"]).await;
        graph
    }

    #[tokio::test]
    async fn test_id_driven_build_clones_only_relevant_nodes() {
        let graph = graph().await;
        let store = GremlinHierarchyStore::new(Arc::new(graph), &BatchConfig::default());
        let builder = HierarchyBuilder::new(&store).with_options(BuildOptions { clone_order: true });

        let report = builder
            .build(&CallContext::new(), INSTANCE, seed::CODE_LIST_ID, DIMENSION)
            .await
            .unwrap();

        assert!(report.id_driven);
        assert_eq!(report.codes_with_data, 1);
        assert_eq!(report.cloned_nodes, Some(4));
        assert_eq!(report.node_count, 4);
    }

    #[tokio::test]
    async fn test_bulk_build_prunes_nodes_without_data() {
        let graph = graph().await;
        let store = CypherHierarchyStore::new(Arc::new(graph), RetryPolicy::default());
        let report = HierarchyBuilder::new(&store)
            .build(&CallContext::new(), INSTANCE, seed::CODE_LIST_ID, DIMENSION)
            .await
            .unwrap();

        assert!(!report.id_driven);
        assert_eq!(report.cloned_nodes, None);
        assert_eq!(report.node_count, 4);
    }
}

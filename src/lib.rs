pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export logic types
pub use logic::{
    BatchOutcome, BatchScheduler, BuildOptions, BuildReport, GenericHierarchyResolver,
    HierarchyBuilder, HierarchyQueries, RetryPolicy,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{
    open_hierarchy_store, CodeListReader, CypherHierarchyStore, GraphError, GraphResult, GraphStore,
    GremlinHierarchyStore, HierarchyReader, HierarchyStore, HierarchyWriter, MemoryGraph,
};

use crate::config::AppConfig;
use std::sync::Arc;

/// Seed an in-memory graph, build the configured demo hierarchy on it and
/// return the build report together with the hierarchy root
pub async fn run_demo(config: &AppConfig) -> anyhow::Result<(BuildReport, HierarchyResponse)> {
    use anyhow::Context;

    let demo = &config.demo;
    let graph = MemoryGraph::new();
    seed::load_seed_data(&graph).await;
    seed::load_instance_data(
        &graph,
        &demo.instance_id,
        &demo.dimension_name,
        &["cpih1dim1S90401"],
    )
    .await;

    let store = open_hierarchy_store(Arc::new(graph), config);
    let ctx = CallContext::new();

    let report = HierarchyBuilder::new(store.as_ref())
        .with_options(BuildOptions { clone_order: true })
        .build(&ctx, &demo.instance_id, &demo.code_list_id, &demo.dimension_name)
        .await
        .with_context(|| {
            format!(
                "failed to build hierarchy for instance {} dimension {}",
                demo.instance_id, demo.dimension_name
            )
        })?;

    let root = store
        .get_hierarchy_root(&ctx, &demo.instance_id, &demo.dimension_name)
        .await
        .context("failed to read hierarchy root")?;

    Ok((report, root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;

    #[tokio::test]
    async fn test_demo_runs_on_both_backends() {
        for backend in [BackendKind::Gremlin, BackendKind::Cypher] {
            let config = AppConfig {
                backend,
                ..AppConfig::default()
            };
            let (report, root) = run_demo(&config).await.unwrap();

            assert_eq!(report.node_count, 4);
            assert_eq!(root.id, "cpih1dim1A0");
            assert_eq!(root.children.len(), 1);
            assert_eq!(root.children[0].id, "cpih1dim1T90000");
            assert!(root.breadcrumbs.is_empty());
        }
    }
}

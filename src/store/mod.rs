pub mod cypher;
pub mod error;
pub mod gremlin;
pub mod memory;
pub mod query;
pub mod traits;

pub use cypher::*;
pub use error::*;
pub use gremlin::*;
pub use memory::*;
pub use traits::*;

use crate::config::{AppConfig, BackendKind};
use log::info;
use std::sync::Arc;

/// Front a graph store with the driver adapter for the configured backend
pub fn open_hierarchy_store(
    graph: Arc<dyn GraphStore>,
    config: &AppConfig,
) -> Arc<dyn HierarchyStore> {
    info!("using the {:?} hierarchy driver", config.backend);
    match config.backend {
        BackendKind::Gremlin => Arc::new(GremlinHierarchyStore::new(graph, &config.batch)),
        BackendKind::Cypher => Arc::new(CypherHierarchyStore::new(graph, config.retry.policy())),
    }
}

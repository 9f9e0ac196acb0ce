use crate::model::{
    CallContext, CodeEntry, CodesById, EdgeRecord, HierarchyResponse, NodeIdSet, NodeRecord,
};
use crate::store::error::GraphResult;
use crate::store::query::Statement;
use serde_json::Value;
use std::collections::BTreeMap;

/// Query capability of a backing graph store.
///
/// Implementations own the connection handling; the hierarchy pipeline only
/// issues statements through these calls.
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    /// Run a statement for its side effects
    async fn run_mutation(&self, statement: &Statement) -> GraphResult<()>;
    /// Run a statement returning a single count
    async fn run_count(&self, statement: &Statement) -> GraphResult<i64>;
    /// Run a statement returning an ordered list of strings
    async fn run_string_list(&self, statement: &Statement) -> GraphResult<Vec<String>>;
    /// Run a statement returning zero or more nodes
    async fn run_node_query(&self, statement: &Statement) -> GraphResult<Vec<NodeRecord>>;
    /// Run a statement returning zero or more edges
    async fn run_edge_query(&self, statement: &Statement) -> GraphResult<Vec<EdgeRecord>>;
    /// Run a statement returning raw response batches, each a list of records
    async fn run_tabular_query(&self, statement: &Statement) -> GraphResult<Vec<Value>>;
}

/// Operations that clone a generic hierarchy into an instance hierarchy and
/// prune it. Every phase is safe to re-run for the same (instance, dimension).
#[async_trait::async_trait]
pub trait HierarchyWriter: Send + Sync {
    async fn create_instance_hierarchy_constraints(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()>;

    async fn clone_nodes(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        code_list_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()>;

    async fn clone_nodes_from_ids(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        code_list_id: &str,
        dimension_name: &str,
        ids: &NodeIdSet,
        has_data: bool,
    ) -> GraphResult<()>;

    async fn clone_relationships(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        code_list_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()>;

    async fn clone_relationships_from_ids(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
        ids: &NodeIdSet,
    ) -> GraphResult<()>;

    async fn clone_order_from_ids(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        ids: &NodeIdSet,
    ) -> GraphResult<()>;

    async fn create_has_code_edges(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        codes_by_id: &CodesById,
    ) -> GraphResult<()>;

    async fn remove_clone_edges(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()>;

    async fn remove_clone_edges_from_source_ids(
        &self,
        ctx: &CallContext,
        ids: &NodeIdSet,
    ) -> GraphResult<()>;

    async fn set_number_of_children(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()>;

    async fn set_number_of_children_from_ids(
        &self,
        ctx: &CallContext,
        ids: &NodeIdSet,
    ) -> GraphResult<()>;

    async fn set_has_data(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()>;

    async fn mark_nodes_to_remain(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()>;

    async fn remove_nodes_not_marked_to_remain(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()>;

    async fn remove_remain_marker(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<()>;
}

/// Read side of the hierarchy store
#[async_trait::async_trait]
pub trait HierarchyReader: Send + Sync {
    async fn count_nodes(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<i64>;

    async fn get_codes_with_data(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<Vec<String>>;

    async fn get_generic_hierarchy_node_ids(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        codes: &[String],
    ) -> GraphResult<CodesById>;

    async fn get_generic_hierarchy_ancestries_ids(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        codes: &[String],
    ) -> GraphResult<CodesById>;

    async fn get_hierarchy_node_ids(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<NodeIdSet>;

    /// Whether an instance hierarchy has been built for the dimension.
    ///
    /// | roots | result |
    /// |---|---|
    /// | 0 | `Ok(false)` |
    /// | 1 | `Ok(true)` |
    /// | more than 1 | `Err(GraphError::MultipleFound)` |
    ///
    /// Several roots still mean a hierarchy exists, only an inconsistent one.
    /// [`GraphError::implies_existence`](crate::store::GraphError::implies_existence)
    /// is `true` for that error, so callers that only need the existence answer
    /// match `Err(e) if e.implies_existence()` as `true` and propagate the rest.
    async fn hierarchy_exists(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<bool>;

    async fn get_hierarchy_codelist(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<String>;

    async fn get_hierarchy_root(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<HierarchyResponse>;

    async fn get_hierarchy_element(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
        code: &str,
    ) -> GraphResult<HierarchyResponse>;
}

/// Read side of the code lists generic hierarchies are built from
#[async_trait::async_trait]
pub trait CodeListReader: Send + Sync {
    /// Number of codes linked to the code list
    async fn count_codes(&self, ctx: &CallContext, code_list_id: &str) -> GraphResult<i64>;

    /// Every code of the list, by order; codes without an order come last
    async fn get_codes(&self, ctx: &CallContext, code_list_id: &str)
        -> GraphResult<Vec<CodeEntry>>;

    /// `NotFound` when the code is not in the list
    async fn get_code(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        code: &str,
    ) -> GraphResult<CodeEntry>;

    /// Position of each requested code within the code list. Codes outside
    /// the list are left out; listed codes without an order map to `None`.
    async fn get_codes_order(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        codes: &[String],
    ) -> GraphResult<BTreeMap<String, Option<i64>>>;
}

/// Full driver interface exposed to the hierarchy builder
pub trait HierarchyStore: HierarchyWriter + HierarchyReader + CodeListReader + Send + Sync {
    /// Whether the ID-driven operations are supported by this backend
    fn supports_id_driven(&self) -> bool;
}

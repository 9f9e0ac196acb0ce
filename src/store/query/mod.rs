//! Statements issued against the graph store.
//!
//! Every statement pairs the typed operation it performs with the text rendered
//! for one backend dialect. Wire clients send the text; the in-process
//! [`MemoryGraph`](crate::store::MemoryGraph) evaluates the operation.

pub mod cypher;
pub mod gremlin;

pub use cypher::Cypher;
pub use gremlin::Gremlin;

use crate::model::Id;
use itertools::Itertools;
use std::fmt;

/// One operation of the hierarchy pipeline, independent of backend grammar
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    CreateHierarchyConstraint {
        instance_id: Id,
        dimension_name: String,
    },
    CloneNodes {
        instance_id: Id,
        code_list_id: Id,
        dimension_name: String,
    },
    CloneNodesFromIds {
        instance_id: Id,
        code_list_id: Id,
        dimension_name: String,
        ids: Vec<Id>,
        has_data: bool,
    },
    CloneRelationships {
        instance_id: Id,
        code_list_id: Id,
        dimension_name: String,
    },
    CloneRelationshipsFromIds {
        instance_id: Id,
        dimension_name: String,
        ids: Vec<Id>,
    },
    CloneOrderFromIds {
        code_list_id: Id,
        ids: Vec<Id>,
    },
    CreateHasCodeEdge {
        code_list_id: Id,
        node_id: Id,
        code: String,
    },
    RemoveCloneEdges {
        instance_id: Id,
        dimension_name: String,
    },
    RemoveCloneEdgesFromSourceIds {
        ids: Vec<Id>,
    },
    SetNumberOfChildren {
        instance_id: Id,
        dimension_name: String,
    },
    SetNumberOfChildrenFromIds {
        ids: Vec<Id>,
    },
    SetHasData {
        instance_id: Id,
        dimension_name: String,
        codes: Vec<String>,
    },
    MarkNodesToRemain {
        instance_id: Id,
        dimension_name: String,
    },
    RemoveNodesNotMarkedToRemain {
        instance_id: Id,
        dimension_name: String,
    },
    RemoveRemainMarker {
        instance_id: Id,
        dimension_name: String,
    },
    CountHierarchyNodes {
        instance_id: Id,
        dimension_name: String,
    },
    GetCodesWithData {
        instance_id: Id,
        dimension_name: String,
    },
    GetHierarchyNodeIds {
        instance_id: Id,
        dimension_name: String,
    },
    GetGenericHierarchyNodeIds {
        code_list_id: Id,
        codes: Vec<String>,
    },
    GetGenericHierarchyAncestryIds {
        code_list_id: Id,
        codes: Vec<String>,
    },
    GetHierarchyRoot {
        instance_id: Id,
        dimension_name: String,
    },
    GetHierarchyElement {
        instance_id: Id,
        dimension_name: String,
        code: String,
    },
    GetChildren {
        instance_id: Id,
        dimension_name: String,
        code: String,
    },
    GetAncestry {
        instance_id: Id,
        dimension_name: String,
        code: String,
    },
    CountCodes {
        code_list_id: Id,
    },
    GetCodes {
        code_list_id: Id,
    },
    GetCode {
        code_list_id: Id,
        code: String,
    },
    GetCodesOrder {
        code_list_id: Id,
        codes: Vec<String>,
    },
}

impl Op {
    /// Short operation name for logs and not-implemented reports
    pub fn name(&self) -> &'static str {
        match self {
            Op::CreateHierarchyConstraint { .. } => "create_hierarchy_constraint",
            Op::CloneNodes { .. } => "clone_nodes",
            Op::CloneNodesFromIds { .. } => "clone_nodes_from_ids",
            Op::CloneRelationships { .. } => "clone_relationships",
            Op::CloneRelationshipsFromIds { .. } => "clone_relationships_from_ids",
            Op::CloneOrderFromIds { .. } => "clone_order_from_ids",
            Op::CreateHasCodeEdge { .. } => "create_has_code_edge",
            Op::RemoveCloneEdges { .. } => "remove_clone_edges",
            Op::RemoveCloneEdgesFromSourceIds { .. } => "remove_clone_edges_from_source_ids",
            Op::SetNumberOfChildren { .. } => "set_number_of_children",
            Op::SetNumberOfChildrenFromIds { .. } => "set_number_of_children_from_ids",
            Op::SetHasData { .. } => "set_has_data",
            Op::MarkNodesToRemain { .. } => "mark_nodes_to_remain",
            Op::RemoveNodesNotMarkedToRemain { .. } => "remove_nodes_not_marked_to_remain",
            Op::RemoveRemainMarker { .. } => "remove_remain_marker",
            Op::CountHierarchyNodes { .. } => "count_hierarchy_nodes",
            Op::GetCodesWithData { .. } => "get_codes_with_data",
            Op::GetHierarchyNodeIds { .. } => "get_hierarchy_node_ids",
            Op::GetGenericHierarchyNodeIds { .. } => "get_generic_hierarchy_node_ids",
            Op::GetGenericHierarchyAncestryIds { .. } => "get_generic_hierarchy_ancestry_ids",
            Op::GetHierarchyRoot { .. } => "get_hierarchy_root",
            Op::GetHierarchyElement { .. } => "get_hierarchy_element",
            Op::GetChildren { .. } => "get_children",
            Op::GetAncestry { .. } => "get_ancestry",
            Op::CountCodes { .. } => "count_codes",
            Op::GetCodes { .. } => "get_codes",
            Op::GetCode { .. } => "get_code",
            Op::GetCodesOrder { .. } => "get_codes_order",
        }
    }

    /// Whether the operation leaves the graph untouched
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Op::CountHierarchyNodes { .. }
                | Op::GetCodesWithData { .. }
                | Op::GetHierarchyNodeIds { .. }
                | Op::GetGenericHierarchyNodeIds { .. }
                | Op::GetGenericHierarchyAncestryIds { .. }
                | Op::GetHierarchyRoot { .. }
                | Op::GetHierarchyElement { .. }
                | Op::GetChildren { .. }
                | Op::GetAncestry { .. }
                | Op::CountCodes { .. }
                | Op::GetCodes { .. }
                | Op::GetCode { .. }
                | Op::GetCodesOrder { .. }
        )
    }
}

/// Renders pipeline operations into backend query text
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;
    fn render(&self, op: &Op) -> String;
}

/// A typed operation together with its rendered text
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub op: Op,
    pub text: String,
}

impl Statement {
    pub fn new(dialect: &dyn Dialect, op: Op) -> Self {
        let text = dialect.render(&op);
        Self { op, text }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub fn generic_label(code_list_id: &str) -> String {
    format!("_generic_hierarchy_node_{}", code_list_id)
}

pub fn hierarchy_label(instance_id: &str, dimension_name: &str) -> String {
    format!("_hierarchy_node_{}_{}", instance_id, dimension_name)
}

/// Label of the instance-scoped dimension option nodes that carry observations
pub fn data_label(instance_id: &str, dimension_name: &str) -> String {
    format!("_{}_{}", instance_id, dimension_name)
}

pub fn code_label(code_list_id: &str) -> String {
    format!("_code_{}", code_list_id)
}

pub fn code_list_label(code_list_id: &str) -> String {
    format!("_code_list_{}", code_list_id)
}

/// Single-quote a literal, escaping embedded quotes and backslashes
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Comma-separated single-quoted literals: `'a','b'`
pub fn quote_list<S: AsRef<str>>(values: &[S]) -> String {
    values.iter().map(|v| quote(v.as_ref())).join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(generic_label("cpih1dim1aggid"), "_generic_hierarchy_node_cpih1dim1aggid");
        assert_eq!(
            hierarchy_label("f0a2f3f2", "aggregate"),
            "_hierarchy_node_f0a2f3f2_aggregate"
        );
        assert_eq!(data_label("f0a2f3f2", "aggregate"), "_f0a2f3f2_aggregate");
    }

    #[test]
    fn test_quote_list_escapes() {
        assert_eq!(quote_list(&["a", "b"]), "'a','b'");
        assert_eq!(quote("o'clock"), "'o\\'clock'");
        assert_eq!(quote_list::<&str>(&[]), "");
    }

    #[test]
    fn test_statement_renders_with_dialect() {
        let op = Op::CountHierarchyNodes {
            instance_id: "i1".to_string(),
            dimension_name: "geography".to_string(),
        };
        let gremlin = Statement::new(&Gremlin, op.clone());
        let cypher = Statement::new(&Cypher, op);
        assert_eq!(gremlin.op, cypher.op);
        assert_ne!(gremlin.text, cypher.text);
        assert_eq!(gremlin.to_string(), gremlin.text);
        assert_eq!(gremlin.op.name(), "count_hierarchy_nodes");
    }
}

use crate::model::Id;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property keys shared by generic and instance hierarchy nodes
pub mod props {
    pub const CODE: &str = "code";
    pub const LABEL: &str = "label";
    pub const CODE_LIST: &str = "code_list";
    pub const HAS_DATA: &str = "hasData";
    pub const NUMBER_OF_CHILDREN: &str = "numberOfChildren";
    pub const REMAIN: &str = "remain";
    pub const ORDER: &str = "order";
    pub const VALUE: &str = "value";
}

/// Edge labels used by the hierarchy pipeline
pub mod edges {
    pub const HAS_PARENT: &str = "hasParent";
    pub const CLONE_OF: &str = "clone_of";
    pub const HAS_CODE: &str = "hasCode";
    pub const USED_BY: &str = "usedBy";
}

/// Entry of the generic, code-list-wide hierarchy. Never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericNode {
    pub id: Id,
    pub code: String,
    pub label: String,
    pub code_list_id: Id,
}

/// Node of an instance hierarchy, cloned from a [`GenericNode`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneNode {
    pub id: Id,
    pub code: String,
    pub label: String,
    pub code_list_id: Id,
    pub has_data: bool,
    pub number_of_children: i64,
    pub order: Option<i64>,
}

/// A node as returned by a node query: backend id, label and raw properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: Id,
    pub label: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl NodeRecord {
    pub fn new(id: impl Into<Id>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn string_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn i64_property(&self, key: &str) -> Option<i64> {
        self.properties.get(key).and_then(Value::as_i64)
    }

    pub fn bool_property(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(Value::as_bool)
    }
}

/// An edge as returned by an edge query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: Id,
    pub label: String,
    pub out_v: Id,
    pub in_v: Id,
}

/// One decoded row of a tabular (id, code) response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdCode {
    pub node_id: Id,
    pub node_code: String,
}

/// A code of a code list with its position in that list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub code: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// One row of a code order lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeOrder {
    pub code: String,
    #[serde(default)]
    pub order: Option<i64>,
}

/// A hierarchy node as presented to readers (children and breadcrumbs)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyElement {
    pub id: String,
    pub label: String,
    pub no_of_children: i64,
    pub has_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// A hierarchy node with its direct children and, for non-root nodes, its
/// ancestor chain (nearest first)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyResponse {
    pub id: String,
    pub label: String,
    pub no_of_children: i64,
    pub has_data: bool,
    pub children: Vec<HierarchyElement>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub breadcrumbs: Vec<HierarchyElement>,
}

impl HierarchyResponse {
    pub fn from_element(element: HierarchyElement) -> Self {
        Self {
            id: element.id,
            label: element.label,
            no_of_children: element.no_of_children,
            has_data: element.has_data,
            children: Vec::new(),
            breadcrumbs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_record_property_accessors() {
        let node = NodeRecord::new("n1", "_hierarchy_node_i_d")
            .with_property(props::CODE, "A0")
            .with_property(props::NUMBER_OF_CHILDREN, 3)
            .with_property(props::HAS_DATA, true);

        assert_eq!(node.string_property(props::CODE), Some("A0"));
        assert_eq!(node.i64_property(props::NUMBER_OF_CHILDREN), Some(3));
        assert_eq!(node.bool_property(props::HAS_DATA), Some(true));
        assert_eq!(node.string_property(props::LABEL), None);
        // wrong type reads as absent
        assert_eq!(node.i64_property(props::CODE), None);
    }

    #[test]
    fn test_response_serialization_skips_empty_breadcrumbs() {
        let response = HierarchyResponse::from_element(HierarchyElement {
            id: "A0".to_string(),
            label: "All items".to_string(),
            no_of_children: 1,
            has_data: false,
            order: None,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("breadcrumbs").is_none());
        assert_eq!(json["children"], serde_json::json!([]));
    }
}

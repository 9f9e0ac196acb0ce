use crate::model::{edges, props, Id, NodeRecord};
use crate::store::query::{code_label, code_list_label, data_label, generic_label};
use crate::store::MemoryGraph;
use serde_json::{Map, Value};

/// Code list of the sample generic hierarchy
pub const CODE_LIST_ID: &str = "cpih1dim1aggid";

/// (code, label, parent code, order within the code list)
const CPIH_CODES: &[(&str, &str, Option<&str>, i64)] = &[
    ("cpih1dim1A0", "CPIH (overall index)", None, 0),
    ("cpih1dim1T90000", "09 Recreation and culture", Some("cpih1dim1A0"), 9),
    (
        "cpih1dim1G90400",
        "09.4 Recreational and cultural services",
        Some("cpih1dim1T90000"),
        4,
    ),
    (
        "cpih1dim1S90401",
        "09.4.1 Recreational and sporting services",
        Some("cpih1dim1G90400"),
        1,
    ),
    (
        "cpih1dim1S90402",
        "09.4.2 Cultural services",
        Some("cpih1dim1G90400"),
        2,
    ),
];

/// Backend id of a generic hierarchy node in the sample code list
pub fn generic_node_id(code: &str) -> Id {
    format!("{}--{}", CODE_LIST_ID, code)
}

fn code_node_id(code: &str) -> Id {
    format!("{}_code_{}", CODE_LIST_ID, code)
}

/// Load the sample CPIH generic hierarchy: generic nodes chained by
/// `hasParent`, one code node per code with a `usedBy` edge (carrying the
/// code's order) to the code list node
pub async fn load_seed_data(graph: &MemoryGraph) {
    graph
        .add_node(NodeRecord::new(CODE_LIST_ID, code_list_label(CODE_LIST_ID)))
        .await;

    for (code, label, _, order) in CPIH_CODES {
        graph
            .add_node(
                NodeRecord::new(generic_node_id(code), generic_label(CODE_LIST_ID))
                    .with_property(props::CODE, *code)
                    .with_property(props::LABEL, *label),
            )
            .await;

        graph
            .add_node(
                NodeRecord::new(code_node_id(code), code_label(CODE_LIST_ID))
                    .with_property(props::VALUE, *code)
                    .with_property(props::LABEL, *label),
            )
            .await;

        let mut used_by = Map::new();
        used_by.insert(props::ORDER.to_string(), Value::from(*order));
        graph
            .add_edge_with_properties(edges::USED_BY, &code_node_id(code), CODE_LIST_ID, used_by)
            .await;
    }

    for (code, _, parent, _) in CPIH_CODES {
        if let Some(parent) = parent {
            graph
                .add_edge(
                    edges::HAS_PARENT,
                    &generic_node_id(code),
                    &generic_node_id(parent),
                )
                .await;
        }
    }
}

/// Add the dimension option nodes an imported instance has observations for
pub async fn load_instance_data(
    graph: &MemoryGraph,
    instance_id: &str,
    dimension_name: &str,
    codes: &[&str],
) {
    let label = data_label(instance_id, dimension_name);
    for code in codes {
        let mut properties = Map::new();
        properties.insert(props::VALUE.to_string(), Value::from(*code));
        graph.add_node_with_label(&label, properties).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_shape() {
        let graph = MemoryGraph::new();
        load_seed_data(&graph).await;
        load_instance_data(&graph, "inst", "aggregate", &["cpih1dim1S90401"]).await;

        assert_eq!(graph.nodes_with_label(&generic_label(CODE_LIST_ID)).await.len(), 5);
        assert_eq!(graph.edges_with_label(edges::HAS_PARENT).await.len(), 4);
        assert_eq!(graph.edges_with_label(edges::USED_BY).await.len(), 5);
        assert_eq!(graph.nodes_with_label(&data_label("inst", "aggregate")).await.len(), 1);
        assert!(graph
            .node(&generic_node_id("cpih1dim1S90401"))
            .await
            .is_some());
    }
}

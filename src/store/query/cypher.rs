use super::{
    code_label, code_list_label, data_label, generic_label, hierarchy_label, quote, quote_list,
    Dialect, Op,
};

/// Cypher dialect used by the legacy single-statement backend
#[derive(Debug, Clone, Copy, Default)]
pub struct Cypher;

impl Dialect for Cypher {
    fn name(&self) -> &'static str {
        "cypher"
    }

    fn render(&self, op: &Op) -> String {
        match op {
            Op::CreateHierarchyConstraint {
                instance_id,
                dimension_name,
            } => format!(
                "CREATE CONSTRAINT ON (n:`{}`) ASSERT n.code IS UNIQUE",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::CloneNodes {
                instance_id,
                code_list_id,
                dimension_name,
            } => format!(
                "MATCH (g:`{generic}`) \
                 MERGE (n:`{target}` {{ code: g.code }}) \
                 ON CREATE SET n.label = g.label, n.code_list = {code_list}, n.hasData = false \
                 MERGE (n)-[:clone_of]->(g)",
                generic = generic_label(code_list_id),
                target = hierarchy_label(instance_id, dimension_name),
                code_list = quote(code_list_id),
            ),
            Op::CloneNodesFromIds {
                instance_id,
                code_list_id,
                dimension_name,
                ids,
                has_data,
            } => format!(
                "MATCH (g) WHERE id(g) IN [{ids}] \
                 MERGE (n:`{target}` {{ code: g.code }}) \
                 ON CREATE SET n.label = g.label, n.code_list = {code_list}, n.hasData = {has_data} \
                 MERGE (n)-[:clone_of]->(g)",
                ids = quote_list(ids),
                target = hierarchy_label(instance_id, dimension_name),
                code_list = quote(code_list_id),
                has_data = has_data,
            ),
            Op::CloneRelationships {
                instance_id,
                code_list_id,
                dimension_name,
            } => format!(
                "MATCH (g:`{generic}`)-[:hasParent]->(gp:`{generic}`) \
                 MATCH (n:`{target}`)-[:clone_of]->(g) \
                 MATCH (p:`{target}`)-[:clone_of]->(gp) \
                 MERGE (n)-[:hasParent]->(p)",
                generic = generic_label(code_list_id),
                target = hierarchy_label(instance_id, dimension_name),
            ),
            Op::CloneRelationshipsFromIds {
                instance_id,
                dimension_name,
                ids,
            } => format!(
                "MATCH (g)-[:hasParent]->(gp) WHERE id(g) IN [{ids}] \
                 MATCH (n:`{target}`)-[:clone_of]->(g) \
                 MATCH (p:`{target}`)-[:clone_of]->(gp) \
                 MERGE (n)-[:hasParent]->(p)",
                ids = quote_list(ids),
                target = hierarchy_label(instance_id, dimension_name),
            ),
            Op::CloneOrderFromIds { code_list_id, ids } => format!(
                "MATCH (n)-[:clone_of]->(g)-[:hasCode]->(c)-[r:usedBy]->(:`{code_list}`) \
                 WHERE id(g) IN [{ids}] SET n.order = r.order",
                ids = quote_list(ids),
                code_list = code_list_label(code_list_id),
            ),
            Op::CreateHasCodeEdge {
                code_list_id,
                node_id,
                code,
            } => format!(
                "MATCH (g) WHERE id(g) = {node} \
                 MATCH (c:`{code_label}` {{ value: {code} }}) \
                 MERGE (g)-[:hasCode]->(c)",
                node = quote(node_id),
                code_label = code_label(code_list_id),
                code = quote(code),
            ),
            Op::RemoveCloneEdges {
                instance_id,
                dimension_name,
            } => format!(
                "MATCH (n:`{}`)-[r:clone_of]->() DELETE r",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::RemoveCloneEdgesFromSourceIds { ids } => format!(
                "MATCH ()-[r:clone_of]->(g) WHERE id(g) IN [{}] DELETE r",
                quote_list(ids)
            ),
            Op::SetNumberOfChildren {
                instance_id,
                dimension_name,
            } => format!(
                "MATCH (n:`{label}`) \
                 SET n.numberOfChildren = size((n)<-[:hasParent]-(:`{label}`))",
                label = hierarchy_label(instance_id, dimension_name)
            ),
            Op::SetNumberOfChildrenFromIds { ids } => format!(
                "MATCH (n) WHERE id(n) IN [{}] SET n.numberOfChildren = size((n)<-[:hasParent]-())",
                quote_list(ids)
            ),
            Op::SetHasData {
                instance_id,
                dimension_name,
                codes,
            } => format!(
                "MATCH (n:`{}`) WHERE n.code IN [{}] SET n.hasData = true",
                hierarchy_label(instance_id, dimension_name),
                quote_list(codes)
            ),
            Op::MarkNodesToRemain {
                instance_id,
                dimension_name,
            } => format!(
                "MATCH (parent:`{label}`)<-[:hasParent*0..]-(n:`{label}` {{ hasData: true }}) \
                 SET parent.remain = true",
                label = hierarchy_label(instance_id, dimension_name)
            ),
            Op::RemoveNodesNotMarkedToRemain {
                instance_id,
                dimension_name,
            } => format!(
                "MATCH (n:`{}`) WHERE NOT exists(n.remain) DETACH DELETE n",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::RemoveRemainMarker {
                instance_id,
                dimension_name,
            } => format!(
                "MATCH (n:`{}`) REMOVE n.remain",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::CountHierarchyNodes {
                instance_id,
                dimension_name,
            } => format!(
                "MATCH (n:`{}`) RETURN count(n)",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::GetCodesWithData {
                instance_id,
                dimension_name,
            } => format!(
                "MATCH (d:`{}`) RETURN d.value",
                data_label(instance_id, dimension_name)
            ),
            Op::GetHierarchyNodeIds {
                instance_id,
                dimension_name,
            } => format!(
                "MATCH (n:`{}`) RETURN id(n)",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::GetGenericHierarchyNodeIds {
                code_list_id,
                codes,
            } => format!(
                "MATCH (g:`{}`) WHERE g.code IN [{}] RETURN id(g) AS node_id, g.code AS node_code",
                generic_label(code_list_id),
                quote_list(codes)
            ),
            Op::GetGenericHierarchyAncestryIds {
                code_list_id,
                codes,
            } => format!(
                "MATCH (g:`{label}`)-[:hasParent*1..]->(a:`{label}`) WHERE g.code IN [{codes}] \
                 RETURN DISTINCT id(a) AS node_id, a.code AS node_code",
                label = generic_label(code_list_id),
                codes = quote_list(codes)
            ),
            Op::GetHierarchyRoot {
                instance_id,
                dimension_name,
            } => format!(
                "MATCH (n:`{}`) WHERE NOT (n)-[:hasParent]->() RETURN n",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::GetHierarchyElement {
                instance_id,
                dimension_name,
                code,
            } => format!(
                "MATCH (n:`{}` {{ code: {} }}) RETURN n",
                hierarchy_label(instance_id, dimension_name),
                quote(code)
            ),
            Op::GetChildren {
                instance_id,
                dimension_name,
                code,
            } => format!(
                "MATCH (n:`{label}` {{ code: {code} }})<-[:hasParent]-(c:`{label}`) \
                 RETURN c ORDER BY c.order, c.label",
                label = hierarchy_label(instance_id, dimension_name),
                code = quote(code)
            ),
            Op::GetAncestry {
                instance_id,
                dimension_name,
                code,
            } => format!(
                "MATCH p = (n:`{label}` {{ code: {code} }})-[:hasParent*]->(a:`{label}`) \
                 RETURN a ORDER BY length(p) ASC",
                label = hierarchy_label(instance_id, dimension_name),
                code = quote(code)
            ),
            Op::CountCodes { code_list_id } => format!(
                "MATCH (c:`{code}`)-[:usedBy]->(:`{list}`) RETURN count(DISTINCT c)",
                code = code_label(code_list_id),
                list = code_list_label(code_list_id),
            ),
            Op::GetCodes { code_list_id } => format!(
                "MATCH (c:`{code}`)-[r:usedBy]->(:`{list}`) \
                 RETURN c.value AS code, c.label AS label, r.order AS order \
                 ORDER BY r.order, c.value",
                code = code_label(code_list_id),
                list = code_list_label(code_list_id),
            ),
            Op::GetCode { code_list_id, code } => format!(
                "MATCH (c:`{code_label}` {{ value: {value} }})-[r:usedBy]->(:`{list}`) \
                 RETURN c.value AS code, c.label AS label, r.order AS order",
                code_label = code_label(code_list_id),
                list = code_list_label(code_list_id),
                value = quote(code),
            ),
            Op::GetCodesOrder {
                code_list_id,
                codes,
            } => format!(
                "MATCH (c:`{code}`)-[r:usedBy]->(:`{list}`) WHERE c.value IN [{values}] \
                 RETURN c.value AS code, r.order AS order",
                code = code_label(code_list_id),
                list = code_list_label(code_list_id),
                values = quote_list(codes),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_query() {
        let text = Cypher.render(&Op::CreateHierarchyConstraint {
            instance_id: "inst".to_string(),
            dimension_name: "time".to_string(),
        });
        assert_eq!(
            text,
            "CREATE CONSTRAINT ON (n:`_hierarchy_node_inst_time`) ASSERT n.code IS UNIQUE"
        );
    }

    #[test]
    fn test_set_has_data_query_lists_codes() {
        let text = Cypher.render(&Op::SetHasData {
            instance_id: "inst".to_string(),
            dimension_name: "aggregate".to_string(),
            codes: vec!["S90401".to_string(), "S90402".to_string()],
        });
        assert_eq!(
            text,
            "MATCH (n:`_hierarchy_node_inst_aggregate`) WHERE n.code IN ['S90401','S90402'] SET n.hasData = true"
        );
    }

    #[test]
    fn test_codes_order_query_reads_used_by_order() {
        let text = Cypher.render(&Op::GetCodesOrder {
            code_list_id: "cpih1dim1aggid".to_string(),
            codes: vec!["cpih1dim1A0".to_string(), "cpih1dim1T90000".to_string()],
        });
        assert_eq!(
            text,
            "MATCH (c:`_code_cpih1dim1aggid`)-[r:usedBy]->(:`_code_list_cpih1dim1aggid`) \
             WHERE c.value IN ['cpih1dim1A0','cpih1dim1T90000'] \
             RETURN c.value AS code, r.order AS order"
        );
    }
}

use super::{
    code_label, code_list_label, data_label, generic_label, hierarchy_label, quote, quote_list,
    Dialect, Op,
};

/// Graph-traversal dialect used by the ID-driven backend
#[derive(Debug, Clone, Copy, Default)]
pub struct Gremlin;

impl Dialect for Gremlin {
    fn name(&self) -> &'static str {
        "gremlin"
    }

    fn render(&self, op: &Op) -> String {
        match op {
            // constraints are not supported by the traversal backend
            Op::CreateHierarchyConstraint { .. } => String::new(),
            Op::CloneNodes {
                instance_id,
                code_list_id,
                dimension_name,
            } => format!(
                "g.V().hasLabel('{generic}').as('old'){clone}",
                generic = generic_label(code_list_id),
                clone = merge_clone(
                    &hierarchy_label(instance_id, dimension_name),
                    code_list_id,
                    false
                ),
            ),
            Op::CloneNodesFromIds {
                instance_id,
                code_list_id,
                dimension_name,
                ids,
                has_data,
            } => format!(
                "g.V({ids}).as('old'){clone}",
                ids = quote_list(ids),
                clone = merge_clone(
                    &hierarchy_label(instance_id, dimension_name),
                    code_list_id,
                    *has_data
                ),
            ),
            Op::CloneRelationships {
                instance_id,
                code_list_id,
                dimension_name,
            } => format!(
                "g.V().hasLabel('{generic}').as('oc')\
                 .out('hasParent').in('clone_of').hasLabel('{target}').as('p')\
                 .select('oc').in('clone_of').hasLabel('{target}')\
                 .not(out('hasParent').where(eq('p')))\
                 .addE('hasParent').to('p')",
                generic = generic_label(code_list_id),
                target = hierarchy_label(instance_id, dimension_name),
            ),
            Op::CloneRelationshipsFromIds {
                instance_id,
                dimension_name,
                ids,
            } => format!(
                "g.V({ids}).as('oc')\
                 .out('hasParent').in('clone_of').hasLabel('{target}').as('p')\
                 .select('oc').in('clone_of').hasLabel('{target}')\
                 .not(out('hasParent').where(eq('p')))\
                 .addE('hasParent').to('p')",
                ids = quote_list(ids),
                target = hierarchy_label(instance_id, dimension_name),
            ),
            Op::CloneOrderFromIds { code_list_id, ids } => format!(
                "g.V({ids}).as('gh')\
                 .out('hasCode').outE('usedBy').where(inV().hasLabel('{code_list}')).values('order').as('o')\
                 .select('gh').in('clone_of').property(single,'order',select('o'))",
                ids = quote_list(ids),
                code_list = code_list_label(code_list_id),
            ),
            Op::CreateHasCodeEdge {
                code_list_id,
                node_id,
                code,
            } => format!(
                "g.V().hasLabel('{code_label}').has('value',{code}).as('c')\
                 .V({node}).coalesce(__.out('hasCode').where(eq('c')), __.addE('hasCode').to('c'))",
                code_label = code_label(code_list_id),
                code = quote(code),
                node = quote(node_id),
            ),
            Op::RemoveCloneEdges {
                instance_id,
                dimension_name,
            } => format!(
                "g.V().hasLabel('{}').outE('clone_of').drop()",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::RemoveCloneEdgesFromSourceIds { ids } => {
                format!("g.V({}).inE('clone_of').drop()", quote_list(ids))
            }
            Op::SetNumberOfChildren {
                instance_id,
                dimension_name,
            } => format!(
                "g.V().hasLabel('{}').property(single,'numberOfChildren',__.in('hasParent').count())",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::SetNumberOfChildrenFromIds { ids } => format!(
                "g.V({}).property(single,'numberOfChildren',__.in('hasParent').count())",
                quote_list(ids)
            ),
            Op::SetHasData {
                instance_id,
                dimension_name,
                codes,
            } => format!(
                "g.V().hasLabel('{}').has('code',within([{}])).property(single,'hasData',true)",
                hierarchy_label(instance_id, dimension_name),
                quote_list(codes)
            ),
            Op::MarkNodesToRemain {
                instance_id,
                dimension_name,
            } => format!(
                "g.V().hasLabel('{}').has('hasData',true)\
                 .emit().repeat(out('hasParent')).property(single,'remain',true)",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::RemoveNodesNotMarkedToRemain {
                instance_id,
                dimension_name,
            } => format!(
                "g.V().hasLabel('{}').not(has('remain',true)).drop()",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::RemoveRemainMarker {
                instance_id,
                dimension_name,
            } => format!(
                "g.V().hasLabel('{}').has('remain').properties('remain').drop()",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::CountHierarchyNodes {
                instance_id,
                dimension_name,
            } => format!(
                "g.V().hasLabel('{}').count()",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::GetCodesWithData {
                instance_id,
                dimension_name,
            } => format!(
                "g.V().hasLabel('{}').values('value')",
                data_label(instance_id, dimension_name)
            ),
            Op::GetHierarchyNodeIds {
                instance_id,
                dimension_name,
            } => format!(
                "g.V().hasLabel('{}').id()",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::GetGenericHierarchyNodeIds {
                code_list_id,
                codes,
            } => format!(
                "g.V().hasLabel('{}').has('code',within([{}]))\
                 .project('node_id','node_code').by(id()).by(values('code'))",
                generic_label(code_list_id),
                quote_list(codes)
            ),
            Op::GetGenericHierarchyAncestryIds {
                code_list_id,
                codes,
            } => format!(
                "g.V().hasLabel('{}').has('code',within([{}]))\
                 .repeat(out('hasParent')).emit().dedup()\
                 .project('node_id','node_code').by(id()).by(values('code'))",
                generic_label(code_list_id),
                quote_list(codes)
            ),
            Op::GetHierarchyRoot {
                instance_id,
                dimension_name,
            } => format!(
                "g.V().hasLabel('{}').not(outE('hasParent'))",
                hierarchy_label(instance_id, dimension_name)
            ),
            Op::GetHierarchyElement {
                instance_id,
                dimension_name,
                code,
            } => format!(
                "g.V().hasLabel('{}').has('code',{})",
                hierarchy_label(instance_id, dimension_name),
                quote(code)
            ),
            Op::GetChildren {
                instance_id,
                dimension_name,
                code,
            } => format!(
                "g.V().hasLabel('{label}').has('code',{code}).in('hasParent').hasLabel('{label}').order().by('order').by('label')",
                label = hierarchy_label(instance_id, dimension_name),
                code = quote(code)
            ),
            Op::GetAncestry {
                instance_id,
                dimension_name,
                code,
            } => format!(
                "g.V().hasLabel('{label}').has('code',{code}).repeat(out('hasParent').hasLabel('{label}')).emit()",
                label = hierarchy_label(instance_id, dimension_name),
                code = quote(code)
            ),
            Op::CountCodes { code_list_id } => format!(
                "g.V().hasLabel('{code}').where(out('usedBy').hasLabel('{list}')).count()",
                code = code_label(code_list_id),
                list = code_list_label(code_list_id),
            ),
            Op::GetCodes { code_list_id } => format!(
                "g.V().hasLabel('{code}').as('c'){rows}",
                code = code_label(code_list_id),
                rows = code_rows(code_list_id),
            ),
            Op::GetCode { code_list_id, code } => format!(
                "g.V().hasLabel('{code_label}').has('value',{value}).as('c'){rows}",
                code_label = code_label(code_list_id),
                value = quote(code),
                rows = code_rows(code_list_id),
            ),
            Op::GetCodesOrder {
                code_list_id,
                codes,
            } => format!(
                "g.V().hasLabel('{code}').has('value',within([{values}])).as('c')\
                 .outE('usedBy').where(inV().hasLabel('{list}'))\
                 .project('code','order').by(select('c').values('value')).by(values('order'))",
                code = code_label(code_list_id),
                list = code_list_label(code_list_id),
                values = quote_list(codes),
            ),
        }
    }
}

/// `code`, `label` and `order` rows for the code nodes selected as `c`
fn code_rows(code_list_id: &str) -> String {
    format!(
        ".outE('usedBy').where(inV().hasLabel('{list}'))\
         .project('code','label','order')\
         .by(select('c').values('value')).by(select('c').values('label')).by(values('order'))",
        list = code_list_label(code_list_id),
    )
}

/// Reuse the `target` node with the code of `old`, or create it, then link it
/// back to `old` unless the `clone_of` edge is already there
fn merge_clone(target: &str, code_list_id: &str, has_data: bool) -> String {
    format!(
        ".coalesce(__.V().hasLabel('{target}').where(eq('old')).by('code'),\
         __.addV('{target}')\
         .property(single,'code',select('old').values('code'))\
         .property(single,'label',select('old').values('label'))\
         .property(single,'hasData',{has_data})\
         .property(single,'code_list',{code_list}))\
         .as('new')\
         .coalesce(__.out('clone_of').where(eq('old')),__.addE('clone_of').to('old'))\
         .select('new')",
        code_list = quote(code_list_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_with_data_query() {
        let text = Gremlin.render(&Op::GetCodesWithData {
            instance_id: "f0a2f3f2-cc86-4bbb-a549-ffc99c89292c".to_string(),
            dimension_name: "aggregate".to_string(),
        });
        assert_eq!(
            text,
            "g.V().hasLabel('_f0a2f3f2-cc86-4bbb-a549-ffc99c89292c_aggregate').values('value')"
        );
    }

    #[test]
    fn test_remove_clone_edges_from_source_ids_query() {
        let text = Gremlin.render(&Op::RemoveCloneEdgesFromSourceIds {
            ids: vec!["a".to_string(), "b".to_string()],
        });
        assert_eq!(text, "g.V('a','b').inE('clone_of').drop()");
    }

    #[test]
    fn test_clone_nodes_from_ids_carries_flag() {
        let text = Gremlin.render(&Op::CloneNodesFromIds {
            instance_id: "i".to_string(),
            code_list_id: "cl".to_string(),
            dimension_name: "d".to_string(),
            ids: vec!["cl--A0".to_string()],
            has_data: true,
        });
        assert!(text.starts_with("g.V('cl--A0').as('old')"));
        assert!(text.contains("property(single,'hasData',true)"));
        assert!(text.contains("_hierarchy_node_i_d"));
    }

    #[test]
    fn test_clone_statements_reuse_existing_clones() {
        let bulk = Gremlin.render(&Op::CloneNodes {
            instance_id: "i".to_string(),
            code_list_id: "cl".to_string(),
            dimension_name: "d".to_string(),
        });
        let by_ids = Gremlin.render(&Op::CloneNodesFromIds {
            instance_id: "i".to_string(),
            code_list_id: "cl".to_string(),
            dimension_name: "d".to_string(),
            ids: vec!["cl--A0".to_string()],
            has_data: false,
        });
        for text in [&bulk, &by_ids] {
            let lookup = text
                .find("coalesce(__.V().hasLabel('_hierarchy_node_i_d').where(eq('old')).by('code')")
                .expect("clone lookup by code");
            let create = text.find("addV('_hierarchy_node_i_d')").expect("clone creation");
            assert!(lookup < create);
            assert!(text.contains("coalesce(__.out('clone_of').where(eq('old')),__.addE('clone_of')"));
        }
        assert!(bulk.starts_with("g.V().hasLabel('_generic_hierarchy_node_cl').as('old')"));
    }

    #[test]
    fn test_clone_relationships_skip_existing_edges() {
        let bulk = Gremlin.render(&Op::CloneRelationships {
            instance_id: "i".to_string(),
            code_list_id: "cl".to_string(),
            dimension_name: "d".to_string(),
        });
        let by_ids = Gremlin.render(&Op::CloneRelationshipsFromIds {
            instance_id: "i".to_string(),
            dimension_name: "d".to_string(),
            ids: vec!["cl--A0".to_string()],
        });
        for text in [&bulk, &by_ids] {
            let guard = text
                .find(".not(out('hasParent').where(eq('p')))")
                .expect("existing edge guard");
            assert!(guard < text.find("addE('hasParent')").expect("edge creation"));
        }
    }
}

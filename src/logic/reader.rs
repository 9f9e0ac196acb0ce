use crate::model::{
    props, CallContext, CodeEntry, CodeOrder, HierarchyElement, HierarchyResponse, NodeIdSet,
    NodeRecord,
};
use crate::store::error::{GraphError, GraphResult};
use crate::store::query::{Dialect, Op, Statement};
use crate::store::traits::GraphStore;
use log::{debug, error, info};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Read-side queries shared by every backend adapter. Reads are never retried.
pub struct HierarchyQueries {
    store: Arc<dyn GraphStore>,
    dialect: Arc<dyn Dialect>,
}

impl HierarchyQueries {
    pub fn new(store: Arc<dyn GraphStore>, dialect: Arc<dyn Dialect>) -> Self {
        Self { store, dialect }
    }

    fn statement(&self, op: Op) -> Statement {
        Statement::new(self.dialect.as_ref(), op)
    }

    pub async fn count_nodes(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<i64> {
        let statement = self.statement(Op::CountHierarchyNodes {
            instance_id: instance_id.to_string(),
            dimension_name: dimension_name.to_string(),
        });
        info!(
            "[{}] counting nodes in the instance hierarchy: instance_id={} dimension_name={}",
            ctx.request_id, instance_id, dimension_name
        );

        self.store.run_count(&statement).await.map_err(|e| {
            error!("[{}] cannot count nodes in a hierarchy: {}", ctx.request_id, e);
            e.with_statement(&statement.text)
        })
    }

    /// Values of the instance dimension options that carry observations
    pub async fn codes_with_data(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<Vec<String>> {
        let statement = self.statement(Op::GetCodesWithData {
            instance_id: instance_id.to_string(),
            dimension_name: dimension_name.to_string(),
        });
        info!(
            "[{}] getting instance dimension codes that have data: instance_id={} dimension_name={}",
            ctx.request_id, instance_id, dimension_name
        );

        self.store
            .run_string_list(&statement)
            .await
            .map_err(|e| e.with_statement(&statement.text))
    }

    pub async fn hierarchy_node_ids(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<NodeIdSet> {
        let statement = self.statement(Op::GetHierarchyNodeIds {
            instance_id: instance_id.to_string(),
            dimension_name: dimension_name.to_string(),
        });
        info!(
            "[{}] getting ids of cloned hierarchy nodes: instance_id={} dimension_name={}",
            ctx.request_id, instance_id, dimension_name
        );

        let ids = self
            .store
            .run_string_list(&statement)
            .await
            .map_err(|e| e.with_statement(&statement.text))?;
        Ok(ids.into_iter().collect())
    }

    /// `Err(MultipleFound)` when several roots exist; that error still
    /// [implies existence](GraphError::implies_existence)
    pub async fn hierarchy_exists(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<bool> {
        let roots = self.roots(ctx, instance_id, dimension_name).await?;
        match roots.len() {
            0 => Ok(false),
            1 => Ok(true),
            n => {
                error!(
                    "[{}] expected a single hierarchy root but {} were returned: instance_id={} dimension_name={}",
                    ctx.request_id, n, instance_id, dimension_name
                );
                Err(GraphError::MultipleFound)
            }
        }
    }

    pub async fn hierarchy_codelist(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<String> {
        let root = single(self.roots(ctx, instance_id, dimension_name).await?)?;
        root.string_property(props::CODE_LIST)
            .map(str::to_string)
            .ok_or_else(|| {
                error!(
                    "[{}] hierarchy root {} has no code list property",
                    ctx.request_id, root.id
                );
                GraphError::NotFound
            })
    }

    pub async fn hierarchy_root(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<HierarchyResponse> {
        let root = single(self.roots(ctx, instance_id, dimension_name).await?).map_err(|e| {
            error!(
                "[{}] cannot identify hierarchy root: instance_id={} dimension_name={}: {}",
                ctx.request_id, instance_id, dimension_name, e
            );
            e
        })?;
        // breadcrumbs are meaningless for the root
        self.build_response(ctx, instance_id, dimension_name, &root, false)
            .await
    }

    pub async fn hierarchy_element(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
        code: &str,
    ) -> GraphResult<HierarchyResponse> {
        let statement = self.statement(Op::GetHierarchyElement {
            instance_id: instance_id.to_string(),
            dimension_name: dimension_name.to_string(),
            code: code.to_string(),
        });
        debug!("[{}] get hierarchy element: {}", ctx.request_id, statement);

        let nodes = self
            .store
            .run_node_query(&statement)
            .await
            .map_err(|e| e.with_statement(&statement.text))?;
        let node = single(nodes)?;
        self.build_response(ctx, instance_id, dimension_name, &node, true)
            .await
    }

    pub async fn count_codes(&self, ctx: &CallContext, code_list_id: &str) -> GraphResult<i64> {
        let statement = self.statement(Op::CountCodes {
            code_list_id: code_list_id.to_string(),
        });
        info!(
            "[{}] counting codes: code_list_id={}",
            ctx.request_id, code_list_id
        );

        self.store
            .run_count(&statement)
            .await
            .map_err(|e| e.with_statement(&statement.text))
    }

    pub async fn codes(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
    ) -> GraphResult<Vec<CodeEntry>> {
        info!(
            "[{}] getting codes: code_list_id={}",
            ctx.request_id, code_list_id
        );
        self.rows(
            ctx,
            Op::GetCodes {
                code_list_id: code_list_id.to_string(),
            },
        )
        .await
    }

    pub async fn code(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        code: &str,
    ) -> GraphResult<CodeEntry> {
        let rows = self
            .rows(
                ctx,
                Op::GetCode {
                    code_list_id: code_list_id.to_string(),
                    code: code.to_string(),
                },
            )
            .await?;
        single(rows).map_err(|e| {
            debug!(
                "[{}] code lookup failed: code_list_id={} code={}: {}",
                ctx.request_id, code_list_id, code, e
            );
            e
        })
    }

    /// Order of the requested codes within the code list, keyed by code
    pub async fn codes_order(
        &self,
        ctx: &CallContext,
        code_list_id: &str,
        codes: &[String],
    ) -> GraphResult<BTreeMap<String, Option<i64>>> {
        let codes: Vec<String> = codes
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if codes.is_empty() {
            return Ok(BTreeMap::new());
        }
        info!(
            "[{}] getting order of {} codes: code_list_id={}",
            ctx.request_id,
            codes.len(),
            code_list_id
        );

        let rows: Vec<CodeOrder> = self
            .rows(
                ctx,
                Op::GetCodesOrder {
                    code_list_id: code_list_id.to_string(),
                    codes,
                },
            )
            .await?;
        Ok(rows.into_iter().map(|row| (row.code, row.order)).collect())
    }

    /// Run a tabular statement and decode one `T` per row
    async fn rows<T: DeserializeOwned>(&self, ctx: &CallContext, op: Op) -> GraphResult<Vec<T>> {
        let statement = self.statement(op);
        debug!("[{}] {}: {}", ctx.request_id, statement.op.name(), statement);

        let rows = self
            .store
            .run_tabular_query(&statement)
            .await
            .map_err(|e| e.with_statement(&statement.text))?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| GraphError::Decode(e.to_string())))
            .collect()
    }

    async fn roots(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
    ) -> GraphResult<Vec<NodeRecord>> {
        let statement = self.statement(Op::GetHierarchyRoot {
            instance_id: instance_id.to_string(),
            dimension_name: dimension_name.to_string(),
        });
        debug!("[{}] get hierarchy root candidates: {}", ctx.request_id, statement);

        self.store
            .run_node_query(&statement)
            .await
            .map_err(|e| e.with_statement(&statement.text))
    }

    /// Assemble a response from a node: its children always, its ancestors
    /// (nearest first) when `with_breadcrumbs` is set
    async fn build_response(
        &self,
        ctx: &CallContext,
        instance_id: &str,
        dimension_name: &str,
        node: &NodeRecord,
        with_breadcrumbs: bool,
    ) -> GraphResult<HierarchyResponse> {
        let element = to_element(node)?;
        let code = element.id.clone();
        let mut response = HierarchyResponse::from_element(element);

        response.children = self
            .elements(
                ctx,
                Op::GetChildren {
                    instance_id: instance_id.to_string(),
                    dimension_name: dimension_name.to_string(),
                    code: code.clone(),
                },
            )
            .await?;

        if with_breadcrumbs {
            response.breadcrumbs = self
                .elements(
                    ctx,
                    Op::GetAncestry {
                        instance_id: instance_id.to_string(),
                        dimension_name: dimension_name.to_string(),
                        code,
                    },
                )
                .await?;
        }

        Ok(response)
    }

    async fn elements(&self, ctx: &CallContext, op: Op) -> GraphResult<Vec<HierarchyElement>> {
        let statement = self.statement(op);
        debug!("[{}] {}: {}", ctx.request_id, statement.op.name(), statement);

        let nodes = self
            .store
            .run_node_query(&statement)
            .await
            .map_err(|e| e.with_statement(&statement.text))?;
        nodes.iter().map(to_element).collect()
    }
}

/// Exactly one item, or `NotFound` / `MultipleFound`
fn single<T>(mut items: Vec<T>) -> GraphResult<T> {
    match items.len() {
        0 => Err(GraphError::NotFound),
        1 => Ok(items.remove(0)),
        _ => Err(GraphError::MultipleFound),
    }
}

/// Read the presentation fields of a hierarchy node
pub fn to_element(node: &NodeRecord) -> GraphResult<HierarchyElement> {
    let code = node
        .string_property(props::CODE)
        .ok_or_else(|| GraphError::Decode(format!("node {} has no code", node.id)))?;
    let label = node
        .string_property(props::LABEL)
        .ok_or_else(|| GraphError::Decode(format!("node {} has no label", node.id)))?;

    Ok(HierarchyElement {
        id: code.to_string(),
        label: label.to_string(),
        no_of_children: node.i64_property(props::NUMBER_OF_CHILDREN).unwrap_or(0),
        has_data: node.bool_property(props::HAS_DATA).unwrap_or(false),
        order: node.i64_property(props::ORDER),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_node_selection() {
        let node = NodeRecord::new("1", "x");
        assert!(matches!(single::<NodeRecord>(vec![]), Err(GraphError::NotFound)));
        assert_eq!(single(vec![node.clone()]).unwrap().id, "1");
        assert!(matches!(
            single(vec![node.clone(), node]),
            Err(GraphError::MultipleFound)
        ));
    }

    #[test]
    fn test_to_element_defaults_and_errors() {
        let node = NodeRecord::new("1", "x")
            .with_property(props::CODE, "S90401")
            .with_property(props::LABEL, "Insurance");
        let element = to_element(&node).unwrap();
        assert_eq!(element.id, "S90401");
        assert_eq!(element.no_of_children, 0);
        assert!(!element.has_data);
        assert_eq!(element.order, None);

        let unlabelled = NodeRecord::new("2", "x").with_property(props::CODE, "A0");
        assert!(matches!(to_element(&unlabelled), Err(GraphError::Decode(_))));
    }
}

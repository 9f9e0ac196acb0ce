use crate::model::{
    edges, generate_id, props, CodeEntry, CodeOrder, EdgeRecord, Id, NodeIdCode, NodeRecord,
};
use crate::store::error::{GraphError, GraphResult};
use crate::store::query::{
    code_label, code_list_label, data_label, generic_label, hierarchy_label, Op, Statement,
};
use crate::store::traits::GraphStore;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredEdge {
    id: Id,
    label: String,
    out_v: Id,
    in_v: Id,
    properties: Map<String, Value>,
}

impl StoredEdge {
    fn record(&self) -> EdgeRecord {
        EdgeRecord {
            id: self.id.clone(),
            label: self.label.clone(),
            out_v: self.out_v.clone(),
            in_v: self.in_v.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Graph {
    nodes: HashMap<Id, NodeRecord>,
    edges: Vec<StoredEdge>,
}

/// What evaluating one operation produced
enum Output {
    Unit,
    Count(i64),
    Strings(Vec<String>),
    Nodes(Vec<NodeRecord>),
    Edges(Vec<EdgeRecord>),
    Tabular(Vec<Value>),
}

impl Output {
    fn kind(&self) -> &'static str {
        match self {
            Output::Unit => "nothing",
            Output::Count(_) => "a count",
            Output::Strings(_) => "a string list",
            Output::Nodes(_) => "nodes",
            Output::Edges(_) => "edges",
            Output::Tabular(_) => "tabular rows",
        }
    }
}

/// In-process labelled property graph.
///
/// Evaluates the typed operation carried by each statement; the rendered text
/// is ignored. Every mutating operation is idempotent, matching the MERGE-style
/// semantics the hierarchy phases rely on when a build is restarted.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    graph: Arc<RwLock<Graph>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a node
    pub async fn add_node(&self, node: NodeRecord) -> Id {
        let id = node.id.clone();
        self.graph.write().await.nodes.insert(id.clone(), node);
        id
    }

    /// Insert a node under a freshly generated id
    pub async fn add_node_with_label(&self, label: &str, properties: Map<String, Value>) -> Id {
        let mut node = NodeRecord::new(generate_id(), label);
        node.properties = properties;
        self.add_node(node).await
    }

    pub async fn add_edge(&self, label: &str, out_v: &str, in_v: &str) -> Id {
        self.add_edge_with_properties(label, out_v, in_v, Map::new())
            .await
    }

    pub async fn add_edge_with_properties(
        &self,
        label: &str,
        out_v: &str,
        in_v: &str,
        properties: Map<String, Value>,
    ) -> Id {
        let id = generate_id();
        self.graph.write().await.edges.push(StoredEdge {
            id: id.clone(),
            label: label.to_string(),
            out_v: out_v.to_string(),
            in_v: in_v.to_string(),
            properties,
        });
        id
    }

    pub async fn node(&self, id: &str) -> Option<NodeRecord> {
        self.graph.read().await.nodes.get(id).cloned()
    }

    /// Nodes carrying `label`, ordered by id
    pub async fn nodes_with_label(&self, label: &str) -> Vec<NodeRecord> {
        let graph = self.graph.read().await;
        graph
            .ids_with_label(label)
            .into_iter()
            .filter_map(|id| graph.nodes.get(&id).cloned())
            .collect()
    }

    pub async fn edges_with_label(&self, label: &str) -> Vec<EdgeRecord> {
        self.graph
            .read()
            .await
            .edges
            .iter()
            .filter(|e| e.label == label)
            .map(StoredEdge::record)
            .collect()
    }

    async fn evaluate(&self, statement: &Statement) -> GraphResult<Output> {
        if statement.op.is_read() {
            let graph = self.graph.read().await;
            graph.query(&statement.op)
        } else {
            let mut graph = self.graph.write().await;
            Ok(graph.mutate(&statement.op))
        }
    }
}

fn unexpected(statement: &Statement, output: &Output, wanted: &str) -> GraphError {
    GraphError::Backend(format!(
        "{} returns {}, not {}",
        statement.op.name(),
        output.kind(),
        wanted
    ))
}

#[async_trait::async_trait]
impl GraphStore for MemoryGraph {
    async fn run_mutation(&self, statement: &Statement) -> GraphResult<()> {
        match self.evaluate(statement).await? {
            Output::Unit | Output::Edges(_) => Ok(()),
            other => Err(unexpected(statement, &other, "a mutation")),
        }
    }

    async fn run_count(&self, statement: &Statement) -> GraphResult<i64> {
        match self.evaluate(statement).await? {
            Output::Count(count) => Ok(count),
            other => Err(unexpected(statement, &other, "a count")),
        }
    }

    async fn run_string_list(&self, statement: &Statement) -> GraphResult<Vec<String>> {
        match self.evaluate(statement).await? {
            Output::Strings(values) => Ok(values),
            other => Err(unexpected(statement, &other, "a string list")),
        }
    }

    async fn run_node_query(&self, statement: &Statement) -> GraphResult<Vec<NodeRecord>> {
        match self.evaluate(statement).await? {
            Output::Nodes(nodes) => Ok(nodes),
            other => Err(unexpected(statement, &other, "nodes")),
        }
    }

    async fn run_edge_query(&self, statement: &Statement) -> GraphResult<Vec<EdgeRecord>> {
        match self.evaluate(statement).await? {
            Output::Edges(edges) => Ok(edges),
            Output::Unit => Ok(Vec::new()),
            other => Err(unexpected(statement, &other, "edges")),
        }
    }

    async fn run_tabular_query(&self, statement: &Statement) -> GraphResult<Vec<Value>> {
        match self.evaluate(statement).await? {
            Output::Tabular(rows) => Ok(rows),
            other => Err(unexpected(statement, &other, "tabular rows")),
        }
    }
}

impl Graph {
    fn ids_with_label(&self, label: &str) -> Vec<Id> {
        let mut ids: Vec<Id> = self
            .nodes
            .values()
            .filter(|n| n.label == label)
            .map(|n| n.id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn with_label_and_code(&self, label: &str, code: &str) -> Vec<Id> {
        let mut ids: Vec<Id> = self
            .nodes
            .values()
            .filter(|n| n.label == label && n.string_property(props::CODE) == Some(code))
            .map(|n| n.id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn out_neighbours(&self, id: &str, label: &str) -> Vec<Id> {
        self.edges
            .iter()
            .filter(|e| e.label == label && e.out_v == id)
            .map(|e| e.in_v.clone())
            .collect()
    }

    fn in_neighbours(&self, id: &str, label: &str) -> Vec<Id> {
        self.edges
            .iter()
            .filter(|e| e.label == label && e.in_v == id)
            .map(|e| e.out_v.clone())
            .collect()
    }

    fn has_edge(&self, label: &str, out_v: &str, in_v: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.label == label && e.out_v == out_v && e.in_v == in_v)
    }

    /// Add an edge unless an identical one exists. Returns the new edge.
    fn merge_edge(&mut self, label: &str, out_v: &str, in_v: &str) -> Option<EdgeRecord> {
        if self.has_edge(label, out_v, in_v) {
            return None;
        }
        let edge = StoredEdge {
            id: generate_id(),
            label: label.to_string(),
            out_v: out_v.to_string(),
            in_v: in_v.to_string(),
            properties: Map::new(),
        };
        let record = edge.record();
        self.edges.push(edge);
        Some(record)
    }

    fn remove_node(&mut self, id: &str) {
        self.nodes.remove(id);
        self.edges.retain(|e| e.out_v != id && e.in_v != id);
    }

    fn set_property(&mut self, id: &str, key: &str, value: Value) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.properties.insert(key.to_string(), value);
        }
    }

    /// Clones of a generic node within one instance hierarchy
    fn clones_of(&self, generic_id: &str, target: &str) -> Vec<Id> {
        self.in_neighbours(generic_id, edges::CLONE_OF)
            .into_iter()
            .filter(|id| self.nodes.get(id).map(|n| n.label == target).unwrap_or(false))
            .collect()
    }

    /// Clone a generic node into `target`, reusing a clone with the same code
    fn clone_node(&mut self, generic_id: &str, target: &str, code_list_id: &str, has_data: bool) {
        let Some(generic) = self.nodes.get(generic_id).cloned() else {
            return;
        };
        let code = generic.string_property(props::CODE).unwrap_or_default().to_string();

        let clone_id = match self.with_label_and_code(target, &code).into_iter().next() {
            Some(existing) => existing,
            None => {
                let mut clone = NodeRecord::new(generate_id(), target)
                    .with_property(props::CODE, code.as_str())
                    .with_property(props::HAS_DATA, has_data)
                    .with_property(props::CODE_LIST, code_list_id);
                if let Some(label) = generic.properties.get(props::LABEL) {
                    clone.properties.insert(props::LABEL.to_string(), label.clone());
                }
                let id = clone.id.clone();
                self.nodes.insert(id.clone(), clone);
                id
            }
        };
        self.merge_edge(edges::CLONE_OF, &clone_id, generic_id);
    }

    /// Mirror the `hasParent` edges of the given generic nodes between their clones
    fn clone_relationships(&mut self, generic_ids: &[Id], target: &str) -> Vec<EdgeRecord> {
        let mut created = Vec::new();
        for generic_id in generic_ids {
            let children = self.clones_of(generic_id, target);
            for generic_parent in self.out_neighbours(generic_id, edges::HAS_PARENT) {
                for parent in self.clones_of(&generic_parent, target) {
                    for child in &children {
                        if let Some(edge) = self.merge_edge(edges::HAS_PARENT, child, &parent) {
                            created.push(edge);
                        }
                    }
                }
            }
        }
        created
    }

    fn set_number_of_children(&mut self, ids: &[Id]) {
        for id in ids {
            let count = self.in_neighbours(id, edges::HAS_PARENT).len() as i64;
            self.set_property(id, props::NUMBER_OF_CHILDREN, Value::from(count));
        }
    }

    /// Ancestors reachable through `hasParent`, nearest first, each reported once.
    /// The start nodes are only reported when reached from another start node.
    fn ancestors(&self, start: &[Id]) -> Vec<Id> {
        let mut emitted = Vec::new();
        let mut seen = HashSet::new();
        let mut expanded: HashSet<Id> = HashSet::new();
        let mut queue: VecDeque<Id> = start.iter().cloned().collect();

        while let Some(id) = queue.pop_front() {
            if !expanded.insert(id.clone()) {
                continue;
            }
            for parent in self.out_neighbours(&id, edges::HAS_PARENT) {
                if seen.insert(parent.clone()) {
                    emitted.push(parent.clone());
                }
                queue.push_back(parent);
            }
        }
        emitted
    }

    fn records(&self, ids: &[Id]) -> Vec<NodeRecord> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id).cloned())
            .collect()
    }

    fn id_code_rows(&self, ids: &[Id]) -> GraphResult<Vec<Value>> {
        let rows: Vec<NodeIdCode> = ids
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| NodeIdCode {
                node_id: n.id.clone(),
                node_code: n.string_property(props::CODE).unwrap_or_default().to_string(),
            })
            .collect();
        let batch = serde_json::to_value(rows).map_err(|e| GraphError::Decode(e.to_string()))?;
        Ok(vec![batch])
    }

    fn mutate(&mut self, op: &Op) -> Output {
        match op {
            Op::CreateHierarchyConstraint { .. } => Output::Unit,
            Op::CloneNodes {
                instance_id,
                code_list_id,
                dimension_name,
            } => {
                let target = hierarchy_label(instance_id, dimension_name);
                for generic_id in self.ids_with_label(&generic_label(code_list_id)) {
                    self.clone_node(&generic_id, &target, code_list_id, false);
                }
                Output::Unit
            }
            Op::CloneNodesFromIds {
                instance_id,
                code_list_id,
                dimension_name,
                ids,
                has_data,
            } => {
                let target = hierarchy_label(instance_id, dimension_name);
                for generic_id in ids {
                    self.clone_node(generic_id, &target, code_list_id, *has_data);
                }
                Output::Unit
            }
            Op::CloneRelationships {
                instance_id,
                code_list_id,
                dimension_name,
            } => {
                let generic_ids = self.ids_with_label(&generic_label(code_list_id));
                let target = hierarchy_label(instance_id, dimension_name);
                Output::Edges(self.clone_relationships(&generic_ids, &target))
            }
            Op::CloneRelationshipsFromIds {
                instance_id,
                dimension_name,
                ids,
            } => {
                let target = hierarchy_label(instance_id, dimension_name);
                Output::Edges(self.clone_relationships(ids, &target))
            }
            Op::CloneOrderFromIds { code_list_id, ids } => {
                let list_label = code_list_label(code_list_id);
                for generic_id in ids {
                    let order = self
                        .out_neighbours(generic_id, edges::HAS_CODE)
                        .iter()
                        .flat_map(|code_id| {
                            self.edges.iter().filter(move |e| {
                                e.label == edges::USED_BY && &e.out_v == code_id
                            })
                        })
                        .filter(|e| {
                            self.nodes
                                .get(&e.in_v)
                                .map(|n| n.label == list_label)
                                .unwrap_or(false)
                        })
                        .find_map(|e| e.properties.get(props::ORDER).cloned());

                    if let Some(order) = order {
                        for clone in self.in_neighbours(generic_id, edges::CLONE_OF) {
                            self.set_property(&clone, props::ORDER, order.clone());
                        }
                    }
                }
                Output::Unit
            }
            Op::CreateHasCodeEdge {
                code_list_id,
                node_id,
                code,
            } => {
                let label = code_label(code_list_id);
                let code_node = self
                    .ids_with_label(&label)
                    .into_iter()
                    .find(|id| {
                        self.nodes
                            .get(id)
                            .and_then(|n| n.string_property(props::VALUE))
                            == Some(code.as_str())
                    });
                if let Some(code_node) = code_node {
                    if self.nodes.contains_key(node_id) {
                        self.merge_edge(edges::HAS_CODE, node_id, &code_node);
                    }
                }
                Output::Unit
            }
            Op::RemoveCloneEdges {
                instance_id,
                dimension_name,
            } => {
                let target: HashSet<Id> = self
                    .ids_with_label(&hierarchy_label(instance_id, dimension_name))
                    .into_iter()
                    .collect();
                self.edges
                    .retain(|e| !(e.label == edges::CLONE_OF && target.contains(&e.out_v)));
                Output::Unit
            }
            Op::RemoveCloneEdgesFromSourceIds { ids } => {
                let sources: HashSet<&Id> = ids.iter().collect();
                self.edges
                    .retain(|e| !(e.label == edges::CLONE_OF && sources.contains(&e.in_v)));
                Output::Unit
            }
            Op::SetNumberOfChildren {
                instance_id,
                dimension_name,
            } => {
                let ids = self.ids_with_label(&hierarchy_label(instance_id, dimension_name));
                self.set_number_of_children(&ids);
                Output::Unit
            }
            Op::SetNumberOfChildrenFromIds { ids } => {
                self.set_number_of_children(ids);
                Output::Unit
            }
            Op::SetHasData {
                instance_id,
                dimension_name,
                codes,
            } => {
                let codes: HashSet<&str> = codes.iter().map(String::as_str).collect();
                for id in self.ids_with_label(&hierarchy_label(instance_id, dimension_name)) {
                    let matches = self
                        .nodes
                        .get(&id)
                        .and_then(|n| n.string_property(props::CODE))
                        .map(|code| codes.contains(code))
                        .unwrap_or(false);
                    if matches {
                        self.set_property(&id, props::HAS_DATA, Value::Bool(true));
                    }
                }
                Output::Unit
            }
            Op::MarkNodesToRemain {
                instance_id,
                dimension_name,
            } => {
                let with_data: Vec<Id> = self
                    .ids_with_label(&hierarchy_label(instance_id, dimension_name))
                    .into_iter()
                    .filter(|id| {
                        self.nodes
                            .get(id)
                            .and_then(|n| n.bool_property(props::HAS_DATA))
                            .unwrap_or(false)
                    })
                    .collect();
                let mut marked: BTreeSet<Id> = with_data.iter().cloned().collect();
                marked.extend(self.ancestors(&with_data));
                for id in marked {
                    self.set_property(&id, props::REMAIN, Value::Bool(true));
                }
                Output::Unit
            }
            Op::RemoveNodesNotMarkedToRemain {
                instance_id,
                dimension_name,
            } => {
                for id in self.ids_with_label(&hierarchy_label(instance_id, dimension_name)) {
                    let remain = self
                        .nodes
                        .get(&id)
                        .and_then(|n| n.bool_property(props::REMAIN))
                        .unwrap_or(false);
                    if !remain {
                        self.remove_node(&id);
                    }
                }
                Output::Unit
            }
            Op::RemoveRemainMarker {
                instance_id,
                dimension_name,
            } => {
                for id in self.ids_with_label(&hierarchy_label(instance_id, dimension_name)) {
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.properties.remove(props::REMAIN);
                    }
                }
                Output::Unit
            }
            // reads are dispatched to `query`
            _ => Output::Unit,
        }
    }

    fn query(&self, op: &Op) -> GraphResult<Output> {
        let output = match op {
            Op::CountHierarchyNodes {
                instance_id,
                dimension_name,
            } => Output::Count(
                self.ids_with_label(&hierarchy_label(instance_id, dimension_name))
                    .len() as i64,
            ),
            Op::GetCodesWithData {
                instance_id,
                dimension_name,
            } => {
                let mut values: Vec<String> = self
                    .records(&self.ids_with_label(&data_label(instance_id, dimension_name)))
                    .iter()
                    .filter_map(|n| n.string_property(props::VALUE).map(str::to_string))
                    .collect();
                values.sort();
                values.dedup();
                Output::Strings(values)
            }
            Op::GetHierarchyNodeIds {
                instance_id,
                dimension_name,
            } => Output::Strings(self.ids_with_label(&hierarchy_label(instance_id, dimension_name))),
            Op::GetGenericHierarchyNodeIds {
                code_list_id,
                codes,
            } => Output::Tabular(self.id_code_rows(&self.generic_matches(code_list_id, codes))?),
            Op::GetGenericHierarchyAncestryIds {
                code_list_id,
                codes,
            } => {
                let matches = self.generic_matches(code_list_id, codes);
                Output::Tabular(self.id_code_rows(&self.ancestors(&matches))?)
            }
            Op::GetHierarchyRoot {
                instance_id,
                dimension_name,
            } => {
                let roots: Vec<Id> = self
                    .ids_with_label(&hierarchy_label(instance_id, dimension_name))
                    .into_iter()
                    .filter(|id| self.out_neighbours(id, edges::HAS_PARENT).is_empty())
                    .collect();
                Output::Nodes(self.records(&roots))
            }
            Op::GetHierarchyElement {
                instance_id,
                dimension_name,
                code,
            } => Output::Nodes(self.records(
                &self.with_label_and_code(&hierarchy_label(instance_id, dimension_name), code),
            )),
            Op::GetChildren {
                instance_id,
                dimension_name,
                code,
            } => {
                let label = hierarchy_label(instance_id, dimension_name);
                let mut children: Vec<NodeRecord> = self
                    .with_label_and_code(&label, code)
                    .iter()
                    .flat_map(|parent| self.in_neighbours(parent, edges::HAS_PARENT))
                    .collect::<BTreeSet<Id>>()
                    .into_iter()
                    .filter_map(|id| self.nodes.get(&id).cloned())
                    .filter(|n| n.label == label)
                    .collect();
                children.sort_by(|a, b| {
                    let key = |n: &NodeRecord| {
                        let order = n.i64_property(props::ORDER);
                        (
                            order.is_none(),
                            order,
                            n.string_property(props::LABEL).unwrap_or_default().to_string(),
                        )
                    };
                    key(a).cmp(&key(b))
                });
                Output::Nodes(children)
            }
            Op::GetAncestry {
                instance_id,
                dimension_name,
                code,
            } => {
                let start =
                    self.with_label_and_code(&hierarchy_label(instance_id, dimension_name), code);
                Output::Nodes(self.records(&self.ancestors(&start)))
            }
            Op::CountCodes { code_list_id } => {
                Output::Count(self.code_list_members(code_list_id).len() as i64)
            }
            Op::GetCodes { code_list_id } => {
                Output::Tabular(code_entry_rows(self.code_list_members(code_list_id))?)
            }
            Op::GetCode { code_list_id, code } => {
                let members = self
                    .code_list_members(code_list_id)
                    .into_iter()
                    .filter(|(node, _)| node.string_property(props::VALUE) == Some(code.as_str()))
                    .collect();
                Output::Tabular(code_entry_rows(members)?)
            }
            Op::GetCodesOrder {
                code_list_id,
                codes,
            } => {
                let codes: HashSet<&str> = codes.iter().map(String::as_str).collect();
                let rows = self
                    .code_list_members(code_list_id)
                    .into_iter()
                    .filter_map(|(node, order)| {
                        let code = node.string_property(props::VALUE)?;
                        codes.contains(code).then(|| CodeOrder {
                            code: code.to_string(),
                            order,
                        })
                    })
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| GraphError::Decode(e.to_string()))?;
                Output::Tabular(rows)
            }
            other => {
                return Err(GraphError::Backend(format!(
                    "{} is not a read operation",
                    other.name()
                )))
            }
        };
        Ok(output)
    }

    /// Code nodes linked to the code list node by `usedBy`, with the order
    /// the edge carries. Ordered by (order, code), unordered codes last.
    fn code_list_members(&self, code_list_id: &str) -> Vec<(&NodeRecord, Option<i64>)> {
        let code_label = code_label(code_list_id);
        let list_label = code_list_label(code_list_id);
        let mut members: Vec<(&NodeRecord, Option<i64>)> = self
            .edges
            .iter()
            .filter(|e| e.label == edges::USED_BY)
            .filter(|e| {
                self.nodes
                    .get(&e.in_v)
                    .map(|n| n.label == list_label)
                    .unwrap_or(false)
            })
            .filter_map(|e| {
                let node = self.nodes.get(&e.out_v).filter(|n| n.label == code_label)?;
                Some((node, e.properties.get(props::ORDER).and_then(Value::as_i64)))
            })
            .collect();
        members.sort_by(|a, b| {
            let key = |(node, order): &(&NodeRecord, Option<i64>)| {
                (
                    order.is_none(),
                    *order,
                    node.string_property(props::VALUE).unwrap_or_default().to_string(),
                )
            };
            key(a).cmp(&key(b))
        });
        members.dedup_by(|a, b| a.0.id == b.0.id);
        members
    }

    fn generic_matches(&self, code_list_id: &str, codes: &[String]) -> Vec<Id> {
        let codes: HashSet<&str> = codes.iter().map(String::as_str).collect();
        self.ids_with_label(&generic_label(code_list_id))
            .into_iter()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .and_then(|n| n.string_property(props::CODE))
                    .map(|code| codes.contains(code))
                    .unwrap_or(false)
            })
            .collect()
    }
}

fn code_entry_rows(members: Vec<(&NodeRecord, Option<i64>)>) -> GraphResult<Vec<Value>> {
    members
        .into_iter()
        .map(|(node, order)| CodeEntry {
            code: node.string_property(props::VALUE).unwrap_or_default().to_string(),
            label: node.string_property(props::LABEL).unwrap_or_default().to_string(),
            order,
        })
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| GraphError::Decode(e.to_string()))
}

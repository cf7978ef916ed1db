// Copyright 2025 Synapse Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Knowledge Graph Builder
//!
//! Pure transformation of the stored entity sets into nodes and edges for
//! the force-directed graph view.
//!
//! ```text
//! conversation ──discusses──▶ problem ◀──belongs_to── conjecture
//!                              ▲   ▲
//!     criticism ──criticizes───┘   └───supports── artifact (deduplicated by name)
//!
//! problem ──related_to──▶ problem   (similarity(title, title) > threshold)
//! ```
//!
//! Emission order is node-creation order: problems, conversations,
//! conjectures, criticisms, artifacts (first-seen name order), then the
//! problem pairs `(i, j)` with `i < j`. Rebuilding from the same inputs
//! yields the same graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::{Artifact, Conjecture, Conversation, Criticism, Problem, ProblemId};
use crate::similarity::similarity;

const CONTENT_LABEL_CHARS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Problem,
    Conversation,
    Conjecture,
    Criticism,
    Artifact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Discusses,
    BelongsTo,
    Criticizes,
    Supports,
    RelatedTo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    /// Row id of the entity; for artifacts, the first row seen with the name.
    pub entity_id: i64,
    /// Problems this node hangs off. Every problem an artifact name is
    /// attached to, in first-seen order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub problem_ids: Vec<ProblemId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// True for artifact nodes that stand for more than one problem.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deduplicated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphOptions {
    /// Problems whose title similarity strictly exceeds this are related.
    pub related_threshold: f64,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            related_threshold: 0.2,
        }
    }
}

/// Borrowed entity sets the graph is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphInput<'a> {
    pub problems: &'a [Problem],
    pub conversations: &'a [Conversation],
    pub conjectures: &'a [Conjecture],
    pub criticisms: &'a [Criticism],
    pub artifacts: &'a [Artifact],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub nodes_by_kind: BTreeMap<NodeKind, usize>,
    pub edges_by_kind: BTreeMap<EdgeKind, usize>,
}

impl KnowledgeGraph {
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            ..Default::default()
        };
        for node in &self.nodes {
            *stats.nodes_by_kind.entry(node.kind).or_insert(0) += 1;
        }
        for edge in &self.edges {
            *stats.edges_by_kind.entry(edge.kind).or_insert(0) += 1;
        }
        stats
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    fn push_node(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    fn push_edge(&mut self, source: String, target: String, kind: EdgeKind) {
        self.edges.push(GraphEdge {
            source,
            target,
            kind,
        });
    }
}

pub fn problem_node_id(id: ProblemId) -> String {
    format!("problem-{}", id)
}

/// Artifact rows sharing a case-insensitive trimmed name collapse into one node.
pub fn artifact_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn artifact_node_id(key: &str) -> String {
    let slug: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("artifact-{}", slug)
}

pub fn build_graph(input: &GraphInput<'_>, options: &GraphOptions) -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::default();

    for problem in input.problems {
        graph.push_node(GraphNode {
            id: problem_node_id(problem.id),
            kind: NodeKind::Problem,
            label: problem.title.clone(),
            entity_id: problem.id,
            problem_ids: Vec::new(),
            url: None,
            deduplicated: false,
        });
    }

    for conversation in input.conversations {
        let id = format!("conversation-{}", conversation.id);
        graph.push_node(GraphNode {
            id: id.clone(),
            kind: NodeKind::Conversation,
            label: conversation.title.clone(),
            entity_id: conversation.id,
            problem_ids: conversation.problem_id.into_iter().collect(),
            url: None,
            deduplicated: false,
        });
        if let Some(problem_id) = conversation.problem_id {
            graph.push_edge(id, problem_node_id(problem_id), EdgeKind::Discusses);
        }
    }

    for conjecture in input.conjectures {
        let id = format!("conjecture-{}", conjecture.id);
        graph.push_node(GraphNode {
            id: id.clone(),
            kind: NodeKind::Conjecture,
            label: content_label(&conjecture.content),
            entity_id: conjecture.id,
            problem_ids: vec![conjecture.problem_id],
            url: None,
            deduplicated: false,
        });
        graph.push_edge(id, problem_node_id(conjecture.problem_id), EdgeKind::BelongsTo);
    }

    for criticism in input.criticisms {
        let id = format!("criticism-{}", criticism.id);
        graph.push_node(GraphNode {
            id: id.clone(),
            kind: NodeKind::Criticism,
            label: content_label(&criticism.content),
            entity_id: criticism.id,
            problem_ids: vec![criticism.problem_id],
            url: None,
            deduplicated: false,
        });
        graph.push_edge(id, problem_node_id(criticism.problem_id), EdgeKind::Criticizes);
    }

    let mut artifact_ids: HashSet<String> = HashSet::new();
    for (slot, (key, group)) in group_artifacts(input.artifacts).into_iter().enumerate() {
        let id = unique_artifact_id(&key, slot, &mut artifact_ids);
        graph.push_node(GraphNode {
            id: id.clone(),
            kind: NodeKind::Artifact,
            label: group.first.name.clone(),
            entity_id: group.first.id,
            deduplicated: group.problem_ids.len() > 1,
            problem_ids: group.problem_ids.clone(),
            url: Some(group.first.url.clone()),
        });
        for problem_id in group.problem_ids {
            graph.push_edge(id.clone(), problem_node_id(problem_id), EdgeKind::Supports);
        }
    }

    for (i, problem) in input.problems.iter().enumerate() {
        for other in &input.problems[i + 1..] {
            if similarity(&problem.title, &other.title) > options.related_threshold {
                graph.push_edge(
                    problem_node_id(problem.id),
                    problem_node_id(other.id),
                    EdgeKind::RelatedTo,
                );
            }
        }
    }

    graph
}

/// Distinct keys can slug to the same id (`a.pdf`, `a-pdf`); later groups
/// get their group index appended.
fn unique_artifact_id(key: &str, slot: usize, taken: &mut HashSet<String>) -> String {
    let base = artifact_node_id(key);
    let mut id = base.clone();
    let mut suffix = slot;
    while !taken.insert(id.clone()) {
        id = format!("{}-{}", base, suffix);
        suffix += 1;
    }
    id
}

struct ArtifactGroup<'a> {
    first: &'a Artifact,
    problem_ids: Vec<ProblemId>,
}

fn group_artifacts(artifacts: &[Artifact]) -> Vec<(String, ArtifactGroup<'_>)> {
    let mut groups: Vec<(String, ArtifactGroup<'_>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for artifact in artifacts {
        let key = artifact_key(&artifact.name);
        match index.get(&key) {
            Some(&slot) => {
                let group = &mut groups[slot].1;
                if !group.problem_ids.contains(&artifact.problem_id) {
                    group.problem_ids.push(artifact.problem_id);
                }
            }
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((
                    key,
                    ArtifactGroup {
                        first: artifact,
                        problem_ids: vec![artifact.problem_id],
                    },
                ));
            }
        }
    }

    groups
}

fn content_label(content: &str) -> String {
    match content.char_indices().nth(CONTENT_LABEL_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActorId, Priority, ProblemStatus};
    use chrono::Utc;

    fn problem(id: i64, title: &str) -> Problem {
        let now = Utc::now();
        Problem {
            id,
            title: title.to_string(),
            description: None,
            status: ProblemStatus::Open,
            priority: Priority::Medium,
            created_by: ActorId::PLACEHOLDER,
            created_at: now,
            updated_at: now,
        }
    }

    fn artifact(id: i64, problem_id: i64, name: &str) -> Artifact {
        Artifact {
            id,
            problem_id,
            name: name.to_string(),
            url: format!("/uploads/{}", name.trim()),
            mime_type: Some("application/pdf".to_string()),
            created_by: ActorId::PLACEHOLDER,
            created_at: Utc::now(),
        }
    }

    fn conversation(id: i64, problem_id: Option<i64>) -> Conversation {
        let now = Utc::now();
        Conversation {
            id,
            problem_id,
            title: format!("conversation {}", id),
            created_by: ActorId::PLACEHOLDER,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_artifacts_deduplicated_by_name() {
        let problems = vec![problem(1, "Alpha"), problem(2, "Bravo")];
        let artifacts = vec![artifact(10, 1, "design.pdf"), artifact(11, 2, " DESIGN.pdf ")];
        let input = GraphInput {
            problems: &problems,
            artifacts: &artifacts,
            ..Default::default()
        };

        let graph = build_graph(&input, &GraphOptions::default());
        let artifact_nodes: Vec<_> = graph
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Artifact)
            .collect();

        assert_eq!(artifact_nodes.len(), 1);
        assert_eq!(artifact_nodes[0].id, "artifact-design-pdf");
        assert_eq!(artifact_nodes[0].problem_ids, vec![1, 2]);
        assert!(artifact_nodes[0].deduplicated);

        let supports: Vec<_> = graph
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Supports)
            .map(|e| e.target.as_str())
            .collect();
        assert_eq!(supports, vec!["problem-1", "problem-2"]);
    }

    #[test]
    fn test_colliding_artifact_slugs_get_distinct_ids() {
        let problems = vec![problem(1, "Alpha"), problem(2, "Bravo")];
        let artifacts = vec![
            artifact(10, 1, "a.pdf"),
            artifact(11, 2, "a-pdf"),
            artifact(12, 1, "日本"),
            artifact(13, 2, "中文"),
        ];
        let input = GraphInput {
            problems: &problems,
            artifacts: &artifacts,
            ..Default::default()
        };

        let graph = build_graph(&input, &GraphOptions::default());
        let ids: Vec<&str> = graph
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Artifact)
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec!["artifact-a-pdf", "artifact-a-pdf-1", "artifact---", "artifact----3"]
        );

        let supports: Vec<(&str, &str)> = graph
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Supports)
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(supports[1], ("artifact-a-pdf-1", "problem-2"));
    }

    #[test]
    fn test_every_edge_endpoint_is_a_node() {
        let problems = vec![problem(1, "Export fails"), problem(2, "Export fails badly")];
        let artifacts = vec![artifact(10, 1, "log.txt"), artifact(11, 2, "LOG.txt")];
        let input = GraphInput {
            problems: &problems,
            artifacts: &artifacts,
            ..Default::default()
        };

        let graph = build_graph(&input, &GraphOptions::default());
        for edge in &graph.edges {
            assert!(graph.node(&edge.source).is_some(), "missing {}", edge.source);
            assert!(graph.node(&edge.target).is_some(), "missing {}", edge.target);
        }
    }

    #[test]
    fn test_conversation_edges_only_when_linked() {
        let problems = vec![problem(1, "Alpha")];
        let conversations = vec![conversation(1, Some(1)), conversation(2, None)];
        let input = GraphInput {
            problems: &problems,
            conversations: &conversations,
            ..Default::default()
        };

        let graph = build_graph(&input, &GraphOptions::default());
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(
            graph.edges,
            vec![GraphEdge {
                source: "conversation-1".into(),
                target: "problem-1".into(),
                kind: EdgeKind::Discusses,
            }]
        );
    }

    #[test]
    fn test_conjecture_and_criticism_edges() {
        let problems = vec![problem(4, "Alpha")];
        let conjectures = vec![Conjecture {
            id: 1,
            problem_id: 4,
            content: "Maybe the cache is stale after deploys".into(),
            created_by: ActorId::PLACEHOLDER,
            created_at: Utc::now(),
        }];
        let criticisms = vec![Criticism {
            id: 2,
            problem_id: 4,
            conjecture_id: Some(1),
            content: "Cache was flushed".into(),
            created_by: ActorId::PLACEHOLDER,
            created_at: Utc::now(),
        }];
        let input = GraphInput {
            problems: &problems,
            conjectures: &conjectures,
            criticisms: &criticisms,
            ..Default::default()
        };

        let graph = build_graph(&input, &GraphOptions::default());
        let conjecture = graph.node("conjecture-1").unwrap();
        assert_eq!(conjecture.label, "Maybe the cache is stale ...");
        assert_eq!(graph.node("criticism-2").unwrap().label, "Cache was flushed");

        let kinds: Vec<_> = graph.edges.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EdgeKind::BelongsTo, EdgeKind::Criticizes]);
    }

    #[test]
    fn test_related_problems_once_per_pair() {
        let problems = vec![
            problem(1, "chat disappearing"),
            problem(2, "where is the chat disappearing"),
            problem(3, "invoice totals wrong"),
        ];
        let input = GraphInput {
            problems: &problems,
            ..Default::default()
        };

        let graph = build_graph(&input, &GraphOptions::default());
        assert_eq!(
            graph.edges,
            vec![GraphEdge {
                source: "problem-1".into(),
                target: "problem-2".into(),
                kind: EdgeKind::RelatedTo,
            }]
        );
    }

    #[test]
    fn test_threshold_is_strict() {
        // jaccard 1/5 with no stem bonus is exactly 0.2
        let problems = vec![problem(1, "export button broken"), problem(2, "export menu slow")];
        let input = GraphInput {
            problems: &problems,
            ..Default::default()
        };

        let graph = build_graph(&input, &GraphOptions::default());
        assert!(graph.edges.is_empty());

        let loose = GraphOptions {
            related_threshold: 0.1,
        };
        assert_eq!(build_graph(&input, &loose).edges.len(), 1);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let problems = vec![problem(1, "login crash"), problem(2, "login crash on mobile")];
        let conversations = vec![conversation(1, Some(2))];
        let artifacts = vec![artifact(1, 1, "trace.log")];
        let input = GraphInput {
            problems: &problems,
            conversations: &conversations,
            artifacts: &artifacts,
            ..Default::default()
        };

        let first = build_graph(&input, &GraphOptions::default());
        let second = build_graph(&input, &GraphOptions::default());
        assert_eq!(first, second);

        let stats = first.stats();
        assert_eq!(stats.total_nodes, 4);
        assert_eq!(stats.nodes_by_kind.get(&NodeKind::Problem), Some(&2));
        assert_eq!(stats.edges_by_kind.get(&EdgeKind::RelatedTo), Some(&1));
    }

    #[test]
    fn test_node_serialization_shape() {
        let problems = vec![problem(1, "Alpha")];
        let input = GraphInput {
            problems: &problems,
            ..Default::default()
        };
        let graph = build_graph(&input, &GraphOptions::default());
        let json = serde_json::to_value(&graph.nodes[0]).unwrap();
        assert_eq!(json["type"], "problem");
        assert_eq!(json["id"], "problem-1");
        assert!(json.get("deduplicated").is_none());
    }
}

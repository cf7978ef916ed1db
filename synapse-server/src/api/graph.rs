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


use axum::{extract::State, Json};
use serde::Serialize;
use synapse_core::{build_graph, GraphEdge, GraphInput, GraphNode, GraphOptions, GraphStats};
use tracing::debug;

use crate::api::{ApiError, AppState};
use crate::store::{ConversationFilter, CriticismFilter};

#[derive(Debug, Serialize)]
pub struct GraphResponse {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: GraphStats,
}

/// GET /api/graph - Graph over every stored entity
pub async fn knowledge_graph(
    State(state): State<AppState>,
) -> Result<Json<GraphResponse>, ApiError> {
    let store = &state.store;
    let (problems, conversations, conjectures, criticisms, artifacts) = futures::try_join!(
        store.list_problems(),
        store.list_conversations(ConversationFilter::All),
        store.list_conjectures(None),
        store.list_criticisms(CriticismFilter::default()),
        store.list_artifacts(None),
    )
    .map_err(|e| ApiError::from_store("Failed to build knowledge graph", e))?;

    let input = GraphInput {
        problems: &problems,
        conversations: &conversations,
        conjectures: &conjectures,
        criticisms: &criticisms,
        artifacts: &artifacts,
    };
    let graph = build_graph(&input, &GraphOptions::default());
    let stats = graph.stats();
    debug!(
        nodes = stats.total_nodes,
        edges = stats.total_edges,
        "Built knowledge graph"
    );

    Ok(Json(GraphResponse {
        nodes: graph.nodes,
        edges: graph.edges,
        stats,
    }))
}

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

//! Synapse Core
//!
//! Domain types and the pure linking logic behind the Synapse problem
//! solving service:
//!
//! - [`similarity`]: keyword relatedness score between two short texts
//! - [`matcher`]: decides whether a chat message belongs to an existing problem
//! - [`creation`]: decides whether an unlinked message spawns a new problem
//! - [`graph`]: turns stored entities into a knowledge graph for visualization
//!
//! Nothing in this crate performs I/O.

pub mod creation;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod model;
pub mod similarity;

pub use creation::{
    conversation_title, synthesize_title, CreationMode, CreationPolicy, CreationSignals,
};
pub use error::{CoreError, Result};
pub use graph::{
    build_graph, EdgeKind, GraphEdge, GraphInput, GraphNode, GraphOptions, GraphStats,
    KnowledgeGraph, NodeKind,
};
pub use matcher::{MatchStrategy, ProblemMatcher};
pub use model::*;
pub use similarity::{similarity, tokenize_filtered, STOP_WORDS};

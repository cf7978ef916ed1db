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


use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use synapse_server::{
    api::AppState,
    build_router,
    config::{HttpServerConfig, LinkingConfig},
    files::FileStore,
    llm::{CompletionOptions, StaticProvider},
    store::MemoryStore,
};

const REPLY: &str = "Let's narrow it down. When did it start?";

fn test_app() -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(StaticProvider::new(REPLY)),
        FileStore::new(dir.path()),
        &LinkingConfig::default(),
        CompletionOptions::default(),
    );
    (build_router(state, &HttpServerConfig::default()), dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_first_message_creates_conversation_and_problem() {
    let (app, _dir) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/api/chat-handler",
            json!({ "message": "The export button crashes when clicking twice" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["aiResponse"], REPLY);
    assert_eq!(body["problemLinked"], false);

    let conversation_id = body["conversationId"].as_i64().unwrap();
    let new_problem_id = body["newProblemId"].as_i64().unwrap();
    assert_eq!(body["problemId"].as_i64(), Some(new_problem_id));

    let (_, body) = send(
        &app,
        get(&format!("/api/conversations/{}/messages", conversation_id)),
    )
    .await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["content"], REPLY);

    let (_, body) = send(&app, get("/api/problems")).await;
    let problems = body["problems"].as_array().unwrap();
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0]["id"].as_i64(), Some(new_problem_id));

    let (_, body) = send(
        &app,
        get(&format!("/api/conversations?problem_id={}", new_problem_id)),
    )
    .await;
    assert_eq!(body["conversations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_related_message_links_existing_problem() {
    let (app, _dir) = test_app();

    let (_, first) = send(
        &app,
        post_json(
            "/api/chat-handler",
            json!({ "message": "The export button crashes when clicking twice" }),
        ),
    )
    .await;
    let problem_id = first["newProblemId"].as_i64().unwrap();

    let (status, second) = send(
        &app,
        post_json(
            "/api/chat-handler",
            json!({ "message": "Export button crashes again after the update" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["problemLinked"], true);
    assert_eq!(second["problemId"].as_i64(), Some(problem_id));
    assert!(second["newProblemId"].is_null());
    assert!(second["linkedProblemTitle"].is_string());

    let (_, body) = send(&app, get("/api/problems")).await;
    assert_eq!(body["problems"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_continuing_unknown_conversation_is_404() {
    let (app, _dir) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/api/chat-handler",
            json!({ "message": "hello", "conversationId": 999 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Conversation not found");
}

#[tokio::test]
async fn test_problem_delete_cascades() {
    let (app, _dir) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/api/problems",
            json!({ "title": "Flaky integration tests", "priority": "high" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["problem"]["priority"], "high");
    let problem_id = body["problem"]["id"].as_i64().unwrap();

    let (_, body) = send(
        &app,
        post_json(
            "/api/conjectures",
            json!({ "problem_id": problem_id, "content": "Shared temp directory" }),
        ),
    )
    .await;
    let conjecture_id = body["conjecture"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        post_json(
            "/api/criticisms",
            json!({
                "problem_id": problem_id,
                "conjecture_id": conjecture_id,
                "content": "Each test already gets its own tempdir"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post_json(
            "/api/artifacts",
            json!({ "problem_id": problem_id, "name": "ci.log", "url": "https://ci.example/1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/api/problems/counts")).await;
    let counts = &body["counts"][problem_id.to_string()];
    assert_eq!(counts["conjectures"], 1);
    assert_eq!(counts["criticisms"], 1);
    assert_eq!(counts["artifacts"], 1);
    assert_eq!(counts["conversations"], 0);

    let (status, body) = send(&app, delete(&format!("/api/problems/{}", problem_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(&app, get(&format!("/api/problems/{}", problem_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Problem not found");

    let (_, body) = send(&app, get("/api/conjectures")).await;
    assert!(body["conjectures"].as_array().unwrap().is_empty());
    let (_, body) = send(&app, get("/api/criticisms")).await;
    assert!(body["criticisms"].as_array().unwrap().is_empty());
    let (_, body) = send(&app, get("/api/artifacts")).await;
    assert!(body["artifacts"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, delete(&format!("/api/problems/{}", problem_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_errors() {
    let (app, _dir) = test_app();

    let (status, body) = send(&app, post_json("/api/chat-handler", json!({ "message": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message is required");

    let (status, body) = send(&app, post_json("/api/problems", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title is required");

    let (status, body) = send(&app, get("/api/conversations")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Either problem_id or unlinked=true is required");

    let (status, body) = send(&app, post_json("/api/conjectures", json!({ "content": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Problem ID and content are required");

    let (status, body) = send(
        &app,
        post_json("/api/artifacts", json!({ "problem_id": 1, "name": "a" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Problem ID, name, and URL are required");

    let (status, body) = send(&app, post_json("/api/summarize", json!({ "messages": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Messages are required");
}

#[tokio::test]
async fn test_unknown_problem_reference_is_bad_request() {
    let (app, _dir) = test_app();

    let (status, _) = send(
        &app,
        post_json("/api/conjectures", json!({ "problem_id": 42, "content": "guess" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_actor_header() {
    let (app, _dir) = test_app();

    let request = Request::builder()
        .uri("/api/problems")
        .header("x-actor-id", "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid x-actor-id header");

    let actor = "6f1c0a52-1d4e-4d59-9a8f-2a0f5f9d83b1";
    let request = Request::builder()
        .method("POST")
        .uri("/api/problems")
        .header("content-type", "application/json")
        .header("x-actor-id", actor)
        .body(Body::from(json!({ "title": "Owned" }).to_string()))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["problem"]["created_by"], actor);
}

#[tokio::test]
async fn test_unlinked_conversations() {
    let (app, _dir) = test_app();

    // Deleting a problem unlinks its conversations.
    let (_, body) = send(&app, post_json("/api/problems", json!({ "title": "Temp" }))).await;
    let problem_id = body["problem"]["id"].as_i64().unwrap();
    let (_, body) = send(
        &app,
        post_json(
            "/api/chat-handler",
            json!({ "message": "hi", "problemId": problem_id }),
        ),
    )
    .await;
    let conversation_id = body["conversationId"].as_i64().unwrap();
    send(&app, delete(&format!("/api/problems/{}", problem_id))).await;

    let (_, body) = send(&app, get("/api/conversations?unlinked=true")).await;
    let conversations = body["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["id"].as_i64(), Some(conversation_id));

    let (status, _) = send(
        &app,
        delete(&format!("/api/conversations/{}", conversation_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        delete(&format!("/api/conversations/{}", conversation_id)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_knowledge_graph() {
    let (app, _dir) = test_app();

    let (_, body) = send(
        &app,
        post_json(
            "/api/chat-handler",
            json!({ "message": "The export button crashes when clicking twice" }),
        ),
    )
    .await;
    let problem_id = body["newProblemId"].as_i64().unwrap();
    let conversation_id = body["conversationId"].as_i64().unwrap();

    let (status, body) = send(&app, get("/api/graph")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total_nodes"], 2);
    assert_eq!(body["stats"]["total_edges"], 1);

    let edge = &body["edges"][0];
    assert_eq!(edge["type"], "discusses");
    assert_eq!(edge["source"], format!("conversation-{}", conversation_id));
    assert_eq!(edge["target"], format!("problem-{}", problem_id));
}

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _dir) = test_app();

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"]["backend"], "memory");
    assert_eq!(body["llm_provider"], "static");

    let (status, body) = send(&app, get("/api/env-check")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Environment check completed");
    assert_eq!(body["environment"]["databaseUrl"], false);
}

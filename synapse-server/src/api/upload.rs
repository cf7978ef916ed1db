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
    extract::{Multipart, State},
    Extension, Json,
};
use serde::Serialize;
use synapse_core::{Artifact, NewArtifact, ProblemId};
use tracing::{info, warn};

use crate::api::{ApiError, AppState};
use crate::auth::ActorContext;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub artifact: Option<Artifact>,
    pub url: String,
    pub message: &'static str,
}

struct UploadForm {
    file_name: String,
    mime_type: Option<String>,
    bytes: Vec<u8>,
    problem_id: ProblemId,
}

async fn read_form(mut multipart: Multipart) -> Result<Option<UploadForm>, ApiError> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut problem_id: Option<ProblemId> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                file = Some((name, mime_type, data.to_vec()));
            }
            Some("problem_id") => {
                let text = field.text().await.unwrap_or_default();
                problem_id = text.trim().parse().ok();
            }
            _ => {}
        }
    }

    Ok(match (file, problem_id) {
        (Some((file_name, mime_type, bytes)), Some(problem_id)) => Some(UploadForm {
            file_name,
            mime_type,
            bytes,
            problem_id,
        }),
        _ => None,
    })
}

/// POST /api/upload - multipart `file` + `problem_id`
///
/// The file lands under `<public_dir>/uploads/`. An artifact row is recorded
/// only for a positive problem id; failing to record it does not fail the
/// upload.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(ctx): Extension<ActorContext>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let form = read_form(multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest("File and problem ID are required".to_string()))?;

    let stored = state
        .files
        .save_upload(&form.file_name, &form.bytes)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to store upload");
            ApiError::internal("Failed to upload file", e)
        })?;

    let artifact = if form.problem_id > 0 {
        let created = state
            .store
            .create_artifact(NewArtifact {
                problem_id: form.problem_id,
                name: form.file_name.clone(),
                url: stored.url.clone(),
                mime_type: form.mime_type,
                created_by: ctx.actor,
            })
            .await;
        match created {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!(error = %e, problem_id = form.problem_id, "Failed to record uploaded artifact");
                None
            }
        }
    } else {
        None
    };

    info!(file = %stored.file_name, size = form.bytes.len(), "Uploaded file");
    Ok(Json(UploadResponse {
        success: true,
        artifact,
        url: stored.url,
        message: "File uploaded successfully",
    }))
}

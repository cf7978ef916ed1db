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


//! Actor context.
//!
//! There is no authentication. Each request acts as the UUID in the
//! `x-actor-id` header, or as the configured default actor when the header
//! is absent.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use synapse_core::ActorId;

use crate::api::{ApiError, AppState};

pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    pub actor: ActorId,
}

pub fn actor_from_header(value: Option<&str>, default: ActorId) -> Result<ActorId, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("Invalid {} header", ACTOR_HEADER))),
    }
}

pub async fn actor_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = match request.headers().get(ACTOR_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::BadRequest(format!("Invalid {} header", ACTOR_HEADER)))?,
        ),
        None => None,
    };
    let actor = actor_from_header(header, state.default_actor)?;
    request.extensions_mut().insert(ActorContext { actor });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_from_header() {
        let fallback = ActorId::PLACEHOLDER;
        assert_eq!(actor_from_header(None, fallback).unwrap(), fallback);
        assert_eq!(actor_from_header(Some("  "), fallback).unwrap(), fallback);

        let id = "6f1c0a52-1d4e-4d59-9a8f-2a0f5f9d83b1";
        assert_eq!(
            actor_from_header(Some(id), fallback).unwrap().to_string(),
            id
        );
        assert!(actor_from_header(Some("not-a-uuid"), fallback).is_err());
    }
}

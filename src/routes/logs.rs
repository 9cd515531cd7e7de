//! Conversation log listing
//!
//! `GET /api/conversation_logs` returns the bearer-authenticated caller's
//! own logs, newest first.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, ErrorResponse},
    middleware::auth::Identity,
    store::{CallType, ConversationLog, LogFilter},
    AppState,
};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Query parameters for listing logs
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogQuery {
    /// 1-based page number (default 1)
    pub page: Option<u32>,
    /// Page size (default 10, at most 100)
    pub limit: Option<u32>,
    pub model_id: Option<Uuid>,
    pub provider_id: Option<String>,
    pub connection_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub call_type: Option<CallType>,
}

impl TryFrom<LogQuery> for LogFilter {
    type Error = AppError;

    fn try_from(query: LogQuery) -> Result<Self, Self::Error> {
        let defaults = LogFilter::default();
        let page = query.page.unwrap_or(defaults.page);
        let limit = query.limit.unwrap_or(defaults.limit);

        if page == 0 {
            return Err(AppError::BadRequest("page must be at least 1".into()));
        }
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(LogFilter {
            page,
            limit,
            model_id: query.model_id,
            provider_id: query.provider_id.filter(|p| !p.is_empty()),
            connection_id: query.connection_id,
            call_type: query.call_type,
        })
    }
}

/// A conversation log as returned to its owner
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationLogView {
    pub id: Uuid,
    pub model_id: Uuid,
    pub connection_id: Uuid,
    /// Request body as sent to the provider
    pub request_payload: String,
    /// Response body as relayed to the caller
    pub response_payload: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub created_at: DateTime<Utc>,
}

impl From<ConversationLog> for ConversationLogView {
    fn from(log: ConversationLog) -> Self {
        Self {
            id: log.id,
            model_id: log.model_id,
            connection_id: log.connection_id,
            request_payload: String::from_utf8_lossy(&log.request_payload).into_owned(),
            response_payload: String::from_utf8_lossy(&log.response_payload).into_owned(),
            prompt_tokens: log.prompt_tokens,
            completion_tokens: log.completion_tokens,
            call_type: log.call_type,
            created_at: log.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogListResponse {
    pub logs: Vec<ConversationLogView>,
    /// Matching logs across all pages
    pub total: i64,
}

#[utoipa::path(
    get,
    path = "/api/conversation_logs",
    tag = "Logs",
    params(LogQuery),
    responses(
        (status = 200, description = "Page of the caller's logs", body = LogListResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_conversation_logs(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    query: Result<Query<LogQuery>, QueryRejection>,
) -> AppResult<Json<LogListResponse>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let filter = LogFilter::try_from(query)?;

    let page = state
        .store
        .list_conversation_logs(identity.user_id, &filter)
        .await?;

    Ok(Json(LogListResponse {
        logs: page.logs.into_iter().map(ConversationLogView::from).collect(),
        total: page.total,
    }))
}

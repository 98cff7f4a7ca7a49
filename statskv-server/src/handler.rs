//! Stats endpoint: POST merges counters into the stored record, GET returns it

use crate::error::ApiError;
use crate::response::{self, HttpResponse};
use crate::AppState;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::{HeaderMap, Method, Request, StatusCode};
use serde::Serialize;
use statskv_common::{InboundUpdate, StatsRecord, STATS_KEY};
use std::fmt::Display;
use tracing::{debug, error, info, warn};

/// Header carrying the shared secret
pub const API_KEY_HEADER: &str = "api-key";

pub const POSTED_MESSAGE: &str = "Data posted to KV.";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Posted<'a> {
    message: &'static str,
    stats_object: &'a StatsRecord,
}

/// Dispatch on method. The path is not looked at.
pub async fn handle_request<B>(state: &AppState, req: Request<B>) -> HttpResponse
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let result = match &method {
        &Method::POST => post_stats(state, req).await,
        &Method::GET => get_stats(state).await,
        _ => Err(ApiError::NotFound),
    };

    result.unwrap_or_else(|e| {
        match &e {
            ApiError::Store(_) | ApiError::Encode(_) => error!("Request failed: {}", e),
            ApiError::InconsistentRecord(_) => warn!("Not updating store: {}", e),
            ApiError::Unauthorized => warn!("Rejected write: {}", e),
            ApiError::InvalidBody(_) | ApiError::NotFound => debug!("Rejected request: {}", e),
        }
        e.into_response()
    })
}

fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| key == state.api_key)
}

async fn post_stats<B>(state: &AppState, req: Request<B>) -> Result<HttpResponse, ApiError>
where
    B: Body,
    B::Error: Display,
{
    if !authorized(state, req.headers()) {
        return Err(ApiError::Unauthorized);
    }

    // An unreadable body is handled like an empty one and fails validation
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            Bytes::new()
        }
    };
    let update = InboundUpdate::from_body(&body).map_err(ApiError::InvalidBody)?;

    let current = state.store.get_json(STATS_KEY).await?;
    let mut record = StatsRecord::from_json(&current).map_err(ApiError::InconsistentRecord)?;

    record.apply(&update, Utc::now());
    state.store.put(STATS_KEY, record.to_json_string()?).await?;

    info!(
        "Updated stats: guilds={} channels={} members={} stats_sent={}",
        record.total_guilds, record.total_channels, record.total_members, record.total_stats_sent
    );

    let posted = Posted {
        message: POSTED_MESSAGE,
        stats_object: &record,
    };
    Ok(response::json(StatusCode::OK, &posted)?)
}

async fn get_stats(state: &AppState) -> Result<HttpResponse, ApiError> {
    let raw = state.store.get(STATS_KEY).await?;
    Ok(response::raw_json(raw.unwrap_or_default()))
}

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use stylesync_core::JobRequest;
use stylesync_scraper::{run_job, BufferedSink, ChannelSink};
use tokio::sync::{mpsc, OwnedSemaphorePermit};

use crate::middleware::RequestId;

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct JobQuery {
    pub stream: Option<String>,
}

impl JobQuery {
    fn wants_stream(&self) -> bool {
        matches!(self.stream.as_deref(), Some("1" | "true"))
    }
}

pub(super) async fn create_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<JobQuery>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::new(req_id.0.clone(), "bad_request", rejection.body_text())
    })?;

    let Some(slot) = state.slots.try_claim() else {
        tracing::warn!(
            request_id = %req_id.0,
            capacity = state.slots.capacity(),
            "job rejected; every browser slot is busy"
        );
        return Err(ApiError::new(
            req_id.0,
            "rate_limited",
            format!(
                "all {} browser slots are busy; retry later",
                state.slots.capacity()
            ),
        ));
    };

    tracing::info!(
        request_id = %req_id.0,
        mode = %request.mode,
        links = request.links.len(),
        stream = query.wants_stream(),
        slots_in_use = state.slots.in_use(),
        "job admitted"
    );

    if query.wants_stream() {
        return Ok(stream_job(state, request, slot));
    }

    let mut sink = BufferedSink::new();
    let outcome = run_job(state.launcher.as_ref(), &state.settings, &request, &mut sink).await;
    drop(slot);
    let report = sink.into_report();
    let status = if outcome.is_ok() && report.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(report)).into_response())
}

/// Run the job in the background and forward each event as one NDJSON line
/// the moment it is produced. The slot is released once the browser is
/// closed, even if the client has gone away.
fn stream_job(state: AppState, request: JobRequest, slot: OwnedSemaphorePermit) -> Response {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut sink = ChannelSink::new(tx);
        let outcome = run_job(state.launcher.as_ref(), &state.settings, &request, &mut sink).await;
        drop(slot);
        if let Err(e) = outcome {
            tracing::debug!(error = %e, "streamed job ended with failure");
        }
    });

    let lines = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok::<_, Infallible>(event.to_ndjson_line()), rx))
    });

    (
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}

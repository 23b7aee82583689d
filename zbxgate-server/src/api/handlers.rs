use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use zbxgate_common::types::DEFAULT_LIMIT;
use zbxgate_common::{
    associate_logs, parse_alert_query, query_alerts, today_alerts, with_session, AlertQuery,
    GatewayConfig, LogAssociationQuery, SortKey,
};

use super::{json_response, ApiError, AppState};
use crate::prom::RouteTimer;
use crate::queue::{Job, TaskQueue};

type HttpResult = Result<Response<Full<Bytes>>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct NlRequest {
    pub text: String,
}

/// `?limit=` for `GET /alerts/today`
#[derive(Debug, Default, Deserialize)]
pub struct TodayParams {
    pub limit: Option<i64>,
}

/// `?by=&limit=` for `GET /alerts/top`
#[derive(Debug, Default, Deserialize)]
pub struct TopParams {
    pub by: Option<String>,
    pub limit: Option<i64>,
}

pub fn health(config: &GatewayConfig) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &json!({"status": "ok", "mock_mode": config.mock_mode}),
    )
}

pub fn metrics(handle: &PrometheusHandle) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(handle.render())));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

pub async fn version(config: &GatewayConfig) -> HttpResult {
    let source = config.build_source()?;
    let version = with_session(source.as_ref(), |s| s.api_version()).await?;
    Ok(json_response(
        StatusCode::OK,
        &json!({"zabbix_api_version": version}),
    ))
}

pub async fn alerts_query(config: &GatewayConfig, query: AlertQuery) -> HttpResult {
    let _timer = RouteTimer::start("alerts_query");
    let query = AlertQuery {
        limit: config.clamp_limit(query.limit),
        ..query
    };

    let source = config.build_source()?;
    let resp = with_session(source.as_ref(), |s| query_alerts(s, &query)).await?;
    Ok(json_response(StatusCode::OK, &resp))
}

pub async fn alerts_today(config: &GatewayConfig, params: TodayParams) -> HttpResult {
    let _timer = RouteTimer::start("alerts_today");
    let limit = config.clamp_limit(params.limit.unwrap_or(DEFAULT_LIMIT));

    let source = config.build_source()?;
    let resp = with_session(source.as_ref(), |s| today_alerts(s, limit)).await?;
    Ok(json_response(StatusCode::OK, &resp))
}

pub async fn alerts_top(config: &GatewayConfig, params: TopParams) -> HttpResult {
    let _timer = RouteTimer::start("alerts_top");
    let sort = params
        .by
        .and_then(|by| by.parse::<SortKey>().ok())
        .unwrap_or(SortKey::Severity);
    let query = AlertQuery::new()
        .with_sort(sort)
        .with_limit(config.clamp_limit(params.limit.unwrap_or(DEFAULT_LIMIT)));

    let source = config.build_source()?;
    let resp = with_session(source.as_ref(), |s| query_alerts(s, &query)).await?;
    Ok(json_response(StatusCode::OK, &resp))
}

pub async fn alerts_nl(config: &GatewayConfig, request: NlRequest) -> HttpResult {
    let _timer = RouteTimer::start("alerts_nl");
    let parsed = parse_alert_query(&request.text);
    let query = AlertQuery {
        limit: config.clamp_limit(parsed.limit),
        ..parsed
    };

    let source = config.build_source()?;
    let resp = with_session(source.as_ref(), |s| query_alerts(s, &query)).await?;
    Ok(json_response(StatusCode::OK, &resp))
}

pub async fn logs_associate(config: &GatewayConfig, query: LogAssociationQuery) -> HttpResult {
    let _timer = RouteTimer::start("logs_associate");
    let query = LogAssociationQuery {
        limit: config.clamp_limit(query.limit),
        ..query
    };

    let source = config.build_source()?;
    let (resp, _keywords) = with_session(source.as_ref(), |s| associate_logs(s, &query)).await?;
    Ok(json_response(StatusCode::OK, &resp))
}

pub async fn queue_enqueue(queue: &TaskQueue, job: Job) -> HttpResult {
    let kind = job.kind.clone();
    let id = queue
        .enqueue(job)
        .await
        .map_err(|e| ApiError::unavailable(e.to_string()))?;

    info!(job_id = %id, kind = %kind, "Job queued");
    Ok(json_response(
        StatusCode::OK,
        &json!({"status": "queued", "job_id": id}),
    ))
}

pub fn queue_stats(queue: &TaskQueue) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &json!({"size": queue.size(), "workers": queue.workers()}),
    )
}

pub async fn config_reload(state: &AppState) -> HttpResult {
    let fresh = (state.loader)()?;
    *state.config.write().await = Arc::new(fresh);

    info!("Configuration reloaded");
    Ok(json_response(StatusCode::OK, &json!({"status": "reloaded"})))
}

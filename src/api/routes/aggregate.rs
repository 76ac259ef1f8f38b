//! `POST /api/aggregate` and `POST /api/aggregate/batch`.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::batch::{run_batch, BatchJob};
use crate::calculate::{compute_stats, records_from_value};
use crate::models::{AggregateOptions, AggregateResult};

/// One aggregation call: the fight records plus optional overrides.
#[derive(Debug, Deserialize)]
pub struct AggregateRequest {
    #[serde(default)]
    pub logs: Value,
    #[serde(default)]
    pub options: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<AggregateResult>,
}

/// Canonical name of a top-level options section.
fn section_key(key: &str) -> &str {
    match key {
        "retain_skill_map" => "retainSkillMap",
        "statsViewSettings" => "view",
        "mvp_weights" => "mvpWeights",
        "precomputed_stats" => "precomputedStats",
        other => other,
    }
}

/// Apply request overrides to the server defaults. A section present in
/// the request replaces the configured one; absent sections keep it.
pub fn resolve_options(
    defaults: &AggregateOptions,
    overrides: Option<Value>,
) -> Result<AggregateOptions, ApiError> {
    let overrides = match overrides {
        None | Some(Value::Null) => return Ok(defaults.clone()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(ApiError::BadRequest("options must be an object".to_string())),
    };

    let mut base = serde_json::to_value(defaults)
        .map_err(|e| ApiError::Internal(format!("failed to encode default options: {e}")))?;
    if let Value::Object(base) = &mut base {
        for (key, value) in overrides {
            base.insert(section_key(&key).to_string(), value);
        }
    }
    serde_json::from_value(base).map_err(|e| ApiError::BadRequest(format!("invalid options: {e}")))
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

fn into_job(state: &AppState, request: AggregateRequest) -> Result<BatchJob, ApiError> {
    let records = records_from_value(request.logs).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let options = resolve_options(&state.defaults, request.options)?;
    Ok(BatchJob { records, options })
}

pub async fn aggregate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AggregateResult>, ApiError> {
    let request: AggregateRequest = parse_body(&body)?;
    let job = into_job(&state, request)?;
    info!("Aggregating {} records", job.records.len());

    let result = tokio::task::spawn_blocking(move || compute_stats(&job.records, &job.options))
        .await
        .map_err(|e| ApiError::Internal(format!("aggregation task failed: {e}")))?;
    Ok(Json(result))
}

pub async fn aggregate_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchResponse>, ApiError> {
    let requests: Vec<AggregateRequest> = parse_body(&body)?;
    let jobs = requests
        .into_iter()
        .enumerate()
        .map(|(index, request)| {
            into_job(&state, request).map_err(|e| match e {
                ApiError::BadRequest(msg) => ApiError::BadRequest(format!("request {index}: {msg}")),
                other => other,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let expected = jobs.len();
    info!("Aggregating batch of {} collections", expected);

    let results = run_batch(jobs, state.batch_concurrency).await;
    if results.len() != expected {
        return Err(ApiError::Internal(format!(
            "{} of {} batch jobs failed",
            expected - results.len(),
            expected
        )));
    }
    Ok(Json(BatchResponse {
        results: results.into_iter().map(|(_, result)| result).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::build_router;
    use crate::models::SkillDamageSource;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::util::ServiceExt;

    fn app() -> axum::Router {
        build_router(AppState::new(AggregateOptions::default(), 16 * 1024 * 1024), "*")
    }

    async fn post_json(app: axum::Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn fight(account: &str, healing: f64) -> Value {
        json!({
            "filePath": format!("{account}.zevtc"),
            "details": {
                "durationMS": 60000,
                "players": [{
                    "account": account, "profession": "Druid",
                    "extHealingStats": { "outgoingHealingAllies": [[{ "healing": healing }]] }
                }]
            }
        })
    }

    #[test]
    fn test_resolve_options_replaces_sections() {
        let mut defaults = AggregateOptions::default();
        defaults.mvp_weights.dps = 0.5;
        defaults.view.skill_damage_source = SkillDamageSource::Total;

        let options = resolve_options(
            &defaults,
            Some(json!({ "statsViewSettings": { "showMvp": false } })),
        )
        .unwrap();
        assert!(!options.view.show_mvp);
        assert_eq!(options.view.skill_damage_source, SkillDamageSource::Target);
        assert!((options.mvp_weights.dps - 0.5).abs() < 0.001);

        assert!(resolve_options(&defaults, Some(json!([1]))).is_err());
        assert!(resolve_options(&defaults, Some(json!({ "view": { "showMvp": "maybe" } }))).is_err());
        assert_eq!(resolve_options(&defaults, None).unwrap().mvp_weights, defaults.mvp_weights);
    }

    #[tokio::test]
    async fn test_aggregate_endpoint() {
        let body = json!({ "logs": [fight("a.1", 500.0), fight("b.1", 900.0)] }).to_string();
        let (status, json) = post_json(app(), "/api/aggregate", &body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["validFightCount"], 2);
        assert_eq!(json["stats"]["total"], 2);
        assert_eq!(json["stats"]["topStats"]["maxHealing"]["player"], "b.1");
        assert_eq!(json["skillUsageData"]["logRecords"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_aggregate_respects_option_overrides() {
        let body = json!({
            "logs": [fight("a.1", 500.0)],
            "options": { "view": { "showMvp": false } }
        })
        .to_string();
        let (status, json) = post_json(app(), "/api/aggregate", &body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["stats"]["mvp"]["account"], "None");
    }

    #[tokio::test]
    async fn test_aggregate_rejects_bad_input() {
        let (status, json) = post_json(app(), "/api/aggregate", r#"{ "logs": 5 }"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");

        let (status, _) = post_json(app(), "/api/aggregate", "{ not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = post_json(app(), "/api/aggregate", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"]["message"].as_str().is_some_and(|m| m.contains("null")));
    }

    #[tokio::test]
    async fn test_batch_endpoint_keeps_request_order() {
        let body = json!([
            { "logs": [fight("a.1", 1.0)] },
            { "logs": [] },
            { "logs": { "logs": [fight("a.1", 1.0), fight("b.1", 2.0)] } }
        ])
        .to_string();
        let (status, json) = post_json(app(), "/api/aggregate/batch", &body).await;

        assert_eq!(status, StatusCode::OK);
        let results = json["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["validFightCount"], 1);
        assert_eq!(results[1]["validFightCount"], 0);
        assert_eq!(results[2]["validFightCount"], 2);
    }

    #[tokio::test]
    async fn test_batch_names_the_bad_request() {
        let body = json!([{ "logs": [] }, { "logs": "nope" }]).to_string();
        let (status, json) = post_json(app(), "/api/aggregate/batch", &body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("request 1")));
    }
}

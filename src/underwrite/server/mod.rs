// SPDX-License-Identifier: MIT

//! HTTP surface for the underwriting dashboard

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::underwrite::config::EngineConfig;
use crate::underwrite::error::{RuleSetLoadError, UnderwriteError};
use crate::underwrite::rules::{RuleLoader, RuleRunner, RuleSet};

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Shared by every request; read-only after startup
pub struct AppState {
    config: EngineConfig,
    runner: RuleRunner,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        let runner = RuleRunner::new(config.limits);
        Self { config, runner }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/rulesets", get(list_rule_sets))
        .route("/api/rulesets/{id}", get(get_rule_set))
        .route("/api/evaluations", post(create_evaluation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: EngineConfig) -> Result<(), UnderwriteError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let app = router(Arc::new(AppState::new(config)));

    log::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_rule_sets(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut rule_sets = Vec::new();
    if let Ok(mut entries) = fs::read_dir(&state.config.rules_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    rule_sets.push(json!({
                        "id": stem,
                        "file": path.to_string_lossy()
                    }));
                }
            }
        }
    }
    // read_dir order is platform dependent
    rule_sets.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
    Json(json!(rule_sets))
}

async fn get_rule_set(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let path = resolve_rule_set(&state.config, &id).await?;
    let rule_set = load_rule_set(path).await?;
    serde_json::to_value(&rule_set)
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct EvaluationRequest {
    #[serde(default)]
    pub payload: Value,
    /// Rule set id in the rules directory; the configured default when absent
    #[serde(default)]
    pub ruleset: Option<String>,
}

async fn create_evaluation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EvaluationRequest>,
) -> ApiResult {
    let path = match request.ruleset.as_deref() {
        Some(id) => resolve_rule_set(&state.config, id).await?,
        None => state.config.rules_path.clone(),
    };
    let rule_set = load_rule_set(path).await?;
    let report = state.runner.evaluate_rule_set(&request.payload, &rule_set);
    serde_json::to_value(&report)
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Map a rule set id to a file in the rules directory
///
/// Ids are restricted to `[A-Za-z0-9_-]+` so a request cannot name a path
/// outside the directory.
async fn resolve_rule_set(config: &EngineConfig, id: &str) -> Result<PathBuf, (StatusCode, Json<Value>)> {
    if !is_valid_id(id) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid rule set id: {:?}", id),
        ));
    }
    for ext in ["yaml", "yml"] {
        let path = config.rules_dir.join(format!("{}.{}", id, ext));
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(path);
        }
    }
    Err(api_error(
        StatusCode::NOT_FOUND,
        format!("Rule set not found: {}", id),
    ))
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

async fn load_rule_set(path: PathBuf) -> Result<RuleSet, (StatusCode, Json<Value>)> {
    let loaded = match fs::read_to_string(&path).await {
        Ok(content) => RuleLoader::parse_yaml(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RuleSetLoadError::NotFound(path)),
        Err(source) => Err(RuleSetLoadError::Io { path, source }),
    };
    loaded.map_err(|e| {
        log::error!("Failed to load rule set: {}", e);
        let status = match e {
            RuleSetLoadError::NotFound(_) => StatusCode::NOT_FOUND,
            RuleSetLoadError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            RuleSetLoadError::Parse(_) | RuleSetLoadError::DuplicateRuleId(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        api_error(status, e.to_string())
    })
}

fn api_error(status: StatusCode, message: String) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;

    const BASE: &str = r#"
version: "1.0.0"
rules:
  - id: R1
    description: Applicant must be an adult
    severity: warn
    condition: age >= 18
  - id: R2
    severity: info
    condition: state == 'TX'
"#;

    fn state_with(dir: &tempfile::TempDir) -> State<Arc<AppState>> {
        let config = EngineConfig {
            rules_path: dir.path().join("base.yaml"),
            rules_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        State(Arc::new(AppState::new(config)))
    }

    fn rules_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std_fs::write(dir.path().join("base.yaml"), BASE).unwrap();
        std_fs::write(dir.path().join("strict.yml"), "version: 2\nrules: []").unwrap();
        std_fs::write(dir.path().join("broken.yaml"), "rules: [{id: R1}]").unwrap();
        std_fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health_check().await;
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_list_rule_sets() {
        let dir = rules_dir();
        let Json(body) = list_rule_sets(state_with(&dir)).await;
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["base", "broken", "strict"]);
    }

    #[tokio::test]
    async fn test_get_rule_set() {
        let dir = rules_dir();
        let Json(body) = get_rule_set(state_with(&dir), Path("base".to_string()))
            .await
            .unwrap();
        assert_eq!(body["version"], "1.0.0");
        assert_eq!(body["rules"][1]["id"], "R2");

        let Json(body) = get_rule_set(state_with(&dir), Path("strict".to_string()))
            .await
            .unwrap();
        assert_eq!(body["version"], "2");
    }

    #[tokio::test]
    async fn test_get_rule_set_errors() {
        let dir = rules_dir();
        let (status, _) = get_rule_set(state_with(&dir), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, Json(body)) = get_rule_set(state_with(&dir), Path("../base".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid rule set id"));

        let (status, _) = get_rule_set(state_with(&dir), Path("broken".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_evaluate_default_rule_set() {
        let dir = rules_dir();
        let request = EvaluationRequest {
            payload: json!({"age": 16, "address": {"state": "TX"}}),
            ruleset: None,
        };
        let Json(body) = create_evaluation(state_with(&dir), Json(request))
            .await
            .unwrap();
        assert_eq!(body["rules_version"], "1.0.0");
        assert_eq!(body["summary"], json!({"passed": 1, "failed": 1}));
        assert_eq!(body["results"][0]["detail"], "Condition evaluated to False");
        assert_eq!(body["results"][1]["detail"], "OK");
    }

    #[tokio::test]
    async fn test_evaluate_named_and_broken_rule_sets() {
        let dir = rules_dir();
        let request = EvaluationRequest {
            payload: json!({}),
            ruleset: Some("strict".to_string()),
        };
        let Json(body) = create_evaluation(state_with(&dir), Json(request))
            .await
            .unwrap();
        assert_eq!(body["rules_version"], "2");
        assert_eq!(body["results"], json!([]));

        let request = EvaluationRequest {
            payload: json!({}),
            ruleset: Some("broken".to_string()),
        };
        let (status, Json(body)) = create_evaluation(state_with(&dir), Json(request))
            .await
            .unwrap_err();
        assert!(!status.is_success());
        assert!(body["error"].as_str().unwrap().starts_with("Invalid rule set"));
    }

    #[tokio::test]
    async fn test_resolve_rule_set_extensions() {
        let dir = rules_dir();
        let config = state_with(&dir).0.config.clone();
        std_fs::write(dir.path().join("both.yaml"), BASE).unwrap();
        std_fs::write(dir.path().join("both.yml"), BASE).unwrap();

        let path = resolve_rule_set(&config, "base").await.unwrap();
        assert_eq!(path, dir.path().join("base.yaml"));
        let path = resolve_rule_set(&config, "strict").await.unwrap();
        assert_eq!(path, dir.path().join("strict.yml"));
        let path = resolve_rule_set(&config, "both").await.unwrap();
        assert_eq!(path, dir.path().join("both.yaml"));

        let (status, _) = resolve_rule_set(&config, "notes").await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_id_validation() {
        assert!(is_valid_id("base"));
        assert!(is_valid_id("commercial_v2-strict"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc/passwd"));
        assert!(!is_valid_id("a.b"));
        assert!(!is_valid_id("a/b"));
    }
}

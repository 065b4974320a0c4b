//! text2sql-web：HTTP 接口
//!
//! - POST /api/query  {"question": "..."} -> Outcome（JSON）
//! - GET  /api/schema -> 缓存的 Schema 上下文
//! - GET  /api/databases -> 服务器上可见的数据库
//! - GET  /api/health -> 数据库可达时 OK，否则 503
//!
//! 端口：TEXT2SQL_WEB_PORT > 配置 [web].port

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use text2sql::config::{load_config, AppConfig};
use text2sql::db::SchemaContext;
use text2sql::pipeline::RuntimeError;
use text2sql::{observability, Outcome, Text2Sql};

struct AppState {
    runtime: Text2Sql,
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    question: String,
}

fn error_status(e: &RuntimeError) -> StatusCode {
    match e {
        RuntimeError::Acquire(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn api_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Outcome>, (StatusCode, String)> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question is required".to_string()));
    }
    let outcome = state.runtime.ask(question).await.map_err(|e| {
        tracing::warn!("query failed before the run started: {}", e);
        (error_status(&e), e.to_string())
    })?;
    Ok(Json(outcome))
}

async fn api_schema(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SchemaContext>, (StatusCode, String)> {
    let schema = state
        .runtime
        .schema()
        .await
        .map_err(|e| (error_status(&e), e.to_string()))?;
    Ok(Json(schema.as_ref().clone()))
}

async fn api_databases(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let databases = state
        .runtime
        .databases()
        .await
        .map_err(|e| (error_status(&e), e.to_string()))?;
    Ok(Json(databases))
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    match state.runtime.ping().await {
        Ok(()) => (StatusCode::OK, "OK".to_string()),
        Err(e) => {
            tracing::warn!("health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/query", post(api_query))
        .route("/api/schema", get(api_schema))
        .route("/api/databases", get(api_databases))
        .route("/api/health", get(health))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let runtime = Text2Sql::connect(&cfg).await?;
    // 启动时预热 Schema，失败则直接退出
    runtime.schema().await?;

    let state = Arc::new(AppState { runtime });
    let app = router(state.clone());

    let port = std::env::var("TEXT2SQL_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(cfg.web.port);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Text2SQL Web API: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown_state.runtime.supervisor().shutdown();
        })
        .await?;

    state.runtime.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn test_state() -> Arc<AppState> {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        let runtime = Text2Sql::connect(&cfg).await.unwrap();
        Arc::new(AppState { runtime })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state().await;
        let response = router(state.clone())
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // 连接池关闭后健康检查失败
        state.runtime.close().await;
        let response = router(state)
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_databases_lists_main() {
        let app = router(test_state().await);
        let response = app
            .oneshot(Request::get("/api/databases").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!(["main"]));
    }

    #[tokio::test]
    async fn test_query_returns_outcome() {
        let app = router(test_state().await);
        let request = Request::post("/api/query")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"question": "how many salespeople?"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["outcome"], "succeeded");
        assert_eq!(json["history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let app = router(test_state().await);
        let request = Request::post("/api/query")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"question": "  "}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_schema_lists_sample_tables() {
        let app = router(test_state().await);
        let response = app
            .oneshot(Request::get("/api/schema").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let text = json.to_string();
        assert!(text.contains("salesperson"));
        assert!(text.contains("timber_sales"));
    }
}

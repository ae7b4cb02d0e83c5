//! REST 接口
//!
//! 路由与原有前端约定保持一致：
//! - POST /create_rule    `{"rule_string": "..."}`          -> 201 AST
//! - POST /combine_rules  `{"rule_strings": ["...", ...]}`  -> 201 AST
//! - POST /evaluate_rule  `{"ast": {...}, "user_data": {...}}` -> 200 `{"result": bool}`
//!
//! 另外提供已保存规则的查询和按 ID 评估。

use crate::error::RuleError;
use crate::service::RuleEngineService;
use crate::store::StoredRule;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rule_shared::config::CorsConfig;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

/// 接口层错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Rule(RuleError::RuleNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Rule(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "VALIDATION_ERROR",
            Self::Rule(e) => e.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!(status = %status, code = self.error_code(), error = %self, "请求失败");

        let body = json!({
            "error": self.to_string(),
            "code": self.error_code(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    #[serde(default)]
    pub rule_string: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CombineRulesRequest {
    #[serde(default)]
    pub rule_strings: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRuleRequest {
    #[serde(default)]
    pub ast: Option<Value>,
    #[serde(default)]
    pub user_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateStoredRequest {
    #[serde(default)]
    pub user_data: Option<Value>,
}

/// null、空字符串、空数组、空对象都视为缺失
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn created(id: Uuid, ast: Value) -> Response {
    let location = HeaderValue::from_str(&format!("/rules/{}", id))
        .unwrap_or_else(|_| HeaderValue::from_static("/rules"));
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(ast)).into_response()
}

/// 创建规则
///
/// POST /create_rule
pub async fn create_rule(
    State(service): State<RuleEngineService>,
    payload: Result<Json<CreateRuleRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let rule_string = req
        .rule_string
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'rule_string' in request".to_string()))?;

    info!(rule = %rule_string, "收到创建规则请求");
    let stored = service.create_rule(&rule_string)?;
    Ok(created(stored.id, stored.ast))
}

/// 合并规则
///
/// POST /combine_rules
pub async fn combine_rules(
    State(service): State<RuleEngineService>,
    payload: Result<Json<CombineRulesRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let invalid = || ApiError::BadRequest("Missing or invalid 'rule_strings' in request".to_string());

    let rule_strings = match req.rule_strings {
        Some(Value::Array(items)) if !items.is_empty() => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(invalid()),
            })
            .collect::<ApiResult<Vec<String>>>()?,
        _ => return Err(invalid()),
    };

    info!(count = rule_strings.len(), "收到合并规则请求");
    let stored = service.combine_rules(&rule_strings)?;
    Ok(created(stored.id, stored.ast))
}

/// 评估规则
///
/// POST /evaluate_rule
pub async fn evaluate_rule(
    State(service): State<RuleEngineService>,
    payload: Result<Json<EvaluateRuleRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    let (Some(ast), Some(user_data)) = (req.ast, req.user_data) else {
        return Err(ApiError::BadRequest(
            "Missing 'ast' or 'user_data' in request".to_string(),
        ));
    };
    if is_blank(&ast) || is_blank(&user_data) {
        return Err(ApiError::BadRequest(
            "Missing 'ast' or 'user_data' in request".to_string(),
        ));
    }

    let result = service.evaluate_rule(&ast, user_data)?;
    Ok(Json(json!({ "result": result })))
}

/// 对已保存的规则求值
///
/// POST /rules/{id}/evaluate
pub async fn evaluate_stored_rule(
    State(service): State<RuleEngineService>,
    Path(id): Path<Uuid>,
    payload: Result<Json<EvaluateStoredRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    let user_data = req
        .user_data
        .filter(|v| !is_blank(v))
        .ok_or_else(|| ApiError::BadRequest("Missing 'user_data' in request".to_string()))?;

    let result = service.evaluate_stored(&id, user_data)?;
    Ok(Json(json!({ "result": result })))
}

/// GET /rules
pub async fn list_rules(State(service): State<RuleEngineService>) -> Json<Value> {
    let rules = service.list_rules();
    Json(json!({ "total": rules.len(), "items": rules }))
}

/// GET /rules/{id}
pub async fn get_rule(
    State(service): State<RuleEngineService>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StoredRule>> {
    Ok(Json(service.get_rule(&id)?))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// 构建跨域层
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "忽略无效的跨域来源");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

/// 构建全部路由
pub fn router(service: RuleEngineService, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/create_rule", post(create_rule))
        .route("/combine_rules", post(combine_rules))
        .route("/evaluate_rule", post(evaluate_rule))
        .route("/rules", get(list_rules))
        .route("/rules/{id}", get(get_rule))
        .route("/rules/{id}/evaluate", post(evaluate_stored_rule))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors))
        .with_state(service)
}

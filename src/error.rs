use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// 服务统一错误类型, 按 HTTP 状态码分类
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// 请求本身不合法 (非PDF上传、空文件等) -> 400
    #[error("{0}")]
    BadInput(String),

    /// 文档分类置信度过低 -> 400
    #[error("{0}")]
    Validation(String),

    /// 资源不存在 -> 404
    #[error("{0}")]
    NotFound(String),

    /// 外部服务不可用或未配置 -> 503
    #[error("{0}")]
    Unavailable(String),

    /// 数据库错误 -> 500 (事务已回滚)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 其他内部错误 -> 500
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::BadInput(_) | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub mod handlers;

use crate::service::{DocumentExtractor, ErpNextClient};
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;

/// 共享状态: 连接池 + 两个外部客户端 (未配置时为 None)
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub extractor: Option<Arc<DocumentExtractor>>,
    pub erpnext: Option<Arc<ErpNextClient>>,
}

/// 构建路由 (单一规范管线, 不再分前后端两套入口)
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/extract", post(handlers::extract))
        .route(
            "/invoices",
            post(handlers::create_invoice).get(handlers::list_invoices),
        )
        .route(
            "/invoices/vendor/:vendor_name",
            get(handlers::invoices_by_vendor),
        )
        .route(
            "/invoices/:invoice_id",
            get(handlers::get_invoice)
                .put(handlers::update_invoice)
                .delete(handlers::delete_invoice),
        )
        .route("/invoices/:invoice_id/analyze", post(handlers::analyze_invoice))
        .with_state(state)
}

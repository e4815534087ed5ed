use invoice_extract_rust::{
    api, create_pool, init_schema, AppConfig, AppState, DocumentExtractor, ErpNextClient,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env();
    info!(
        "Starting server (database: {}, document AI configured: {}, ERPNext configured: {})",
        config.database.url,
        !config.document_ai.endpoint.is_empty(),
        config.erpnext.is_configured()
    );

    // 创建数据库连接池并建表 (无迁移机制)
    let pool = create_pool(&config.database.url).await?;
    init_schema(&pool).await?;
    info!("Database pool created, schema ready");

    // 启动时显式构造外部客户端并注入
    let extractor = DocumentExtractor::from_config(&config.document_ai).map(Arc::new);
    if extractor.is_none() {
        warn!("Document AI not configured, POST /extract will return 503");
    }
    let erpnext = ErpNextClient::from_config(&config.erpnext).map(Arc::new);
    if erpnext.is_none() {
        info!("ERPNext not configured, sync requests will be skipped");
    }

    let state = AppState {
        pool,
        extractor,
        erpnext,
    };
    let app = api::router(state);

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST   /extract                      - upload PDF, extract and persist");
    info!("  POST   /invoices                     - manual create (JSON)");
    info!("  GET    /invoices                     - list all invoices");
    info!("  GET    /invoices/:id                 - invoice with items");
    info!("  PUT    /invoices/:id                 - partial update");
    info!("  DELETE /invoices/:id                 - cascading delete");
    info!("  GET    /invoices/vendor/:name        - invoices by vendor");
    info!("  POST   /invoices/:id/analyze         - anomaly risk score");
    info!("  GET    /health                       - health check");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

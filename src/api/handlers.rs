use crate::api::AppState;
use crate::db::queries;
use crate::error::ServiceError;
use crate::models::{
    ConfidenceScores, ExtractionResult, Invoice, InvoiceItem, InvoiceUpdate, InvoiceWithItems,
    RiskReport,
};
use crate::service::risk;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;

/// 抽取接口查询参数
#[derive(Debug, Default, Deserialize)]
pub struct ExtractParams {
    #[serde(default)]
    pub sync_to_erpnext: bool,
}

/// 抽取响应: 归一化结果 + 可选的同步状态
/// 同步结果对调用方可见 (syncStatus), 不再只写日志
#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    #[serde(flatten)]
    pub result: ExtractionResult,
    #[serde(rename = "riskScore", skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<u32>,
    #[serde(rename = "syncStatus", skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<String>,
}

/// 手动创建发票的请求体 (与存储字段同名, PascalCase)
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    #[serde(flatten)]
    pub invoice: Invoice,
    #[serde(rename = "Items", default)]
    pub items: Vec<InvoiceItem>,
    #[serde(rename = "dataConfidence", default)]
    pub confidence: Option<ConfidenceScores>,
}

/// 按供应商查询的响应体
#[derive(Debug, Serialize)]
pub struct VendorInvoicesResponse {
    #[serde(rename = "VendorName")]
    pub vendor_name: String,
    #[serde(rename = "TotalInvoices")]
    pub total_invoices: usize,
    pub invoices: Vec<InvoiceWithItems>,
}

/// 健康检查
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// 上传PDF -> 抽取 -> 校验 -> 入库 -> (可选) 评分并推送 ERPNext
pub async fn extract(
    State(state): State<AppState>,
    Query(params): Query<ExtractParams>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>, ServiceError> {
    // 1. 读取上传文件, 在任何抽取调用之前做PDF检查
    let mut pdf_bytes = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ServiceError::BadInput(format!("Invalid multipart request: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type_is_pdf = field.content_type() == Some("application/pdf");
        let filename_is_pdf = field
            .file_name()
            .map(|name| name.to_lowercase().ends_with(".pdf"))
            .unwrap_or(false);
        if !(content_type_is_pdf || filename_is_pdf) {
            return Err(ServiceError::BadInput(
                "Invalid document. Please upload a valid PDF invoice with high confidence."
                    .to_string(),
            ));
        }
        let bytes = field.bytes().await.map_err(|e| {
            ServiceError::BadInput(format!("Failed to read uploaded file: {}", e))
        })?;
        pdf_bytes = Some(bytes);
        break;
    }
    let pdf_bytes = pdf_bytes
        .ok_or_else(|| ServiceError::BadInput("Missing multipart field 'file'".to_string()))?;

    // 2. 调用文档理解服务
    let extractor = state.extractor.as_ref().ok_or_else(|| {
        ServiceError::Unavailable("Document AI client not configured".to_string())
    })?;
    let result = extractor.extract(&pdf_bytes).await?;

    // 3. 入库 (单事务, 失败整体回滚)
    let invoice_id = queries::save_invoice_extraction(&state.pool, &result).await?;
    tracing::info!("Invoice {} extracted and saved", invoice_id);

    // 4. 可选: 评分 + ERPNext 同步, 失败不影响本次上传
    let mut risk_score = None;
    let mut sync_status = None;
    if params.sync_to_erpnext {
        match &state.erpnext {
            None => {
                tracing::warn!("ERPNext sync requested but ERPNext is not configured");
                sync_status = Some("skipped: ERPNext not configured".to_string());
            }
            Some(client) => match queries::get_invoice_by_id(&state.pool, &invoice_id).await {
                Ok(Some(invoice)) => {
                    let report = risk_report(&state.pool, &invoice).await;
                    risk_score = Some(report.risk_score);
                    match client.create_purchase_invoice(&invoice, Some(&report)).await {
                        Ok(name) => {
                            tracing::info!("Invoice {} created in ERPNext as {}", invoice_id, name);
                            sync_status = Some("synced".to_string());
                        }
                        Err(e) => {
                            tracing::error!("Failed to sync invoice {} to ERPNext: {}", invoice_id, e);
                            sync_status = Some(format!("failed: {}", e));
                        }
                    }
                }
                Ok(None) => {
                    sync_status = Some("failed: invoice not found after save".to_string());
                }
                Err(e) => {
                    tracing::error!("Failed to reload invoice {} for sync: {}", invoice_id, e);
                    sync_status = Some(format!("failed: {}", e));
                }
            },
        }
    }

    Ok(Json(ExtractResponse {
        result,
        risk_score,
        sync_status,
    }))
}

/// 手动创建发票 (JSON)
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceWithItems>), ServiceError> {
    if request.invoice.invoice_id.trim().is_empty() {
        return Err(ServiceError::BadInput("InvoiceId must not be empty".to_string()));
    }

    queries::create_invoice(
        &state.pool,
        &request.invoice,
        &request.items,
        request.confidence.as_ref(),
    )
    .await?;

    let invoice = queries::get_invoice_by_id(&state.pool, &request.invoice.invoice_id)
        .await?
        .ok_or_else(|| ServiceError::Internal("Invoice missing after insert".to_string()))?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// 全量列表
pub async fn list_invoices(
    State(state): State<AppState>,
) -> Result<Json<Vec<InvoiceWithItems>>, ServiceError> {
    let invoices = queries::list_invoices(&state.pool).await?;
    Ok(Json(invoices))
}

/// 按ID查询 (含明细)
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<InvoiceWithItems>, ServiceError> {
    match queries::get_invoice_by_id(&state.pool, &invoice_id).await? {
        Some(invoice) => Ok(Json(invoice)),
        None => Err(not_found(&invoice_id)),
    }
}

/// 部分更新
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(update): Json<InvoiceUpdate>,
) -> Result<Json<InvoiceWithItems>, ServiceError> {
    let found = queries::update_invoice(&state.pool, &invoice_id, &update).await?;
    if !found {
        return Err(not_found(&invoice_id));
    }
    let invoice = queries::get_invoice_by_id(&state.pool, &invoice_id)
        .await?
        .ok_or_else(|| not_found(&invoice_id))?;
    Ok(Json(invoice))
}

/// 级联删除
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let deleted = queries::delete_invoice(&state.pool, &invoice_id).await?;
    if !deleted {
        return Err(not_found(&invoice_id));
    }
    Ok(Json(json!({
        "message": format!("Invoice {} deleted successfully", invoice_id),
        "deleted": true
    })))
}

/// 按供应商查询; 无结果时返回 "Unknown Vendor" 哨兵而非 404
pub async fn invoices_by_vendor(
    State(state): State<AppState>,
    Path(vendor_name): Path<String>,
) -> Result<Json<VendorInvoicesResponse>, ServiceError> {
    let invoices = queries::get_invoices_by_vendor(&state.pool, &vendor_name).await?;
    if invoices.is_empty() {
        return Ok(Json(VendorInvoicesResponse {
            vendor_name: "Unknown Vendor".to_string(),
            total_invoices: 0,
            invoices: vec![],
        }));
    }
    Ok(Json(VendorInvoicesResponse {
        vendor_name,
        total_invoices: invoices.len(),
        invoices,
    }))
}

/// 风险评分
pub async fn analyze_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<RiskReport>, ServiceError> {
    let invoice = queries::get_invoice_by_id(&state.pool, &invoice_id)
        .await?
        .ok_or_else(|| not_found(&invoice_id))?;
    Ok(Json(risk_report(&state.pool, &invoice).await))
}

/// 同供应商同金额的重复查询失败不阻断评分, 按 0 处理
async fn risk_report(pool: &SqlitePool, invoice: &InvoiceWithItems) -> RiskReport {
    let duplicates = match (&invoice.invoice.vendor_name, invoice.invoice.invoice_total) {
        (Some(vendor), Some(total)) => {
            queries::count_vendor_total_duplicates(pool, vendor, total, &invoice.invoice.invoice_id)
                .await
                .unwrap_or(0)
        }
        _ => 0,
    };
    risk::score_invoice(invoice, duplicates)
}

fn not_found(invoice_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Invoice with ID '{}' not found", invoice_id))
}

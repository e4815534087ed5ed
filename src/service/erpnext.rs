use crate::config::ErpNextConfig;
use crate::error::ServiceError;
use crate::models::{InvoiceWithItems, RiskReport};
use serde_json::{json, Value};
use std::time::Duration;

/// ERPNext 采购发票客户端, token key:secret 认证
/// 仅在上传方显式要求时调用, 失败只记日志不影响主流程
pub struct ErpNextClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl ErpNextClient {
    pub fn from_config(config: &ErpNextConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .ok()?;
        Some(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    /// 创建 Purchase Invoice, 返回 ERPNext 侧的单据名
    pub async fn create_purchase_invoice(
        &self,
        invoice: &InvoiceWithItems,
        risk: Option<&RiskReport>,
    ) -> Result<String, ServiceError> {
        let header = &invoice.invoice;

        let items: Vec<Value> = invoice
            .items
            .iter()
            .map(|item| {
                json!({
                    "item_name": item.name,
                    "description": item.description,
                    "qty": item.quantity,
                    "rate": item.unit_price,
                    "amount": item.amount,
                })
            })
            .collect();

        let mut body = json!({
            "supplier": header.vendor_name,
            "bill_no": header.invoice_id,
            "bill_date": header.invoice_date,
            "grand_total": header.invoice_total,
            "items": items,
        });
        if let Some(report) = risk {
            body["remarks"] = json!(format!(
                "Risk score: {}/100. {}",
                report.risk_score, report.explanation
            ));
        }

        let url = format!("{}/api/resource/Purchase Invoice", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(
                "Authorization",
                format!("token {}:{}", self.api_key, self.api_secret),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(format!("ERPNext request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::Unavailable(format!(
                "ERPNext returned {}: {}",
                status, detail
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Unavailable(format!("ERPNext response invalid: {}", e)))?;
        let name = payload
            .get("data")
            .and_then(|data| data.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        Ok(name)
    }
}

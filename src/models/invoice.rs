use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 发票主表 (invoices)
/// 主键是供应商侧的发票号, 跨供应商可能冲突 (已知限制)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Invoice {
    pub invoice_id: String,
    pub vendor_name: Option<String>,
    pub invoice_date: Option<String>, // ISO-8601 字符串, 解析失败时为原始文本
    pub billing_address_recipient: Option<String>,
    pub shipping_address: Option<String>,
    pub sub_total: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub invoice_total: Option<f64>,
}

/// 发票明细行 (items 表, 不含代理主键)
/// 各字段按文档原样入库, 不做 quantity × unit_price 校验
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvoiceItem {
    pub description: Option<String>,
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub amount: Option<f64>,
}

/// 各标量字段的置信度快照 (confidences 表, 与发票一对一)
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfidenceScores {
    pub vendor_name: Option<f64>,
    pub invoice_date: Option<f64>,
    pub billing_address_recipient: Option<f64>,
    pub shipping_address: Option<f64>,
    pub sub_total: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub invoice_total: Option<f64>,
}

/// 发票及其所有明细 (composite read)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    #[serde(rename = "Items", default)]
    pub items: Vec<InvoiceItem>,
}

/// 部分更新请求: 缺省字段保持不变;
/// Items 出现时整体替换, 置信度出现时 update-or-create
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvoiceUpdate {
    pub vendor_name: Option<String>,
    pub invoice_date: Option<String>,
    pub billing_address_recipient: Option<String>,
    pub shipping_address: Option<String>,
    pub sub_total: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub invoice_total: Option<f64>,
    pub items: Option<Vec<InvoiceItem>>,
    #[serde(rename = "dataConfidence", alias = "Confidence")]
    pub confidence: Option<ConfidenceScores>,
}

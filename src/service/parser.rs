use crate::config::DocumentAiConfig;
use crate::error::ServiceError;
use crate::models::{
    AnalyzeRequest, AnalyzeResponse, DocumentFeature, DocumentField, ExtractionResult, FieldValue,
    InlineDocument,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// 文档分类置信度阈值, 低于该值整单拒绝
const MIN_DOCUMENT_CONFIDENCE: f64 = 0.9;

/// 货币类字段 (主表层)
const MONEY_FIELDS: [&str; 6] = [
    "InvoiceTotal",
    "SubTotal",
    "ShippingCost",
    "Amount",
    "UnitPrice",
    "AmountDue",
];

/// 明细行内需要清洗的数值字段
const ITEM_NUMBER_FIELDS: [&str; 3] = ["Quantity", "UnitPrice", "Amount"];

/// 发票抽取服务: base64 编码 PDF -> 外部文档理解API -> 归一化扁平结果
/// 启动时显式构造并注入, 不用全局单例
pub struct DocumentExtractor {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl DocumentExtractor {
    /// 配置不完整时返回 None, 调用方在请求期报 503
    pub fn from_config(config: &DocumentAiConfig) -> Option<Self> {
        if config.endpoint.is_empty() || config.api_key.is_empty() {
            return None;
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .ok()?;
        Some(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub async fn extract(&self, pdf_bytes: &[u8]) -> Result<ExtractionResult, ServiceError> {
        if pdf_bytes.is_empty() {
            return Err(ServiceError::BadInput(
                "Invalid document. Please upload a valid PDF invoice.".to_string(),
            ));
        }

        let request = AnalyzeRequest {
            document: InlineDocument {
                source: "INLINE",
                data: BASE64.encode(pdf_bytes),
            },
            features: vec![
                DocumentFeature::key_value_extraction(),
                DocumentFeature::document_classification(5),
            ],
        };

        let url = format!("{}/actions/analyzeDocument", self.endpoint);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Document AI request failed: {}", e);
                ServiceError::Unavailable(
                    "The service is currently unavailable. Please try again later.".to_string(),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Document AI returned {}: {}", status, body);
            return Err(ServiceError::Unavailable(
                "The service is currently unavailable. Please try again later.".to_string(),
            ));
        }

        let analyzed: AnalyzeResponse = response.json().await.map_err(|e| {
            tracing::error!("Document AI response is not valid JSON: {}", e);
            ServiceError::Unavailable(
                "The service is currently unavailable. Please try again later.".to_string(),
            )
        })?;

        normalize_response(analyzed)
    }
}

/// 把页面/字段树压平成 {confidence, data, dataConfidence}
/// 字段树是固定两层 schema (Items -> 行 -> 子字段), 不做通用递归
pub fn normalize_response(response: AnalyzeResponse) -> Result<ExtractionResult, ServiceError> {
    let mut data: Map<String, Value> = Map::new();
    let mut data_confidence: Map<String, Value> = Map::new();

    for page in &response.pages {
        for field in &page.document_fields {
            let Some(name) = field
                .field_label
                .as_ref()
                .and_then(|label| label.name.clone())
            else {
                continue;
            };
            let field_confidence = field
                .field_label
                .as_ref()
                .and_then(|label| label.confidence)
                .unwrap_or(0.0);

            if name == "Items" {
                let rows = field
                    .field_value
                    .as_ref()
                    .map(|value| flatten_items(&value.items))
                    .unwrap_or_default();
                data.insert(name, Value::Array(rows));
                // 明细不记置信度
                continue;
            }

            let raw = scalar_value(field.field_value.as_ref());
            let value = if name == "InvoiceDate" {
                format_date_value(raw)
            } else if MONEY_FIELDS.contains(&name.as_str()) {
                amount_format_value(raw)
            } else {
                raw
            };

            data.insert(name.clone(), value);
            data_confidence.insert(name, json!(field_confidence));
        }
    }

    // 文档分类校验: 任一类型置信度低于阈值则拒绝
    let mut confidence = None;
    for doc_type in &response.detected_document_types {
        if let Some(c) = doc_type.confidence {
            confidence = Some(c);
            if c < MIN_DOCUMENT_CONFIDENCE {
                return Err(ServiceError::Validation(
                    "Invalid document. Please upload a valid PDF invoice with high confidence."
                        .to_string(),
                ));
            }
        }
    }

    Ok(ExtractionResult {
        confidence,
        data,
        data_confidence,
    })
}

/// 每个行分组压成一个扁平 map
fn flatten_items(groups: &[DocumentField]) -> Vec<Value> {
    let mut rows = Vec::with_capacity(groups.len());
    for group in groups {
        let Some(group_value) = group.field_value.as_ref() else {
            continue;
        };
        let mut row: Map<String, Value> = Map::new();
        for sub in &group_value.items {
            let Some(key) = sub
                .field_label
                .as_ref()
                .and_then(|label| label.name.clone())
            else {
                continue;
            };
            let mut value = scalar_value(sub.field_value.as_ref());
            if ITEM_NUMBER_FIELDS.contains(&key.as_str()) {
                value = amount_format_value(value);
            }
            row.insert(key, value);
        }
        rows.push(Value::Object(row));
    }
    rows
}

/// 双通道取值: 优先 text, 其次类型化 value
fn scalar_value(field_value: Option<&FieldValue>) -> Value {
    let Some(fv) = field_value else {
        return Value::Null;
    };
    if let Some(text) = &fv.text {
        if !text.is_empty() {
            return Value::String(text.clone());
        }
    }
    match &fv.value {
        Some(value) if !value.is_null() => value.clone(),
        _ => Value::Null,
    }
}

/// "Mar 06 2012" -> "2012-03-06T00:00:00+00:00"
/// 解析失败原样返回 (lossy fallback, 不报错)
pub fn format_date(date_text: &str) -> String {
    let trimmed = date_text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match NaiveDate::parse_from_str(trimmed, "%b %d %Y") {
        Ok(date) => match date.and_hms_opt(0, 0, 0) {
            Some(midnight) => Utc.from_utc_datetime(&midnight).to_rfc3339(),
            None => date_text.to_string(),
        },
        Err(_) => date_text.to_string(),
    }
}

/// 去掉 $ , 和空白后解析为浮点数
/// '$58.11' -> 58.11, '4,293.55' -> 4293.55, 解析失败原样返回, 空串返回空串
pub fn amount_format(value: &str) -> Value {
    if value.is_empty() {
        return Value::String(String::new());
    }
    let cleaned = value.replace(['$', ','], "");
    match cleaned.trim().parse::<f64>() {
        Ok(number) => json!(number),
        Err(_) => Value::String(value.to_string()),
    }
}

fn format_date_value(value: Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::String(s) => Value::String(format_date(&s)),
        other => other,
    }
}

fn amount_format_value(value: Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::Number(_) => value,
        Value::String(s) => amount_format(&s),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_date_parses_vendor_format() {
        assert_eq!(format_date("Mar 06 2012"), "2012-03-06T00:00:00+00:00");
        assert_eq!(format_date(" Jan 01 2020 "), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn format_date_passes_through_unparseable() {
        assert_eq!(format_date("06/03/2012"), "06/03/2012");
        assert_eq!(format_date("not a date"), "not a date");
        assert_eq!(format_date(""), "");
    }

    #[test]
    fn amount_format_cleans_currency_strings() {
        assert_eq!(amount_format("$58.11"), json!(58.11));
        assert_eq!(amount_format("4,293.55"), json!(4293.55));
        assert_eq!(amount_format("$1,000"), json!(1000.0));
    }

    #[test]
    fn amount_format_passes_through_on_failure() {
        assert_eq!(amount_format(""), json!(""));
        assert_eq!(amount_format("N/A"), json!("N/A"));
    }

    fn sample_response(classification_confidence: f64) -> AnalyzeResponse {
        serde_json::from_value(json!({
            "pages": [
                {
                    "documentFields": [
                        {
                            "fieldLabel": { "name": "InvoiceId", "confidence": 0.98 },
                            "fieldValue": { "text": "36259" }
                        },
                        {
                            "fieldLabel": { "name": "VendorName", "confidence": 0.97 },
                            "fieldValue": { "text": "SuperStore" }
                        },
                        {
                            "fieldLabel": { "name": "InvoiceDate", "confidence": 0.95 },
                            "fieldValue": { "text": "Mar 06 2012" }
                        },
                        {
                            // 只有类型化 value, 没有 text
                            "fieldLabel": { "name": "InvoiceTotal", "confidence": 0.96 },
                            "fieldValue": { "value": "$58.11" }
                        },
                        {
                            // 无名字段: 跳过
                            "fieldValue": { "text": "stray" }
                        },
                        {
                            "fieldLabel": { "name": "Items", "confidence": 0.9 },
                            "fieldValue": {
                                "items": [
                                    {
                                        "fieldValue": {
                                            "items": [
                                                {
                                                    "fieldLabel": { "name": "Name" },
                                                    "fieldValue": {
                                                        "text": "Newell 330 Art, Office Supplies, OFF-AR-5309"
                                                    }
                                                },
                                                {
                                                    "fieldLabel": { "name": "Quantity" },
                                                    "fieldValue": { "text": "1" }
                                                },
                                                {
                                                    "fieldLabel": { "name": "Amount" },
                                                    "fieldValue": { "text": "$54.35" }
                                                }
                                            ]
                                        }
                                    }
                                ]
                            }
                        }
                    ]
                }
            ],
            "detectedDocumentTypes": [
                { "documentType": "INVOICE", "confidence": classification_confidence }
            ]
        }))
        .expect("valid analyze response")
    }

    #[test]
    fn normalize_flattens_fields_and_items() {
        let result = normalize_response(sample_response(0.95)).expect("accepted");

        assert_eq!(result.confidence, Some(0.95));
        assert_eq!(result.data["InvoiceId"], json!("36259"));
        assert_eq!(result.data["VendorName"], json!("SuperStore"));
        assert_eq!(result.data["InvoiceDate"], json!("2012-03-06T00:00:00+00:00"));
        // value 通道 + 货币清洗
        assert_eq!(result.data["InvoiceTotal"], json!(58.11));

        let items = result.data["Items"].as_array().expect("items array");
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0]["Name"],
            json!("Newell 330 Art, Office Supplies, OFF-AR-5309")
        );
        assert_eq!(items[0]["Quantity"], json!(1.0));
        assert_eq!(items[0]["Amount"], json!(54.35));

        // 标量字段有置信度, Items 没有
        assert_eq!(result.data_confidence["VendorName"], json!(0.97));
        assert!(result.data_confidence.get("Items").is_none());
    }

    #[test]
    fn normalize_rejects_low_classification_confidence() {
        let result = normalize_response(sample_response(0.42));
        match result {
            Err(ServiceError::Validation(message)) => {
                assert!(message.contains("valid PDF invoice"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|r| r.data)),
        }
    }

    #[test]
    fn normalize_accepts_empty_response() {
        let result = normalize_response(AnalyzeResponse::default()).expect("accepted");
        assert_eq!(result.confidence, None);
        assert!(result.data.is_empty());
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 归一化后的抽取结果
/// data 是扁平字段表, 其中 "Items" 为每行一个扁平子表;
/// 数值/日期归一化失败时保留原始字符串 (lossy fallback), 因此值类型用 Value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub confidence: Option<f64>,
    pub data: Map<String, Value>,
    #[serde(rename = "dataConfidence")]
    pub data_confidence: Map<String, Value>,
}

// ---------- Document AI 请求 ----------

#[derive(Debug, Serialize)]
pub struct AnalyzeRequest {
    pub document: InlineDocument,
    pub features: Vec<DocumentFeature>,
}

#[derive(Debug, Serialize)]
pub struct InlineDocument {
    pub source: &'static str, // "INLINE"
    pub data: String,         // base64 PDF
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFeature {
    pub feature_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
}

impl DocumentFeature {
    pub fn key_value_extraction() -> Self {
        Self {
            feature_type: "KEY_VALUE_EXTRACTION",
            max_results: None,
        }
    }

    pub fn document_classification(max_results: u32) -> Self {
        Self {
            feature_type: "DOCUMENT_CLASSIFICATION",
            max_results: Some(max_results),
        }
    }
}

// ---------- Document AI 响应 (固定两层字段树) ----------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeResponse {
    pub pages: Vec<DocumentPage>,
    pub detected_document_types: Vec<DetectedDocumentType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentPage {
    pub document_fields: Vec<DocumentField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentField {
    pub field_label: Option<FieldLabel>,
    pub field_value: Option<FieldValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldLabel {
    pub name: Option<String>,
    pub confidence: Option<f64>,
}

/// 字段值的双通道表示: 部分字段只有 text, 部分只有类型化 value;
/// 复合字段 (Items) 通过 items 嵌套一层子字段组
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldValue {
    pub text: Option<String>,
    pub value: Option<Value>,
    pub items: Vec<DocumentField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectedDocumentType {
    pub document_type: Option<String>,
    pub confidence: Option<f64>,
}

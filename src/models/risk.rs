use serde::{Deserialize, Serialize};

/// 异常/欺诈风险评估结果 (0-100, 越高越可疑)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub invoice_id: String,
    pub risk_score: u32,
    pub explanation: String,
}

use crate::models::{InvoiceWithItems, RiskReport};

/// 单项异常的分值上限见各检查处, 总分截断到 100
const MAX_SCORE: u32 = 100;

/// 金额比对的相对容差 (OCR 浮点结果, 不做精确相等)
const AMOUNT_TOLERANCE: f64 = 0.01;

/// 朴素的异常/欺诈评分: 若干加法启发式, 0-100 + 人读解释
/// duplicate_count 是同供应商同金额的其他发票数 (由查询层提供)
pub fn score_invoice(invoice: &InvoiceWithItems, duplicate_count: i64) -> RiskReport {
    let mut score = 0u32;
    let mut reasons: Vec<String> = Vec::new();

    let header = &invoice.invoice;

    if header
        .vendor_name
        .as_deref()
        .map(str::trim)
        .unwrap_or("")
        .is_empty()
    {
        score += 15;
        reasons.push("missing vendor name".to_string());
    }

    if header
        .invoice_date
        .as_deref()
        .map(str::trim)
        .unwrap_or("")
        .is_empty()
    {
        score += 10;
        reasons.push("missing invoice date".to_string());
    }

    match header.invoice_total {
        None => {
            score += 25;
            reasons.push("missing invoice total".to_string());
        }
        Some(total) if total <= 0.0 => {
            score += 25;
            reasons.push(format!("non-positive invoice total ({})", total));
        }
        Some(_) => {}
    }

    if invoice.items.is_empty() {
        score += 10;
        reasons.push("no line items".to_string());
    }

    // 明细合计与小计比对
    if let Some(sub_total) = header.sub_total {
        let amounts: Vec<f64> = invoice.items.iter().filter_map(|item| item.amount).collect();
        if !amounts.is_empty() {
            let item_sum: f64 = amounts.iter().sum();
            if !roughly_equal(item_sum, sub_total) {
                score += 30;
                reasons.push(format!(
                    "line item amounts sum to {:.2} but subtotal is {:.2}",
                    item_sum, sub_total
                ));
            }
        }
    }

    // 单行 quantity × unit_price 与 amount 比对
    let mismatched_rows = invoice
        .items
        .iter()
        .filter(|item| {
            match (item.quantity, item.unit_price, item.amount) {
                (Some(quantity), Some(unit_price), Some(amount)) => {
                    !roughly_equal(quantity * unit_price, amount)
                }
                _ => false,
            }
        })
        .count();
    if mismatched_rows > 0 {
        score += 15;
        reasons.push(format!(
            "{} line item(s) where amount differs from quantity x unit price",
            mismatched_rows
        ));
    }

    if duplicate_count > 0 {
        score += 20;
        reasons.push(format!(
            "{} other invoice(s) from this vendor have the same total",
            duplicate_count
        ));
    }

    let explanation = if reasons.is_empty() {
        "No anomalies detected".to_string()
    } else {
        reasons.join("; ")
    };

    RiskReport {
        invoice_id: header.invoice_id.clone(),
        risk_score: score.min(MAX_SCORE),
        explanation,
    }
}

fn roughly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= AMOUNT_TOLERANCE * f64::max(1.0, b.abs())
}

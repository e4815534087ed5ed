use crate::error::ServiceError;
use crate::models::{ConfidenceScores, ExtractionResult, Invoice, InvoiceItem, InvoiceUpdate, InvoiceWithItems};
use serde_json::{Map, Value};
use sqlx::{SqliteConnection, SqlitePool};

/// 保存一次抽取结果: 主表 + 明细 + 置信度快照, 单事务写入
/// 重复的 InvoiceId 是硬错误 (主键冲突), 不做 upsert
pub async fn save_invoice_extraction(
    pool: &SqlitePool,
    result: &ExtractionResult,
) -> Result<String, ServiceError> {
    let invoice = invoice_from_data(&result.data)?;
    let items = items_from_data(&result.data);
    let confidence = confidence_from_map(&result.data_confidence);

    let invoice_id = invoice.invoice_id.clone();
    create_invoice(pool, &invoice, &items, Some(&confidence)).await?;
    Ok(invoice_id)
}

/// 插入一张完整发票 (手动创建与抽取保存共用), 单事务
pub async fn create_invoice(
    pool: &SqlitePool,
    invoice: &Invoice,
    items: &[InvoiceItem],
    confidence: Option<&ConfidenceScores>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO invoices (invoice_id, vendor_name, invoice_date,
                              billing_address_recipient, shipping_address,
                              sub_total, shipping_cost, invoice_total)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&invoice.invoice_id)
    .bind(&invoice.vendor_name)
    .bind(&invoice.invoice_date)
    .bind(&invoice.billing_address_recipient)
    .bind(&invoice.shipping_address)
    .bind(invoice.sub_total)
    .bind(invoice.shipping_cost)
    .bind(invoice.invoice_total)
    .execute(&mut *tx)
    .await?;

    for item in items {
        insert_item(&mut *tx, &invoice.invoice_id, item).await?;
    }

    if let Some(conf) = confidence {
        insert_confidence(&mut *tx, &invoice.invoice_id, conf).await?;
    }

    // 失败时 tx 随 drop 回滚
    tx.commit().await?;
    Ok(())
}

/// 按ID查询发票及其明细 (composite read)
pub async fn get_invoice_by_id(
    pool: &SqlitePool,
    invoice_id: &str,
) -> Result<Option<InvoiceWithItems>, sqlx::Error> {
    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT invoice_id, vendor_name, invoice_date,
               billing_address_recipient, shipping_address,
               sub_total, shipping_cost, invoice_total
        FROM invoices
        WHERE invoice_id = ?1
        "#,
    )
    .bind(invoice_id)
    .fetch_optional(pool)
    .await?;

    let Some(invoice) = invoice else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT description, name, quantity, unit_price, amount
        FROM items
        WHERE invoice_id = ?1
        ORDER BY id ASC
        "#,
    )
    .bind(invoice_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(InvoiceWithItems { invoice, items }))
}

/// 查询全部发票 (按ID排序)
pub async fn list_invoices(pool: &SqlitePool) -> Result<Vec<InvoiceWithItems>, sqlx::Error> {
    let ids: Vec<(String,)> =
        sqlx::query_as("SELECT invoice_id FROM invoices ORDER BY invoice_id ASC")
            .fetch_all(pool)
            .await?;

    let mut invoices = Vec::with_capacity(ids.len());
    for (id,) in ids {
        if let Some(invoice) = get_invoice_by_id(pool, &id).await? {
            invoices.push(invoice);
        }
    }
    Ok(invoices)
}

/// 按供应商名精确匹配 (大小写敏感), 按存储的日期字符串升序
/// 注意: 日期列是文本, 排序是字典序; 非ISO格式的日期不保证时间序 (既有缺陷)
pub async fn get_invoices_by_vendor(
    pool: &SqlitePool,
    vendor_name: &str,
) -> Result<Vec<InvoiceWithItems>, sqlx::Error> {
    let ids: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT invoice_id
        FROM invoices
        WHERE vendor_name = ?1
        ORDER BY invoice_date ASC
        "#,
    )
    .bind(vendor_name)
    .fetch_all(pool)
    .await?;

    let mut invoices = Vec::with_capacity(ids.len());
    for (id,) in ids {
        if let Some(invoice) = get_invoice_by_id(pool, &id).await? {
            invoices.push(invoice);
        }
    }
    Ok(invoices)
}

/// 部分更新: 只改出现的标量字段; Items 出现时整体替换;
/// 置信度出现时 update-or-create。返回 false 表示发票不存在
pub async fn update_invoice(
    pool: &SqlitePool,
    invoice_id: &str,
    update: &InvoiceUpdate,
) -> Result<bool, sqlx::Error> {
    let exists: Option<(String,)> =
        sqlx::query_as("SELECT invoice_id FROM invoices WHERE invoice_id = ?1")
            .bind(invoice_id)
            .fetch_optional(pool)
            .await?;
    if exists.is_none() {
        return Ok(false);
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE invoices
        SET vendor_name               = COALESCE(?1, vendor_name),
            invoice_date              = COALESCE(?2, invoice_date),
            billing_address_recipient = COALESCE(?3, billing_address_recipient),
            shipping_address          = COALESCE(?4, shipping_address),
            sub_total                 = COALESCE(?5, sub_total),
            shipping_cost             = COALESCE(?6, shipping_cost),
            invoice_total             = COALESCE(?7, invoice_total)
        WHERE invoice_id = ?8
        "#,
    )
    .bind(&update.vendor_name)
    .bind(&update.invoice_date)
    .bind(&update.billing_address_recipient)
    .bind(&update.shipping_address)
    .bind(update.sub_total)
    .bind(update.shipping_cost)
    .bind(update.invoice_total)
    .bind(invoice_id)
    .execute(&mut *tx)
    .await?;

    if let Some(items) = &update.items {
        // 整体替换, 不做合并/比对
        sqlx::query("DELETE FROM items WHERE invoice_id = ?1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        for item in items {
            insert_item(&mut *tx, invoice_id, item).await?;
        }
    }

    if let Some(conf) = &update.confidence {
        upsert_confidence(&mut *tx, invoice_id, conf).await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// 级联硬删除: 明细 + 置信度 + 主表。返回 false 表示发票不存在
pub async fn delete_invoice(pool: &SqlitePool, invoice_id: &str) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM items WHERE invoice_id = ?1")
        .bind(invoice_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM confidences WHERE invoice_id = ?1")
        .bind(invoice_id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = ?1")
        .bind(invoice_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// 查询发票的置信度快照
pub async fn get_confidence(
    pool: &SqlitePool,
    invoice_id: &str,
) -> Result<Option<ConfidenceScores>, sqlx::Error> {
    sqlx::query_as::<_, ConfidenceScores>(
        r#"
        SELECT vendor_name, invoice_date, billing_address_recipient,
               shipping_address, sub_total, shipping_cost, invoice_total
        FROM confidences
        WHERE invoice_id = ?1
        "#,
    )
    .bind(invoice_id)
    .fetch_optional(pool)
    .await
}

/// 同一供应商下金额完全相同的其他发票数量 (风险评分用)
pub async fn count_vendor_total_duplicates(
    pool: &SqlitePool,
    vendor_name: &str,
    invoice_total: f64,
    exclude_invoice_id: &str,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        SELECT count(*)
        FROM invoices
        WHERE vendor_name = ?1
          AND invoice_total = ?2
          AND invoice_id <> ?3
        "#,
    )
    .bind(vendor_name)
    .bind(invoice_total)
    .bind(exclude_invoice_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

async fn insert_item(
    tx: &mut SqliteConnection,
    invoice_id: &str,
    item: &InvoiceItem,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO items (invoice_id, description, name, quantity, unit_price, amount)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(invoice_id)
    .bind(&item.description)
    .bind(&item.name)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.amount)
    .execute(&mut *tx)
    .await?;
    Ok(())
}

async fn insert_confidence(
    tx: &mut SqliteConnection,
    invoice_id: &str,
    conf: &ConfidenceScores,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO confidences (invoice_id, vendor_name, invoice_date,
                                 billing_address_recipient, shipping_address,
                                 sub_total, shipping_cost, invoice_total)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(invoice_id)
    .bind(conf.vendor_name)
    .bind(conf.invoice_date)
    .bind(conf.billing_address_recipient)
    .bind(conf.shipping_address)
    .bind(conf.sub_total)
    .bind(conf.shipping_cost)
    .bind(conf.invoice_total)
    .execute(&mut *tx)
    .await?;
    Ok(())
}

async fn upsert_confidence(
    tx: &mut SqliteConnection,
    invoice_id: &str,
    conf: &ConfidenceScores,
) -> Result<(), sqlx::Error> {
    let exists: Option<(String,)> =
        sqlx::query_as("SELECT invoice_id FROM confidences WHERE invoice_id = ?1")
            .bind(invoice_id)
            .fetch_optional(&mut *tx)
            .await?;

    if exists.is_some() {
        sqlx::query(
            r#"
            UPDATE confidences
            SET vendor_name               = COALESCE(?1, vendor_name),
                invoice_date              = COALESCE(?2, invoice_date),
                billing_address_recipient = COALESCE(?3, billing_address_recipient),
                shipping_address          = COALESCE(?4, shipping_address),
                sub_total                 = COALESCE(?5, sub_total),
                shipping_cost             = COALESCE(?6, shipping_cost),
                invoice_total             = COALESCE(?7, invoice_total)
            WHERE invoice_id = ?8
            "#,
        )
        .bind(conf.vendor_name)
        .bind(conf.invoice_date)
        .bind(conf.billing_address_recipient)
        .bind(conf.shipping_address)
        .bind(conf.sub_total)
        .bind(conf.shipping_cost)
        .bind(conf.invoice_total)
        .bind(invoice_id)
        .execute(&mut *tx)
        .await?;
    } else {
        insert_confidence(tx, invoice_id, conf).await?;
    }
    Ok(())
}

// ---------- 抽取结果 -> 记录映射 ----------

/// 从扁平字段表组装主表记录 (忽略嵌套的 Items)
fn invoice_from_data(data: &Map<String, Value>) -> Result<Invoice, ServiceError> {
    let invoice_id = data_string(data, "InvoiceId")
        .ok_or_else(|| ServiceError::Internal("Extraction result has no InvoiceId".to_string()))?;

    Ok(Invoice {
        invoice_id,
        vendor_name: data_string(data, "VendorName"),
        invoice_date: data_string(data, "InvoiceDate"),
        billing_address_recipient: data_string(data, "BillingAddressRecipient"),
        shipping_address: data_string(data, "ShippingAddress"),
        sub_total: data_number(data, "SubTotal"),
        shipping_cost: data_number(data, "ShippingCost"),
        invoice_total: data_number(data, "InvoiceTotal"),
    })
}

fn items_from_data(data: &Map<String, Value>) -> Vec<InvoiceItem> {
    let Some(Value::Array(entries)) = data.get("Items") else {
        return Vec::new();
    };
    entries.iter().map(item_from_value).collect()
}

fn item_from_value(value: &Value) -> InvoiceItem {
    InvoiceItem {
        description: value
            .get("Description")
            .and_then(Value::as_str)
            .map(str::to_string),
        name: value.get("Name").and_then(Value::as_str).map(str::to_string),
        quantity: value.get("Quantity").and_then(Value::as_f64),
        unit_price: value.get("UnitPrice").and_then(Value::as_f64),
        amount: value.get("Amount").and_then(Value::as_f64),
    }
}

fn confidence_from_map(map: &Map<String, Value>) -> ConfidenceScores {
    serde_json::from_value(Value::Object(map.clone())).unwrap_or_default()
}

/// 字段值可能是字符串或数值 (归一化是 lossy 的)
fn data_string(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn data_number(data: &Map<String, Value>, key: &str) -> Option<f64> {
    data.get(key).and_then(Value::as_f64)
}

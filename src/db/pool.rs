use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

/// 创建数据库连接池
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let mut connect_options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // 设置慢查询日志阈值为 5秒
    connect_options = connect_options.log_slow_statements(
        tracing::log::LevelFilter::Warn,
        Duration::from_secs(5),
    );

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
}

/// 启动时建表 (无迁移机制, 三张表: 主表/明细/置信度)
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            invoice_id                TEXT PRIMARY KEY NOT NULL,
            vendor_name               TEXT,
            invoice_date              TEXT,
            billing_address_recipient TEXT,
            shipping_address          TEXT,
            sub_total                 REAL,
            shipping_cost             REAL,
            invoice_total             REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            invoice_id  TEXT REFERENCES invoices(invoice_id),
            description TEXT,
            name        TEXT,
            quantity    REAL,
            unit_price  REAL,
            amount      REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS confidences (
            invoice_id                TEXT PRIMARY KEY NOT NULL
                                      REFERENCES invoices(invoice_id),
            vendor_name               REAL,
            invoice_date              REAL,
            billing_address_recipient REAL,
            shipping_address          REAL,
            sub_total                 REAL,
            shipping_cost             REAL,
            invoice_total             REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use invoice_extract_rust::{api, init_schema, AppState};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

const BOUNDARY: &str = "test-boundary";

/// 内存库 + 未配置外部客户端的最小状态
async fn test_state() -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    init_schema(&pool).await.expect("create schema");
    AppState {
        pool,
        extractor: None,
        erpnext: None,
    }
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = api::router(state.clone())
        .oneshot(request)
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn multipart_upload(filename: &str, content_type: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/extract")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn sample_invoice(id: &str, vendor: &str, date: &str) -> Value {
    json!({
        "InvoiceId": id,
        "VendorName": vendor,
        "InvoiceDate": date,
        "BillingAddressRecipient": "Aaron Bergman",
        "ShippingAddress": "98103, Seattle, Washington, United States",
        "SubTotal": 54.35,
        "ShippingCost": 3.76,
        "InvoiceTotal": 58.11,
        "Items": [
            {
                "Description": "Newell 330",
                "Name": "Newell 330 Art, Office Supplies, OFF-AR-5309",
                "Quantity": 1.0,
                "UnitPrice": 54.35,
                "Amount": 54.35
            }
        ],
        "dataConfidence": { "VendorName": 0.97, "InvoiceTotal": 0.96 }
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let state = test_state().await;
    let (status, body) = send(
        &state,
        Request::get("/health").body(Body::empty()).expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn non_pdf_upload_is_rejected_before_extraction() {
    let state = test_state().await;
    // 未配置抽取服务: 若PDF检查不先行, 会得到 503 而不是 400
    let (status, body) =
        send(&state, multipart_upload("note.txt", "text/plain", b"hello")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .expect("detail message")
        .contains("valid PDF invoice"));
}

#[tokio::test]
async fn pdf_upload_without_extractor_returns_503() {
    let state = test_state().await;
    let (status, _) = send(
        &state,
        multipart_upload("invoice.pdf", "application/pdf", b"%PDF-1.4"),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unknown_invoice_returns_404_with_message() {
    let state = test_state().await;
    let (status, body) = send(
        &state,
        Request::get("/invoices/9999")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"]
        .as_str()
        .expect("detail message")
        .contains("not found"));
}

#[tokio::test]
async fn create_then_fetch_roundtrip() {
    let state = test_state().await;

    let (status, created) = send(
        &state,
        json_request(
            "POST",
            "/invoices",
            sample_invoice("36259", "SuperStore", "2012-03-06T00:00:00+00:00"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["InvoiceId"], "36259");

    let (status, body) = send(
        &state,
        Request::get("/invoices/36259")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["InvoiceId"], "36259");
    assert_eq!(body["VendorName"], "SuperStore");
    assert_eq!(body["InvoiceTotal"], 58.11);
    let items = body["Items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0]["Name"],
        "Newell 330 Art, Office Supplies, OFF-AR-5309"
    );
}

#[tokio::test]
async fn vendor_lookup_orders_by_date_and_uses_sentinel_when_empty() {
    let state = test_state().await;
    for (id, date) in [
        ("B-2", "2013-01-15T00:00:00+00:00"),
        ("A-1", "2011-07-02T00:00:00+00:00"),
    ] {
        let (status, _) = send(
            &state,
            json_request("POST", "/invoices", sample_invoice(id, "SuperStore", date)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = send(
        &state,
        json_request(
            "POST",
            "/invoices",
            sample_invoice("C-3", "OtherStore", "2010-01-01T00:00:00+00:00"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &state,
        Request::get("/invoices/vendor/SuperStore")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["VendorName"], "SuperStore");
    assert_eq!(body["TotalInvoices"], 2);
    let invoices = body["invoices"].as_array().expect("invoices");
    assert_eq!(invoices[0]["InvoiceId"], "A-1");
    assert_eq!(invoices[1]["InvoiceId"], "B-2");

    // 无结果: 哨兵响应, 不是 404
    let (status, body) = send(
        &state,
        Request::get("/invoices/vendor/Nobody")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["VendorName"], "Unknown Vendor");
    assert_eq!(body["TotalInvoices"], 0);
}

#[tokio::test]
async fn update_replaces_items() {
    let state = test_state().await;
    send(
        &state,
        json_request(
            "POST",
            "/invoices",
            sample_invoice("36259", "SuperStore", "2012-03-06T00:00:00+00:00"),
        ),
    )
    .await;

    let (status, body) = send(
        &state,
        json_request(
            "PUT",
            "/invoices/36259",
            json!({
                "VendorName": "SuperStore East",
                "Items": [
                    { "Name": "Staple remover", "Quantity": 2.0, "UnitPrice": 3.0, "Amount": 6.0 }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["VendorName"], "SuperStore East");
    // 未提交的标量保持不变
    assert_eq!(body["InvoiceTotal"], 58.11);
    let items = body["Items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["Name"], "Staple remover");

    let (status, _) = send(
        &state,
        json_request("PUT", "/invoices/9999", json!({ "VendorName": "X" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_then_fetch_returns_404() {
    let state = test_state().await;
    send(
        &state,
        json_request(
            "POST",
            "/invoices",
            sample_invoice("36259", "SuperStore", "2012-03-06T00:00:00+00:00"),
        ),
    )
    .await;

    let (status, body) = send(
        &state,
        Request::delete("/invoices/36259")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = send(
        &state,
        Request::get("/invoices/36259")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &state,
        Request::delete("/invoices/36259")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analyze_scores_stored_invoice() {
    let state = test_state().await;
    send(
        &state,
        json_request(
            "POST",
            "/invoices",
            sample_invoice("36259", "SuperStore", "2012-03-06T00:00:00+00:00"),
        ),
    )
    .await;

    let (status, body) = send(
        &state,
        Request::post("/invoices/36259/analyze")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invoice_id"], "36259");
    assert_eq!(body["risk_score"], 0);
    assert_eq!(body["explanation"], "No anomalies detected");

    let (status, _) = send(
        &state,
        Request::post("/invoices/9999/analyze")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

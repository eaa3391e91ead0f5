//! Assertion helpers for tests.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use super::app::TestResponse;

/// Assert response has expected status code
pub fn assert_status(response: &TestResponse, expected: StatusCode) {
    assert_eq!(
        response.status,
        expected,
        "Expected status {}, got {}. Body: {}",
        expected,
        response.status,
        response.text()
    );
}

/// Assert response is OK (200)
pub fn assert_ok(response: &TestResponse) {
    assert_status(response, StatusCode::OK);
}

/// Assert response is a generated PNG attachment
pub fn assert_png(response: &TestResponse) {
    assert_ok(response);
    assert!(
        response.is_png(),
        "Expected PNG image, got {} bytes starting with {:?}",
        response.body.len(),
        &response.body[..8.min(response.body.len())]
    );

    assert_eq!(
        response.header("content-type"),
        Some("image/png"),
        "Expected Content-Type: image/png"
    );
    assert_eq!(
        response.header("content-disposition"),
        Some("attachment; filename=\"generated.png\""),
        "Expected attachment disposition"
    );
}

/// Assert response is a render failure and return its details message
pub fn assert_generate_failed(response: &TestResponse) -> String {
    assert_status(response, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = response.json();

    assert_eq!(json["error"], "generate failed");
    assert!(
        json["elapsed_ms"].is_u64(),
        "Expected elapsed_ms, got {}",
        serde_json::to_string_pretty(&json).unwrap()
    );
    json["details"]
        .as_str()
        .expect("Expected details string")
        .to_string()
}

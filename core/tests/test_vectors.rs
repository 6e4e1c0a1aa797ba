//! Verify response validation and multipart summaries against JSON test
//! vectors stored in `test-vectors/`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use apiclient_core::response::validate;
use apiclient_core::{ApiError, Endpoint, HttpResponse, MultipartPayload};

struct Probe;

impl Endpoint for Probe {
    fn url(&self) -> String {
        "http://localhost:3000/probe".to_string()
    }

    fn identity(&self) -> String {
        "probe".to_string()
    }

    fn auth_headers(&self) -> Option<HashMap<String, String>> {
        Some(HashMap::new())
    }
}

fn headers_of(value: &serde_json::Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let pair = h.as_array().unwrap();
            (
                pair[0].as_str().unwrap().to_string(),
                pair[1].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Status validation
// ---------------------------------------------------------------------------

#[test]
fn status_test_vectors() {
    let raw = include_str!("../../test-vectors/status.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let response = HttpResponse {
            status: case["status"].as_u64().unwrap() as u16,
            headers: headers_of(&case["headers"]),
            body: Vec::new(),
        };
        let expected = &case["expected"];

        let calls = AtomicUsize::new(0);
        let handler = |_: &dyn Endpoint| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let result = validate(response.clone(), &Probe, Some(&handler));

        match expected["kind"].as_str().unwrap() {
            "ok" => {
                assert_eq!(result.unwrap(), response, "{name}: response passes through");
            }
            "server_error" => match result {
                Err(ApiError::ServerError {
                    status_code,
                    request_id,
                    ..
                }) => {
                    assert_eq!(
                        u64::from(status_code),
                        expected["status_code"].as_u64().unwrap(),
                        "{name}: status"
                    );
                    assert_eq!(request_id, expected["request_id"].as_str().unwrap(), "{name}: request id");
                    assert_eq!(
                        calls.load(Ordering::SeqCst) as u64,
                        expected["unauthorized_calls"].as_u64().unwrap(),
                        "{name}: unauthorized handler calls"
                    );
                }
                other => panic!("{name}: expected ServerError, got {other:?}"),
            },
            "invalid_response" => {
                assert!(
                    matches!(result, Err(ApiError::InvalidResponse(_))),
                    "{name}: expected InvalidResponse"
                );
            }
            other => panic!("unknown expected kind: {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Multipart summaries
// ---------------------------------------------------------------------------

#[test]
fn multipart_summary_test_vectors() {
    let raw = include_str!("../../test-vectors/multipart_summary.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let parameters: Option<HashMap<String, String>> =
            serde_json::from_value(case["parameters"].clone()).unwrap();
        let file_locations: Option<Vec<PathBuf>> =
            serde_json::from_value(case["file_locations"].clone()).unwrap();

        let payload = MultipartPayload {
            parameters,
            file_field_name: case["file_field_name"].as_str().unwrap().to_string(),
            file_locations,
        };

        assert_eq!(
            payload.string_value(),
            case["expected"].as_str().unwrap(),
            "{name}: summary"
        );
    }
}

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;

use serde_json::{Value, json};
use tempfile::TempDir;

pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Write one test-case file in the corpus format.
pub fn write_case(dir: &Path, id: &str, query: &str, gt: &str, codes: &[&str]) {
    std::fs::create_dir_all(dir).expect("Failed to create corpus dir");
    let case = json!({
        "protocol_id": id,
        "query": query,
        "gt": gt,
        "icd_codes": codes,
    });
    std::fs::write(dir.join(format!("{id}.json")), case.to_string()).expect("Failed to write case");
}

/// A `/diagnose` response body ranking `codes` in order.
pub fn diagnose_body(codes: &[&str]) -> String {
    let diagnoses: Vec<Value> = codes
        .iter()
        .enumerate()
        .map(|(i, code)| {
            json!({
                "rank": i + 1,
                "diagnosis": format!("diagnosis {code}"),
                "icd10_code": code,
                "explanation": format!("because of {code}"),
            })
        })
        .collect();
    json!({ "diagnoses": diagnoses }).to_string()
}

/// A chat-completions response carrying `content`.
pub fn completion_body(content: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
    })
    .to_string()
}

pub fn health_body(loaded: bool) -> String {
    json!({
        "status": "ok",
        "rag": {"loaded": loaded, "total_vectors": 1200},
        "prompts": {"version": 3, "file": "prompts.json"}
    })
    .to_string()
}

use std::collections::BTreeMap;

use serde::Deserialize;

/// Raw shape of a smoke.yml document. Everything is optional here; the
/// Validator decides what is actually required and reports where it is
/// missing.
#[derive(Deserialize, Debug, Clone)]
pub struct RawSuite {
    pub base_url: Option<String>,
    pub timeout: Option<f64>,
    pub tests: Option<Vec<RawTest>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RawTest {
    pub name: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub expect_status: Option<u16>,
    pub expect_body: Option<serde_json::Value>,
    pub expect_body_schema: Option<BTreeMap<String, String>>,
    pub headers: Option<BTreeMap<String, String>>,
    pub body: Option<serde_json::Value>,
    pub timeout: Option<f64>,
}

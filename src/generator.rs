use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::validator::SmokeConfig;

const FALLBACK_ID: &str = "test";

/// One self-contained, independently executable test descriptor. This is
/// pure data: the runner interprets it, so no user-supplied value is ever
/// spliced into source text.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedTest {
    pub id: String,
    pub name: String,
    pub method: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    pub timeout_secs: f64,
    pub checks: Vec<Check>,
}

/// Checks run in the order they appear: status always first, so a body is
/// never interpreted before the status line has been verified.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
    Status { expected: u16 },
    BodyEquals { expected: serde_json::Value },
    BodySchema { schema: BTreeMap<String, String> },
}

/// Produces one descriptor per test case, in declaration order.
pub fn generate(config: &SmokeConfig) -> Vec<GeneratedTest> {
    let mut assigned: BTreeSet<String> = BTreeSet::new();

    config
        .tests
        .iter()
        .map(|test| {
            let base = format!("test_{}", sanitize_name(&test.name));

            // Distinct names can sanitize to the same identifier; later
            // occurrences get a sequence suffix so nothing is merged. The
            // suffix bumps past ids another name already claimed outright
            // (a literal "get users 2" takes test_get_users_2 for itself).
            let id = if assigned.insert(base.clone()) {
                base
            } else {
                let mut n = 2;
                loop {
                    let candidate = format!("{base}_{n}");
                    if assigned.insert(candidate.clone()) {
                        break candidate;
                    }
                    n += 1;
                }
            };

            let mut checks = vec![Check::Status {
                expected: test.expect_status,
            }];
            if let Some(expected) = &test.expect_body {
                checks.push(Check::BodyEquals {
                    expected: expected.clone(),
                });
            }
            if let Some(schema) = &test.expect_body_schema {
                checks.push(Check::BodySchema {
                    schema: schema.clone(),
                });
            }

            GeneratedTest {
                id,
                name: test.name.clone(),
                method: test.method.to_string(),
                target: format!("{}{}", config.base_url, test.path),
                headers: test.headers.clone(),
                body: test.body.clone(),
                timeout_secs: test.timeout,
                checks,
            }
        })
        .collect()
}

/// Lower-cases the name and collapses every run of characters that would
/// not be valid in an identifier into a single underscore.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut gap = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if gap && !out.is_empty() {
                out.push('_');
            }
            gap = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            gap = true;
        }
    }

    if out.is_empty() {
        FALLBACK_ID.to_string()
    } else {
        out
    }
}

/// Serialized form of the descriptor sequence. Byte-identical across runs
/// for an unchanged config.
pub fn render_plan(tests: &[GeneratedTest]) -> Result<String, serde_json::Error> {
    let mut plan = serde_json::to_string_pretty(tests)?;
    plan.push('\n');
    Ok(plan)
}

#[cfg(test)]
mod test {
    use reqwest::Method;

    use super::Check;
    use super::generate;
    use super::render_plan;
    use super::sanitize_name;
    use crate::validator::SmokeConfig;
    use crate::validator::TestCase;

    fn case(name: &str) -> TestCase {
        TestCase {
            name: name.into(),
            path: "/users".into(),
            method: Method::GET,
            expect_status: 200,
            expect_body: None,
            expect_body_schema: None,
            headers: None,
            body: None,
            timeout: 30.0,
        }
    }

    fn config(tests: Vec<TestCase>) -> SmokeConfig {
        SmokeConfig {
            base_url: "http://localhost:8080".into(),
            default_timeout: 30.0,
            tests,
        }
    }

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize_name("Get All Users!!"), "get_all_users");
        assert_eq!(sanitize_name("  GET /users/1  "), "get_users_1");
        assert_eq!(sanitize_name("already_fine"), "already_fine");
        assert_eq!(sanitize_name("a__b"), "a_b");
    }

    #[test]
    fn sanitize_falls_back_when_nothing_survives() {
        assert_eq!(sanitize_name("***"), "test");
        assert_eq!(sanitize_name(""), "test");
    }

    #[test]
    fn one_descriptor_per_case_in_declaration_order() {
        let generated = generate(&config(vec![case("B test"), case("A test")]));
        assert_eq!(generated.len(), 2);
        assert_eq!(generated[0].id, "test_b_test");
        assert_eq!(generated[1].id, "test_a_test");
    }

    #[test]
    fn colliding_ids_get_sequence_suffixes() {
        let generated = generate(&config(vec![
            case("Get Users!"),
            case("Get Users?"),
            case("Get Users."),
        ]));
        assert_eq!(generated[0].id, "test_get_users");
        assert_eq!(generated[1].id, "test_get_users_2");
        assert_eq!(generated[2].id, "test_get_users_3");
    }

    #[test]
    fn suffix_skips_ids_claimed_by_other_names() {
        // "Get Users 2" owns test_get_users_2 outright, so the collision
        // suffix for "Get Users!" has to bump past it.
        let generated = generate(&config(vec![
            case("Get Users"),
            case("Get Users 2"),
            case("Get Users!"),
        ]));
        assert_eq!(generated[0].id, "test_get_users");
        assert_eq!(generated[1].id, "test_get_users_2");
        assert_eq!(generated[2].id, "test_get_users_3");

        let mut ids: Vec<&String> = generated.iter().map(|t| &t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), generated.len());
    }

    #[test]
    fn suffix_skips_ids_claimed_in_either_order() {
        // Same pre-emption with the literal name declared first.
        let generated = generate(&config(vec![
            case("Get Users 2"),
            case("Get Users"),
            case("Get Users!"),
        ]));
        assert_eq!(generated[0].id, "test_get_users_2");
        assert_eq!(generated[1].id, "test_get_users");
        assert_eq!(generated[2].id, "test_get_users_3");
    }

    #[test]
    fn target_is_verbatim_concatenation() {
        let generated = generate(&config(vec![case("x")]));
        assert_eq!(generated[0].target, "http://localhost:8080/users");
    }

    #[test]
    fn status_check_comes_first_then_body_then_schema() {
        let mut tc = case("x");
        tc.expect_status = 201;
        tc.expect_body = Some(serde_json::json!({ "ok": true }));
        tc.expect_body_schema = Some(
            [("ok".to_string(), "bool".to_string())].into_iter().collect(),
        );

        let generated = generate(&config(vec![tc]));
        let checks = &generated[0].checks;
        assert_eq!(checks.len(), 3);
        assert!(matches!(checks[0], Check::Status { expected: 201 }));
        assert!(matches!(checks[1], Check::BodyEquals { .. }));
        assert!(matches!(checks[2], Check::BodySchema { .. }));
    }

    #[test]
    fn absent_headers_and_body_are_omitted_from_the_plan() {
        let generated = generate(&config(vec![case("x")]));
        let plan = render_plan(&generated).unwrap();
        assert!(!plan.contains("\"headers\""));
        assert!(!plan.contains("\"body\""));
    }

    #[test]
    fn plan_is_byte_identical_across_runs() {
        let mut tc = case("x");
        tc.headers = Some(
            [("x-token".to_string(), "abc".to_string())].into_iter().collect(),
        );
        tc.body = Some(serde_json::json!({ "name": "alice" }));
        let cfg = config(vec![tc, case("y")]);

        let first = render_plan(&generate(&cfg)).unwrap();
        let second = render_plan(&generate(&cfg)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn timeout_is_propagated_per_test() {
        let mut tc = case("x");
        tc.timeout = 2.5;
        let generated = generate(&config(vec![tc]));
        assert_eq!(generated[0].timeout_secs, 2.5);
    }
}

use std::collections::BTreeMap;
use std::str::FromStr;

use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use thiserror::Error;

use crate::parser::RawSuite;
use crate::parser::RawTest;

const DEFAULT_TIMEOUT: f64 = 30.0;
const DEFAULT_STATUS: u16 = 200;

pub struct Validator {
    raw: RawSuite,
    yaml_src: String,
    file_name: String,
}

/// One declared HTTP expectation, fully validated. Immutable once built.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub path: String,
    pub method: Method,
    pub expect_status: u16,
    pub expect_body: Option<serde_json::Value>,
    pub expect_body_schema: Option<BTreeMap<String, String>>,
    pub headers: Option<BTreeMap<String, String>>,
    pub body: Option<serde_json::Value>,
    pub timeout: f64,
}

#[derive(Debug, Clone)]
pub struct SmokeConfig {
    pub base_url: String,
    pub default_timeout: f64,
    pub tests: Vec<TestCase>,
}

#[derive(Debug, Error, Diagnostic)]
#[error("Invalid field `{field}`: {message}")]
pub struct ValidationError {
    field: String,
    message: String,
    #[source_code]
    src: Option<NamedSource<String>>,
    #[label("invalid value here")]
    span: Option<SourceSpan>,
}

macro_rules! validation_err {
    ($field:expr, $msg:expr, $self:expr, $snippet:expr) => {
        ValidationError {
            field: $field.to_string(),
            message: $msg.to_string(),
            src: Some(NamedSource::new(
                $self.file_name.clone(),
                $self.yaml_src.clone(),
            )),
            span: find_span($snippet, &$self.yaml_src),
        }
    };
}

impl Validator {
    pub fn new(raw: &RawSuite, yaml_src: &str, file_name: &str) -> Self {
        Self {
            raw: raw.clone(),
            yaml_src: yaml_src.into(),
            file_name: file_name.into(),
        }
    }

    pub fn validate(&self) -> Result<SmokeConfig, ValidationError> {
        let base_url = self.validate_base_url()?;
        let default_timeout = self.validate_timeout(&self.raw.timeout, "timeout")?;

        let Some(raw_tests) = self.raw.tests.as_ref().filter(|t| !t.is_empty()) else {
            return Err(validation_err!(
                "tests",
                "Missing or empty `tests` field",
                self,
                "tests"
            ));
        };

        let tests = raw_tests
            .iter()
            .enumerate()
            .map(|(i, test)| self.validate_test(test, i, default_timeout))
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(SmokeConfig {
            base_url,
            default_timeout,
            tests,
        })
    }

    fn validate_base_url(&self) -> Result<String, ValidationError> {
        let Some(base_url) = &self.raw.base_url else {
            return Err(validation_err!(
                "base_url",
                "Missing required field: base_url",
                self,
                "base_url"
            ));
        };

        Ok(base_url.trim_end_matches('/').to_string())
    }

    fn validate_timeout(
        &self,
        timeout: &Option<f64>,
        field: &str,
    ) -> Result<f64, ValidationError> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        if !(timeout > 0.0) {
            return Err(validation_err!(
                field,
                format!("Timeout must be a positive number, got {timeout}"),
                self,
                "timeout"
            ));
        }
        Ok(timeout)
    }

    fn validate_test(
        &self,
        test: &RawTest,
        index: usize,
        default_timeout: f64,
    ) -> Result<TestCase, ValidationError> {
        // Position is 1-based so the error lines up with how people count
        // entries in the YAML file.
        let position = index + 1;

        let Some(name) = &test.name else {
            return Err(validation_err!(
                format!("tests[{index}].name"),
                format!("Test #{position}: missing `name`"),
                self,
                "tests"
            ));
        };

        let Some(path) = &test.path else {
            return Err(validation_err!(
                format!("tests[{index}].path"),
                format!("Test '{name}': missing `path`"),
                self,
                name
            ));
        };

        let Some(raw_method) = &test.method else {
            return Err(validation_err!(
                format!("tests[{index}].method"),
                format!("Test '{name}': missing `method`"),
                self,
                name
            ));
        };

        let method = parse_method(&raw_method.to_uppercase()).map_err(|e| {
            validation_err!(format!("tests[{index}].method"), format!("Test '{name}': {e}"), self, raw_method)
        })?;

        let expect_status = test.expect_status.unwrap_or(DEFAULT_STATUS);
        if StatusCode::from_u16(expect_status).is_err() {
            return Err(validation_err!(
                format!("tests[{index}].expect_status"),
                format!("Test '{name}': invalid status code {expect_status}"),
                self,
                name
            ));
        }

        if let Some(headers) = &test.headers {
            for (key, value) in headers {
                self.validate_header(name, key, value)?;
            }
        }

        let timeout = match test.timeout {
            Some(t) if t > 0.0 => t,
            Some(t) => {
                return Err(validation_err!(
                    format!("tests[{index}].timeout"),
                    format!("Test '{name}': timeout must be a positive number, got {t}"),
                    self,
                    name
                ));
            }
            None => default_timeout,
        };

        Ok(TestCase {
            name: name.clone(),
            path: path.clone(),
            method,
            expect_status,
            expect_body: test.expect_body.clone(),
            expect_body_schema: test.expect_body_schema.clone(),
            headers: test.headers.clone(),
            body: test.body.clone(),
            timeout,
        })
    }

    fn validate_header(
        &self,
        test_name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ValidationError> {
        HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            validation_err!(
                format!("{test_name} - headers"),
                format!("Invalid header name `{key}`: {e}"),
                self,
                key
            )
        })?;

        HeaderValue::from_str(value).map_err(|e| {
            validation_err!(
                format!("{test_name} - headers"),
                format!("Invalid header value for `{key}`: {e}"),
                self,
                value
            )
        })?;

        Ok(())
    }
}

fn parse_method(method: &str) -> Result<Method, String> {
    let method = Method::from_str(method).map_err(|e| e.to_string())?;

    if !matches!(
        method,
        Method::GET
            | Method::POST
            | Method::PUT
            | Method::PATCH
            | Method::DELETE
            | Method::HEAD
            | Method::OPTIONS
    ) {
        return Err(format!("invalid method '{}'", method));
    }

    Ok(method)
}

fn find_span(needle: &str, yaml_src: &str) -> Option<SourceSpan> {
    yaml_src
        .find(needle)
        .map(|start| SourceSpan::new(start.into(), needle.len()))
}

#[cfg(test)]
mod test {
    use reqwest::Method;

    use crate::parser::RawSuite;
    use crate::validator::Validator;

    fn validate(yaml: &str) -> Result<super::SmokeConfig, super::ValidationError> {
        let raw: RawSuite = serde_yaml::from_str(yaml).unwrap();
        Validator::new(&raw, yaml, "smoke.yml").validate()
    }

    #[test]
    fn valid_config_loads_in_order() {
        let config = validate(
            r#"
base_url: http://localhost:8080
tests:
  - name: Health
    path: /health
    method: get
  - name: Create User
    path: /users
    method: POST
    expect_status: 201
    body:
      name: alice
"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.tests.len(), 2);
        assert_eq!(config.tests[0].name, "Health");
        assert_eq!(config.tests[0].method, Method::GET);
        assert_eq!(config.tests[0].expect_status, 200);
        assert_eq!(config.tests[1].method, Method::POST);
        assert_eq!(config.tests[1].expect_status, 201);
    }

    #[test]
    fn missing_base_url_is_named() {
        let err = validate("tests:\n  - name: A\n    path: /a\n    method: GET\n").unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn missing_tests_field() {
        let err = validate("base_url: http://x\n").unwrap_err();
        assert!(err.to_string().contains("tests"));
    }

    #[test]
    fn empty_tests_field() {
        let err = validate("base_url: http://x\ntests: []\n").unwrap_err();
        assert!(err.to_string().contains("tests"));
    }

    #[test]
    fn missing_method_names_the_test() {
        let err = validate(
            "base_url: http://x\ntests:\n  - name: Ping\n    path: /ping\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Ping"));
        assert!(err.to_string().contains("method"));
    }

    #[test]
    fn missing_name_reports_position() {
        let err = validate(
            "base_url: http://x\ntests:\n  - path: /ping\n    method: GET\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("#1"));
    }

    #[test]
    fn rejects_unknown_method() {
        let err = validate(
            "base_url: http://x\ntests:\n  - name: Bad\n    path: /\n    method: YEET\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Bad"));
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        let config = validate(
            "base_url: http://x//\ntests:\n  - name: A\n    path: /a\n    method: GET\n",
        )
        .unwrap();
        assert_eq!(config.base_url, "http://x");
    }

    #[test]
    fn timeout_falls_back_to_suite_default() {
        let config = validate(
            r#"
base_url: http://x
timeout: 5.0
tests:
  - name: A
    path: /a
    method: GET
  - name: B
    path: /b
    method: GET
    timeout: 1.5
"#,
        )
        .unwrap();
        assert_eq!(config.default_timeout, 5.0);
        assert_eq!(config.tests[0].timeout, 5.0);
        assert_eq!(config.tests[1].timeout, 1.5);
    }

    #[test]
    fn rejects_non_positive_timeout() {
        let err = validate(
            "base_url: http://x\ntests:\n  - name: A\n    path: /a\n    method: GET\n    timeout: 0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn rejects_invalid_header_name() {
        let err = validate(
            r#"
base_url: http://x
tests:
  - name: A
    path: /a
    method: GET
    headers:
      "bad header": value
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("header"));
    }
}

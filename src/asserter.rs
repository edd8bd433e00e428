use core::fmt;
use std::fmt::Display;
use std::sync::Arc;

use flume::Receiver;
use flume::SendError;
use flume::Sender;
use reqwest::StatusCode;
use serde_json::Value;

use crate::differ;
use crate::differ::DiffReport;
use crate::generator::Check;
use crate::runner::CapturedResponse;
use crate::runner::RequestFailure;
use crate::runner::RunnerResult;
use crate::schema;

const PREVIEW_LEN: usize = 200;

pub struct Asserter {}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TestResult {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Request,
    Status,
    Decode,
    BodyEquals,
    BodySchema,
}

#[derive(Debug, Clone)]
pub enum CheckFailure {
    Timeout {
        seconds: f64,
    },
    Transport {
        message: String,
    },
    Status {
        expected: u16,
        actual: StatusCode,
        body_preview: String,
    },
    Decode {
        message: String,
        body_preview: String,
    },
    BodyDiff {
        expected: Value,
        actual: Value,
        report: DiffReport,
    },
    Schema {
        errors: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct AssertResult {
    pub status: TestResult,
    pub check: CheckKind,
    pub failure: Option<CheckFailure>,
}

impl AssertResult {
    fn pass(check: CheckKind) -> Self {
        Self {
            status: TestResult::Pass,
            check,
            failure: None,
        }
    }

    fn fail(check: CheckKind, failure: CheckFailure) -> Self {
        Self {
            status: TestResult::Fail,
            check,
            failure: Some(failure),
        }
    }
}

pub trait Assert {
    fn assert(&self) -> Arc<[AssertResult]>;
}

impl Assert for RunnerResult {
    /// Evaluates the descriptor's checks in order and stops at the first
    /// failure, so a failing test reports exactly one error. The body is
    /// decoded lazily: a status mismatch never triggers a decode.
    fn assert(&self) -> Arc<[AssertResult]> {
        let response = match &self.outcome {
            Ok(response) => response,
            Err(failure) => {
                let failure = match failure {
                    RequestFailure::Timeout { seconds } => CheckFailure::Timeout {
                        seconds: *seconds,
                    },
                    RequestFailure::Transport { message } => CheckFailure::Transport {
                        message: message.clone(),
                    },
                };
                return Arc::from(vec![AssertResult::fail(CheckKind::Request, failure)]);
            }
        };

        let mut results = Vec::with_capacity(self.test.checks.len());
        let mut decoded: Option<Value> = None;

        for check in &self.test.checks {
            match check {
                Check::Status { expected } => {
                    if response.status.as_u16() == *expected {
                        results.push(AssertResult::pass(CheckKind::Status));
                    } else {
                        results.push(AssertResult::fail(
                            CheckKind::Status,
                            CheckFailure::Status {
                                expected: *expected,
                                actual: response.status,
                                body_preview: preview(&response.body_text),
                            },
                        ));
                        break;
                    }
                }

                Check::BodyEquals { expected } => {
                    let actual = match decode_body(&mut decoded, response) {
                        Ok(actual) => actual,
                        Err(result) => {
                            results.push(result);
                            break;
                        }
                    };

                    match differ::assert_equivalent(expected, actual) {
                        Ok(()) => results.push(AssertResult::pass(CheckKind::BodyEquals)),
                        Err(mismatch) => {
                            results.push(AssertResult::fail(
                                CheckKind::BodyEquals,
                                CheckFailure::BodyDiff {
                                    expected: expected.clone(),
                                    actual: actual.clone(),
                                    report: mismatch.report,
                                },
                            ));
                            break;
                        }
                    }
                }

                Check::BodySchema { schema } => {
                    let actual = match decode_body(&mut decoded, response) {
                        Ok(actual) => actual,
                        Err(result) => {
                            results.push(result);
                            break;
                        }
                    };

                    match schema::assert_valid(actual, schema) {
                        Ok(()) => results.push(AssertResult::pass(CheckKind::BodySchema)),
                        Err(mismatch) => {
                            results.push(AssertResult::fail(
                                CheckKind::BodySchema,
                                CheckFailure::Schema {
                                    errors: mismatch.errors,
                                },
                            ));
                            break;
                        }
                    }
                }
            }
        }

        Arc::from(results)
    }
}

impl Asserter {
    pub async fn run(
        rx: Receiver<RunnerResult>,
        output_tx: Sender<(String, Arc<[AssertResult]>)>,
    ) -> Result<(), SendError<(String, Arc<[AssertResult]>)>> {
        while let Ok(msg) = rx.recv_async().await {
            let assert_result = msg.assert();
            output_tx
                .send_async((msg.test.name.clone(), assert_result))
                .await?;
        }

        Ok(())
    }
}

fn decode_body<'a>(
    cache: &'a mut Option<Value>,
    response: &CapturedResponse,
) -> Result<&'a Value, AssertResult> {
    match cache {
        Some(value) => Ok(value),
        None => match serde_json::from_str(&response.body_text) {
            Ok(value) => Ok(cache.insert(value)),
            Err(err) => Err(AssertResult::fail(
                CheckKind::Decode,
                CheckFailure::Decode {
                    message: err.to_string(),
                    body_preview: preview(&response.body_text),
                },
            )),
        },
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_LEN).collect()
}

impl Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Request => write!(f, "Request"),
            CheckKind::Status => write!(f, "Status test"),
            CheckKind::Decode => write!(f, "Body decode"),
            CheckKind::BodyEquals => write!(f, "Body test"),
            CheckKind::BodySchema => write!(f, "Schema test"),
        }
    }
}

impl Display for AssertResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            None => {
                write!(
                    f,
                    "{} {} {}",
                    console::style("✔").green().bold(),
                    console::style("PASS!").green().bold(),
                    self.check
                )
            }

            Some(CheckFailure::Timeout { seconds }) => {
                write!(
                    f,
                    "{} {}\n  {}",
                    console::style("✘").red().bold(),
                    console::style("FAIL!").red().bold(),
                    console::style(format!("Request timed out after {seconds}s")).red(),
                )
            }

            Some(CheckFailure::Transport { message }) => {
                write!(
                    f,
                    "{} {}\n  {}",
                    console::style("✘").red().bold(),
                    console::style("FAIL!").red().bold(),
                    console::style(format!("Request failed: {message}")).red(),
                )
            }

            Some(CheckFailure::Status {
                expected,
                actual,
                body_preview,
            }) => {
                write!(
                    f,
                    "{} {}\n  Expected: {}\n  Actual:   {}\n  Body:     {}",
                    console::style("✘").red().bold(),
                    console::style("FAIL!").red().bold(),
                    console::style(format!("Expected status {}", expected)).green(),
                    console::style(format!("Got status {}", actual)).red(),
                    console::style(body_preview).dim(),
                )
            }

            Some(CheckFailure::Decode {
                message,
                body_preview,
            }) => {
                write!(
                    f,
                    "{} {}\n  {}\n  Body:     {}",
                    console::style("✘").red().bold(),
                    console::style("FAIL!").red().bold(),
                    console::style(format!("Failed to decode response body: {message}")).red(),
                    console::style(body_preview).dim(),
                )
            }

            Some(CheckFailure::BodyDiff {
                expected,
                actual,
                report,
            }) => {
                writeln!(
                    f,
                    "{} {}",
                    console::style("✘").red().bold(),
                    console::style("FAIL!").red().bold(),
                )?;
                print_field_rows(f, expected, actual)?;
                write!(f, "{report}")
            }

            Some(CheckFailure::Schema { errors }) => {
                writeln!(
                    f,
                    "{} {}",
                    console::style("✘").red().bold(),
                    console::style("FAIL!").red().bold(),
                )?;
                writeln!(f, "  {}", console::style("Schema violations:").red().bold())?;
                for error in errors {
                    writeln!(f, "    {}", console::style(error).red())?;
                }
                Ok(())
            }
        }
    }
}

/// Side-by-side field listing for top-level mappings, one row per key with
/// its expected value, actual value, and what happened to it. Non-mapping
/// bodies skip the table; the diff report below carries the mismatch.
fn print_field_rows(f: &mut fmt::Formatter<'_>, expected: &Value, actual: &Value) -> fmt::Result {
    let (Value::Object(exp), Value::Object(act)) = (expected, actual) else {
        return Ok(());
    };

    writeln!(f, "  {}", console::style("Expected vs Actual:").cyan().bold())?;

    let mut keys: Vec<&String> = exp.keys().chain(act.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        let row = match (exp.get(key), act.get(key)) {
            (None, Some(act_val)) => format!(
                "{key}: [missing] | {act_val} {}",
                console::style("+ added").green()
            ),
            (Some(exp_val), None) => format!(
                "{key}: {exp_val} | [missing] {}",
                console::style("- removed").red()
            ),
            (Some(exp_val), Some(act_val)) if exp_val != act_val => format!(
                "{key}: {} | {} {}",
                console::style(exp_val).green(),
                console::style(act_val).red(),
                console::style("~ changed").yellow()
            ),
            (Some(exp_val), Some(_)) => {
                format!("{key}: {exp_val} {}", console::style("✓").dim())
            }
            (None, None) => continue,
        };
        writeln!(f, "    {row}")?;
    }

    Ok(())
}

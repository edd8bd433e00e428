use std::str::FromStr;
use std::time::Duration;

use flume::SendError;
use flume::Sender;
use reqwest::Client;
use reqwest::Method;
use reqwest::Response;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::generator::GeneratedTest;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("channel error")]
    ChannelError(#[from] SendError<RunnerResult>),
}

/// A request that never produced a usable response. Timeouts are kept
/// apart from other transport failures so the operator can tell a slow
/// service from an unreachable one.
#[derive(Debug, Clone)]
pub enum RequestFailure {
    Timeout { seconds: f64 },
    Transport { message: String },
}

#[derive(Debug)]
pub struct RunnerResult {
    pub test: GeneratedTest,
    pub outcome: Result<CapturedResponse, RequestFailure>,
}

/// Status and raw body text, captured before any assertion runs. The body
/// is decoded as JSON later, and only once the status check has passed.
#[derive(Debug)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub body_text: String,
}

impl CapturedResponse {
    async fn from_response(resp: Response) -> Result<Self, reqwest::Error> {
        let status = resp.status();
        let body_text = resp.text().await?;

        Ok(Self { status, body_text })
    }
}

/// Executes the descriptors in declaration order, streaming one result per
/// test to the asserter. Tests share nothing beyond the client, so any
/// future reordering or parallelism needs no coordination here.
pub async fn run_generated_tests(
    tests: Vec<GeneratedTest>,
    tx: Sender<RunnerResult>,
) -> Result<(), RunnerError> {
    let client = Client::new();

    for test in tests {
        let outcome = execute(&client, &test).await;
        tx.send_async(RunnerResult { test, outcome }).await?;
    }

    Ok(())
}

async fn execute(
    client: &Client,
    test: &GeneratedTest,
) -> Result<CapturedResponse, RequestFailure> {
    let method = Method::from_str(&test.method).map_err(|e| RequestFailure::Transport {
        message: format!("invalid method `{}`: {e}", test.method),
    })?;

    let url = Url::parse(&test.target).map_err(|e| RequestFailure::Transport {
        message: format!("invalid url `{}`: {e}", test.target),
    })?;

    let mut request = client
        .request(method, url)
        .timeout(Duration::from_secs_f64(test.timeout_secs));

    if let Some(headers) = &test.headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }

    if let Some(body) = &test.body {
        request = request.json(body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| classify(e, test.timeout_secs))?;

    CapturedResponse::from_response(response)
        .await
        .map_err(|e| classify(e, test.timeout_secs))
}

fn classify(error: reqwest::Error, timeout_secs: f64) -> RequestFailure {
    if error.is_timeout() {
        RequestFailure::Timeout {
            seconds: timeout_secs,
        }
    } else {
        RequestFailure::Transport {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::generator::GeneratedTest;
    use crate::runner::RequestFailure;
    use crate::runner::run_generated_tests;

    fn unreachable_test() -> GeneratedTest {
        GeneratedTest {
            id: "test_unreachable".into(),
            name: "Unreachable".into(),
            method: "GET".into(),
            target: "not a url".into(),
            headers: None,
            body: None,
            timeout_secs: 1.0,
            checks: vec![],
        }
    }

    #[tokio::test]
    async fn bad_target_is_a_transport_failure() {
        let (tx, rx) = flume::unbounded();

        run_generated_tests(vec![unreachable_test()], tx)
            .await
            .unwrap();

        let result = rx.recv_async().await.unwrap();
        match result.outcome {
            Err(RequestFailure::Transport { message }) => {
                assert!(message.contains("invalid url"));
            }
            other => panic!("expected transport failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn results_arrive_in_declaration_order() {
        let (tx, rx) = flume::unbounded();

        let mut second = unreachable_test();
        second.id = "test_second".into();

        run_generated_tests(vec![unreachable_test(), second], tx)
            .await
            .unwrap();

        assert_eq!(rx.recv_async().await.unwrap().test.id, "test_unreachable");
        assert_eq!(rx.recv_async().await.unwrap().test.id, "test_second");
    }
}

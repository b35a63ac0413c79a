use std::thread;
use std::time::Duration;

use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub attempts: usize,
    pub retry_delay: Duration,
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

/// GETs `url` as text, retrying transport failures and retryable statuses.
pub fn get_json_text_with_retries(
    url: &str,
    query: &[(String, String)],
    policy: RetryPolicy,
) -> Result<String, String> {
    let attempts = policy.attempts.max(1);
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(policy.connect_timeout)
        .timeout_read(policy.read_timeout)
        .timeout_write(policy.read_timeout)
        .build();

    for attempt in 1..=attempts {
        let mut request = agent.get(url).set("Accept", "application/json");
        for (key, value) in query {
            request = request.query(key, value);
        }
        debug!("GET {url} (attempt {attempt}/{attempts})");

        match request.call() {
            Ok(response) => match response.into_string() {
                Ok(body) => return Ok(body),
                Err(err) => {
                    return Err(format!("request failed: response decode failed: {err}"));
                }
            },
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                let body = response_body.trim();
                let status_error = if body.is_empty() {
                    format!("HTTP status {status}")
                } else {
                    let truncated = body.chars().take(240).collect::<String>();
                    format!("HTTP status {status} ({truncated})")
                };

                if should_retry_http_status(status) && attempt < attempts {
                    warn!("GET {url}: {status_error}, retrying");
                    thread::sleep(policy.retry_delay);
                    continue;
                }

                if should_retry_http_status(status) {
                    return Err(format!(
                        "request failed after {attempts} attempt(s): {status_error}"
                    ));
                }

                return Err(format!("request failed: {status_error}"));
            }
            Err(ureq::Error::Transport(err)) => {
                let transport_error = format!("transport error: {err}");
                if attempt < attempts {
                    warn!("GET {url}: {transport_error}, retrying");
                    thread::sleep(policy.retry_delay);
                    continue;
                }
                return Err(format!(
                    "request failed after {attempts} attempt(s): {transport_error}"
                ));
            }
        }
    }

    Err("request failed: exhausted attempts without a concrete error".to_string())
}


#[cfg(test)]
mod tests {
    use super::test_server::{Behavior, TestServer};
    use super::*;

    fn policy(connect_ms: u64, read_ms: u64, attempts: usize) -> RetryPolicy {
        RetryPolicy {
            connect_timeout: Duration::from_millis(connect_ms),
            read_timeout: Duration::from_millis(read_ms),
            attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn retries_retryable_statuses_until_success() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(500, "server-error".to_string()),
            Behavior::Respond(429, "throttled".to_string()),
            Behavior::Respond(200, "ok".to_string()),
        ]);

        let result = get_json_text_with_retries(&server.base_url, &[], policy(200, 200, 3));

        assert_eq!(result.expect("should eventually succeed"), "ok");
        assert_eq!(server.request_count(), 3);
    }

    #[test]
    fn does_not_retry_hard_client_errors() {
        let server = TestServer::spawn(vec![Behavior::Respond(404, "not-found".to_string())]);

        let result = get_json_text_with_retries(&server.base_url, &[], policy(200, 200, 5));

        let err = result.expect_err("404 should not be retried");
        assert!(
            err.contains("HTTP status 404") && err.contains("not-found"),
            "unexpected error message: {err}"
        );
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn retries_transport_timeout_and_recovers() {
        let server = TestServer::spawn(vec![
            Behavior::DelayRespond(Duration::from_millis(120), 200, "slow".to_string()),
            Behavior::Respond(200, "ok".to_string()),
        ]);

        let result = get_json_text_with_retries(&server.base_url, &[], policy(250, 20, 2));

        assert_eq!(result.expect("timeout should be retried"), "ok");
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn returns_retry_exhausted_error_for_retryable_status() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(503, "down".to_string()),
            Behavior::Respond(503, "still-down".to_string()),
        ]);

        let result = get_json_text_with_retries(&server.base_url, &[], policy(200, 200, 2));

        let err = result.expect_err("retryable failures should eventually error");
        assert!(
            err.contains("after 2 attempt(s)") && err.contains("HTTP status 503"),
            "unexpected error message: {err}"
        );
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn sends_query_parameters() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, "[]".to_string())]);
        let url = format!("{}/episodes", server.base_url);
        let query = vec![
            ("_limit".to_string(), "2".to_string()),
            ("_order".to_string(), "desc".to_string()),
        ];

        let result = get_json_text_with_retries(&url, &query, policy(200, 200, 1));

        assert_eq!(result.expect("request should succeed"), "[]");
        let lines = server.request_lines();
        assert_eq!(lines.len(), 1);
        assert!(
            lines[0].starts_with("GET /episodes?_limit=2&_order=desc "),
            "unexpected request line: {}",
            lines[0]
        );
    }
}

//! Client side of the configuration self-test.
//!
//! [`DiagnosticsPanel::trigger`] calls the relay's self-test endpoint once and
//! keeps whatever JSON comes back as the last result. Transport failures are
//! turned into a local failure object so there is always something to show.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};

pub const SELF_TEST_PATH: &str = "/api/test-bedrock";

#[derive(Clone)]
pub struct DiagnosticsPanel {
    base_url: String,
    client: Client,
    last_result: Option<Value>,
    loading: Arc<AtomicBool>,
}

struct LoadingGuard(Arc<AtomicBool>);

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DiagnosticsPanel {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            last_result: None,
            loading: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs the self-test and stores the result, success or not. No retries.
    pub async fn trigger(&mut self) -> &Value {
        self.loading.store(true, Ordering::SeqCst);
        let _guard = LoadingGuard(self.loading.clone());
        let result = match self.fetch().await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("configuration self-test request failed: {err:#}");
                json!({
                    "success": false,
                    "error": "Failed to test configuration",
                    "details": err.to_string(),
                })
            }
        };
        self.last_result.insert(result)
    }

    async fn fetch(&self) -> anyhow::Result<Value> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), SELF_TEST_PATH);
        let resp = self.client.get(&url).send().await?;
        let value = resp.json::<Value>().await?;
        Ok(value)
    }

    /// True while a trigger is in flight. Clones of a panel share this flag.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn last_result(&self) -> Option<&Value> {
        self.last_result.as_ref()
    }

    pub fn last_succeeded(&self) -> bool {
        self.last_result.as_ref().is_some_and(result_succeeded)
    }

    /// Status line followed by the pretty-printed result. `None` until the
    /// first trigger.
    pub fn render(&self) -> Option<String> {
        let result = self.last_result.as_ref()?;
        let status = if result_succeeded(result) {
            "Success"
        } else {
            "Failed"
        };
        let body = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
        Some(format!("[{status}]\n{body}"))
    }
}

pub fn result_succeeded(result: &Value) -> bool {
    result
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn stores_endpoint_json_verbatim() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SELF_TEST_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "foo": 1})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut panel = DiagnosticsPanel::new(mock_server.uri());
        let result = panel.trigger().await.clone();

        assert_eq!(result, json!({"success": true, "foo": 1}));
        assert_eq!(panel.last_result(), Some(&json!({"success": true, "foo": 1})));
        assert!(panel.last_succeeded());
    }

    #[tokio::test]
    async fn keeps_failure_bodies_regardless_of_status() {
        let mock_server = MockServer::start().await;
        let body = json!({"success": false, "message": "AWS credentials are required"});
        Mock::given(method("GET"))
            .and(path(SELF_TEST_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_json(body.clone()))
            .mount(&mock_server)
            .await;

        let mut panel = DiagnosticsPanel::new(format!("{}/", mock_server.uri()));
        assert_eq!(panel.trigger().await, &body);
        assert!(!panel.last_succeeded());
    }

    #[tokio::test]
    async fn network_failure_becomes_local_failure_result() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let mut panel = DiagnosticsPanel::new(format!("http://{addr}"));
        let result = panel.trigger().await.clone();

        assert_eq!(result["success"], false);
        assert_eq!(result["error"], "Failed to test configuration");
        assert!(result["details"].as_str().is_some_and(|d| !d.is_empty()));
    }

    #[tokio::test]
    async fn non_json_body_becomes_local_failure_result() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SELF_TEST_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&mock_server)
            .await;

        let mut panel = DiagnosticsPanel::new(mock_server.uri());
        let result = panel.trigger().await.clone();
        assert_eq!(result["success"], false);
        assert_eq!(result["error"], "Failed to test configuration");
    }

    #[tokio::test]
    async fn loading_flag_tracks_in_flight_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SELF_TEST_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true}))
                    .set_delay(std::time::Duration::from_millis(300)),
            )
            .mount(&mock_server)
            .await;

        let mut panel = DiagnosticsPanel::new(mock_server.uri());
        let observer = panel.clone();
        assert!(!observer.is_loading());

        let handle = tokio::spawn(async move {
            panel.trigger().await;
            panel
        });
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(observer.is_loading());

        let panel = handle.await.expect("join");
        assert!(!panel.is_loading());
        assert!(!observer.is_loading());
        assert!(panel.last_succeeded());
    }

    #[test]
    fn render_is_empty_before_first_trigger() {
        let panel = DiagnosticsPanel::new("http://127.0.0.1:1");
        assert!(panel.render().is_none());
        assert!(!panel.last_succeeded());
    }

    #[tokio::test]
    async fn render_shows_status_and_pretty_json() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SELF_TEST_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&mock_server)
            .await;

        let mut panel = DiagnosticsPanel::new(mock_server.uri());
        panel.trigger().await;
        let rendered = panel.render().expect("rendered");
        assert!(rendered.starts_with("[Success]\n"));
        assert!(rendered.contains("\"success\": true"));
    }
}

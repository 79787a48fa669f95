use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{ConnectionConfig, FetchError, Location, TemperatureReading, TemperatureUnit};

use super::ForecastService;

/// Talks to a forecast service over HTTP:
/// `GET http://{host}:{port}/forecast?location=<id>` answering
/// `{"temperature": 21.5, "unit": "celsius"}`.
#[derive(Debug, Clone)]
pub struct HttpForecastService {
    http: Client,
}

impl HttpForecastService {
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder.build().context("Failed to build HTTP client for forecast service")?;
        Ok(Self { http })
    }
}

#[derive(Debug, Deserialize)]
struct ForecastBody {
    temperature: f64,
    unit: TemperatureUnit,
}

#[async_trait]
impl ForecastService for HttpForecastService {
    async fn fetch(
        &self,
        config: &ConnectionConfig,
        location: &Location,
    ) -> Result<TemperatureReading, FetchError> {
        let url = format!("{}/forecast", config.base_url());
        debug!(%url, %location, "requesting forecast");

        let res = self
            .http
            .get(&url)
            .query(&[("location", location.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::failed(format!("request to {url} timed out"))
                } else {
                    FetchError::failed(format!("request to {url} failed: {e}"))
                }
            })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| FetchError::failed(format!("failed to read forecast response: {e}")))?;

        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::UnknownLocation(location.to_string()));
        }

        if !status.is_success() {
            return Err(FetchError::failed(format!(
                "forecast request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let parsed: ForecastBody = serde_json::from_str(&body).map_err(|e| {
            FetchError::failed(format!(
                "failed to parse forecast JSON ({e}): {}",
                truncate_body(&body)
            ))
        })?;

        Ok(TemperatureReading::new(parsed.temperature, parsed.unit))
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    /// Accepts one connection, answers it with `status_line` and `body`, and
    /// yields the raw request head it received.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (ConnectionConfig, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }

            let response = format!(
                "{status_line}\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;

            String::from_utf8_lossy(&request).into_owned()
        });

        (ConnectionConfig::new("127.0.0.1", port).unwrap(), handle)
    }

    fn service() -> HttpForecastService {
        HttpForecastService::new(Some(Duration::from_secs(5))).unwrap()
    }

    #[tokio::test]
    async fn decodes_a_successful_reading() {
        let (config, server) =
            serve_once("HTTP/1.1 200 OK", r#"{"temperature": 59.0, "unit": "fahrenheit"}"#).await;

        let reading = service().fetch(&config, &Location::new("London")).await.unwrap();
        assert_eq!(reading, TemperatureReading::fahrenheit(59.0));

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /forecast?location=London "), "got: {request}");
    }

    #[tokio::test]
    async fn not_found_means_unknown_location() {
        let (config, _server) = serve_once("HTTP/1.1 404 Not Found", "{}").await;

        let err = service().fetch(&config, &Location::new("Atlantis")).await.unwrap_err();
        assert_eq!(err, FetchError::UnknownLocation("Atlantis".into()));
    }

    #[tokio::test]
    async fn server_error_reports_status_and_body() {
        let (config, _server) =
            serve_once("HTTP/1.1 503 Service Unavailable", "down for maintenance").await;

        let err = service().fetch(&config, &Location::new("Cadiz")).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("503"), "got: {msg}");
        assert!(msg.contains("down for maintenance"), "got: {msg}");
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn malformed_body_is_a_fetch_error() {
        let (config, _server) = serve_once("HTTP/1.1 200 OK", r#"{"temp": "hot"}"#).await;

        let err = service().fetch(&config, &Location::new("Cadiz")).await.unwrap_err();
        assert!(err.to_string().contains("failed to parse forecast JSON"));
    }

    #[tokio::test]
    async fn refused_connection_is_a_fetch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ConnectionConfig::new("127.0.0.1", port).unwrap();
        let err = service().fetch(&config, &Location::new("Cadiz")).await.unwrap_err();
        assert!(err.to_string().contains("failed"), "got: {err}");
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let service = HttpForecastService::new(Some(Duration::from_millis(100))).unwrap();
        let config = ConnectionConfig::new("127.0.0.1", port).unwrap();

        let err = service.fetch(&config, &Location::new("Cadiz")).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "got: {err}");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(150);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 203);
    }
}

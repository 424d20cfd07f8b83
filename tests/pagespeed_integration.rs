//! Integration tests for the PageSpeed Insights client.

mod support;

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use upstream_core::http::RetryPolicy;
use upstream_core::{ClientError, FailureType, PageSpeedClient, Strategy, classify_error};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::start_mock_server_or_skip;

const ENDPOINT: &str = "/pagespeedonline/v5/runPagespeed";

fn client(server: &MockServer, api_key: Option<&str>) -> PageSpeedClient {
    let mut builder = PageSpeedClient::builder()
        .base_url(format!("{}{ENDPOINT}", server.uri()))
        .retry_policy(
            RetryPolicy::exponential()
                .with_max_attempts(2)
                .with_base_delay(Duration::from_millis(10)),
        );
    if let Some(key) = api_key {
        builder = builder.api_key(key);
    }
    builder.build().expect("client should build")
}

#[tokio::test]
async fn test_run_sends_query_and_flattens_report() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("url", "https://example.com/"))
        .and(query_param("strategy", "DESKTOP"))
        .and(query_param("category", "performance"))
        .and(query_param("category", "best-practices"))
        .and(query_param("key", "psi-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "https://example.com/",
            "loadingExperience": {"metrics": {}},
            "lighthouseResult": {
                "finalUrl": "https://example.com/home",
                "lighthouseVersion": "12.2.1",
                "categories": {
                    "performance": {"score": 0.72},
                    "accessibility": {"score": 0.98},
                    "best-practices": {"score": 1.0},
                    "seo": {"score": null}
                },
                "audits": {
                    "largest-contentful-paint": {"numericValue": 2450.5},
                    "total-blocking-time": {"numericValue": 130.0}
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let report = client(&server, Some("psi-key"))
        .run(&CancellationToken::new(), "https://example.com/", Strategy::Desktop)
        .await
        .expect("report decodes");

    assert_eq!(report.url, "https://example.com/");
    assert_eq!(report.final_url.as_deref(), Some("https://example.com/home"));
    assert_eq!(report.strategy, Strategy::Desktop);
    assert_eq!(report.scores.performance, Some(72));
    assert_eq!(report.scores.accessibility, Some(98));
    assert_eq!(report.scores.best_practices, Some(100));
    assert_eq!(report.scores.seo, None);
    assert_eq!(report.lab.largest_contentful_paint_ms, Some(2450.5));
    assert_eq!(report.lab.speed_index_ms, None);
    assert!(report.field.is_none(), "empty field metrics are dropped");
}

#[tokio::test]
async fn test_lighthouse_runtime_error_is_rejected() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lighthouseResult": {
                "runtimeError": {
                    "code": "FAILED_DOCUMENT_REQUEST",
                    "message": "Lighthouse was unable to reliably load the page."
                },
                "categories": {"performance": {"score": null}}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let error = client(&server, None)
        .run(&CancellationToken::new(), "https://broken.example/", Strategy::Mobile)
        .await
        .expect_err("runtime error surfaces");

    assert_eq!(
        error.to_string(),
        "pagespeed: request rejected: FAILED_DOCUMENT_REQUEST: \
         Lighthouse was unable to reliably load the page."
    );
    assert_eq!(classify_error(&error), FailureType::Permanent);
}

#[tokio::test]
async fn test_missing_lighthouse_result_is_empty() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "https://example.com/"})))
        .mount(&server)
        .await;

    let error = client(&server, None)
        .run(&CancellationToken::new(), "https://example.com/", Strategy::Mobile)
        .await
        .expect_err("no lighthouse result");
    assert!(matches!(error, ClientError::EmptyResult { .. }), "got: {error:?}");
}

#[tokio::test]
async fn test_quota_error_is_not_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let error = client(&server, Some("bad"))
        .run(&CancellationToken::new(), "https://example.com/", Strategy::Mobile)
        .await
        .expect_err("400 is final");
    assert_eq!(error.status(), Some(400));
    assert!(error.to_string().contains("API key not valid."));
}

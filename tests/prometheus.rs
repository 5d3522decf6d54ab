#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use alertbridge::config::HttpSettings;
use alertbridge::http::HttpClient;
use alertbridge::prometheus::RulesClient;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> RulesClient {
    let http = HttpClient::new(&HttpSettings {
        timeout: Duration::from_secs(2),
        max_attempts: 2,
        backoff_unit: Duration::from_millis(10),
        verify_tls: true,
    })
    .expect("http client");
    RulesClient::new(http, Url::parse(&server.uri()).expect("prometheus url"))
}

#[tokio::test]
async fn rules_are_flattened_across_groups() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "groups": [
                    {
                        "name": "node",
                        "rules": [
                            {"name": "HighCpu", "query": "cpu > 0.9", "duration": 300, "type": "alerting"},
                            {"name": "DiskFull", "query": "disk > 0.95", "duration": "5m"}
                        ]
                    },
                    {"name": "empty", "rules": []},
                    {"name": "net", "rules": [{"name": "LinkDown", "query": "up == 0"}]}
                ]
            }
        })))
        .mount(&server)
        .await;

    let rules = client(&server).rules().await.expect("rules");
    let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["HighCpu", "DiskFull", "LinkDown"]);
    assert_eq!(rules[0].duration, "300");
    assert_eq!(rules[1].duration, "5m");
    assert_eq!(rules[2].duration, "");

    let first = client(&server).first_rule().await.expect("first rule");
    assert_eq!(first.map(|r| r.query), Some("cpu > 0.9".to_string()));
}

#[tokio::test]
async fn unexpected_shape_is_a_json_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .mount(&server)
        .await;

    let err = client(&server).rules().await.expect_err("missing data");
    assert!(matches!(
        err,
        alertbridge::error::Error::Http(alertbridge::error::HttpError::Json { .. })
    ));
}

#[tokio::test]
async fn no_groups_means_no_first_rule() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"groups": []}})))
        .mount(&server)
        .await;

    assert!(client(&server).first_rule().await.expect("rules").is_none());
}

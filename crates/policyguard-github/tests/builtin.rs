use policyguard_domain::{Builtin, BuiltinRegistry};
use policyguard_github::{GitHubRequest, HttpClient};
use policyguard_test_util::FakeHttpClient;
use serde_json::json;
use std::sync::Arc;
use url::Url;

fn builtin(client: &Arc<FakeHttpClient>) -> GitHubRequest<Arc<FakeHttpClient>> {
    GitHubRequest::new(client.clone())
}

#[test]
fn get_request_substitutes_params_and_returns_status_and_body() {
    let client = Arc::new(FakeHttpClient::json(200, json!([{"number": 1}])));
    let gh = builtin(&client);

    let value = gh
        .call(&[
            json!("GET /repos/{owner}/{repo}/issues"),
            json!({"owner": "o", "repo": "r", "state": "open"}),
        ])
        .expect("call");

    assert_eq!(value, json!({"statusCode": 200, "body": [{"number": 1}]}));

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, "GET");
    assert_eq!(
        req.url.as_str(),
        "https://api.github.com/repos/o/r/issues?state=open"
    );
    assert_eq!(req.body, b"{}");
    assert_eq!(req.header("User-Agent"), Some("policyguard"));
}

#[test]
fn forbidden_response_is_an_error() {
    let client = Arc::new(FakeHttpClient::json(403, json!({"message": "rate limited"})));
    let err = builtin(&client)
        .call(&[json!("GET /user"), json!({})])
        .unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"forbidden: rate limited");
}

#[test]
fn non_forbidden_error_statuses_are_returned_to_the_rule() {
    let client = Arc::new(FakeHttpClient::json(404, json!({"message": "Not Found"})));
    let value = builtin(&client)
        .call(&[json!("GET /repos/{owner}/{repo}"), json!({"owner": "o", "repo": "gone"})])
        .expect("call");
    assert_eq!(value["statusCode"], 404);
    assert_eq!(value["body"]["message"], "Not Found");
}

#[test]
fn failures_surface_as_errors() {
    let html = Arc::new(FakeHttpClient::raw(200, "<html></html>"));
    let err = builtin(&html).call(&[json!("GET /x"), json!({})]).unwrap_err();
    assert!(err.to_string().starts_with("decode response body:"), "{err}");

    let down = Arc::new(FakeHttpClient::unreachable("connection refused"));
    let err = builtin(&down).call(&[json!("GET /x"), json!({})]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"send request: connection refused");

    let client = Arc::new(FakeHttpClient::json(200, json!({})));
    let err = builtin(&client).call(&[json!("GET"), json!({})]).unwrap_err();
    insta::assert_snapshot!(
        err.to_string(),
        @r#"malformed request line "GET": expected "<METHOD> <path>""#
    );

    let err = builtin(&client)
        .call(&[json!("GET /repos/{owner}"), json!({})])
        .unwrap_err();
    insta::assert_snapshot!(err.to_string(), @r#"missing value for path parameter "owner""#);

    let err = builtin(&client).call(&[json!(7), json!({})]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"request line must be a string, got 7");

    let err = builtin(&client)
        .call(&[json!("GET https://collector.example/steal"), json!({})])
        .unwrap_err();
    insta::assert_snapshot!(
        err.to_string(),
        @"url https://collector.example/steal is outside the configured api root https://api.github.com"
    );

    // None of the malformed calls reached the network.
    assert!(client.requests().is_empty());
}

#[test]
fn registry_wraps_errors_with_the_builtin_name() {
    let client = Arc::new(FakeHttpClient::json(403, json!({"message": "rate limited"})));
    let mut registry = BuiltinRegistry::new();
    registry.register(Arc::new(builtin(&client)));

    let err = registry
        .call("github.request", &[json!("GET /user"), json!({})])
        .unwrap_err();
    assert_eq!(err.to_string(), "github.request: forbidden: rate limited");
}

#[test]
fn identical_calls_are_memoized_within_one_evaluation() {
    let client = Arc::new(FakeHttpClient::json(200, json!({"ok": true})));
    let mut registry = BuiltinRegistry::new();
    registry.register(Arc::new(builtin(&client)));

    let args = [json!("GET /orgs/{org}"), json!({"org": "acme", "a": 1, "b": 2})];
    let reordered = [json!("GET /orgs/{org}"), json!({"b": 2, "a": 1, "org": "acme"})];

    registry.call("github.request", &args).expect("first");
    registry.call("github.request", &reordered).expect("second");
    assert_eq!(client.requests().len(), 1);

    registry.begin_evaluation();
    registry.call("github.request", &args).expect("third");
    assert_eq!(client.requests().len(), 2);
}

#[test]
fn custom_base_url_gets_a_trailing_slash() {
    let client = Arc::new(FakeHttpClient::json(200, json!({})));
    let base = Url::parse("https://ghe.example.com/api/v3").expect("url");
    let gh = GitHubRequest::with_base_url(client.clone(), base);
    assert_eq!(gh.base_url().as_str(), "https://ghe.example.com/api/v3/");

    gh.request("GET /meta", &json!({})).expect("request");
    assert_eq!(
        client.requests()[0].url.as_str(),
        "https://ghe.example.com/api/v3/meta"
    );
}

#[test]
fn fake_client_is_usable_through_the_trait_object() {
    let client: Arc<dyn HttpClient> = Arc::new(FakeHttpClient::json(201, json!({"id": 9})));
    let gh = GitHubRequest::new(client);
    let resp = gh
        .request("POST /repos/{owner}/{repo}/issues", &json!({"owner": "o", "repo": "r"}))
        .expect("request");
    assert_eq!(resp.status_code, 201);
    assert_eq!(resp.body["id"], 9);
}

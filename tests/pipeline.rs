//! End-to-end pipeline behaviour against mocked identity provider, model
//! provider and Dataverse.
//!
//! Every scenario also pins which downstream calls must NOT happen: wiremock
//! verifies `.expect(0)` mocks when the harness is dropped.

mod support;

use copilot::errors::AppError;
use copilot::identity::exchange::ExchangeError;
use copilot::identity::validator::AuthError;
use copilot::pipeline::{handle_chat, RequestId};
use copilot::query::executor::ExecutionError;
use serde_json::json;
use support::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

const QUESTION: &str = "show my active work orders in Seattle";

#[tokio::test]
async fn test_answers_with_dataverse_records() {
    let h = Harness::start().await;
    let token = h.token();

    h.expect_exchange(&token).await;
    h.model_writes_fetch(WORK_ORDER_FETCH).await;
    h.dataverse_responds(
        "msdyn_workorders",
        ResponseTemplate::new(200).set_body_json(work_orders(&["WO-00042", "WO-00043"])),
    )
    .await;

    let reply = handle_chat(&h.ctx, &RequestId::new(), &token, QUESTION).await.unwrap();
    let text = reply.as_str();

    assert!(text.starts_with("I found 2 records."), "unexpected reply: {}", text);
    assert!(text.contains("Record 1:\nmsdyn_name: WO-00042"));
    assert!(text.contains("Record 2:\nmsdyn_name: WO-00043"));
    assert!(!text.contains("@odata.etag"));
    assert!(text.contains("msdyn_systemstatus: Scheduled"));
    assert!(!text.contains("FormattedValue"));
    assert!(!reply.is_error());
}

#[tokio::test]
async fn test_fetchxml_is_forwarded_to_dataverse() {
    let h = Harness::start().await;
    let token = h.token();

    h.expect_exchange(&token).await;
    h.model_writes_fetch(WORK_ORDER_FETCH).await;
    h.dataverse_responds(
        "msdyn_workorders",
        ResponseTemplate::new(200).set_body_json(json!({"value": []})),
    )
    .await;

    let reply = handle_chat(&h.ctx, &RequestId::new(), &token, QUESTION).await.unwrap();
    assert_eq!(reply.as_str(), copilot::reply::NO_RESULTS);

    let requests = h.dataverse.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let fetch = requests[0]
        .url
        .query_pairs()
        .find(|(k, _)| k == "fetchXml")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert_eq!(fetch, WORK_ORDER_FETCH);
    assert_eq!(requests[0].headers.get("odata-maxversion").unwrap(), "4.0");
}

#[tokio::test]
async fn test_malformed_tokens_never_reach_exchange() {
    let h = Harness::start().await;
    h.forbid_exchange().await;
    h.forbid_model().await;
    h.forbid_dataverse().await;

    let mut expired = h.claims();
    expired["iat"] = json!(1_000_000_000);
    expired["nbf"] = json!(1_000_000_000);
    expired["exp"] = json!(1_000_003_600);

    let mut wrong_audience = h.claims();
    wrong_audience["aud"] = json!("api://someone-else");

    let candidates = vec![
        "".to_string(),
        "not-a-token".to_string(),
        "aaa.bbb.ccc".to_string(),
        sign(SIGNING_KEY, None, &h.claims()),
        sign(ROGUE_KEY, Some(KID), &h.claims()),
        sign(SIGNING_KEY, Some(KID), &expired),
        sign(SIGNING_KEY, Some(KID), &wrong_audience),
    ];

    for raw in candidates {
        let err = handle_chat(&h.ctx, &RequestId::new(), &raw, QUESTION).await.unwrap_err();
        assert!(
            matches!(err, AppError::Authentication(AuthError::InvalidCredentials { .. })),
            "unexpected error for {:?}: {:?}",
            raw,
            err
        );
    }
}

#[tokio::test]
async fn test_unknown_signing_key_is_reported() {
    let h = Harness::start().await;
    h.forbid_exchange().await;

    let token = sign(SIGNING_KEY, Some("rotated-after-startup"), &h.claims());
    let err = handle_chat(&h.ctx, &RequestId::new(), &token, QUESTION).await.unwrap_err();

    match err {
        AppError::Authentication(AuthError::UnknownSigningKey { kid }) => {
            assert_eq!(kid, "rotated-after-startup")
        }
        other => panic!("expected unknown signing key, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exchange_failure_stops_before_model_and_dataverse() {
    let h = Harness::start().await;
    h.reject_exchange().await;
    h.forbid_model().await;
    h.forbid_dataverse().await;

    let err = handle_chat(&h.ctx, &RequestId::new(), &h.token(), QUESTION).await.unwrap_err();

    match err {
        AppError::DownstreamAuthorization(ExchangeError::Rejected { code, .. }) => {
            assert_eq!(code, "invalid_grant")
        }
        other => panic!("expected downstream authorization failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_reply_without_fence_skips_dataverse() {
    let h = Harness::start().await;
    let token = h.token();

    h.expect_exchange(&token).await;
    h.model_replies("Sorry, I can only help with Field Service data.").await;
    h.forbid_dataverse().await;

    let reply = handle_chat(&h.ctx, &RequestId::new(), &token, "what's the weather?").await.unwrap();

    assert!(reply.is_error());
    assert!(reply.as_str().starts_with("[error]"));
}

#[tokio::test]
async fn test_dataverse_error_is_surfaced() {
    let h = Harness::start().await;
    let token = h.token();
    let body = r#"{"error":{"code":"0x80041103","message":"'msdyn_workorder' entity doesn't contain attribute with Name = 'msdyn_town'."}}"#;

    h.expect_exchange(&token).await;
    h.model_writes_fetch(WORK_ORDER_FETCH).await;
    h.dataverse_responds(
        "msdyn_workorders",
        ResponseTemplate::new(400).set_body_string(body),
    )
    .await;

    let err = handle_chat(&h.ctx, &RequestId::new(), &token, QUESTION).await.unwrap_err();

    match err {
        AppError::Execution(ExecutionError::Status { status, body: returned }) => {
            assert_eq!(status, 400);
            assert_eq!(returned, body);
        }
        other => panic!("expected execution failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_each_request_performs_its_own_exchange() {
    let h = Harness::start().await;
    let token = h.token();

    Mock::given(method("POST"))
        .and(path(format!("/{}/oauth2/v2.0/token", TENANT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": DATAVERSE_TOKEN
        })))
        .expect(2)
        .mount(&h.identity)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": format!("```fetchxml\n{}\n```", WORK_ORDER_FETCH)}}]
        })))
        .expect(2)
        .mount(&h.model)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/msdyn_workorders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(work_orders(&["WO-1"])))
        .expect(2)
        .mount(&h.dataverse)
        .await;

    for _ in 0..2 {
        let reply = handle_chat(&h.ctx, &RequestId::new(), &token, QUESTION).await.unwrap();
        assert!(reply.as_str().starts_with("I found one record:"));
    }
}

#[tokio::test]
async fn test_outcomes_are_counted() {
    let h = Harness::start().await;
    h.reject_exchange().await;

    let _ = handle_chat(&h.ctx, &RequestId::new(), &h.token(), QUESTION).await;
    let _ = handle_chat(&h.ctx, &RequestId::new(), "garbage", QUESTION).await;

    let text = h.ctx.metrics.encode();
    assert!(text.contains("copilot_chat_requests_total{outcome=\"error\"} 2"));
    assert!(text.contains("copilot_stage_failures_total{stage=\"exchange\"} 1"));
    assert!(text.contains("copilot_stage_failures_total{stage=\"validate\"} 1"));
}

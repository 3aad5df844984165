//! End-to-end behaviour of the authenticated request pipeline.
//!
//! Every test drives the client through a scripted transport and checks the
//! observable contract: which requests went out, what the caller received,
//! and what happened to the stored token.

use homenote_client::{
    AuthEvent, AuthProvider, ClientError, FatalAuthReason, Method, RequestOptions, TransportError,
};
use homenote_test_utils::{
    bearer_of, client_with, envelope, error_response, json_response, session, token_grant,
    valid_token, Reply, ScriptedTransport, HOUR_MS,
};
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const REFRESH: &str = "/v1/auth/refresh";
const ME: &str = "/v1/members/me";

#[derive(Debug, Deserialize, PartialEq)]
struct Member {
    id: u64,
    nickname: String,
}

fn member_body() -> Value {
    json!({"id": 7, "nickname": "tenant"})
}

/// Backend that accepts only `Bearer new` and refreshes to `new`.
fn rotating_backend(refresh_delay: Duration) -> ScriptedTransport {
    ScriptedTransport::new(move |req| {
        if req.path() == REFRESH {
            return Reply::ok(token_grant("new", 3600)).delayed(refresh_delay);
        }
        match bearer_of(req) {
            Some("new") => envelope(member_body()).into(),
            _ => error_response(401, "EXPIRED_ACCESS_TOKEN", "Access token expired").into(),
        }
    })
}

#[tokio::test]
async fn attaches_bearer_token() {
    let transport = Arc::new(ScriptedTransport::new(|_| envelope(member_body()).into()));
    let (tokens, _, _) = session();
    tokens.save(&valid_token("abc"));
    let client = client_with(transport.clone(), tokens);

    let me: Member = client.get_data(ME).await.unwrap();
    assert_eq!(me, Member { id: 7, nickname: "tenant".to_string() });

    let sent = transport.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(bearer_of(&sent[0]), Some("abc"));
    assert_eq!(sent[0].url, "https://api.test/v1/members/me");
    assert_eq!(sent[0].header_value("Accept"), Some("application/json"));
}

#[tokio::test]
async fn missing_token_sends_anonymous_request_then_refreshes() {
    let transport = Arc::new(rotating_backend(Duration::ZERO));
    let (tokens, _, _) = session();
    let client = client_with(transport.clone(), tokens.clone());

    let me: Member = client.get_data(ME).await.unwrap();
    assert_eq!(me.id, 7);

    let calls = transport.matching(Method::Get, ME);
    assert_eq!(calls.len(), 2);
    assert_eq!(bearer_of(&calls[0]), None);
    assert_eq!(bearer_of(&calls[1]), Some("new"));
    assert_eq!(tokens.get().unwrap().access_token, "new");
}

#[tokio::test(start_paused = true)]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let transport = Arc::new(rotating_backend(Duration::from_millis(50)));
    let (tokens, _, _) = session();
    tokens.save(&valid_token("old"));
    let client = client_with(transport.clone(), tokens);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.get_data::<Member>(ME).await
        }));
    }

    for handle in handles {
        let me = handle.await.unwrap().unwrap();
        assert_eq!(me.id, 7);
    }

    assert_eq!(transport.count(Method::Post, REFRESH), 1);
    assert_eq!(client.refresh_count(), 1);
}

#[tokio::test]
async fn second_unauthorized_after_refresh_is_fatal() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if req.path() == REFRESH {
            token_grant("new", 3600).into()
        } else {
            error_response(401, "EXPIRED_ACCESS_TOKEN", "nope").into()
        }
    }));
    let (tokens, _, _) = session();
    tokens.save(&valid_token("old"));
    let client = client_with(transport.clone(), tokens.clone());
    let mut events = client.subscribe_auth_events();

    let err = client.get_data::<Member>(ME).await.unwrap_err();
    match err {
        ClientError::SessionExpired { reason } => {
            assert_eq!(reason, FatalAuthReason::RetryUnauthorized)
        }
        other => panic!("expected SessionExpired, got {other:?}"),
    }

    assert_eq!(transport.count(Method::Get, ME), 2);
    assert_eq!(transport.count(Method::Post, REFRESH), 1);
    assert_eq!(tokens.get(), None);

    assert_eq!(events.recv().await.unwrap(), AuthEvent::Refreshed);
    assert_eq!(
        events.recv().await.unwrap(),
        AuthEvent::SignInRequired {
            reason: FatalAuthReason::RetryUnauthorized
        }
    );
}

#[tokio::test]
async fn fatal_codes_skip_refresh() {
    for code in ["INVALID_REFRESH_TOKEN", "TOKEN_REUSE_DETECTED"] {
        let transport = Arc::new(ScriptedTransport::new(move |_| {
            error_response(401, code, "session revoked").into()
        }));
        let (tokens, _, _) = session();
        tokens.save(&valid_token("old"));
        let client = client_with(transport.clone(), tokens.clone());
        let mut events = client.subscribe_auth_events();

        let err = client.get_data::<Member>(ME).await.unwrap_err();
        assert!(err.is_session_expired(), "{code}: {err:?}");
        assert_eq!(transport.count(Method::Post, REFRESH), 0);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(tokens.get(), None);
        assert!(matches!(
            events.recv().await.unwrap(),
            AuthEvent::SignInRequired { .. }
        ));
    }
}

#[tokio::test]
async fn failed_refresh_ends_session() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if req.path() == REFRESH {
            error_response(401, "REFRESH_TOKEN_EXPIRED", "expired").into()
        } else {
            error_response(401, "EXPIRED_ACCESS_TOKEN", "expired").into()
        }
    }));
    let (tokens, _, _) = session();
    tokens.save(&valid_token("old"));
    let client = client_with(transport.clone(), tokens.clone());

    let err = client.get_data::<Member>(ME).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::SessionExpired {
            reason: FatalAuthReason::RefreshFailed(_)
        }
    ));
    assert_eq!(transport.count(Method::Get, ME), 1);
    assert_eq!(tokens.get(), None);
}

#[tokio::test]
async fn rejected_refresh_keeps_the_backend_reason() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if req.path() == REFRESH {
            error_response(401, "TOKEN_REUSE_DETECTED", "replayed").into()
        } else {
            error_response(401, "EXPIRED_ACCESS_TOKEN", "expired").into()
        }
    }));
    let (tokens, _, _) = session();
    tokens.save(&valid_token("old"));
    let client = client_with(transport, tokens);

    let err = client.get_data::<Member>(ME).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::SessionExpired {
            reason: FatalAuthReason::TokenReuseDetected
        }
    ));
}

#[tokio::test]
async fn force_refresh_failure_ends_session() {
    let transport = Arc::new(ScriptedTransport::new(|_| {
        error_response(401, "INVALID_REFRESH_TOKEN", "gone").into()
    }));
    let (tokens, _, _) = session();
    tokens.save(&valid_token("revoked"));
    let client = client_with(transport, tokens.clone());
    let mut events = client.subscribe_auth_events();

    let err = client.force_refresh().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::SessionExpired {
            reason: FatalAuthReason::InvalidRefreshToken
        }
    ));
    assert_eq!(tokens.get(), None);
    assert_eq!(
        events.try_recv().unwrap(),
        AuthEvent::SignInRequired {
            reason: FatalAuthReason::InvalidRefreshToken
        }
    );
}

#[tokio::test]
async fn force_refresh_replaces_the_token() {
    let transport = Arc::new(rotating_backend(Duration::ZERO));
    let (tokens, _, _) = session();
    tokens.save(&valid_token("old"));
    let client = client_with(transport, tokens.clone());

    let token = client.force_refresh().await.unwrap();
    assert_eq!(token.access_token, "new");
    assert_eq!(tokens.get().map(|t| t.access_token).as_deref(), Some("new"));
}

#[tokio::test]
async fn public_and_skip_refresh_requests_surface_401() {
    let transport = Arc::new(ScriptedTransport::new(|_| {
        error_response(401, "UNAUTHORIZED", "login required").into()
    }));
    let (tokens, _, _) = session();
    tokens.save(&valid_token("old"));
    let client = client_with(transport.clone(), tokens.clone());

    let err = client
        .request::<Value>(ME, RequestOptions::get().public())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.code(), Some("UNAUTHORIZED"));
    assert_eq!(bearer_of(&transport.requests()[0]), None);

    let err = client
        .request::<Value>(ME, RequestOptions::get().skip_refresh())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api(_)));

    assert_eq!(transport.count(Method::Post, REFRESH), 0);
    assert!(tokens.get().is_some());
}

#[tokio::test]
async fn non_json_success_decodes_from_empty_object() {
    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Ack {
        #[serde(default)]
        id: Option<u64>,
    }

    let transport = Arc::new(ScriptedTransport::new(|_| {
        homenote_client::HttpResponse::new(204, Vec::new()).into()
    }));
    let (tokens, _, _) = session();
    let client = client_with(transport, tokens);

    let ack: Ack = client
        .request("/v1/home-notes/3", RequestOptions::delete())
        .await
        .unwrap();
    assert_eq!(ack, Ack::default());
}

#[tokio::test]
async fn validation_errors_are_joined() {
    let transport = Arc::new(ScriptedTransport::new(|_| {
        json_response(
            400,
            json!({"errors": [{"field": "title", "reason": "required"}, {"field": "deposit", "reason": "must be positive"}]}),
        )
        .into()
    }));
    let (tokens, _, _) = session();
    let client = client_with(transport, tokens);

    let err = client
        .post_data::<_, Value>("/v2/property-posts", &json!({"title": ""}))
        .await
        .unwrap_err();
    match err {
        ClientError::Api(api) => {
            assert_eq!(api.status, 400);
            assert_eq!(api.message, "required, must be positive");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn network_failure_is_typed() {
    let transport = Arc::new(ScriptedTransport::new(|_| {
        Reply::err(TransportError::Connect("dns".to_string()))
    }));
    let (tokens, _, _) = session();
    let client = client_with(transport, tokens);

    let err = client.get_data::<Value>(ME).await.unwrap_err();
    assert!(matches!(err, ClientError::Network(TransportError::Connect(_))));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn json_body_and_query_are_sent() {
    let transport = Arc::new(ScriptedTransport::new(|_| envelope(json!([])).into()));
    let (tokens, _, _) = session();
    let client = client_with(transport.clone(), tokens);

    let options = RequestOptions::post()
        .with_json(&json!({"title": "sunny flat"}))
        .unwrap()
        .with_query("keyword", "mapo gu")
        .with_query("page", 1);
    let _: Value = client.request_data("/v2/property-posts", options).await.unwrap();

    let sent = &transport.requests()[0];
    assert_eq!(
        sent.url,
        "https://api.test/v2/property-posts?keyword=mapo+gu&page=1"
    );
    assert_eq!(sent.header_value("Content-Type"), Some("application/json"));
    let body: Value = serde_json::from_slice(sent.body.as_ref().unwrap()).unwrap();
    assert_eq!(body, json!({"title": "sunny flat"}));
}

#[tokio::test]
async fn login_and_logout_manage_the_session() {
    let transport = Arc::new(ScriptedTransport::new(|req| match req.path().as_str() {
        "/v1/auth/token" => envelope(json!({
            "access_token": "fresh",
            "expires_in": 3600,
            "is_new_member": true
        }))
        .into(),
        _ => envelope(Value::Null).into(),
    }));
    let (tokens, _, _) = session();
    let client = client_with(transport.clone(), tokens.clone());
    let mut events = client.subscribe_auth_events();

    let outcome = client
        .login(AuthProvider::Kakao, "code-123", "https://homenote.kr/oauth")
        .await
        .unwrap();
    assert!(outcome.is_new_member);
    assert_eq!(outcome.token.expires_at, homenote_test_utils::NOW + HOUR_MS);
    assert_eq!(tokens.get().unwrap().access_token, "fresh");
    assert!(client.is_authenticated());
    assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn);

    let login_request = &transport.matching(Method::Post, "/v1/auth/token")[0];
    assert_eq!(bearer_of(login_request), None);

    client.logout().await;
    assert!(!client.is_authenticated());
    assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
    let logout_request = &transport.matching(Method::Post, "/v1/auth/logout")[0];
    assert_eq!(bearer_of(logout_request), Some("fresh"));
}

#[tokio::test]
async fn ensure_valid_token_refreshes_only_when_needed() {
    let transport = Arc::new(rotating_backend(Duration::ZERO));
    let (tokens, _, clock) = session();
    tokens.save(&valid_token("current"));
    let client = client_with(transport.clone(), tokens);

    assert_eq!(client.ensure_valid_token().await.as_deref(), Some("current"));
    assert_eq!(transport.requests().len(), 0);

    // Inside the five-minute buffer
    clock.advance_ms(HOUR_MS - 60_000);
    assert_eq!(client.ensure_valid_token().await.as_deref(), Some("new"));
    assert_eq!(transport.count(Method::Post, REFRESH), 1);
}

#[tokio::test]
async fn ensure_valid_token_returns_none_when_refresh_fails() {
    let transport = Arc::new(ScriptedTransport::new(|_| {
        error_response(401, "INVALID_REFRESH_TOKEN", "gone").into()
    }));
    let (tokens, _, _) = session();
    let client = client_with(transport, tokens);

    assert_eq!(client.ensure_valid_token().await, None);
}

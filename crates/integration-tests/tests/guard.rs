//! Route guard decisions, and the guard in front of the real router.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use tower::ServiceExt;

use quardcube_integration_tests::lazy_state;
use quardcube_storefront::app;
use quardcube_storefront::middleware::route_guard::{GuardDecision, RouteClass, classify, decide};

fn redirect(location: &str) -> GuardDecision {
    GuardDecision::Redirect(location.to_string())
}

#[test]
fn protected_paths_send_anonymous_visitors_to_login() {
    assert_eq!(decide("/orders", false), redirect("/auth/login?redirectTo=/orders"));
    assert_eq!(
        decide("/orders/3f2a/invoice", false),
        redirect("/auth/login?redirectTo=/orders/3f2a/invoice")
    );
    assert_eq!(decide("/account", false), redirect("/auth/login?redirectTo=/account"));
    assert_eq!(decide("/orders", true), GuardDecision::Allow);
}

#[test]
fn auth_pages_send_signed_in_visitors_home() {
    assert_eq!(decide("/auth/login", true), redirect("/"));
    assert_eq!(decide("/auth/register", true), redirect("/"));
    assert_eq!(decide("/auth/login", false), GuardDecision::Allow);
}

#[test]
fn public_paths_skip_the_lookup() {
    for path in ["/api/products", "/static/css/app.css", "/health", "/auth/callback", "/auth/oauth/google"] {
        assert_eq!(decide(path, false), GuardDecision::Bypass, "{path}");
    }
}

#[test]
fn prefixes_match_whole_segments() {
    assert_eq!(classify("/ordersx"), RouteClass::Open);
    assert_eq!(classify("/accounting"), RouteClass::Open);
    assert_eq!(classify("/apiary"), RouteClass::Open);
    assert_eq!(decide("/cart", false), GuardDecision::Allow);
}

async fn get(uri: &str) -> Response {
    app(lazy_state())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn anonymous_orders_request_redirects_to_login() {
    let response = get("/orders").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?redirectTo=/orders");
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn unreachable_auth_backend_counts_as_signed_out() {
    let response = app(lazy_state())
        .oneshot(
            Request::builder()
                .uri("/orders")
                .header(header::COOKIE, "sb-auth-token=aaa.bbb.ccc; sb-refresh-token=r1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?redirectTo=/orders");
}

#[tokio::test]
async fn anonymous_account_request_keeps_full_path() {
    let response = get("/account/profile").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?redirectTo=/account/profile");
}

#[tokio::test]
async fn login_page_renders_with_matching_nonce() {
    let response = get("/auth/login?redirectTo=/orders").await;

    assert_eq!(response.status(), StatusCode::OK);
    let csp = response
        .headers()
        .get(header::CONTENT_SECURITY_POLICY)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let nonce = csp
        .split("'nonce-")
        .nth(1)
        .and_then(|rest| rest.split('\'').next())
        .unwrap()
        .to_string();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains(&format!("nonce=\"{nonce}\"")));
    assert!(html.contains("name=\"redirectTo\""));
}

#[tokio::test]
async fn callback_error_redirects_to_login_with_message() {
    let response = get("/auth/callback?error=access_denied&error_description=Nope").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "http://localhost:3000/auth/login?error=access_denied&message=Nope"
    );
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn oauth_start_sets_verifier_cookie() {
    let response = get("/auth/oauth/google").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("http://127.0.0.1:9/auth/v1/authorize?provider=google"));
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("sb-code-verifier="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn oauth_start_rejects_unknown_provider() {
    let response = get("/auth/oauth/myspace").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth/login?error="));
}

#[tokio::test]
async fn upstream_request_id_is_echoed() {
    let response = app(lazy_state())
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-42");
}

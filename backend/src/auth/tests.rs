use super::*;
use axum::{
    http::{Request, StatusCode, header::{AUTHORIZATION, CONTENT_TYPE}},
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};

const SECRET: &str = "supersecretjwtsecretforunittesting123";
const USER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";

fn token(secret: &str, role: &str, exp: usize) -> String {
    let claims = Claims {
        sub: USER_ID.to_string(),
        role: role.to_string(),
        email: Some("test@example.com".to_string()),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

async fn extract(authorization: Option<String>) -> Result<AuthUser, AppError> {
    let mut builder = Request::builder().uri("/api/v1/orders");
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    let (mut parts, _) = builder.body(()).unwrap().into_parts();
    parts.extensions.insert(Arc::new(AuthConfig::new(SECRET)));

    AuthUser::from_request_parts(&mut parts, &()).await
}

#[test]
fn test_validate_jwt_success() {
    let config = AuthConfig::new(SECRET);

    let claims = validate_jwt(&token(SECRET, "customer", 9999999999), &config)
        .expect("Valid token should pass");

    assert_eq!(claims.sub, USER_ID);
    assert_eq!(claims.email.as_deref(), Some("test@example.com"));
}

#[test]
fn test_validate_jwt_expired() {
    let config = AuthConfig::new(SECRET);

    assert!(validate_jwt(&token(SECRET, "customer", 1), &config).is_err());
}

#[test]
fn test_validate_jwt_invalid_signature() {
    let config = AuthConfig::new(SECRET);

    assert!(validate_jwt(&token("wrongsecret", "customer", 9999999999), &config).is_err());
}

#[tokio::test]
async fn extracts_admin_user_from_bearer_token() {
    let user = extract(Some(format!(
        "Bearer {}",
        token(SECRET, "admin", 9999999999)
    )))
    .await
    .unwrap();

    assert_eq!(user.user_id.to_string(), USER_ID);
    assert!(user.is_admin());
}

#[tokio::test]
async fn extracts_customer_from_legacy_role_claim() {
    let user = extract(Some(format!(
        "Bearer {}",
        token(SECRET, "authenticated", 9999999999)
    )))
    .await
    .unwrap();

    assert_eq!(user.role, Role::Customer);
    assert!(!user.is_admin());
}

#[tokio::test]
async fn rejects_missing_or_malformed_header() {
    let response = extract(None).await.unwrap_err().into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = extract(Some("Token abc".to_string()))
        .await
        .unwrap_err()
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejections_use_the_json_error_body() {
    let response = extract(None).await.unwrap_err().into_response();

    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["code"], 401);
    assert_eq!(body["message"], "Missing Authorization header");
}

#[tokio::test]
async fn rejects_unknown_role() {
    let response = extract(Some(format!(
        "Bearer {}",
        token(SECRET, "superuser", 9999999999)
    )))
    .await
    .unwrap_err()
    .into_response();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

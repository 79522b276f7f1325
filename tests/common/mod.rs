//! Common test utilities.

use serde_json::{Value, json};

use sqlsight::api::UserInfo;
use sqlsight::auth::AuthContext;
use sqlsight::client::InsightClient;

pub const TEST_TOKEN: &str = "test-token";

/// Auth context used by every test client.
pub fn test_auth() -> AuthContext {
    AuthContext {
        token: TEST_TOKEN.to_string(),
        user: UserInfo {
            user_id: 1,
            username: "tester".to_string(),
            permissions: vec!["ROLE_USER".to_string()],
        },
    }
}

/// Client pointed at a mock server.
pub fn test_client(base_url: &str) -> InsightClient {
    InsightClient::new(base_url, test_auth())
}

/// Wrap a payload in the backend's `{code, message, data}` envelope.
pub fn envelope(data: Value) -> Value {
    json!({"code": 200, "message": "ok", "data": data})
}

/// An envelope carrying a business error code.
pub fn error_envelope(code: i64, message: &str) -> Value {
    json!({"code": code, "message": message, "data": null})
}

use serde::{Deserialize, Serialize};

/// Request body for account registration. Absent fields deserialize as empty
/// so the handler can answer with a precise "is required" message.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Response returned after signup or login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

use serde::{Deserialize, Serialize};

// -- Session --

/// Claims carried by a back-office access token. Only `sub` is needed to tell
/// sessions apart; the server is the one that verifies the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub exp: Option<u64>,
}

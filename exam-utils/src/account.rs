use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user. Credentials are stored as a salted digest, never as
/// the password itself, even though everything lives in the browser's own
/// storage.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct UserRecord {
    pub username: String,
    pub salt: u64,
    pub digest: u64,
    pub created_at: DateTime<Utc>,
}

/// Whoever is currently logged in on this device, persisted so a reload
/// does not log the user out.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct CurrentUser {
    pub username: String,
    pub logged_in_at: DateTime<Utc>,
}

//! Credentials presented to the emulator.
//!
//! The emulator does not verify signatures, so identities are sent as
//! unsigned JWTs shaped like the ones its client SDK test helpers mint.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rulebench_core::{DatasetId, Identity, Principal};
use serde_json::{Map, Value, json};

/// Bearer token the emulator treats as a privileged caller.
pub const ADMIN_TOKEN: &str = "owner";

const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Claims that attributes may not override.
const RESERVED_CLAIMS: &[&str] = &["sub", "user_id", "iss", "aud"];

/// Build the claim set for an authenticated identity.
pub fn identity_claims(identity: &Identity, dataset: &DatasetId, issued_at: i64) -> Option<Value> {
    let Identity::Authenticated { subject_id, attributes } = identity else {
        return None;
    };

    let mut claims = Map::new();
    claims.insert("iat".to_string(), json!(issued_at));
    claims.insert("exp".to_string(), json!(issued_at + TOKEN_LIFETIME_SECS));
    claims.insert("auth_time".to_string(), json!(issued_at));
    claims.insert(
        "firebase".to_string(),
        json!({ "sign_in_provider": "custom", "identities": {} }),
    );
    for (key, value) in attributes {
        if !RESERVED_CLAIMS.contains(&key.as_str()) {
            claims.insert(key.clone(), value.clone());
        }
    }
    claims.insert(
        "iss".to_string(),
        json!(format!("https://securetoken.google.com/{}", dataset.as_str())),
    );
    claims.insert("aud".to_string(), json!(dataset.as_str()));
    claims.insert("sub".to_string(), json!(subject_id));
    claims.insert("user_id".to_string(), json!(subject_id));
    Some(Value::Object(claims))
}

/// Encode claims as an unsigned JWT (`header.payload.` with an empty
/// signature).
pub fn unsigned_jwt(claims: &Value) -> String {
    let header = json!({ "alg": "none", "kid": "fakekid", "typ": "JWT" });
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// The bearer token to send for `principal`, or `None` for anonymous callers.
pub fn bearer_token(principal: &Principal, dataset: &DatasetId) -> Option<String> {
    match principal {
        Principal::Admin => Some(ADMIN_TOKEN.to_string()),
        Principal::User(identity) => {
            let issued_at = chrono::Utc::now().timestamp();
            identity_claims(identity, dataset, issued_at).map(|claims| unsigned_jwt(&claims))
        }
    }
}

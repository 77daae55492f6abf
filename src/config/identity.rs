use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a CLI-shaped `metadata.user_id`.
///
/// Format: `user_<64 hex>_account__session_<uuid v4>`. The hash is derived
/// from the current time so two gateways started apart never share it.
pub fn generate_user_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let digest = Sha256::digest(format!("mimic-gateway_{nanos}").as_bytes());
    format!(
        "user_{}_account__session_{}",
        hex::encode(digest),
        Uuid::new_v4()
    )
}

//! HMAC-SHA256 signatures over payment callback parameters.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

fn mac(key: &str, id: &str, email: &str, amount: i64) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid signing key: {}", e)))?;
    mac.update(format!("{id}|{email}|{amount}").as_bytes());
    Ok(mac)
}

/// Hex signature of `id|email|amount`.
pub fn sign_callback(key: &str, id: &str, email: &str, amount: i64) -> Result<String, AppError> {
    Ok(hex::encode(mac(key, id, email, amount)?.finalize().into_bytes()))
}

/// Constant-time check of a hex signature.
pub fn verify_callback(key: &str, id: &str, email: &str, amount: i64, sig: &str) -> bool {
    let (Ok(bytes), Ok(mac)) = (hex::decode(sig), mac(key, id, email, amount)) else {
        return false;
    };
    mac.verify_slice(&bytes).is_ok()
}

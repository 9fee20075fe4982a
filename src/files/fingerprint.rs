use crate::files::Dialect;
use sha2::{Digest, Sha256};

/// Content fingerprint used to decide whether a file changed.
///
/// Lockfiles carry a metadata block describing the machine and tool that
/// produced them; it is dropped before hashing so that re-locking the same
/// dependency set elsewhere yields the same fingerprint.
pub fn fingerprint(dialect: Dialect, content: &str) -> Result<String, String> {
    match dialect {
        Dialect::PipfileLock => {
            let mut data: serde_json::Value =
                serde_json::from_str(content).map_err(|e| format!("invalid JSON: {}", e))?;
            if let Some(object) = data.as_object_mut() {
                object.remove("_meta");
            }
            canonical_sha256(&data)
        }
        Dialect::PoetryLock => {
            let mut data: toml::Table =
                toml::from_str(content).map_err(|e| format!("invalid TOML: {}", e))?;
            data.remove("metadata");
            let json = serde_json::to_value(&data).map_err(|e| e.to_string())?;
            canonical_sha256(&json)
        }
        Dialect::Pipfile | Dialect::PoetryPyproject | Dialect::Requirements => {
            Ok(blake3::hash(content.as_bytes()).to_hex().to_string())
        }
    }
}

/// `sha256:<hex>` over compact JSON with sorted object keys.
fn canonical_sha256(data: &serde_json::Value) -> Result<String, String> {
    let serialized = serde_json::to_string(data).map_err(|e| e.to_string())?;
    let digest = Sha256::digest(serialized.as_bytes());
    Ok(format!("sha256:{}", hex::encode(digest)))
}

//! Device fingerprint embedded in issued tokens.

use sha2::{Digest, Sha256};

/// SHA-256 (lowercase hex) over `"{device_id}-{app_version}-{device_info}"`.
///
/// Only an auxiliary integrity claim; it is not secret and never verified
/// against anything server-side.
pub fn derive_device_hash(device_id: &str, app_version: &str, device_info: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{device_id}-{app_version}-{device_info}").as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_hex_sha256() {
        let hash = derive_device_hash("d1", "2.0.0", "");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(
            derive_device_hash("d1", "2.0.0", "pixel"),
            derive_device_hash("d1", "2.0.0", "pixel")
        );
    }

    #[test]
    fn device_info_changes_hash() {
        assert_ne!(
            derive_device_hash("d1", "2.0.0", "pixel"),
            derive_device_hash("d1", "2.0.0", "iphone")
        );
    }
}

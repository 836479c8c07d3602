//! HMAC-SHA256 helpers shared by webhook verification and URL presigning.

pub fn hmac_sha256(key: impl AsRef<[u8]>, message: impl AsRef<[u8]>) -> [u8; 32] {
    hmac_sha256::HMAC::mac(message, key)
}

pub fn hmac_sha256_hex(key: impl AsRef<[u8]>, message: impl AsRef<[u8]>) -> String {
    hex::encode(hmac_sha256(key, message))
}

pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(hmac_sha256::Hash::hash(data.as_ref()))
}

/// Check a hex-encoded HMAC-SHA256 tag in constant time.
///
/// Tags that are not 32 bytes of valid hex (either case) never match.
pub fn verify_hmac_sha256_hex(
    key: impl AsRef<[u8]>,
    message: impl AsRef<[u8]>,
    tag_hex: &str,
) -> bool {
    let Ok(tag) = hex::decode(tag_hex.trim()) else {
        return false;
    };
    let Ok(tag) = <[u8; 32]>::try_from(tag.as_slice()) else {
        return false;
    };
    hmac_sha256::HMAC::verify(message, key, &tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JEFE_TAG: &str = "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843";

    #[test]
    fn test_hmac_sha256_rfc4231_case_2() {
        assert_eq!(hmac_sha256_hex("Jefe", "what do ya want for nothing?"), JEFE_TAG);
    }

    #[test]
    fn test_sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_verify_hmac_sha256_hex() {
        let message = "what do ya want for nothing?";
        assert!(verify_hmac_sha256_hex("Jefe", message, JEFE_TAG));
        assert!(verify_hmac_sha256_hex("Jefe", message, &JEFE_TAG.to_uppercase()));
        assert!(verify_hmac_sha256_hex("Jefe", message, &format!(" {JEFE_TAG}\n")));

        assert!(!verify_hmac_sha256_hex("jefe", message, JEFE_TAG));
        assert!(!verify_hmac_sha256_hex("Jefe", "what do ya want?", JEFE_TAG));
        assert!(!verify_hmac_sha256_hex("Jefe", message, &JEFE_TAG[..62]));
        assert!(!verify_hmac_sha256_hex("Jefe", message, &format!("{JEFE_TAG}00")));
        assert!(!verify_hmac_sha256_hex("Jefe", message, "not-hex"));
        assert!(!verify_hmac_sha256_hex("Jefe", message, ""));
    }
}

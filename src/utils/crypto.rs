//! # 密钥指纹与脱敏
//!
//! 原始密钥只在探测期间驻留内存，持久化时只保存 SHA-256 指纹与脱敏形式。

use sha2::{Digest, Sha256};

/// 可展示脱敏形式的最小密钥长度
pub const MIN_MASKABLE_LEN: usize = 10;

/// 短密钥的固定脱敏结果
pub const REDACTED: &str = "***";

const MAX_PREFIX_LEN: usize = 12;
const MAX_SUFFIX_LEN: usize = 6;

/// 计算密钥的 SHA-256 指纹（小写十六进制）
#[must_use]
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// 脱敏密钥：保留前 20%（最多 12 个字符）与后 10%（最多 6 个字符）
///
/// 长度不足 [`MIN_MASKABLE_LEN`] 的密钥统一返回 [`REDACTED`]。
#[must_use]
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let len = chars.len();
    if len < MIN_MASKABLE_LEN {
        return REDACTED.to_string();
    }

    let prefix_len = (len / 5).min(MAX_PREFIX_LEN);
    let suffix_len = (len / 10).min(MAX_SUFFIX_LEN);

    let prefix: String = chars[..prefix_len].iter().collect();
    let suffix: String = chars[len - suffix_len..].iter().collect();
    format!("{prefix}{REDACTED}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_hash_is_deterministic_hex() {
        let first = hash_key("sk-test-1234567890");
        let second = hash_key("sk-test-1234567890");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_known_vector() {
        assert_eq!(
            hash_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_distinct_keys_distinct_fingerprints() {
        assert_ne!(hash_key("sk-aaaaaaaaaaaa"), hash_key("sk-aaaaaaaaaaab"));
    }

    #[rstest]
    #[case("", "***")]
    #[case("short", "***")]
    #[case("123456789", "***")]
    #[case("1234567890", "12***0")]
    #[case("sk-proj-abcdefghijklmnop", "sk-p***op")]
    #[case(
        "sk-ant-REDACTED",
        "sk-ant-api03***ABCDEF"
    )]
    fn test_mask_key(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(mask_key(key), expected);
    }

    #[test]
    fn test_mask_never_reveals_full_key() {
        for len in MIN_MASKABLE_LEN..200 {
            let key: String = (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
            let masked = mask_key(&key);
            assert!(!masked.contains(&key));
            assert!(masked.contains(REDACTED));
            assert!(masked.len() < key.len() + REDACTED.len());
        }
    }
}

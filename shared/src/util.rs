//! Small shared utilities: timestamps, ID generation, order numbers

use rand::Rng;

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a Snowflake-style i64 for use as resource ID.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: random (4096 values per ms)
pub fn snowflake_id() -> i64 {
    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    let now = now_millis();
    let ts = (now - EPOCH_MS) & 0x1FF_FFFF_FFFF; // 41 bits
    let rand_bits: i64 = rand::thread_rng().gen_range(0..0x1000); // 12 bits
    (ts << 12) | rand_bits
}

/// Generate an order reference: prefix + yyyymmddHHMMSSmmm + 6 random digits.
///
/// The timestamp-with-millis body plus the random tail keeps collisions
/// practically impossible; uniqueness is still enforced at the store level.
pub fn gen_order_no(prefix: &str) -> String {
    let now = chrono::Utc::now();
    let body = now.format("%Y%m%d%H%M%S");
    let millis = now.timestamp_subsec_millis();
    let tail: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}{}{:03}{:06}", prefix, body, millis, tail)
}

/// Generate a random alphanumeric nonce of the given length
pub fn gen_nonce(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_fits_js_safe_integer() {
        let id = snowflake_id();
        assert!(id > 0);
        assert!(id <= 0x1F_FFFF_FFFF_FFFF); // 2^53 - 1
    }

    #[test]
    fn test_gen_order_no_shape() {
        let no = gen_order_no("MKT");
        assert!(no.starts_with("MKT"));
        // prefix + 14 (yyyymmddHHMMSS) + 3 (millis) + 6 (random)
        assert_eq!(no.len(), 3 + 14 + 3 + 6);
        assert!(no[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_gen_nonce_len_and_charset() {
        let nonce = gen_nonce(32);
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

use alloy_primitives::U256;

/// Decimal exponent of a chain's native unit (wei granularity)
pub const NATIVE_DECIMALS: u8 = 18;

/// Decimal exponent used when a token has no configured override
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Converts raw integer amounts into human-readable decimal strings.
///
/// All arithmetic is integer division on `U256`; the result is the shortest exact
/// decimal rendering, without trailing zeros and never in scientific notation.
pub struct AmountNormalizer;

impl AmountNormalizer {
    /// Render `raw / 10^decimals` as a decimal string
    pub fn normalize(raw: U256, decimals: u8) -> String {
        if decimals == 0 {
            return raw.to_string();
        }

        // 10^78 no longer fits in 256 bits, and every U256 is below it
        let (whole, fractional) = match U256::from(10u64).checked_pow(U256::from(decimals)) {
            Some(divisor) => (raw / divisor, raw % divisor),
            None => (U256::ZERO, raw),
        };

        let digits = fractional.to_string();
        let width = decimals as usize;
        let padded = format!("{}{}", "0".repeat(width.saturating_sub(digits.len())), digits);
        let trimmed = padded.trim_end_matches('0');

        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, trimmed)
        }
    }

    /// Normalize a native-coin value (18 decimals)
    pub fn native(raw: U256) -> String {
        Self::normalize(raw, NATIVE_DECIMALS)
    }
}

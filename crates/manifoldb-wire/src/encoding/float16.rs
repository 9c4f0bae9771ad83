//! Half-precision float conversions.
//!
//! `float16` follows IEEE 754 binary16 (1 sign, 5 exponent, 10 mantissa bits)
//! with round-to-nearest-even, gradual underflow into subnormals and overflow to
//! infinity. `bfloat16` keeps the upper 16 bits of the `f32` bit pattern
//! (1 sign, 8 exponent, 7 mantissa bits).
//!
//! Vector payloads are little-endian, two bytes per element.

use crate::error::{WireError, WireResult};

/// Canonical quiet NaN in binary16.
const F16_QUIET_NAN: u16 = 0x7E00;

/// Canonical quiet NaN in bfloat16.
const BF16_QUIET_NAN: u16 = 0x7FC0;

/// Convert an `f32` to binary16 bits.
#[must_use]
pub fn f32_to_f16(value: f32) -> u16 {
    let x = value.to_bits();
    let sign = x & 0x8000_0000;
    let exp = x & 0x7F80_0000;
    let man = x & 0x007F_FFFF;

    // Infinity or NaN; keep a quiet bit so a NaN never collapses into infinity.
    if exp == 0x7F80_0000 {
        let nan_bit = if man == 0 { 0 } else { 0x0200 };
        return ((sign >> 16) | 0x7C00 | nan_bit | (man >> 13)) as u16;
    }

    let half_sign = sign >> 16;
    let unbiased_exp = ((exp >> 23) as i32) - 127;
    let half_exp = unbiased_exp + 15;

    if half_exp >= 0x1F {
        return (half_sign | 0x7C00) as u16;
    }

    if half_exp <= 0 {
        // Below the smallest subnormal even after rounding: signed zero.
        if 14 - half_exp > 24 {
            return half_sign as u16;
        }
        let man = man | 0x0080_0000;
        let mut half_man = man >> (14 - half_exp);
        let round_bit = 1u32 << (13 - half_exp);
        if (man & round_bit) != 0 && (man & (3 * round_bit - 1)) != 0 {
            half_man += 1;
        }
        return (half_sign | half_man) as u16;
    }

    let half_exp = (half_exp as u32) << 10;
    let half_man = man >> 13;
    let round_bit = 0x0000_1000u32;
    let bits = half_sign | half_exp | half_man;
    // A carry out of the mantissa correctly bumps the exponent, up to infinity.
    if (man & round_bit) != 0 && (man & (3 * round_bit - 1)) != 0 {
        (bits + 1) as u16
    } else {
        bits as u16
    }
}

/// Convert binary16 bits to an `f32`. The conversion is exact.
#[must_use]
pub fn f16_to_f32(bits: u16) -> f32 {
    if bits & 0x7FFF == 0 {
        return f32::from_bits(u32::from(bits) << 16);
    }

    let half_sign = u32::from(bits & 0x8000);
    let half_exp = u32::from(bits & 0x7C00);
    let half_man = u32::from(bits & 0x03FF);
    let sign = half_sign << 16;

    if half_exp == 0x7C00 {
        if half_man == 0 {
            return f32::from_bits(sign | 0x7F80_0000);
        }
        return f32::from_bits(sign | 0x7FC0_0000 | (half_man << 13));
    }

    if half_exp == 0 {
        // Subnormal: renormalize around the leading one.
        let e = (half_man as u16).leading_zeros() - 6;
        let exp = (127 - 15 - e) << 23;
        let man = (half_man << (14 + e)) & 0x007F_FFFF;
        return f32::from_bits(sign | exp | man);
    }

    let unbiased_exp = ((half_exp >> 10) as i32) - 15;
    let exp = ((unbiased_exp + 127) as u32) << 23;
    let man = half_man << 13;
    f32::from_bits(sign | exp | man)
}

/// Convert an `f32` to bfloat16 bits by truncating the low mantissa half.
#[must_use]
pub fn f32_to_bf16(value: f32) -> u16 {
    if value.is_nan() {
        let sign = (value.to_bits() >> 16) as u16 & 0x8000;
        return sign | BF16_QUIET_NAN;
    }
    (value.to_bits() >> 16) as u16
}

/// Convert bfloat16 bits to an `f32`. The conversion is exact.
#[must_use]
pub fn bf16_to_f32(bits: u16) -> f32 {
    f32::from_bits(u32::from(bits) << 16)
}

/// Returns `true` if the binary16 bits encode a NaN.
#[must_use]
pub const fn f16_is_nan(bits: u16) -> bool {
    bits & 0x7C00 == 0x7C00 && bits & 0x03FF != 0
}

/// Encode `f32` values as a little-endian binary16 payload.
#[must_use]
pub fn encode_float16_vector(values: &[f32]) -> Vec<u8> {
    encode_half_words(values.iter().map(|&v| f32_to_f16(v)), values.len())
}

/// Encode `f32` values as a little-endian bfloat16 payload.
#[must_use]
pub fn encode_bfloat16_vector(values: &[f32]) -> Vec<u8> {
    encode_half_words(values.iter().map(|&v| f32_to_bf16(v)), values.len())
}

/// Decode a little-endian binary16 payload into `f32` values.
///
/// # Errors
///
/// Returns an error if the payload length is odd.
pub fn decode_float16_vector(bytes: &[u8]) -> WireResult<Vec<f32>> {
    Ok(decode_half_words(bytes)?.into_iter().map(f16_to_f32).collect())
}

/// Decode a little-endian bfloat16 payload into `f32` values.
///
/// # Errors
///
/// Returns an error if the payload length is odd.
pub fn decode_bfloat16_vector(bytes: &[u8]) -> WireResult<Vec<f32>> {
    Ok(decode_half_words(bytes)?.into_iter().map(bf16_to_f32).collect())
}

/// Pack 16-bit words little-endian.
#[must_use]
pub fn encode_half_words(words: impl Iterator<Item = u16>, len_hint: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(len_hint * 2);
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes
}

/// Unpack little-endian 16-bit words.
///
/// # Errors
///
/// Returns an error if the payload length is odd.
pub fn decode_half_words(bytes: &[u8]) -> WireResult<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        return Err(WireError::encoding(format!(
            "half-precision payload has odd length {}",
            bytes.len()
        )));
    }
    Ok(bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect())
}

/// Canonical binary16 NaN bits.
#[must_use]
pub const fn f16_nan() -> u16 {
    F16_QUIET_NAN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f16_special_values() {
        assert_eq!(f32_to_f16(0.0), 0x0000);
        assert_eq!(f32_to_f16(-0.0), 0x8000);
        assert_eq!(f32_to_f16(f32::INFINITY), 0x7C00);
        assert_eq!(f32_to_f16(f32::NEG_INFINITY), 0xFC00);
        assert!(f16_is_nan(f32_to_f16(f32::NAN)));
        assert_eq!(f32_to_f16(1.0), 0x3C00);
        assert_eq!(f32_to_f16(-2.0), 0xC000);
        assert_eq!(f32_to_f16(65504.0), 0x7BFF);
    }

    #[test]
    fn test_f16_overflow_and_underflow() {
        assert_eq!(f32_to_f16(65520.0), 0x7C00);
        assert_eq!(f32_to_f16(1.0e6), 0x7C00);
        assert_eq!(f32_to_f16(-1.0e6), 0xFC00);
        assert_eq!(f32_to_f16(1.0e-10), 0x0000);
        assert_eq!(f32_to_f16(-1.0e-10), 0x8000);
    }

    #[test]
    fn test_f16_subnormals() {
        // Smallest positive subnormal 2^-24.
        let tiny = 2f32.powi(-24);
        assert_eq!(f32_to_f16(tiny), 0x0001);
        assert_eq!(f16_to_f32(0x0001), tiny);
        // Largest subnormal.
        assert_eq!(f16_to_f32(0x03FF), 1023.0 * tiny);
        assert_eq!(f32_to_f16(1023.0 * tiny), 0x03FF);
    }

    #[test]
    fn test_f16_rounds_to_nearest_even() {
        // 1 + 2^-11 is exactly halfway between 1.0 and the next binary16 value.
        assert_eq!(f32_to_f16(1.0 + 2f32.powi(-11)), 0x3C00);
        // 1 + 3 * 2^-11 is halfway and rounds up to the even mantissa.
        assert_eq!(f32_to_f16(1.0 + 3.0 * 2f32.powi(-11)), 0x3C02);
    }

    #[test]
    fn test_f16_to_f32_special_values() {
        assert_eq!(f16_to_f32(0x7C00), f32::INFINITY);
        assert_eq!(f16_to_f32(0xFC00), f32::NEG_INFINITY);
        assert!(f16_to_f32(f16_nan()).is_nan());
        assert_eq!(f16_to_f32(0x8000).to_bits(), (-0.0f32).to_bits());
        assert_eq!(f16_to_f32(0x3C00), 1.0);
    }

    #[test]
    fn test_bf16_truncates() {
        assert_eq!(f32_to_bf16(1.0), 0x3F80);
        assert_eq!(bf16_to_f32(0x3F80), 1.0);
        assert_eq!(f32_to_bf16(f32::INFINITY), 0x7F80);
        assert_eq!(f32_to_bf16(f32::NEG_INFINITY), 0xFF80);
        assert!(bf16_to_f32(f32_to_bf16(f32::NAN)).is_nan());
        assert_eq!(f32_to_bf16(-0.0), 0x8000);
        // A NaN whose payload lives only in the low bits stays a NaN.
        let low_nan = f32::from_bits(0x7F80_0001);
        assert!(bf16_to_f32(f32_to_bf16(low_nan)).is_nan());
    }

    #[test]
    fn test_vector_payloads() {
        let values = [1.0f32, -2.0, 0.5];
        let bytes = encode_float16_vector(&values);
        assert_eq!(bytes, vec![0x00, 0x3C, 0x00, 0xC0, 0x00, 0x38]);
        assert_eq!(decode_float16_vector(&bytes).expect("valid"), values.to_vec());

        let bytes = encode_bfloat16_vector(&values);
        assert_eq!(decode_bfloat16_vector(&bytes).expect("valid"), values.to_vec());

        assert!(decode_float16_vector(&[0x00]).is_err());
    }
}

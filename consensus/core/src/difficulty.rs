//! Compact target encoding and proof-of-work arithmetic.

use primitive_types::U256;

use crate::header::Header;
use crate::BlueWorkType;

/// Expands compact bits into a 256-bit target
pub fn compact_to_target(bits: u32) -> U256 {
    let exponent = (bits >> 24) as usize;
    let mantissa = bits & 0x007f_ffff;
    if exponent <= 3 {
        U256::from(mantissa >> (8 * (3 - exponent)))
    } else if exponent > 32 {
        U256::MAX
    } else {
        U256::from(mantissa) << (8 * (exponent - 3))
    }
}

/// Compresses a target into compact bits (loses precision below the top 3 bytes)
pub fn target_to_compact(target: U256) -> u32 {
    if target.is_zero() {
        return 0;
    }
    let mut size = (target.bits() + 7) / 8;
    let shifted = if size <= 3 { target.low_u64() << (8 * (3 - size)) } else { (target >> (8 * (size - 3))).low_u64() };
    let mut mantissa = shifted as u32;
    // The sign bit is not part of the mantissa
    if mantissa & 0x0080_0000 != 0 {
        mantissa >>= 8;
        size += 1;
    }
    ((size as u32) << 24) | mantissa
}

/// Expected number of hashes for a target: 2^256 / (target + 1)
pub fn calc_work(bits: u32) -> BlueWorkType {
    let target = compact_to_target(bits);
    if target == U256::MAX {
        return BlueWorkType::from(1u64);
    }
    if target.is_zero() {
        return BlueWorkType::MAX;
    }
    // (2^256 - target - 1) / (target + 1) + 1 == 2^256 / (target + 1)
    let work = (!target / (target + 1)) + 1;
    u256_to_blue_work(work)
}

/// Truncates to the low 192 bits; work above that bound is not reachable in practice
pub fn u256_to_blue_work(value: U256) -> BlueWorkType {
    let mut bytes = [0u8; 32];
    value.to_little_endian(&mut bytes);
    if bytes[24..].iter().any(|b| *b != 0) {
        return BlueWorkType::MAX;
    }
    let mut low = [0u8; 24];
    low.copy_from_slice(&bytes[..24]);
    BlueWorkType::from_le_bytes(low)
}

/// The header hash read as a little-endian number must not exceed the header target
pub fn check_proof_of_work(header: &Header) -> bool {
    let target = compact_to_target(header.bits);
    U256::from_little_endian(header.hash.as_bytes()) <= target
}

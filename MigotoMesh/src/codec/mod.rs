//! Numeric format conversions for vertex attribute encoding.
//!
//! Stateless helpers that quantize f32 attribute data into the byte formats a
//! D3D11 element list can demand: IEEE half floats and signed/unsigned
//! normalized 8/16-bit integers.
//!
//! Policy for malformed input: NaN encodes as 0 (the clamp step is NaN-aware
//! and resolves to the lower bound of the valid range), infinities clamp to
//! the nearest range bound. Out-of-range values clamp, they never wrap.
//! Normalized-integer rounding is half-away-from-zero (`f32::round`); half
//! float conversion is round-to-nearest-even per the `half` crate.

use half::f16;

/// Convert f32 to half-float (f16) bits.
#[must_use]
pub fn f32_to_half(value: f32) -> u16 {
    f16::from_f32(value).to_bits()
}

/// Convert half-float (f16) bits to f32.
#[must_use]
pub fn half_to_f32(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

/// Clamp to [-1, 1], mapping NaN to 0.
fn clamp_snorm(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { x.clamp(-1.0, 1.0) }
}

/// Clamp to [0, 1], mapping NaN to 0.
fn clamp_unorm(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// Encode a single value as signed normalized 8-bit.
#[must_use]
pub fn encode_snorm8(x: f32) -> i8 {
    (clamp_snorm(x) * 127.0).round() as i8
}

/// Decode a signed normalized 8-bit value.
#[must_use]
pub fn decode_snorm8(b: i8) -> f32 {
    (f32::from(b) / 127.0).clamp(-1.0, 1.0)
}

/// Encode a single value as unsigned normalized 8-bit.
#[must_use]
pub fn encode_unorm8(x: f32) -> u8 {
    (clamp_unorm(x) * 255.0).round() as u8
}

/// Decode an unsigned normalized 8-bit value.
#[must_use]
pub fn decode_unorm8(b: u8) -> f32 {
    f32::from(b) / 255.0
}

/// Encode a single value as signed normalized 16-bit.
#[must_use]
pub fn encode_snorm16(x: f32) -> i16 {
    (clamp_snorm(x) * 32767.0).round() as i16
}

/// Decode a signed normalized 16-bit value.
#[must_use]
pub fn decode_snorm16(b: i16) -> f32 {
    (f32::from(b) / 32767.0).clamp(-1.0, 1.0)
}

/// Encode a single value as unsigned normalized 16-bit.
#[must_use]
pub fn encode_unorm16(x: f32) -> u16 {
    (clamp_unorm(x) * 65535.0).round() as u16
}

/// Decode an unsigned normalized 16-bit value.
#[must_use]
pub fn decode_unorm16(b: u16) -> f32 {
    f32::from(b) / 65535.0
}

/// Encode 4 floats as `R8G8B8A8_SNORM` bytes (two's complement).
#[must_use]
pub fn f32x4_to_snorm8x4(v: [f32; 4]) -> [u8; 4] {
    v.map(|x| encode_snorm8(x) as u8)
}

/// Encode 4 floats as `R8G8B8A8_UNORM` bytes.
#[must_use]
pub fn f32x4_to_unorm8x4(v: [f32; 4]) -> [u8; 4] {
    v.map(encode_unorm8)
}

/// Encode 4 floats as `R16G16B16A16_SNORM` values.
#[must_use]
pub fn f32x4_to_snorm16x4(v: [f32; 4]) -> [i16; 4] {
    v.map(encode_snorm16)
}

/// Encode 2 floats as `R16G16_UNORM` values.
#[must_use]
pub fn f32x2_to_unorm16x2(v: [f32; 2]) -> [u16; 2] {
    v.map(encode_unorm16)
}

/// Encode a blend-weight row as unsigned normalized 8-bit, renormalizing so
/// the encoded bytes sum to exactly 255.
///
/// Callers pass weights that already sum to 1.0; per-slot rounding can still
/// leave the byte sum at 254 or 256, which makes skinned vertices visibly
/// shift in-game. The rounding residue is assigned to the slot holding the
/// largest original weight, ties broken toward the lowest slot index, so the
/// correction lands where it is least visible and the output is deterministic.
///
/// An all-zero row stays all-zero: zero-filled fallback slots must not gain
/// weight mass.
///
/// Works for any row length (4 for `R8G8B8A8_UNORM`, or the schema-declared
/// influence count for `R8_UNORM` array elements).
#[must_use]
pub fn encode_unorm8_weights(row: &[f32]) -> Vec<u8> {
    let clamped: Vec<f32> = row.iter().copied().map(clamp_unorm).collect();
    let mut bytes: Vec<u8> = clamped.iter().map(|&w| (w * 255.0).round() as u8).collect();

    let sum: i32 = bytes.iter().map(|&b| i32::from(b)).sum();
    if sum == 0 {
        return bytes;
    }

    let residue = 255 - sum;
    if residue != 0 {
        let mut largest = 0usize;
        for (i, &w) in clamped.iter().enumerate() {
            if w > clamped[largest] {
                largest = i;
            }
        }
        bytes[largest] = (i32::from(bytes[largest]) + residue).clamp(0, 255) as u8;
    }

    bytes
}

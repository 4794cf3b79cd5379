// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use base64::{engine::general_purpose, Engine as _};

/// Encode `n` in as few little-endian bytes as its width needs (1, 2, 4 or 8), as URL safe
/// base 64 without padding.
pub fn compact_id(n: u64) -> String {
    let data = n.to_le_bytes();
    let width = if n >> 32 != 0 {
        8
    } else if n >> 16 != 0 {
        4
    } else if n >> 8 != 0 {
        2
    } else {
        1
    };
    general_purpose::URL_SAFE_NO_PAD.encode(&data[..width])
}

/// Decode a `compact_id`, returning `None` if it isn't one. Only the shortest encoding is
/// accepted, so `"AAA"` (zero padded to two bytes) is rejected in favour of `"AA"`.
pub fn compact_id_to_u64(s: &str) -> Option<u64> {
    let data = general_purpose::URL_SAFE_NO_PAD.decode(s).ok()?;
    if !matches!(data.len(), 1 | 2 | 4 | 8) {
        return None;
    }
    let mut bytes = [0u8; 8];
    bytes[..data.len()].copy_from_slice(&data);
    let n = u64::from_le_bytes(bytes);
    (compact_id(n) == s).then_some(n)
}

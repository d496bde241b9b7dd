//{{ Liquid }}
//Copyright (C) {{ 2015,2016,2017,2018 }}  {{ Blockstream }}

//This program is free software: you can redistribute it and/or modify
//it under the terms of the GNU Affero General Public License as published by
//the Free Software Foundation, either version 3 of the License, or
//(at your option) any later version.

//This program is distributed in the hope that it will be useful,
//but WITHOUT ANY WARRANTY; without even the implied warranty of
//MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//GNU Affero General Public License for more details.

//You should have received a copy of the GNU Affero General Public License
//along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Utilities
//! Script number encoding used by timelock pushes

/// Encode an integer in the minimal little-endian sign-magnitude format
/// scripts use for numbers. Zero encodes to the empty vector.
pub fn build_scriptint(n: i64) -> Vec<u8> {
    if n == 0 {
        return vec![];
    }

    let neg = n < 0;

    let mut abs = n.unsigned_abs();
    let mut v = vec![];
    while abs > 0xFF {
        v.push((abs & 0xFF) as u8);
        abs >>= 8;
    }
    // If the top byte has its sign bit set we need an extra byte to
    // carry the sign.
    if abs & 0x80 != 0 {
        v.push(abs as u8);
        v.push(if neg { 0x80u8 } else { 0u8 });
    } else {
        abs |= if neg { 0x80 } else { 0 };
        v.push(abs as u8);
    }
    v
}

/// Decode a script number. Returns `None` if the encoding is longer than
/// `max_len` bytes or is not minimal.
pub fn read_scriptint(v: &[u8], max_len: usize) -> Option<i64> {
    if v.is_empty() {
        return Some(0);
    }
    if v.len() > max_len || v.len() > 8 {
        return None;
    }
    let last = v[v.len() - 1];
    // Minimality: the top byte may only be 0x00/0x80 if the byte below
    // it needs its high bit for the magnitude.
    if last & 0x7f == 0 && (v.len() == 1 || v[v.len() - 2] & 0x80 == 0) {
        return None;
    }

    let mut ret: i64 = 0;
    for (i, byte) in v.iter().enumerate() {
        ret |= i64::from(*byte) << (8 * i);
    }
    if last & 0x80 != 0 {
        ret &= !(0x80i64 << (8 * (v.len() - 1)));
        ret = -ret;
    }
    Some(ret)
}

/// Decode big-endian hex as used for delays in configuration, e.g. "05cf".
pub fn parse_be_hex_u32(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 8 {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}

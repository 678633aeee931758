//! CHECKSUM and DATASUM keywords.
//!
//! The 32-bit ones-complement sum over big-endian 16-bit words, encoded as
//! sixteen alphanumeric characters so that a stamped HDU sums to -0.

use crate::block::{padded_byte_len, BLOCK_SIZE};
use crate::error::Result;
use crate::hdu::Hdu;
use crate::header::{card_string, serialize_header, Card};
use crate::value::Value;

/// Value written to CHECKSUM while the header sum is computed.
const CHECKSUM_PLACEHOLDER: &str = "0000000000000000";

// ── Ones-complement sum ──

/// Ones-complement sum of `data`, zero-padded to a whole number of blocks.
pub fn checksum_bytes(data: &[u8]) -> u32 {
    let mut sum = 0u32;
    let mut blocks = data.chunks_exact(BLOCK_SIZE);
    for block in &mut blocks {
        sum = accumulate(sum, block);
    }
    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut block = [0u8; BLOCK_SIZE];
        block[..tail.len()].copy_from_slice(tail);
        sum = accumulate(sum, &block);
    }
    sum
}

fn accumulate(sum: u32, block: &[u8]) -> u32 {
    let mut hi = u64::from(sum >> 16);
    let mut lo = u64::from(sum & 0xFFFF);
    for word in block.chunks_exact(4) {
        hi += u64::from(u16::from_be_bytes([word[0], word[1]]));
        lo += u64::from(u16::from_be_bytes([word[2], word[3]]));
    }
    fold(hi, lo)
}

fn fold(mut hi: u64, mut lo: u64) -> u32 {
    loop {
        let (hicarry, locarry) = (hi >> 16, lo >> 16);
        if hicarry | locarry == 0 {
            return ((hi << 16) | lo) as u32;
        }
        hi = (hi & 0xFFFF) + locarry;
        lo = (lo & 0xFFFF) + hicarry;
    }
}

/// Ones-complement addition of two 32-bit sums.
pub fn ones_complement_add(a: u32, b: u32) -> u32 {
    fold(
        u64::from(a >> 16) + u64::from(b >> 16),
        u64::from(a & 0xFFFF) + u64::from(b & 0xFFFF),
    )
}

// ── ASCII encoding ──

/// Punctuation between the digits and letters, never emitted.
const EXCLUDE: [u8; 13] = [
    b':', b';', b'<', b'=', b'>', b'?', b'@', b'[', b'\\', b']', b'^', b'_', b'`',
];

/// Encode a sum as 16 ASCII characters, complemented when `complement`.
pub fn encode_checksum(sum: u32, complement: bool) -> [u8; 16] {
    let value = if complement { !sum } else { sum };
    let mut interleaved = [0u8; 16];
    for (i, byte) in value.to_be_bytes().into_iter().enumerate() {
        let quotient = byte / 4 + b'0';
        let mut ch = [quotient; 4];
        ch[0] += byte % 4;

        // Shift pairs away from excluded characters, preserving their sum.
        let mut adjusted = true;
        while adjusted {
            adjusted = false;
            for pair in ch.chunks_exact_mut(2) {
                if EXCLUDE.contains(&pair[0]) || EXCLUDE.contains(&pair[1]) {
                    pair[0] += 1;
                    pair[1] -= 1;
                    adjusted = true;
                }
            }
        }

        for (j, &c) in ch.iter().enumerate() {
            interleaved[4 * j + i] = c;
        }
    }

    let mut out = [0u8; 16];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = interleaved[(i + 15) % 16];
    }
    out
}

/// Decode 16 ASCII characters back into a sum.
pub fn decode_checksum(ascii: &[u8; 16], complement: bool) -> u32 {
    let mut hi = 0u64;
    let mut lo = 0u64;
    for i in (0..16).step_by(4) {
        let c = |k: usize| u64::from(ascii[(i + k + 1) % 16].wrapping_sub(b'0'));
        hi += (c(0) << 8) + c(1);
        lo += (c(2) << 8) + c(3);
    }
    let sum = fold(hi, lo);
    if complement {
        !sum
    } else {
        sum
    }
}

// ── Stamping ──

/// Replace any CHECKSUM/DATASUM in `cards` with values computed for a
/// header made of the returned cards followed by `data` (unpadded).
pub fn stamp_checksum(cards: &[Card], data: &[u8]) -> Result<Vec<Card>> {
    let mut stamped: Vec<Card> = cards
        .iter()
        .filter(|c| c.keyword != "CHECKSUM" && c.keyword != "DATASUM")
        .cloned()
        .collect();

    let datasum = checksum_bytes(data);
    stamped.push(
        Card::new("CHECKSUM", Value::String(CHECKSUM_PLACEHOLDER.into()))
            .with_comment("HDU checksum"),
    );
    stamped.push(
        Card::new("DATASUM", Value::String(datasum.to_string()))
            .with_comment("data unit checksum"),
    );

    let header_sum = checksum_bytes(&serialize_header(&stamped)?);
    let encoded = encode_checksum(ones_complement_add(header_sum, datasum), true);
    let checksum: String = encoded.iter().map(|&b| b as char).collect();
    if let Some(card) = stamped.iter_mut().find(|c| c.keyword == "CHECKSUM") {
        card.value = Some(Value::String(checksum));
    }
    Ok(stamped)
}

// ── Verification ──

/// Check DATASUM against the HDU's data. `None` when the keyword is absent.
pub fn verify_datasum(fits_data: &[u8], hdu: &Hdu) -> Option<bool> {
    let stored = card_string(&hdu.cards, "DATASUM")?;
    let Ok(expected) = stored.parse::<u64>() else {
        return Some(false);
    };
    let data = hdu.data(fits_data).ok()?;
    Some(u64::from(checksum_bytes(data)) == expected)
}

/// Check that the whole HDU sums to -0. `None` when CHECKSUM is absent.
pub fn verify_checksum(fits_data: &[u8], hdu: &Hdu) -> Option<bool> {
    card_string(&hdu.cards, "CHECKSUM")?;
    let end = hdu.data_start + padded_byte_len(hdu.data_len);
    let bytes = fits_data.get(hdu.header_start..end.min(fits_data.len()))?;
    let sum = checksum_bytes(bytes);
    Some(sum == 0 || sum == u32::MAX)
}

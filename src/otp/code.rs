//! Passcode generation.

use rand::seq::SliceRandom;
use rand::Rng;

/// Number of digits in a passcode.
pub const CODE_LENGTH: usize = 6;

const DIGITS: [u8; 10] = *b"0123456789";

/// Generate a passcode from the thread-local CSPRNG.
pub fn generate_code() -> String {
    generate_code_with(&mut rand::thread_rng())
}

/// Generate a passcode of six pairwise distinct digits.
///
/// The digits are the prefix of a partial Fisher-Yates shuffle of the ten
/// decimal digits, so every ordered 6-of-10 selection is equally likely.
pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut digits = DIGITS;
    let (picked, _) = digits.partial_shuffle(rng, CODE_LENGTH);
    picked.iter().map(|&d| d as char).collect()
}

/// Whether `code` has the shape of an issued passcode.
pub fn is_well_formed(code: &str) -> bool {
    if code.len() != CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let mut seen = [false; 10];
    for b in code.bytes() {
        let slot = &mut seen[(b - b'0') as usize];
        if *slot {
            return false;
        }
        *slot = true;
    }
    true
}

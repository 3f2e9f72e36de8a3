//! Response text decoding.
//!
//! Gopherspace predates UTF-8 everywhere, so decoding is an ordered
//! chain of strict attempts: UTF-8, then the charset detector's best
//! guess, then the user-configured fallback encoding. Replacement
//! characters are never silently substituted -- an attempt either
//! decodes cleanly or the next one is tried.

use burrow_types::{BurrowError, Result};

/// Decode raw response bytes into text.
///
/// Fails with [`BurrowError::Decode`] only when every attempt fails.
/// In practice the chain is effectively total: the detector only
/// guesses a multi-byte encoding when the bytes validate under it, and
/// its single-byte guesses (windows-1252 and friends) decode every
/// byte, so the error arm is defensive rather than a path callers
/// should expect to see. The result always ends in a newline so
/// downstream line splitting is well-defined.
pub fn decode(raw: &[u8], fallback_label: &str) -> Result<String> {
    // (a) Strict UTF-8.
    if let Ok(text) = std::str::from_utf8(raw) {
        return Ok(normalize_trailing_newline(text.to_string()));
    }

    // (b) Detector's best guess, decoded strictly.
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(raw, true);
    let guess = detector.guess(None, true);
    if guess != encoding_rs::UTF_8
        && let Some(text) = guess.decode_without_bom_handling_and_without_replacement(raw)
    {
        log::debug!("decoded response as detected charset {}", guess.name());
        return Ok(normalize_trailing_newline(text.into_owned()));
    }

    // (c) Configured fallback encoding.
    if let Some(encoding) = encoding_rs::Encoding::for_label(fallback_label.as_bytes())
        && let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(raw)
    {
        log::debug!("decoded response as fallback charset {}", encoding.name());
        return Ok(normalize_trailing_newline(text.into_owned()));
    }

    Err(BurrowError::Decode)
}

/// Append CRLF when the text does not already end in a newline.
fn normalize_trailing_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push_str("\r\n");
    }
    text
}

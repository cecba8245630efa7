// Separator framing for batch translation.
//
// A batch travels as one string with the units joined by `SEPARATOR`; the
// reply is split on the bare marker so that models which drop the
// surrounding newlines are still understood.

use tracing::warn;

/// Joins units inside a request.
pub const SEPARATOR: &str = "\n###SEG_SEP###\n";

/// What the reply is split on.
pub const MARKER: &str = "###SEG_SEP###";

pub fn join_units<S: AsRef<str>>(units: &[S]) -> String {
    units
        .iter()
        .map(|u| u.as_ref().trim())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Splits a reply into exactly `expected` slots.
///
/// A trailing empty piece (the model echoed a final separator) is dropped.
/// Extra pieces are discarded and missing ones become `None`; empty pieces
/// are `None` as well, meaning the original text is kept.
pub fn split_units(reply: &str, expected: usize) -> Vec<Option<String>> {
    let mut pieces: Vec<String> = reply.split(MARKER).map(|p| p.trim().to_string()).collect();

    if pieces.len() > expected && pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }

    if pieces.len() != expected {
        warn!(
            "Translation returned {} units for {} inputs; aligning by position",
            pieces.len(),
            expected
        );
    }

    let mut slots: Vec<Option<String>> = pieces
        .into_iter()
        .take(expected)
        .map(|p| (!p.is_empty()).then_some(p))
        .collect();
    slots.resize(expected, None);
    slots
}

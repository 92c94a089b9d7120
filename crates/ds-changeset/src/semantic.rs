// semantic.rs — Field-wise equality and a cheap content signature.
//
// Every write path short-circuits through here: if a candidate is
// semantically equal to what is already there, nothing needs to change.
//
// Contract: hash(a) != hash(b) implies !equal(a, b). The converse does not
// hold, so wherever correctness matters the full comparison is the judge.

use crate::record::Record;

/// Signature used for the "delete whole slot" marker.
pub const NULL_HASH: &str = "NULL";

/// Positional, field-wise equality of two record sequences.
///
/// `None` is only equal to `None`. Otherwise both sequences must have the
/// same length and, index by index, the same `code`, `amount` and `note`.
/// No reordering tolerance.
pub fn equal(a: Option<&[Record]>, b: Option<&[Record]>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => equal_slices(a, b),
        _ => false,
    }
}

/// Equality over two present sequences.
pub fn equal_slices(a: &[Record], b: &[Record]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| record_equal(x, y))
}

/// Single-record equality, the granularity the diff classifier works at.
pub fn record_equal(a: &Record, b: &Record) -> bool {
    a.code == b.code && amount_of(a) == amount_of(b) && a.note_text() == b.note_text()
}

/// Cheap signature: `"<count>|<sumAmount>|<first3 codes>|<last3 codes>"`.
///
/// Not collision-free. An empty sequence hashes to `"0|0||"`.
pub fn hash(records: &[Record]) -> String {
    if records.is_empty() {
        return "0|0||".to_string();
    }
    let mut total = 0.0_f64;
    for r in records {
        total += amount_of(r);
    }
    // Normalize -0 so an all-zero day always renders as "0".
    if total == 0.0 {
        total = 0.0;
    }
    let first = join_codes(records.iter().take(3));
    let last = join_codes(records.iter().skip(records.len().saturating_sub(3)));
    format!("{}|{}|{}|{}", records.len(), total, first, last)
}

/// Signature of an optional sequence; `None` maps to [`NULL_HASH`].
pub fn hash_opt(records: Option<&[Record]>) -> String {
    match records {
        Some(records) => hash(records),
        None => NULL_HASH.to_string(),
    }
}

// NaN amounts count as zero, the same way a missing amount does.
fn amount_of(r: &Record) -> f64 {
    if r.amount.is_nan() {
        0.0
    } else {
        r.amount
    }
}

fn join_codes<'a>(records: impl Iterator<Item = &'a Record>) -> String {
    records
        .map(|r| r.code.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

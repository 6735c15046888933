//! Extraction of payment references from gateway transfer memos.
//!
//! A transfer memo is free text typed by the customer or rewritten by their
//! bank, so it may carry noise around the reference ("Thanh toan TK2025...",
//! "MBVCB.123.ORD42.CT tu ..."). The structured `code` field, when the gateway
//! supplies one, is taken as-is.

use regex::Regex;
use std::sync::LazyLock;

pub const ORDER_PREFIX: &str = "ORD";
pub const BOOKING_PREFIX: &str = "TK";
pub const FALLBACK_MIN_DIGITS: usize = 6;

static ORDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ORD\d+").expect("order pattern is valid"));
static BOOKING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)TK\d+").expect("booking pattern is valid"));
static DIGITS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{6,}").expect("digit pattern is valid"));

/// What kind of entity a payment reference points at, judged by its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Order,
    Booking,
    Unknown,
}

impl ReferenceKind {
    pub fn of(reference: &str) -> Self {
        if reference.starts_with(ORDER_PREFIX) {
            ReferenceKind::Order
        } else if reference.starts_with(BOOKING_PREFIX) {
            ReferenceKind::Booking
        } else {
            ReferenceKind::Unknown
        }
    }
}

/// Returns the canonical payment reference for a notification.
///
/// A non-blank structured code wins outright. Otherwise the memo is scanned for
/// an order reference, then a booking reference, then any run of at least
/// [`FALLBACK_MIN_DIGITS`] digits.
pub fn extract_payment_reference(memo: &str, code: Option<&str>) -> Option<String> {
    if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
        return Some(code.to_uppercase());
    }

    [&*ORDER_PATTERN, &*BOOKING_PATTERN, &*DIGITS_PATTERN]
        .into_iter()
        .find_map(|pattern| pattern.find(memo))
        .map(|m| m.as_str().to_uppercase())
}

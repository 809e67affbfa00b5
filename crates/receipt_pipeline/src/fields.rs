//! Contact details found in recognised receipt text.

use crate::types::ReceiptFields;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // 555-123-4567, (555) 123 4567, 1-555-1234567 ...
    pub static ref PHONE_PATTERN: Regex = Regex::new(
        r"([0-9]( |-)?)?(\(?[0-9]{3}\)?|[0-9]{3})( |-)?([0-9]{3}( |-)?[0-9]{4}|[0-9]{7})"
    ).unwrap();

    pub static ref STREET_ADDRESS_PATTERN: Regex = Regex::new(
        r"\d{1,3}.?\d{0,3}\s[a-zA-Z]{2,30}\s[a-zA-Z]{2,15}"
    ).unwrap();

    pub static ref EMAIL_PATTERN: Regex = Regex::new(
        r"\w+@[a-zA-Z_]+?\.[a-zA-Z]{2,3}"
    ).unwrap();
}

fn first_match(text: &str, pattern: &Regex) -> Option<String> {
    pattern.find(text).map(|m| m.as_str().to_string())
}

pub fn find_phone(text: &str) -> Option<String> {
    first_match(text, &PHONE_PATTERN)
}

pub fn find_email(text: &str) -> Option<String> {
    first_match(text, &EMAIL_PATTERN)
}

pub fn find_street(text: &str) -> Option<String> {
    first_match(text, &STREET_ADDRESS_PATTERN)
}

/// Pull every supported field out of `text`
pub fn extract_fields(text: &str) -> ReceiptFields {
    ReceiptFields {
        phone: find_phone(text),
        email: find_email(text),
        address: find_street(text),
    }
}

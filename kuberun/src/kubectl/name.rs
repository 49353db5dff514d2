//! Syntax rules for object names, label keys and values, and environment variable names. See
//! https://kubernetes.io/docs/concepts/overview/working-with-objects/names/ and
//! https://kubernetes.io/docs/concepts/overview/working-with-objects/labels/#syntax-and-character-set.

use std::borrow::Cow;

pub const LABEL_NAME_MAX_LEN: usize = 63;
pub const DNS_SUBDOMAIN_MAX_LEN: usize = 253;

fn is_ascii_lowercase_numeric(byte: u8) -> bool {
    matches!(byte, b'a'..=b'z' | b'0'..=b'9')
}

fn is_ascii_lowercase_numeric_or_dash(byte: u8) -> bool {
    matches!(byte, b'a'..=b'z' | b'0'..=b'9' | b'-')
}

/// Returns true if the input matches `^[a-z]([-a-z0-9]*[a-z0-9])?$`.
pub fn is_rfc_1035_label(value: &(impl AsRef<[u8]> + ?Sized)) -> bool {
    fn inner(value: &[u8]) -> bool {
        match value {
            [] => false,
            [only] => only.is_ascii_lowercase(),
            [first, middle @ .., last] => {
                value.len() <= LABEL_NAME_MAX_LEN
                    && first.is_ascii_lowercase()
                    && middle.iter().copied().all(is_ascii_lowercase_numeric_or_dash)
                    && is_ascii_lowercase_numeric(*last)
            }
        }
    }
    inner(value.as_ref())
}

/// Returns true if the input matches `^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$`
/// and is at most 253 characters long.
pub fn is_dns_subdomain(value: &str) -> bool {
    value.len() <= DNS_SUBDOMAIN_MAX_LEN
        && value.split('.').all(|part| {
            let bytes = part.as_bytes();
            match bytes {
                [] => false,
                [only] => is_ascii_lowercase_numeric(*only),
                [first, middle @ .., last] => {
                    is_ascii_lowercase_numeric(*first)
                        && middle.iter().copied().all(is_ascii_lowercase_numeric_or_dash)
                        && is_ascii_lowercase_numeric(*last)
                }
            }
        })
}

/// Label names and values consist of alphanumerics, `-`, `_` and `.`, and start and end with an
/// alphanumeric.
fn is_label_name(value: &str) -> bool {
    let bytes = value.as_bytes();
    let inner_ok = |b: &u8| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.');
    match bytes {
        [] => false,
        [only] => only.is_ascii_alphanumeric(),
        [first, middle @ .., last] => {
            bytes.len() <= LABEL_NAME_MAX_LEN
                && first.is_ascii_alphanumeric()
                && middle.iter().all(inner_ok)
                && last.is_ascii_alphanumeric()
        }
    }
}

/// A label key is an optional DNS subdomain prefix followed by `/` and a name.
pub fn is_label_key(value: &str) -> bool {
    match value.split_once('/') {
        Some((prefix, name)) => is_dns_subdomain(prefix) && is_label_name(name),
        None => is_label_name(value),
    }
}

/// A label value may also be empty.
pub fn is_label_value(value: &str) -> bool {
    value.is_empty() || is_label_name(value)
}

/// Matches `^[-._a-zA-Z][-._a-zA-Z0-9]*$`.
pub fn is_env_var_name(value: &str) -> bool {
    let mut bytes = value.bytes();
    let Some(first) = bytes.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || matches!(first, b'-' | b'.' | b'_'))
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_'))
}

/// Lossily converts the input into an RFC 1035 label, e.g. to derive an object name from an image
/// name. Returns `None` if there are not enough alphanumeric characters to build one.
pub fn to_rfc_1035_label_lossy(input: &(impl AsRef<[u8]> + ?Sized)) -> Option<Cow<'_, str>> {
    fn inner(input: &[u8]) -> Option<Cow<'_, str>> {
        let input = &input[..input.len().min(LABEL_NAME_MAX_LEN)];

        let start = input.iter().position(u8::is_ascii_lowercase)?;

        // `start` is a lowercase letter so the range is never empty.
        let end = input
            .iter()
            .rposition(|&byte| is_ascii_lowercase_numeric(byte))
            .filter(|&end| end > start)
            .unwrap_or(start)
            + 1;

        let trimmed = &input[start..end];
        if is_rfc_1035_label(trimmed) {
            // All bytes are ASCII.
            return std::str::from_utf8(trimmed).ok().map(Cow::Borrowed);
        }

        let mut output = String::with_capacity(trimmed.len());
        let mut can_append_dash = true;
        for &byte in trimmed {
            if is_ascii_lowercase_numeric_or_dash(byte) {
                output.push(char::from(byte));
                can_append_dash = byte != b'-';
            } else if can_append_dash {
                output.push('-');
                can_append_dash = false;
            }
        }

        debug_assert!(is_rfc_1035_label(&output));
        Some(Cow::Owned(output))
    }
    inner(input.as_ref())
}

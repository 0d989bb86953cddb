//! Recipient phone normalization and the demo allow-list.

use std::collections::HashSet;

/// Numbers approved to receive messages while the service runs in demo mode.
pub const DEMO_ALLOW_LIST: [&str; 4] = [
    "+918329391715",
    "+919867542729",
    "+918097783653",
    "+919152274885",
];

/// Normalize a stored phone number to E.164 using the Indian country code:
/// whitespace is removed, numbers starting with `91` gain a `+`, any other
/// number without a `+` gains `+91`.
pub fn normalize_phone(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with('+') {
        compact
    } else if compact.starts_with("91") {
        format!("+{compact}")
    } else {
        format!("+91{compact}")
    }
}

/// Set of normalized phone numbers that may be messaged on any channel.
#[derive(Debug, Clone)]
pub struct AllowList {
    numbers: HashSet<String>,
}

impl AllowList {
    pub fn demo() -> Self {
        Self::from_numbers(DEMO_ALLOW_LIST)
    }

    pub fn from_numbers<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            numbers: numbers.into_iter().map(Into::into).collect(),
        }
    }

    /// `normalized` must already be the output of [`normalize_phone`].
    pub fn permits(&self, normalized: &str) -> bool {
        self.numbers.contains(normalized)
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::demo()
    }
}

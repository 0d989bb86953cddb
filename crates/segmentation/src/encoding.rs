//! Call-local label encoding for categorical columns.
//!
//! The alphabet is rebuilt from every batch, so codes are only meaningful
//! within the execution that produced them.

/// Maps each distinct value to its index in the sorted set of values seen
/// at fit time.
#[derive(Debug, Clone, Default)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut classes: Vec<String> = values.into_iter().map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn encode(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
    }
}

/// Fit an encoder on `values` and return the code of each value in order.
pub fn encode_column<'a>(values: impl IntoIterator<Item = &'a str> + Clone) -> Vec<usize> {
    let encoder = LabelEncoder::fit(values.clone());
    values
        .into_iter()
        .map(|value| encoder.encode(value).unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_sorted_order() {
        let values = ["Life", "Car", "Health", "Car", "Home"];
        let encoder = LabelEncoder::fit(values);
        let codes: Vec<_> = ["Car", "Health", "Home", "Life"]
            .iter()
            .map(|class| encoder.encode(class))
            .collect();
        assert_eq!(codes, vec![Some(0), Some(1), Some(2), Some(3)]);
        assert_eq!(encoder.encode("Travel"), None);

        assert_eq!(encode_column(values), vec![3, 0, 1, 0, 2]);
    }

    #[test]
    fn test_alphabet_depends_on_batch() {
        assert_eq!(encode_column(["Marriage", "None"]), vec![0, 1]);
        assert_eq!(encode_column(["New Job", "None"]), vec![0, 1]);
        assert_eq!(encode_column(["Marriage", "New Job", "None"]), vec![0, 1, 2]);
    }
}

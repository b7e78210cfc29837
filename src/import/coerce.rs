use crate::types::{LabelDefinition, LabelType, LabelValue};

const TRUE_WORDS: [&str; 5] = ["true", "t", "yes", "y", "1"];
const FALSE_WORDS: [&str; 5] = ["false", "f", "no", "n", "0"];

/// Coerce a raw CSV cell to the target label's type.
///
/// Coercion never fails: unrecognized values fall back to the label's
/// default (false for booleans, the first possible value for categories)
/// rather than aborting the row.
pub fn coerce_label_value(raw: &str, definition: &LabelDefinition) -> LabelValue {
    match definition.label_type {
        LabelType::Boolean => LabelValue::Bool(coerce_boolean(raw)),
        LabelType::Category => {
            LabelValue::Text(coerce_category(raw, &definition.possible_values))
        }
    }
}

fn coerce_boolean(raw: &str) -> bool {
    let value = raw.trim().to_lowercase();
    if TRUE_WORDS.contains(&value.as_str()) {
        return true;
    }
    if FALSE_WORDS.contains(&value.as_str()) {
        return false;
    }
    // Numeric cells: non-zero is true, zero is false
    if let Ok(number) = value.parse::<f64>() {
        return number != 0.0;
    }
    false
}

fn coerce_category(raw: &str, possible_values: &[String]) -> String {
    let value = raw.trim();
    // Exact match wins
    if possible_values.iter().any(|candidate| candidate == value) {
        return value.to_string();
    }
    // Then case-insensitive
    let lowered = value.to_lowercase();
    if let Some(matched) = possible_values
        .iter()
        .find(|candidate| candidate.to_lowercase() == lowered)
    {
        return matched.clone();
    }
    // Otherwise default to the first possible value
    possible_values.first().cloned().unwrap_or_default()
}

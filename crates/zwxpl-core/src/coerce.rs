//! Loose value grammar for inbound bus fields.

use serde_json::Value;
use zwxpl_types::ZValue;

/// Strings accepted as `true`, compared case-insensitively.
const TRUE_WORDS: &[&str] = &["true", "1", "t", "ok", "on", "active", "enable", "enabled"];

/// Permissive boolean test used for flags such as `security` or a switch's
/// `current`.
///
/// Booleans are taken as-is, numbers are true when non-zero, strings are true
/// only when they are one of `true, 1, t, ok, on, active, enable, enabled`.
pub fn is_true(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => {
            let s = s.trim();
            TRUE_WORDS.iter().any(|word| word.eq_ignore_ascii_case(s))
        }
        _ => false,
    }
}

/// Parse a field as a finite decimal number.
pub fn as_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Coerce a raw-literal `current` into a driver value: `"true"`/`"false"`
/// become booleans, numeric text becomes a float, anything else is passed
/// through untouched.
pub fn coerce_literal(value: &Value) -> ZValue {
    match value {
        Value::Bool(b) => ZValue::Bool(*b),
        Value::Number(n) => n.as_f64().map_or_else(|| ZValue::Text(n.to_string()), ZValue::Float),
        Value::String(s) if s == "true" => ZValue::Bool(true),
        Value::String(s) if s == "false" => ZValue::Bool(false),
        Value::String(s) => match as_number(Some(value)) {
            Some(number) => ZValue::Float(number),
            None => ZValue::Text(s.clone()),
        },
        other => ZValue::Text(other.to_string()),
    }
}

/// JSON number for `value`, integral values rendered without a fraction.
pub fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn true_words_are_accepted_case_insensitively() {
        for word in ["true", "1", "t", "ok", "on", "active", "enable", "enabled"] {
            assert!(is_true(Some(&json!(word))), "{word}");
            assert!(is_true(Some(&json!(word.to_uppercase()))), "{word} uppercase");
        }
        assert!(is_true(Some(&json!("Enabled"))));
    }

    #[test]
    fn other_strings_are_false() {
        for word in ["false", "0", "off", "yes", "2", "", "truthy", "disable"] {
            assert!(!is_true(Some(&json!(word))), "{word}");
        }
    }

    #[test]
    fn booleans_and_numbers() {
        assert!(is_true(Some(&json!(true))));
        assert!(!is_true(Some(&json!(false))));
        assert!(!is_true(Some(&json!(0))));
        assert!(!is_true(Some(&json!(0.0))));
        assert!(is_true(Some(&json!(1))));
        assert!(is_true(Some(&json!(-3))));
        assert!(is_true(Some(&json!(0.5))));
    }

    #[test]
    fn missing_or_structured_values_are_false() {
        assert!(!is_true(None));
        assert!(!is_true(Some(&Value::Null)));
        assert!(!is_true(Some(&json!(["on"]))));
    }

    #[test]
    fn coerce_literal_handles_booleans_numbers_and_text() {
        assert_eq!(coerce_literal(&json!("true")), ZValue::Bool(true));
        assert_eq!(coerce_literal(&json!("false")), ZValue::Bool(false));
        assert_eq!(coerce_literal(&json!("300")), ZValue::Float(300.0));
        assert_eq!(coerce_literal(&json!("-2.5")), ZValue::Float(-2.5));
        assert_eq!(coerce_literal(&json!(12)), ZValue::Float(12.0));
        assert_eq!(coerce_literal(&json!("Auto")), ZValue::Text("Auto".to_string()));
        // Only the exact lowercase literals become booleans.
        assert_eq!(coerce_literal(&json!("TRUE")), ZValue::Text("TRUE".to_string()));
        assert_eq!(coerce_literal(&json!("inf")), ZValue::Text("inf".to_string()));
    }

    #[test]
    fn as_number_rejects_non_finite_and_text() {
        assert_eq!(as_number(Some(&json!(" 42 "))), Some(42.0));
        assert_eq!(as_number(Some(&json!("NaN"))), None);
        assert_eq!(as_number(Some(&json!("abc"))), None);
        assert_eq!(as_number(None), None);
    }

    #[test]
    fn number_value_drops_integral_fraction() {
        assert_eq!(number_value(50.0), json!(50));
        assert_eq!(number_value(12.5), json!(12.5));
    }
}

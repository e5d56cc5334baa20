//! Pure evaluation of stored workflow conditions against an entity snapshot.

use serde_json::{Number, Value};

use crate::workflow::{ConditionNode, ConditionOperator, WorkflowConditions};

/// Returns true when every condition holds for the snapshot.
///
/// An empty condition map always matches. Field names resolve as a
/// top-level key first and fall back to a dot-separated path.
#[must_use]
pub fn matches_conditions(conditions: &WorkflowConditions, snapshot: &Value) -> bool {
    conditions
        .iter()
        .all(|(field, node)| matches_condition(node, field_value(snapshot, field)))
}

/// Evaluates one condition against an optional entity value.
#[must_use]
pub fn matches_condition(node: &ConditionNode, entity_value: Option<&Value>) -> bool {
    let Some(entity_value) = entity_value else {
        // Absent fields only satisfy not_equals against a present value.
        return node.operator == ConditionOperator::NotEquals && !node.value.is_null();
    };

    match node.operator {
        ConditionOperator::Equals => values_equal(entity_value, &node.value),
        ConditionOperator::NotEquals => !values_equal(entity_value, &node.value),
        ConditionOperator::Contains => contains(entity_value, &node.value),
        ConditionOperator::GreaterThan => compare_numeric(entity_value, &node.value)
            .is_some_and(|ordering| ordering.is_gt()),
        ConditionOperator::LessThan => compare_numeric(entity_value, &node.value)
            .is_some_and(|ordering| ordering.is_lt()),
    }
}

fn field_value<'a>(snapshot: &'a Value, field: &str) -> Option<&'a Value> {
    let object = snapshot.as_object()?;
    if let Some(value) = object.get(field) {
        return Some(value);
    }

    if !field.contains('.') {
        return None;
    }

    let mut current = snapshot;
    for segment in field.split('.') {
        if segment.is_empty() {
            return None;
        }

        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

/// Deep equality where numbers compare by numeric value (`1 == 1.0`).
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => numbers_equal(left, right),
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right.iter())
                    .all(|(left, right)| values_equal(left, right))
        }
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, left_value)| {
                    right
                        .get(key)
                        .is_some_and(|right_value| values_equal(left_value, right_value))
                })
        }
        _ => left == right,
    }
}

/// Integers compare exactly; `f64` is only used when a float is involved.
fn numbers_equal(left: &Number, right: &Number) -> bool {
    if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
        return left == right;
    }
    if let (Some(left), Some(right)) = (left.as_u64(), right.as_u64()) {
        return left == right;
    }
    if !left.is_f64() && !right.is_f64() {
        return false;
    }

    match (left.as_f64(), right.as_f64()) {
        (Some(left), Some(right)) => left == right,
        _ => left == right,
    }
}

fn contains(entity_value: &Value, needle: &Value) -> bool {
    match entity_value {
        Value::String(haystack) => needle
            .as_str()
            .is_some_and(|needle| haystack.contains(needle)),
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        _ => false,
    }
}

fn compare_numeric(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    let left = numeric(left)?;
    let right = numeric(right)?;
    left.partial_cmp(&right)
}

fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{Value, json};

    use super::{matches_condition, matches_conditions};
    use crate::workflow::{ConditionNode, ConditionOperator, WorkflowConditions};

    fn conditions(entries: &[(&str, ConditionOperator, Value)]) -> WorkflowConditions {
        entries
            .iter()
            .map(|(field, operator, value)| {
                ((*field).to_owned(), ConditionNode::new(*operator, value.clone()))
            })
            .collect()
    }

    #[test]
    fn empty_conditions_always_match() {
        assert!(matches_conditions(&WorkflowConditions::new(), &json!({})));
        assert!(matches_conditions(&WorkflowConditions::new(), &Value::Null));
    }

    #[test]
    fn equals_uses_deep_equality() {
        let rules = conditions(&[
            ("status", ConditionOperator::Equals, json!("completed")),
            ("address", ConditionOperator::Equals, json!({"city": "Oslo", "zip": 150})),
        ]);

        assert!(matches_conditions(
            &rules,
            &json!({"status": "completed", "address": {"zip": 150.0, "city": "Oslo"}})
        ));
        assert!(!matches_conditions(
            &rules,
            &json!({"status": "in_progress", "address": {"zip": 150, "city": "Oslo"}})
        ));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let node = ConditionNode::new(ConditionOperator::Equals, json!(9_007_199_254_740_993_u64));

        assert!(matches_condition(&node, Some(&json!(9_007_199_254_740_993_u64))));
        assert!(!matches_condition(&node, Some(&json!(9_007_199_254_740_992_u64))));
        assert!(!matches_condition(
            &ConditionNode::new(ConditionOperator::Equals, json!(u64::MAX)),
            Some(&json!(u64::MAX - 1))
        ));
        assert!(!matches_condition(
            &ConditionNode::new(ConditionOperator::Equals, json!(i64::MAX)),
            Some(&json!(9_223_372_036_854_775_808_u64))
        ));
        assert!(matches_condition(
            &ConditionNode::new(ConditionOperator::Equals, json!(-7)),
            Some(&json!(-7.0))
        ));
    }

    #[test]
    fn absent_field_fails_equals_and_passes_not_equals() {
        let equals = ConditionNode::new(ConditionOperator::Equals, json!("completed"));
        let not_equals = ConditionNode::new(ConditionOperator::NotEquals, json!("completed"));
        let not_equals_null = ConditionNode::new(ConditionOperator::NotEquals, Value::Null);

        assert!(!matches_condition(&equals, None));
        assert!(matches_condition(&not_equals, None));
        assert!(!matches_condition(&not_equals_null, None));
    }

    #[test]
    fn contains_checks_substrings_and_sequences() {
        let node = ConditionNode::new(ConditionOperator::Contains, json!("roof"));

        assert!(matches_condition(&node, Some(&json!("flat roof repair"))));
        assert!(matches_condition(&node, Some(&json!(["gutter", "roof"]))));
        assert!(!matches_condition(&node, Some(&json!(["gutter"]))));
        assert!(!matches_condition(&node, Some(&json!(42))));
    }

    #[test]
    fn numeric_comparisons_coerce_and_fail_closed() {
        let above = ConditionNode::new(ConditionOperator::GreaterThan, json!("100"));
        let below = ConditionNode::new(ConditionOperator::LessThan, json!(100));

        assert!(matches_condition(&above, Some(&json!(250.5))));
        assert!(matches_condition(&above, Some(&json!(" 101 "))));
        assert!(!matches_condition(&above, Some(&json!(100))));
        assert!(matches_condition(&below, Some(&json!("99"))));
        assert!(!matches_condition(&below, Some(&json!("n/a"))));
        assert!(!matches_condition(&below, Some(&json!(true))));
        assert!(!matches_condition(&below, Some(&Value::Null)));
    }

    #[test]
    fn dotted_fields_resolve_nested_values() {
        let rules = conditions(&[("client.tier", ConditionOperator::Equals, json!("gold"))]);

        assert!(matches_conditions(&rules, &json!({"client": {"tier": "gold"}})));
        assert!(matches_conditions(&rules, &json!({"client.tier": "gold"})));
        assert!(!matches_conditions(&rules, &json!({"client": "gold"})));
    }

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|number| json!(number)),
            "[a-z0-9 ]{0,12}".prop_map(Value::String),
        ]
    }

    fn operator() -> impl Strategy<Value = ConditionOperator> {
        prop_oneof![
            Just(ConditionOperator::Equals),
            Just(ConditionOperator::NotEquals),
            Just(ConditionOperator::Contains),
            Just(ConditionOperator::GreaterThan),
            Just(ConditionOperator::LessThan),
        ]
    }

    proptest! {
        #[test]
        fn evaluation_is_deterministic(
            rules in prop::collection::btree_map(
                "[a-c]",
                (operator(), scalar()).prop_map(|(operator, value)| ConditionNode::new(operator, value)),
                0..4,
            ),
            snapshot in prop::collection::btree_map("[a-d]", scalar(), 0..5),
        ) {
            let snapshot = serde_json::to_value(&snapshot).unwrap_or(Value::Null);
            let first = matches_conditions(&rules, &snapshot);
            let second = matches_conditions(&rules, &snapshot);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn equals_and_not_equals_are_complementary_for_present_fields(
            value in scalar(),
            expected in scalar(),
        ) {
            let equals = ConditionNode::new(ConditionOperator::Equals, expected.clone());
            let not_equals = ConditionNode::new(ConditionOperator::NotEquals, expected);
            prop_assert_ne!(
                matches_condition(&equals, Some(&value)),
                matches_condition(&not_equals, Some(&value))
            );
        }
    }
}

use chrono::{TimeZone, Utc};
use meatpi_table::condition::format_literal;
use meatpi_table::{
    ComparisonOp, Condition, EdmValue, LogicalOperator, QueryOperator, StringOp, TIMESTAMP,
    combine, combine_filters,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use uuid::Uuid;

// ── combine ─────────────────────────────────────────────────────

#[test]
fn combine_empty_is_none() {
    assert_eq!(combine(LogicalOperator::And, Vec::<Condition>::new()), None);
}

#[test]
fn combine_single_is_unchanged() {
    let c = Condition::eq("RowKey", "cook1");
    assert_eq!(combine(LogicalOperator::And, [c.clone()]), Some(c));
}

#[test]
fn combine_nests_left_to_right() {
    let combined = combine(LogicalOperator::And, ["a eq 1", "b eq 2", "c eq 3", "d eq 4"]).unwrap();
    assert_eq!(
        combined.as_str(),
        "(((a eq 1) and (b eq 2)) and (c eq 3)) and (d eq 4)"
    );
}

#[test]
fn default_operator_is_and() {
    assert_eq!(LogicalOperator::default(), LogicalOperator::And);
}

proptest! {
    #[test]
    fn combine_equals_manual_left_fold(parts in prop::collection::vec("[A-Za-z]{1,8} eq [0-9]{1,4}", 2..12), or in any::<bool>()) {
        let op = if or { LogicalOperator::Or } else { LogicalOperator::And };
        let conditions: Vec<Condition> = parts.iter().map(|p| Condition::raw(p.as_str())).collect();

        let mut expected = conditions[0].clone();
        for next in &conditions[1..] {
            expected = combine_filters(&expected, op, next);
        }

        prop_assert_eq!(combine(op, conditions), Some(expected));
    }
}

// ── generation ──────────────────────────────────────────────────

#[test]
fn comparison_renders_typed_literals() {
    let since = Utc.with_ymd_and_hms(2023, 7, 4, 12, 0, 0).unwrap();
    assert_eq!(
        Condition::gt(TIMESTAMP, since).as_str(),
        "Timestamp gt datetime'2023-07-04T12:00:00.0000000Z'"
    );
    assert_eq!(
        Condition::compare("ChamberTarget", ComparisonOp::GreaterThanOrEqual, 225.0).as_str(),
        "ChamberTarget ge 225.0"
    );
    assert_eq!(
        Condition::compare("IsCookerOn", ComparisonOp::NotEqual, true).as_str(),
        "IsCookerOn ne true"
    );
    assert_eq!(Condition::lt("Count", 5_i64).as_str(), "Count lt 5L");
}

#[test]
fn other_literal_types() {
    let id = Uuid::parse_str("0f8fad5b-d9cb-469f-a165-70867728950e").unwrap();
    assert_eq!(
        format_literal(&EdmValue::Guid(id)),
        "guid'0f8fad5b-d9cb-469f-a165-70867728950e'"
    );
    assert_eq!(format_literal(&EdmValue::Binary(vec![0xde, 0xad])), "X'dead'");
    assert_eq!(format_literal(&EdmValue::Int32(-7)), "-7");
}

#[test]
fn generate_covers_every_operator() {
    for op in QueryOperator::ALL {
        let condition = Condition::generate("DeviceId", op, "pi").unwrap();
        assert!(condition.as_str().contains(op.as_str()));
    }
    assert_eq!(
        QueryOperator::ALL.len(),
        QueryOperator::COMPARISONS.len() + QueryOperator::STRING_OPERATORS.len()
    );
}

#[test]
fn string_operators_use_function_syntax() {
    assert_eq!(
        Condition::string_match("RowKey", StringOp::StartsWith, "2024-").as_str(),
        "startswith(RowKey,'2024-')"
    );
}

#[test]
fn string_operator_with_number_is_rejected() {
    let err =
        Condition::generate("Value", QueryOperator::String(StringOp::Contains), 3).unwrap_err();
    assert!(err.is_invalid_argument());
}

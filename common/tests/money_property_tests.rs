// Property-based tests for monetary formatting, parsing and points

use common::money::{
    determine_monetary_value, determine_points_to_award, determine_transaction_value,
    POINTS_PER_PENNY,
};
use proptest::prelude::*;

/// **Property: formatted values parse back to the same pence**
///
/// *For any* non-negative amount, the display string is accepted by the
/// transaction value parser and yields the original amount.
#[test]
fn property_monetary_value_parses_back() {
    proptest!(|(pence in 0i64..10_000_000)| {
        let formatted = determine_monetary_value(pence);
        prop_assert_eq!(determine_transaction_value(&formatted).unwrap(), pence);
    });
}

/// **Property: amounts under a pound are shown in pence**
#[test]
fn property_small_amounts_use_pence() {
    proptest!(|(pence in 0i64..100)| {
        prop_assert_eq!(determine_monetary_value(pence), format!("{}p", pence));
    });
}

/// **Property: whole pounds omit the fractional part**
#[test]
fn property_whole_pounds_have_no_fraction() {
    proptest!(|(pounds in 1i64..100_000)| {
        prop_assert_eq!(determine_monetary_value(pounds * 100), format!("£{}", pounds));
    });
}

/// **Property: fractional pence are always two digits**
#[test]
fn property_fraction_is_zero_padded() {
    proptest!(|(pounds in 1i64..100_000, remainder in 1i64..100)| {
        let formatted = determine_monetary_value(pounds * 100 + remainder);
        let (_, fraction) = formatted.split_once('.').unwrap();
        prop_assert_eq!(fraction.len(), 2);
    });
}

/// **Property: points scale linearly with spend**
#[test]
fn property_points_are_linear() {
    proptest!(|(a in 0i64..1_000_000, b in 0i64..1_000_000)| {
        prop_assert_eq!(determine_points_to_award(a), a * POINTS_PER_PENNY);
        prop_assert_eq!(
            determine_points_to_award(a + b),
            determine_points_to_award(a) + determine_points_to_award(b)
        );
    });
}

/// **Property: strings without a unit are rejected**
#[test]
fn property_unitless_values_are_rejected() {
    proptest!(|(amount in 0u32..1_000_000)| {
        prop_assert!(determine_transaction_value(&amount.to_string()).is_err());
    });
}

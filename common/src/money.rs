// Pence/pound conversions and loyalty points

use crate::errors::ValidationError;

/// Points earned per penny spent
pub const POINTS_PER_PENNY: i64 = 10;

/// Render a pence amount: `99p`, `£1`, `£1.05`
pub fn determine_monetary_value(pence: i64) -> String {
    if pence < 100 {
        return format!("{}p", pence);
    }
    let pounds = pence / 100;
    match pence % 100 {
        0 => format!("£{}", pounds),
        remainder => format!("£{}.{:02}", pounds, remainder),
    }
}

/// Parse `45p`, `£3` or `£3.05` into pence.
///
/// A single fraction digit is read as tenths of a pound, so `£3.5` is 350.
/// Older clients read the digit as pence and would store 305.
pub fn determine_transaction_value(value: &str) -> Result<i64, ValidationError> {
    let invalid = || ValidationError::InvalidMonetaryValue(value.to_string());
    let trimmed = value.trim();

    if let Some(pence) = trimmed.strip_suffix('p') {
        return pence.trim().parse::<i64>().map_err(|_| invalid());
    }

    let pounds = trimmed.strip_prefix('£').ok_or_else(invalid)?;
    match pounds.split_once('.') {
        Some((whole, fraction)) => {
            if fraction.is_empty() || fraction.len() > 2 {
                return Err(invalid());
            }
            let whole = whole.parse::<i64>().map_err(|_| invalid())?;
            let mut fraction_pence = fraction.parse::<i64>().map_err(|_| invalid())?;
            // "£1.5" means fifty pence
            if fraction.len() == 1 {
                fraction_pence *= 10;
            }
            Ok(whole * 100 + fraction_pence)
        }
        None => pounds
            .parse::<i64>()
            .map(|whole| whole * 100)
            .map_err(|_| invalid()),
    }
}

pub fn determine_points_to_award(transaction_value: i64) -> i64 {
    transaction_value * POINTS_PER_PENNY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monetary_value_formatting() {
        assert_eq!(determine_monetary_value(0), "0p");
        assert_eq!(determine_monetary_value(99), "99p");
        assert_eq!(determine_monetary_value(100), "£1");
        assert_eq!(determine_monetary_value(150), "£1.50");
        assert_eq!(determine_monetary_value(105), "£1.05");
        assert_eq!(determine_monetary_value(123_456), "£1234.56");
    }

    #[test]
    fn test_transaction_value_parsing() {
        assert_eq!(determine_transaction_value("45p"), Ok(45));
        assert_eq!(determine_transaction_value("£3"), Ok(300));
        assert_eq!(determine_transaction_value("£3.05"), Ok(305));
        assert_eq!(determine_transaction_value("£3.5"), Ok(350));
    }

    #[test]
    fn test_transaction_value_rejects_garbage() {
        for input in ["", "3", "£", "£3.", "£3.123", "abcp", "$4"] {
            assert!(
                determine_transaction_value(input).is_err(),
                "expected '{}' to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_points_to_award() {
        assert_eq!(determine_points_to_award(250), 2500);
    }
}

use crate::app_error::{AppError, AppResult};

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 100;

/// Validates a subscription name against the allowed length range.
pub fn validate_subscription_name(name: &str) -> AppResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "subscription name is required".into(),
        ));
    }
    let len = trimmed.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(AppError::Validation(format!(
            "name must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

/// Validates a price in minor units.
pub fn validate_price(price: i64) -> AppResult<()> {
    if price <= 0 {
        return Err(AppError::Validation("price must be greater than 0".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_names() {
        assert!(validate_subscription_name("Netflix").is_ok());
        assert!(validate_subscription_name("ab").is_ok());
        assert!(validate_subscription_name(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn rejects_out_of_range_names() {
        assert!(validate_subscription_name("").is_err());
        assert!(validate_subscription_name("   ").is_err());
        assert!(validate_subscription_name("a").is_err());
        assert!(validate_subscription_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn rejects_non_positive_prices() {
        assert!(validate_price(0).is_err());
        assert!(validate_price(-100).is_err());
        assert!(validate_price(1).is_ok());
    }
}

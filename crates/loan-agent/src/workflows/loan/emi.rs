//! Equal-monthly-installment math for amortized loans.

/// Raised when the installment formula is invoked outside its domain. These
/// are programming errors in the calling stage, not user-recoverable states.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EmiError {
    #[error("annual interest rate must be positive, got {0}")]
    NonPositiveRate(f64),
    #[error("principal must be positive, got {0}")]
    NonPositivePrincipal(f64),
    #[error("tenure must be at least one month")]
    ZeroTenure,
}

/// Standard amortized-loan installment:
/// `emi = p·r·(1+r)^n / ((1+r)^n − 1)` with `r = annual_rate_pct / 1200`.
///
/// The result is rounded to two decimal places (currency precision). Pure and
/// deterministic; a zero rate would divide by zero and is rejected up front.
pub fn monthly_installment(
    principal: f64,
    annual_rate_pct: f64,
    tenure_months: u32,
) -> Result<f64, EmiError> {
    if annual_rate_pct <= 0.0 {
        return Err(EmiError::NonPositiveRate(annual_rate_pct));
    }
    if principal <= 0.0 {
        return Err(EmiError::NonPositivePrincipal(principal));
    }
    if tenure_months == 0 {
        return Err(EmiError::ZeroTenure);
    }

    let monthly_rate = annual_rate_pct / 1200.0;
    let growth = (1.0 + monthly_rate).powi(tenure_months as i32);
    let emi = principal * monthly_rate * growth / (growth - 1.0);

    Ok((emi * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repayment_exceeds_principal() {
        let emi = monthly_installment(500_000.0, 12.0, 24).expect("valid inputs");
        assert!(emi * 24.0 > 500_000.0);
    }

    #[test]
    fn deterministic_across_calls() {
        let first = monthly_installment(500_000.0, 12.0, 24).expect("valid inputs");
        let second = monthly_installment(500_000.0, 12.0, 24).expect("valid inputs");
        assert_eq!(first, second);
    }

    #[test]
    fn known_value_to_currency_precision() {
        // 5L at 12% over 24 months is ₹23,536.74 against standard tables.
        let emi = monthly_installment(500_000.0, 12.0, 24).expect("valid inputs");
        assert!((emi - 23_536.74).abs() < 0.01);
    }

    #[test]
    fn zero_rate_is_a_precondition_violation() {
        assert_eq!(
            monthly_installment(500_000.0, 0.0, 24),
            Err(EmiError::NonPositiveRate(0.0))
        );
    }

    #[test]
    fn zero_tenure_rejected() {
        assert_eq!(
            monthly_installment(500_000.0, 12.0, 0),
            Err(EmiError::ZeroTenure)
        );
    }

    #[test]
    fn negative_principal_rejected() {
        assert!(matches!(
            monthly_installment(-1.0, 12.0, 12),
            Err(EmiError::NonPositivePrincipal(_))
        ));
    }
}

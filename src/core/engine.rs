use tracing::debug;

use super::types::{
    ComputationResult, Field, InvalidInput, InvestmentInputs, LoanParameters, ParsedInputs,
};

const MONTHS_PER_YEAR: f64 = 12.0;

/// Fixed monthly payment that repays `principal` over `years`.
///
/// A zero rate is repaid straight-line. A negative or non-finite principal or
/// rate, a zero term, or any combination that would yield a non-finite payment
/// is refused instead of returning NaN.
pub fn monthly_loan_payment(params: LoanParameters) -> Result<f64, InvalidInput> {
    let principal = check_amount(Field::LoanAmount, params.principal)?;
    let annual_rate_percent = check_amount(Field::InterestRate, params.annual_rate_percent)?;
    if params.years <= 0.0 {
        return Err(InvalidInput::ZeroLoanTerm);
    }

    let n = params.years * MONTHS_PER_YEAR;
    let payment = if annual_rate_percent == 0.0 {
        principal / n
    } else {
        let monthly_rate = annual_rate_percent / MONTHS_PER_YEAR / 100.0;
        principal * monthly_rate / (1.0 - (1.0 + monthly_rate).powf(-n))
    };

    if !payment.is_finite() {
        return Err(InvalidInput::NonFinitePayment { params });
    }
    Ok(payment)
}

pub fn parse_inputs(inputs: &InvestmentInputs) -> Result<ParsedInputs, InvalidInput> {
    let mut values = [0.0; 8];
    for (slot, field) in values.iter_mut().zip(Field::ALL) {
        *slot = parse_field(field, inputs.raw(field))?;
    }
    let [
        price,
        down_payment,
        loan_amount,
        interest_rate,
        loan_duration_years,
        monthly_insurance,
        monthly_rent,
        annual_fees,
    ] = values;

    Ok(ParsedInputs {
        price,
        down_payment,
        loan_amount,
        interest_rate,
        loan_duration_years,
        monthly_insurance,
        monthly_rent,
        annual_fees,
    })
}

pub fn compute_result(inputs: &InvestmentInputs) -> Result<ComputationResult, InvalidInput> {
    let parsed = parse_inputs(inputs)?;
    compute_parsed(&parsed)
}

/// Price and down payment are validated upstream but do not enter the formula.
pub fn compute_parsed(parsed: &ParsedInputs) -> Result<ComputationResult, InvalidInput> {
    let loan_payment = monthly_loan_payment(parsed.loan())?;
    let monthly_payment = loan_payment + parsed.monthly_insurance;
    let monthly_fees = parsed.annual_fees / MONTHS_PER_YEAR;
    let monthly_cashflow = parsed.monthly_rent - (monthly_fees + monthly_payment);

    Ok(ComputationResult {
        monthly_payment,
        monthly_cashflow,
    })
}

/// Result slot rendered by the form: replaced on success, cleared on invalid input.
#[derive(Debug, Default, Clone)]
pub struct Calculator {
    result: Option<ComputationResult>,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, inputs: &InvestmentInputs) -> Option<&ComputationResult> {
        self.result = match compute_result(inputs) {
            Ok(result) => Some(result),
            Err(err) => {
                debug!(%err, "clearing result after invalid input");
                None
            }
        };
        self.result.as_ref()
    }

    pub fn result(&self) -> Option<&ComputationResult> {
        self.result.as_ref()
    }

    pub fn clear(&mut self) {
        self.result = None;
    }
}

fn parse_field(field: Field, raw: &str) -> Result<f64, InvalidInput> {
    let value = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| InvalidInput::NotANumber {
            field,
            value: raw.to_string(),
        })?;
    check_amount(field, value)
}

fn check_amount(field: Field, value: f64) -> Result<f64, InvalidInput> {
    if !value.is_finite() {
        return Err(InvalidInput::NotANumber {
            field,
            value: value.to_string(),
        });
    }
    if value < 0.0 {
        return Err(InvalidInput::Negative { field, value });
    }
    // "-0" parses to negative zero; keep it out of the sign-sensitive math.
    Ok(value + 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_relative(actual: f64, expected: f64, tol: f64) {
        let scale = expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tol * scale,
            "expected {expected}, got {actual}, relative tolerance {tol}"
        );
    }

    fn loan(principal: f64, annual_rate_percent: f64, years: f64) -> LoanParameters {
        LoanParameters {
            principal,
            annual_rate_percent,
            years,
        }
    }

    fn sample_inputs() -> InvestmentInputs {
        InvestmentInputs {
            price: "180000".to_string(),
            down_payment: "30000".to_string(),
            loan_amount: "150000".to_string(),
            interest_rate: "2".to_string(),
            loan_duration: "15".to_string(),
            insurance: "30".to_string(),
            rent: "900".to_string(),
            fees: "1200".to_string(),
        }
    }

    fn closed_form(principal: f64, annual_rate_percent: f64, years: f64) -> f64 {
        let r = annual_rate_percent / 1200.0;
        let n = years * 12.0;
        principal * r * (1.0 + r).powf(n) / ((1.0 + r).powf(n) - 1.0)
    }

    #[test]
    fn zero_rate_is_straight_line() {
        let payment = monthly_loan_payment(loan(200_000.0, 0.0, 20.0)).expect("valid loan");
        assert_approx(payment, 200_000.0 / 240.0);
        assert_eq!(format!("{payment:.2}"), "833.33");
    }

    #[test]
    fn three_percent_over_twenty_years_matches_amortization_table() {
        let payment = monthly_loan_payment(loan(200_000.0, 3.0, 20.0)).expect("valid loan");
        assert_eq!(format!("{payment:.2}"), "1109.20");
    }

    #[test]
    fn zero_principal_pays_nothing() {
        let payment = monthly_loan_payment(loan(0.0, 4.0, 25.0)).expect("valid loan");
        assert_approx(payment, 0.0);
    }

    #[test]
    fn zero_term_is_refused() {
        assert_eq!(
            monthly_loan_payment(loan(100_000.0, 0.0, 0.0)),
            Err(InvalidInput::ZeroLoanTerm)
        );
        assert_eq!(
            monthly_loan_payment(loan(100_000.0, 3.0, 0.0)),
            Err(InvalidInput::ZeroLoanTerm)
        );
    }

    #[test]
    fn overflowing_payment_is_refused() {
        let err = monthly_loan_payment(loan(f64::MAX, 0.0, 1e-300)).expect_err("must overflow");
        assert!(matches!(err, InvalidInput::NonFinitePayment { .. }));
    }

    #[test]
    fn negative_principal_or_rate_is_refused() {
        assert_eq!(
            monthly_loan_payment(loan(-1000.0, 3.0, 10.0)),
            Err(InvalidInput::Negative {
                field: Field::LoanAmount,
                value: -1000.0,
            })
        );
        assert_eq!(
            monthly_loan_payment(loan(100_000.0, -1200.0, 10.0)),
            Err(InvalidInput::Negative {
                field: Field::InterestRate,
                value: -1200.0,
            })
        );
    }

    #[test]
    fn non_finite_principal_or_rate_is_refused() {
        let err = monthly_loan_payment(loan(f64::NAN, 3.0, 10.0)).expect_err("NaN principal");
        assert_eq!(err.field(), Some(Field::LoanAmount));
        let err =
            monthly_loan_payment(loan(1000.0, f64::INFINITY, 10.0)).expect_err("infinite rate");
        assert_eq!(err.field(), Some(Field::InterestRate));
    }

    #[test]
    fn exact_half_cents_round_away_from_zero() {
        let mut inputs = InvestmentInputs {
            price: "0".to_string(),
            down_payment: "0".to_string(),
            loan_amount: "0".to_string(),
            interest_rate: "0".to_string(),
            loan_duration: "1".to_string(),
            insurance: "0".to_string(),
            rent: "0.125".to_string(),
            fees: "0".to_string(),
        };
        let result = compute_result(&inputs).expect("valid inputs");
        assert_eq!(result.monthly_cashflow_display(), "0.13");

        inputs.rent = "0".to_string();
        inputs.fees = "1.5".to_string();
        let result = compute_result(&inputs).expect("valid inputs");
        assert_eq!(result.monthly_cashflow_display(), "-0.13");
        assert!(!result.is_cashflow_positive());

        inputs.fees = "0".to_string();
        inputs.insurance = "0.375".to_string();
        let result = compute_result(&inputs).expect("valid inputs");
        assert_eq!(result.monthly_payment_display(), "0.38");
    }

    #[test]
    fn compute_result_combines_loan_insurance_rent_and_fees() {
        let result = compute_result(&sample_inputs()).expect("valid inputs");
        let loan_payment = closed_form(150_000.0, 2.0, 15.0);

        assert_approx(result.monthly_payment, loan_payment + 30.0);
        assert_approx(result.monthly_cashflow, 900.0 - (100.0 + loan_payment + 30.0));
        assert_eq!(result.monthly_payment_display(), "995.26");
        assert_eq!(result.monthly_cashflow_display(), "-195.26");
        assert!(!result.is_cashflow_positive());
    }

    #[test]
    fn positive_cashflow_is_flagged() {
        let mut inputs = sample_inputs();
        inputs.rent = "1500".to_string();
        let result = compute_result(&inputs).expect("valid inputs");
        assert_eq!(result.monthly_cashflow_display(), "404.74");
        assert!(result.is_cashflow_positive());
    }

    #[test]
    fn price_and_down_payment_do_not_change_the_figures() {
        let baseline = compute_result(&sample_inputs()).expect("valid inputs");
        let mut inputs = sample_inputs();
        inputs.price = "0".to_string();
        inputs.down_payment = "999999".to_string();
        assert_eq!(compute_result(&inputs), Ok(baseline));
    }

    #[test]
    fn non_numeric_field_is_refused() {
        let mut inputs = sample_inputs();
        inputs.rent = "abc".to_string();
        assert_eq!(
            compute_result(&inputs),
            Err(InvalidInput::NotANumber {
                field: Field::MonthlyRent,
                value: "abc".to_string(),
            })
        );
    }

    #[test]
    fn negative_field_is_refused() {
        let mut inputs = sample_inputs();
        inputs.fees = "-1".to_string();
        assert_eq!(
            compute_result(&inputs),
            Err(InvalidInput::Negative {
                field: Field::AnnualFees,
                value: -1.0,
            })
        );
    }

    #[test]
    fn unused_fields_are_still_validated() {
        let mut inputs = sample_inputs();
        inputs.down_payment = "-5".to_string();
        let err = compute_result(&inputs).expect_err("negative down payment");
        assert_eq!(err.field(), Some(Field::DownPayment));
    }

    #[test]
    fn empty_and_non_finite_fields_are_refused() {
        for raw in ["", "   ", "inf", "NaN", "-infinity", "1e400"] {
            let mut inputs = sample_inputs();
            inputs.price = raw.to_string();
            let err = compute_result(&inputs).expect_err("must refuse");
            assert_eq!(err.field(), Some(Field::Price), "input {raw:?}");
        }
    }

    #[test]
    fn surrounding_whitespace_is_accepted() {
        let mut inputs = sample_inputs();
        inputs.loan_amount = " 150000 ".to_string();
        assert_eq!(compute_result(&inputs), compute_result(&sample_inputs()));
    }

    #[test]
    fn zero_duration_input_is_refused() {
        let mut inputs = sample_inputs();
        inputs.loan_duration = "0".to_string();
        assert_eq!(compute_result(&inputs), Err(InvalidInput::ZeroLoanTerm));
    }

    #[test]
    fn negative_zero_is_accepted_as_zero() {
        let mut inputs = sample_inputs();
        inputs.insurance = "-0".to_string();
        let result = compute_result(&inputs).expect("negative zero is not negative");
        assert_approx(result.monthly_payment, closed_form(150_000.0, 2.0, 15.0));
    }

    #[test]
    fn calculator_replaces_then_clears_result() {
        let mut calculator = Calculator::new();
        assert!(calculator.result().is_none());

        calculator.submit(&sample_inputs());
        assert!(calculator.result().is_some());

        let mut bad = sample_inputs();
        bad.interest_rate = "abc".to_string();
        assert!(calculator.submit(&bad).is_none());
        assert!(calculator.result().is_none());

        calculator.submit(&sample_inputs());
        calculator.clear();
        assert!(calculator.result().is_none());
    }

    #[test]
    fn calculator_keeps_last_successful_submission() {
        let mut calculator = Calculator::new();
        calculator.submit(&sample_inputs());
        let mut other = sample_inputs();
        other.rent = "2000".to_string();
        calculator.submit(&other);
        assert_eq!(
            calculator.result().map(|r| r.monthly_cashflow_display()),
            Some("904.74".to_string())
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_zero_rate_payment_is_exact_division(
            principal in 0u32..5_000_000,
            years in 1u32..60
        ) {
            let principal = principal as f64;
            let years = years as f64;
            let payment = monthly_loan_payment(loan(principal, 0.0, years)).expect("valid loan");
            prop_assert_eq!(payment, principal / (years * 12.0));
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_positive_rate_matches_closed_form(
            principal in 1u32..5_000_000,
            rate_bp in 1u32..2_000,
            years in 1u32..50
        ) {
            let principal = principal as f64;
            let rate = rate_bp as f64 / 100.0;
            let years = years as f64;
            let payment = monthly_loan_payment(loan(principal, rate, years)).expect("valid loan");
            assert_relative(payment, closed_form(principal, rate, years), 1e-9);
            prop_assert!(payment * years * 12.0 >= principal - 1e-6);
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_compute_result_is_idempotent_and_two_decimal(
            loan_amount in 0u32..1_000_000,
            rate_bp in 0u32..1_500,
            years in 1u32..40,
            insurance in 0u32..500,
            rent in 0u32..10_000,
            fees in 0u32..20_000
        ) {
            let inputs = InvestmentInputs {
                price: "0".to_string(),
                down_payment: "0".to_string(),
                loan_amount: loan_amount.to_string(),
                interest_rate: (rate_bp as f64 / 100.0).to_string(),
                loan_duration: years.to_string(),
                insurance: insurance.to_string(),
                rent: rent.to_string(),
                fees: fees.to_string(),
            };
            let first = compute_result(&inputs).expect("valid inputs");
            let second = compute_result(&inputs).expect("valid inputs");
            prop_assert_eq!(first, second);

            for display in [first.monthly_payment_display(), first.monthly_cashflow_display()] {
                let decimals = display.split('.').nth(1).map(str::len);
                prop_assert_eq!(decimals, Some(2));
            }
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_any_single_negative_field_is_refused(
            index in 0usize..8,
            magnitude in 1u32..1_000_000
        ) {
            let field = Field::ALL[index];
            let mut inputs = sample_inputs();
            let raw = format!("-{magnitude}");
            match field {
                Field::Price => inputs.price = raw,
                Field::DownPayment => inputs.down_payment = raw,
                Field::LoanAmount => inputs.loan_amount = raw,
                Field::InterestRate => inputs.interest_rate = raw,
                Field::LoanDuration => inputs.loan_duration = raw,
                Field::MonthlyInsurance => inputs.insurance = raw,
                Field::MonthlyRent => inputs.rent = raw,
                Field::AnnualFees => inputs.fees = raw,
            }
            let err = compute_result(&inputs).expect_err("negative field must be refused");
            prop_assert_eq!(err.field(), Some(field));
        }
    }
}

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Field {
    Price,
    DownPayment,
    LoanAmount,
    InterestRate,
    LoanDuration,
    MonthlyInsurance,
    MonthlyRent,
    AnnualFees,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Price,
        Field::DownPayment,
        Field::LoanAmount,
        Field::InterestRate,
        Field::LoanDuration,
        Field::MonthlyInsurance,
        Field::MonthlyRent,
        Field::AnnualFees,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Price => "Property price",
            Field::DownPayment => "Down payment",
            Field::LoanAmount => "Loan amount",
            Field::InterestRate => "Annual interest rate",
            Field::LoanDuration => "Loan duration",
            Field::MonthlyInsurance => "Monthly insurance",
            Field::MonthlyRent => "Monthly rent",
            Field::AnnualFees => "Annual fees",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Field::InterestRate => "%",
            Field::LoanDuration => "years",
            _ => "€",
        }
    }

    pub fn accessible_name(self) -> &'static str {
        match self {
            Field::Price => "Property price in euros",
            Field::DownPayment => "Down payment in euros",
            Field::LoanAmount => "Loan amount in euros",
            Field::InterestRate => "Annual interest rate in percent",
            Field::LoanDuration => "Loan duration in years",
            Field::MonthlyInsurance => "Monthly insurance in euros",
            Field::MonthlyRent => "Monthly rent in euros",
            Field::AnnualFees => "Annual fees in euros",
        }
    }

    /// Key used by the web form and the JSON API.
    pub fn key(self) -> &'static str {
        match self {
            Field::Price => "price",
            Field::DownPayment => "downPayment",
            Field::LoanAmount => "loanAmount",
            Field::InterestRate => "interestRate",
            Field::LoanDuration => "loanDuration",
            Field::MonthlyInsurance => "insurance",
            Field::MonthlyRent => "rent",
            Field::AnnualFees => "fees",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LoanParameters {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub years: f64,
}

/// Raw form values, exactly as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvestmentInputs {
    #[serde(deserialize_with = "raw_field")]
    pub price: String,
    #[serde(deserialize_with = "raw_field")]
    pub down_payment: String,
    #[serde(deserialize_with = "raw_field")]
    pub loan_amount: String,
    #[serde(deserialize_with = "raw_field")]
    pub interest_rate: String,
    #[serde(deserialize_with = "raw_field")]
    pub loan_duration: String,
    #[serde(deserialize_with = "raw_field")]
    pub insurance: String,
    #[serde(deserialize_with = "raw_field")]
    pub rent: String,
    #[serde(deserialize_with = "raw_field")]
    pub fees: String,
}

/// JSON clients may send numbers where the form sends text.
fn raw_field<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

impl InvestmentInputs {
    pub fn raw(&self, field: Field) -> &str {
        match field {
            Field::Price => &self.price,
            Field::DownPayment => &self.down_payment,
            Field::LoanAmount => &self.loan_amount,
            Field::InterestRate => &self.interest_rate,
            Field::LoanDuration => &self.loan_duration,
            Field::MonthlyInsurance => &self.insurance,
            Field::MonthlyRent => &self.rent,
            Field::AnnualFees => &self.fees,
        }
    }
}

/// Inputs after every field parsed to a finite, non-negative number.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParsedInputs {
    pub price: f64,
    pub down_payment: f64,
    pub loan_amount: f64,
    pub interest_rate: f64,
    pub loan_duration_years: f64,
    pub monthly_insurance: f64,
    pub monthly_rent: f64,
    pub annual_fees: f64,
}

impl ParsedInputs {
    pub fn loan(&self) -> LoanParameters {
        LoanParameters {
            principal: self.loan_amount,
            annual_rate_percent: self.interest_rate,
            years: self.loan_duration_years,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvalidInput {
    #[error("{} is not a number: {value:?}", .field.label())]
    NotANumber { field: Field, value: String },
    #[error("{} must be >= 0, got {value}", .field.label())]
    Negative { field: Field, value: f64 },
    #[error("loan duration must be > 0")]
    ZeroLoanTerm,
    #[error("monthly payment is not finite for {params:?}")]
    NonFinitePayment { params: LoanParameters },
}

impl InvalidInput {
    pub fn field(&self) -> Option<Field> {
        match self {
            InvalidInput::NotANumber { field, .. } | InvalidInput::Negative { field, .. } => {
                Some(*field)
            }
            InvalidInput::ZeroLoanTerm | InvalidInput::NonFinitePayment { .. } => {
                Some(Field::LoanDuration)
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ComputationResult {
    pub monthly_payment: f64,
    pub monthly_cashflow: f64,
}

impl ComputationResult {
    pub fn monthly_payment_display(&self) -> String {
        format_two_decimals(self.monthly_payment)
    }

    pub fn monthly_cashflow_display(&self) -> String {
        format_two_decimals(self.monthly_cashflow)
    }

    /// Sign of the displayed cash flow, so anything shown as 0.00 counts as positive.
    pub fn is_cashflow_positive(&self) -> bool {
        !self.monthly_cashflow_display().starts_with('-')
    }
}

impl Serialize for ComputationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ComputationResult", 3)?;
        state.serialize_field("monthlyPayment", &self.monthly_payment_display())?;
        state.serialize_field("monthlyCashflow", &self.monthly_cashflow_display())?;
        state.serialize_field("cashflowPositive", &self.is_cashflow_positive())?;
        state.end()
    }
}

/// Fixed-point with two decimals. Exact halves round away from zero, so
/// 0.125 shows as 0.13 and -0.125 as -0.13.
pub fn format_two_decimals(value: f64) -> String {
    // Only odd multiples of 1/8 sit exactly between two cents.
    let eighths = value * 8.0;
    let value = if eighths.fract() == 0.0 && eighths % 2.0 != 0.0 {
        (value * 100.0).round() / 100.0
    } else {
        value
    };
    let formatted = format!("{value:.2}");
    if formatted == "-0.00" {
        "0.00".to_string()
    } else {
        formatted
    }
}

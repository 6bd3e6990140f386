mod engine;
mod types;

pub use engine::{Calculator, compute_parsed, compute_result, monthly_loan_payment, parse_inputs};
pub use types::{
    ComputationResult, Field, InvalidInput, InvestmentInputs, LoanParameters, ParsedInputs,
    format_two_decimals,
};

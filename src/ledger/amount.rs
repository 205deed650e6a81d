//! Parsing of transaction amounts.
//!
//! Amounts are stored as text in the ledger, as exported by the card issuer,
//! e.g. "$-77.00" or "$1,204.50". The SQL function `parse_amount` exposes
//! [parse_amount] to queries so that every aggregate in the app shares the
//! same parsing rules and fails on the same inputs.

use rusqlite::{
    Connection,
    functions::{Context, FunctionFlags},
    types::ValueRef,
};

use crate::Error;

/// The name of the SQL function registered by [register_amount_function].
pub const AMOUNT_FUNCTION: &str = "parse_amount";

/// Characters that decorate an amount but carry no numeric meaning.
const CURRENCY_DECORATION: [char; 3] = ['$', ',', ' '];

/// Parse an amount such as "$-77.00", "-$77.00" or "1,204.50" into a number.
///
/// Currency symbols, thousands separators and surrounding whitespace are
/// stripped. Anything else that does not parse as a finite number is an
/// error, the amount is never coerced to zero.
///
/// # Errors
/// Returns [Error::InvalidAmount] with the original text if it is not a number.
pub fn parse_amount(text: &str) -> Result<f64, Error> {
    let stripped: String = text
        .trim()
        .chars()
        .filter(|c| !CURRENCY_DECORATION.contains(c))
        .collect();

    match stripped.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(Error::InvalidAmount(text.to_owned())),
    }
}

/// Register the `parse_amount(amount)` SQL function on `connection`.
///
/// Functions are registered per connection and must be registered again
/// after reopening the database.
pub fn register_amount_function(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.create_scalar_function(
        AMOUNT_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        amount_from_context,
    )
}

fn amount_from_context(context: &Context<'_>) -> Result<f64, rusqlite::Error> {
    amount_from_value(context.get_raw(0))
        .map_err(|error| rusqlite::Error::UserFunctionError(Box::new(error)))
}

fn amount_from_value(value: ValueRef<'_>) -> Result<f64, Error> {
    match value {
        ValueRef::Real(amount) => Ok(amount),
        ValueRef::Integer(amount) => Ok(amount as f64),
        ValueRef::Text(bytes) => parse_amount(&String::from_utf8_lossy(bytes)),
        ValueRef::Null => Err(Error::InvalidAmount("NULL".to_owned())),
        ValueRef::Blob(_) => Err(Error::InvalidAmount("<blob>".to_owned())),
    }
}

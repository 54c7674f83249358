//! Month range expansion
//!
//! Turns a `start`/`end` pair of `YYYY-MM` tokens into the inclusive, chronologically
//! ordered list of months between them. Each month becomes one archive fetch.

use crate::error::{Error, Result};
use crate::types::Period;

/// Expand `start..=end` (both `YYYY-MM`) into every month of the range, in order
///
/// # Errors
/// * [`Error::InvalidDateFormat`] if either token is not a `YYYY-MM` month
/// * [`Error::RangeInverted`] if `start` is after `end`
///
/// # Example
/// ```
/// use tor_exit_history::period::expand_periods;
///
/// let months = expand_periods("2023-11", "2024-02").unwrap();
/// let tokens: Vec<String> = months.iter().map(|p| p.to_string()).collect();
/// assert_eq!(tokens, ["2023-11", "2023-12", "2024-01", "2024-02"]);
/// ```
pub fn expand_periods(start: &str, end: &str) -> Result<Vec<Period>> {
    let start: Period = start.parse()?;
    let end: Period = end.parse()?;
    expand_range(start, end)
}

/// Expand an already-parsed inclusive range
pub fn expand_range(start: Period, end: Period) -> Result<Vec<Period>> {
    if start > end {
        return Err(Error::RangeInverted { start, end });
    }

    let span = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    let mut periods = Vec::with_capacity(span as usize + 1);
    let mut current = start;
    loop {
        periods.push(current);
        if current == end {
            break;
        }
        current = current.next();
    }

    Ok(periods)
}

//! Replenishment policy: pure decisions, no I/O.

use restock_core::error::RestockError;
use restock_core::types::Item;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("on-hand must be a non-negative number, got {0}")]
    OnHand(f64),
    #[error("par level must be a non-negative number, got {0}")]
    ParLevel(f64),
    #[error("average daily usage must be a non-negative number, got {0}")]
    Usage(f64),
    #[error("case size must be at least 1")]
    CaseSize,
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Cases to request so that on-hand reaches par.
///
/// `n = ceil(max(0, par - on_hand) / case_size)`.
pub fn requested_cases(on_hand: f64, par_level: f64, case_size: u32) -> Result<u32, PolicyError> {
    if !non_negative(on_hand) {
        return Err(PolicyError::OnHand(on_hand));
    }
    if !non_negative(par_level) {
        return Err(PolicyError::ParLevel(par_level));
    }
    if case_size == 0 {
        return Err(PolicyError::CaseSize);
    }

    let shortfall = par_level - on_hand;
    if shortfall <= 0.0 {
        return Ok(0);
    }
    // Whole nano-units absorb float noise: 8.3 - (0.1 + 0.2) is exactly 8.
    let shortfall = (shortfall * NANOS as f64).round() as u64;
    let per_case = u64::from(case_size) * NANOS;
    let cases = shortfall.div_ceil(per_case).max(1);
    Ok(u32::try_from(cases).unwrap_or(u32::MAX))
}

const NANOS: u64 = 1_000_000_000;

/// Days the current stock lasts at the average rate; `None` when usage is zero.
pub fn days_of_supply(on_hand: f64, adu: f64) -> Option<f64> {
    if adu > 0.0 { Some(on_hand / adu) } else { None }
}

/// Everything the jobs need to know about one item at one count.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub on_hand: f64,
    pub shortfall: f64,
    pub cases: u32,
    pub days_of_supply: Option<f64>,
}

impl Assessment {
    pub fn below_par(&self) -> bool {
        self.shortfall > 0.0
    }
}

/// Evaluate an item against a count, tagging bad data with the item key.
pub fn assess(item: &Item, on_hand: f64) -> Result<Assessment, RestockError> {
    if !non_negative(item.adu) {
        return Err(RestockError::invalid_input(&item.id, PolicyError::Usage(item.adu).to_string()));
    }
    let cases = requested_cases(on_hand, item.par_level, item.case_size)
        .map_err(|e| RestockError::invalid_input(&item.id, e.to_string()))?;

    Ok(Assessment {
        on_hand,
        shortfall: (item.par_level - on_hand).max(0.0),
        cases,
        days_of_supply: days_of_supply(on_hand, item.adu),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_or_above_par_requests_nothing() {
        assert_eq!(requested_cases(10.0, 10.0, 4), Ok(0));
        assert_eq!(requested_cases(12.5, 10.0, 4), Ok(0));
        assert_eq!(requested_cases(0.0, 0.0, 1), Ok(0));
    }

    #[test]
    fn test_shortfall_rounds_up_to_whole_cases() {
        assert_eq!(requested_cases(2.0, 10.0, 4), Ok(2));
        assert_eq!(requested_cases(3.0, 10.0, 4), Ok(2));
        assert_eq!(requested_cases(0.0, 10.0, 4), Ok(3));
        assert_eq!(requested_cases(9.5, 10.0, 4), Ok(1));
        assert_eq!(requested_cases(0.0, 6.0, 1), Ok(6));
    }

    #[test]
    fn test_matches_ceiling_formula_over_a_grid() {
        for case_size in 1..=6u32 {
            for par in 0..=20u32 {
                for on_hand in 0..=20u32 {
                    let shortfall = par.saturating_sub(on_hand);
                    let expected = shortfall.div_ceil(case_size);
                    assert_eq!(
                        requested_cases(f64::from(on_hand), f64::from(par), case_size),
                        Ok(expected),
                        "h={on_hand} p={par} c={case_size}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_float_noise_does_not_add_a_case() {
        let on_hand = 0.1 + 0.2;
        assert_eq!(requested_cases(on_hand, 8.3, 4), Ok(2));
    }

    #[test]
    fn test_tiny_excess_over_whole_cases_adds_a_case() {
        assert_eq!(requested_cases(0.0, 4.000000002, 4), Ok(2));
        assert_eq!(requested_cases(0.0, 8.000000001, 4), Ok(3));
        assert_eq!(requested_cases(0.0, 8.000000000001, 4), Ok(2));
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        assert_eq!(requested_cases(-1.0, 10.0, 4), Err(PolicyError::OnHand(-1.0)));
        assert_eq!(requested_cases(1.0, -10.0, 4), Err(PolicyError::ParLevel(-10.0)));
        assert_eq!(requested_cases(1.0, 10.0, 0), Err(PolicyError::CaseSize));
        assert!(requested_cases(f64::NAN, 10.0, 4).is_err());
    }

    #[test]
    fn test_days_of_supply() {
        assert_eq!(days_of_supply(3.6, 1.8), Some(2.0));
        assert_eq!(days_of_supply(5.0, 0.0), None);
    }

    #[test]
    fn test_assess_item() {
        let item = Item::new("Steak", "Avondale", 1.8, 6.0, 1);
        let a = assess(&item, 2.0).unwrap();
        assert_eq!(a.cases, 4);
        assert_eq!(a.shortfall, 4.0);
        assert!(a.below_par());

        let mut broken = item.clone();
        broken.adu = -1.0;
        let err = assess(&broken, 2.0).unwrap_err();
        assert!(matches!(err, RestockError::PolicyInputInvalid { ref item, .. } if item == "Steak"));
    }
}

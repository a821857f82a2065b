use std::collections::BTreeMap;

use super::error::ConfigurationError;

/// Disbursement plan: month (1-based) to amount released in that month.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlabSchedule {
    slabs: BTreeMap<u32, f64>,
}

impl SlabSchedule {
    /// Pairs `amounts[k]` with `months[k]`. Both slices must have the same
    /// length; a month listed twice keeps the later amount.
    pub fn from_pairs(amounts: &[f64], months: &[i64]) -> Result<Self, ConfigurationError> {
        if amounts.len() != months.len() {
            return Err(ConfigurationError::MismatchedSlabs {
                amounts: amounts.len(),
                months: months.len(),
            });
        }

        Self::from_slabs(months.iter().copied().zip(amounts.iter().copied()))
    }

    /// Builds a schedule from `(month, amount)` entries, applying the same
    /// checks as [`SlabSchedule::from_pairs`]. Errors report the entry index.
    pub fn from_slabs<I>(slabs: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (i64, f64)>,
    {
        let mut map = BTreeMap::new();
        for (index, (month, amount)) in slabs.into_iter().enumerate() {
            if month <= 0 || month > i64::from(u32::MAX) {
                return Err(ConfigurationError::NonPositiveMonth { index, month });
            }
            if !amount.is_finite() || amount < 0.0 {
                return Err(ConfigurationError::InvalidAmount { index, amount });
            }
            if let Some(previous) = map.insert(month as u32, amount) {
                tracing::warn!(
                    target: "loan.schedule",
                    month,
                    previous,
                    amount,
                    "duplicate slab month, keeping the later amount"
                );
            }
        }
        Ok(Self { slabs: map })
    }

    pub fn amount_at(&self, month: u32) -> f64 {
        self.slabs.get(&month).copied().unwrap_or(0.0)
    }

    pub fn last_month(&self) -> Option<u32> {
        self.slabs.keys().next_back().copied()
    }

    pub fn total(&self) -> f64 {
        self.slabs.values().sum()
    }

    pub fn len(&self) -> usize {
        self.slabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slabs.is_empty()
    }
}

//! Transaction model for the matching core.
//!
//! An [`IndexedTransaction`] is the immutable, fixed-point snapshot of one
//! imported line. The core never sees the stored row it came from.

use serde::{Deserialize, Serialize};

use crate::{CompareCurrency, DateField, EpochDay, MinorUnits, TransactionId, constants};

/// Which of the two reconciled collections a transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Set1,
    Set2,
}

impl Side {
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Set1 => Self::Set2,
            Self::Set2 => Self::Set1,
        }
    }

    pub const BOTH: [Self; 2] = [Self::Set1, Self::Set2];
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Set1 => write!(f, "SET1"),
            Self::Set2 => write!(f, "SET2"),
        }
    }
}

/// A named text field that rule conditions can inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "field", content = "index")]
pub enum TransactionField {
    Reference,
    Description,
    TextCode,
    AccountNumber,
    Currency,
    /// Dimension tag by zero-based slot (`0..MAX_DIMENSIONS`).
    Dimension(u8),
}

/// Immutable fixed-point snapshot of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedTransaction {
    pub id: TransactionId,
    pub side: Side,
    /// Home-currency amount in minor units.
    pub amount: MinorUnits,
    /// Foreign-currency amount in minor units, when the line carries one.
    pub foreign_amount: Option<MinorUnits>,
    pub date: EpochDay,
    pub secondary_date: Option<EpochDay>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub text_code: Option<String>,
    pub account_number: Option<String>,
    pub currency: String,
    pub dimensions: [Option<String>; constants::MAX_DIMENSIONS],
}

impl IndexedTransaction {
    /// Resolve a named field. `None` means the field is absent, which makes
    /// any condition on it fail.
    #[must_use]
    pub fn field(&self, field: TransactionField) -> Option<&str> {
        match field {
            TransactionField::Reference => self.reference.as_deref(),
            TransactionField::Description => self.description.as_deref(),
            TransactionField::TextCode => self.text_code.as_deref(),
            TransactionField::AccountNumber => self.account_number.as_deref(),
            TransactionField::Currency => Some(self.currency.as_str()),
            TransactionField::Dimension(slot) => self
                .dimensions
                .get(usize::from(slot))
                .and_then(Option::as_deref),
        }
    }

    /// The amount a rule compares. `None` when the rule compares foreign
    /// amounts and this line has none.
    #[must_use]
    pub fn comparison_amount(&self, currency: CompareCurrency) -> Option<MinorUnits> {
        match currency {
            CompareCurrency::Home => Some(self.amount),
            CompareCurrency::Foreign => self.foreign_amount,
        }
    }

    /// The date a rule compares.
    #[must_use]
    pub fn comparison_date(&self, field: DateField) -> EpochDay {
        match field {
            DateField::Primary => self.date,
            DateField::Secondary => self.secondary_date.unwrap_or(self.date),
        }
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl IndexedTransaction {
    /// Minimal transaction: no text fields, home currency "NOK".
    pub fn dummy(id: u128, side: Side, amount: i64, date: i32) -> Self {
        Self {
            id: TransactionId::from_u128(id),
            side,
            amount: MinorUnits(amount),
            foreign_amount: None,
            date: EpochDay(date),
            secondary_date: None,
            reference: None,
            description: None,
            text_code: None,
            account_number: None,
            currency: "NOK".to_string(),
            dimensions: Default::default(),
        }
    }

    #[must_use]
    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_string());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn with_foreign_amount(mut self, amount: i64) -> Self {
        self.foreign_amount = Some(MinorUnits(amount));
        self
    }
}

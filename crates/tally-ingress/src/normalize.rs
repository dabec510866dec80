//! Fixed-point normalization of stored transaction rows.
//!
//! Amounts become `round(amount × 100)` minor units and dates become epoch
//! days. Blank text fields are treated as absent so that conditions on
//! them fail the same way as on a NULL column.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_types::{
    EpochDay, IndexedTransaction, MinorUnits, Result, Side, TallyError, TransactionId, constants,
};

/// A transaction row as the storage collaborator hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub id: TransactionId,
    pub side: Side,
    pub amount: Decimal,
    #[serde(default)]
    pub foreign_amount: Option<Decimal>,
    pub date: NaiveDate,
    #[serde(default)]
    pub secondary_date: Option<NaiveDate>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub text_code: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    pub currency: String,
    /// Dimension tags in slot order; at most `MAX_DIMENSIONS`.
    #[serde(default)]
    pub dimensions: Vec<Option<String>>,
}

/// Convert one stored row into its indexed form.
///
/// # Errors
/// - `AmountOutOfRange` if an amount exceeds `MinorUnits::MAX` in magnitude
/// - `TooManyDimensions` if more than `MAX_DIMENSIONS` tags are present
/// - `InvalidTransaction` if the currency code is blank
pub fn normalize(raw: &RawTransaction) -> Result<IndexedTransaction> {
    if raw.dimensions.len() > constants::MAX_DIMENSIONS {
        return Err(TallyError::TooManyDimensions {
            id: raw.id,
            count: raw.dimensions.len(),
            max: constants::MAX_DIMENSIONS,
        });
    }
    let currency = raw.currency.trim();
    if currency.is_empty() {
        return Err(TallyError::InvalidTransaction {
            id: raw.id,
            reason: "missing currency code".into(),
        });
    }

    let mut dimensions: [Option<String>; constants::MAX_DIMENSIONS] = Default::default();
    for (slot, tag) in dimensions.iter_mut().zip(&raw.dimensions) {
        *slot = clean_text(tag.as_deref());
    }

    Ok(IndexedTransaction {
        id: raw.id,
        side: raw.side,
        amount: MinorUnits::from_decimal(raw.amount)?,
        foreign_amount: raw.foreign_amount.map(MinorUnits::from_decimal).transpose()?,
        date: EpochDay::from_date(raw.date),
        secondary_date: raw.secondary_date.map(EpochDay::from_date),
        reference: clean_text(raw.reference.as_deref()),
        description: clean_text(raw.description.as_deref()),
        text_code: clean_text(raw.text_code.as_deref()),
        account_number: clean_text(raw.account_number.as_deref()),
        currency: currency.to_ascii_uppercase(),
        dimensions,
    })
}

fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(amount: Decimal) -> RawTransaction {
        RawTransaction {
            id: TransactionId::from_u128(1),
            side: Side::Set1,
            amount,
            foreign_amount: None,
            date: NaiveDate::from_ymd_opt(2022, 1, 8).unwrap(),
            secondary_date: None,
            reference: Some("  INV-42 ".into()),
            description: Some("   ".into()),
            text_code: None,
            account_number: None,
            currency: "nok".into(),
            dimensions: vec![Some("sales".into()), None, Some(String::new())],
        }
    }

    #[test]
    fn converts_amount_and_date() {
        let tx = normalize(&raw(Decimal::new(-15050, 2))).unwrap();
        assert_eq!(tx.amount, MinorUnits(-15050));
        assert_eq!(tx.date, EpochDay(19000));
        assert_eq!(tx.currency, "NOK");
    }

    #[test]
    fn blank_text_becomes_absent() {
        let tx = normalize(&raw(Decimal::ONE)).unwrap();
        assert_eq!(tx.reference.as_deref(), Some("INV-42"));
        assert_eq!(tx.description, None);
        assert_eq!(tx.dimensions[0].as_deref(), Some("sales"));
        assert_eq!(tx.dimensions[2], None);
    }

    #[test]
    fn foreign_amount_is_rounded() {
        let mut r = raw(Decimal::ONE);
        r.foreign_amount = Some(Decimal::new(12345, 3)); // 12.345
        let tx = normalize(&r).unwrap();
        assert_eq!(tx.foreign_amount, Some(MinorUnits(1235)));
    }

    #[test]
    fn oversized_amounts_rejected() {
        // 90 quadrillion fits in i64 øre but not under the ingestion bound.
        let huge = Decimal::new(90_000_000_000_000_000, 0);
        assert!(matches!(
            normalize(&raw(huge)),
            Err(TallyError::AmountOutOfRange { .. })
        ));
        let mut r = raw(Decimal::ONE);
        r.foreign_amount = Some(-huge);
        assert!(normalize(&r).is_err());
    }

    #[test]
    fn too_many_dimensions_rejected() {
        let mut r = raw(Decimal::ONE);
        r.dimensions = vec![None; constants::MAX_DIMENSIONS + 1];
        let err = normalize(&r).unwrap_err();
        assert!(matches!(err, TallyError::TooManyDimensions { count: 11, .. }));
    }

    #[test]
    fn missing_currency_rejected() {
        let mut r = raw(Decimal::ONE);
        r.currency = " ".into();
        assert!(matches!(
            normalize(&r),
            Err(TallyError::InvalidTransaction { .. })
        ));
    }
}

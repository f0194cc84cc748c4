use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fields::CanonicalField;
use crate::ConfigError;

/// One order, mapped onto the fixed schema the record store understands.
///
/// Every text field defaults to an empty string when the source offers
/// nothing for it. `date` is always the run's target date, never a value read
/// from the source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub date: NaiveDate,
    pub customer: String,
    pub address: String,
    pub phone: String,
    /// Dumpster / container size descriptor, e.g. `"20 yd"`.
    pub size: String,
    /// Order number with any single leading `#` removed.
    pub order_number: String,
    pub status: String,
}

impl CanonicalRecord {
    /// Creates an empty record for `date`.
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            customer: String::new(),
            address: String::new(),
            phone: String::new(),
            size: String::new(),
            order_number: String::new(),
            status: String::new(),
        }
    }

    #[must_use]
    pub fn get(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::Customer => &self.customer,
            CanonicalField::Address => &self.address,
            CanonicalField::Phone => &self.phone,
            CanonicalField::Size => &self.size,
            CanonicalField::OrderNumber => &self.order_number,
            CanonicalField::Status => &self.status,
        }
    }

    pub fn set(&mut self, field: CanonicalField, value: String) {
        let slot = match field {
            CanonicalField::Customer => &mut self.customer,
            CanonicalField::Address => &mut self.address,
            CanonicalField::Phone => &mut self.phone,
            CanonicalField::Size => &mut self.size,
            CanonicalField::OrderNumber => &mut self.order_number,
            CanonicalField::Status => &mut self.status,
        };
        *slot = value;
    }

    /// A record may reach the store only if it names a customer, an address,
    /// or an order number. Status or phone alone never qualify.
    #[must_use]
    pub fn is_persistable(&self) -> bool {
        !(self.customer.is_empty() && self.address.is_empty() && self.order_number.is_empty())
    }

    /// `YYYY-MM-DD` rendering of [`Self::date`].
    #[must_use]
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Parses a strict `YYYY-MM-DD` calendar date.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] tagged with `var` when the value is
/// not a valid ISO calendar date.
pub fn parse_iso_date(var: &str, raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: format!("expected YYYY-MM-DD, got \"{raw}\": {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan_15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn status_alone_is_not_persistable() {
        let mut record = CanonicalRecord::new(jan_15());
        record.status = "Done".to_string();
        record.phone = "555-0100".to_string();
        assert!(!record.is_persistable());
    }

    #[test]
    fn any_identifying_field_makes_record_persistable() {
        for field in [
            CanonicalField::Customer,
            CanonicalField::Address,
            CanonicalField::OrderNumber,
        ] {
            let mut record = CanonicalRecord::new(jan_15());
            record.set(field, "x".to_string());
            assert!(record.is_persistable(), "{field:?} should qualify");
        }
    }

    #[test]
    fn serializes_with_camel_case_and_iso_date() {
        let mut record = CanonicalRecord::new(jan_15());
        record.order_number = "7".to_string();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2025-01-15");
        assert_eq!(json["orderNumber"], "7");
    }

    #[test]
    fn parse_iso_date_rejects_other_formats() {
        assert_eq!(parse_iso_date("DATE", "2025-01-15").unwrap(), jan_15());
        assert!(matches!(
            parse_iso_date("DATE", "01/15/2025"),
            Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "DATE"
        ));
    }
}

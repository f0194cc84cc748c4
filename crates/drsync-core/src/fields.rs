//! Source-to-canonical field mapping and canonical-to-store display names.
//!
//! These are two separate indirections. [`FieldMapping`] says which source
//! column labels (or JSON keys) feed each canonical field; [`TargetSchema`]
//! says what each canonical field is called in the record store.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Customer,
    Address,
    Phone,
    Size,
    OrderNumber,
    Status,
}

impl CanonicalField {
    /// All mappable fields, in resolution order. `date` is not mappable.
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::Customer,
        CanonicalField::Address,
        CanonicalField::Phone,
        CanonicalField::Size,
        CanonicalField::OrderNumber,
        CanonicalField::Status,
    ];

    /// Suffix used by `DRSYNC_COL_*` and `AIRTABLE_FIELD_*` overrides.
    #[must_use]
    pub fn env_suffix(self) -> &'static str {
        match self {
            CanonicalField::Customer => "CUSTOMER",
            CanonicalField::Address => "ADDRESS",
            CanonicalField::Phone => "PHONE",
            CanonicalField::Size => "SIZE",
            CanonicalField::OrderNumber => "ORDER",
            CanonicalField::Status => "STATUS",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanonicalField::Customer => write!(f, "customer"),
            CanonicalField::Address => write!(f, "address"),
            CanonicalField::Phone => write!(f, "phone"),
            CanonicalField::Size => write!(f, "size"),
            CanonicalField::OrderNumber => write!(f, "orderNumber"),
            CanonicalField::Status => write!(f, "status"),
        }
    }
}

/// Lookup rule for one canonical field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Table column labels, tried in order.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Flattened JSON keys (lowercase, dotted paths allowed), tried in order.
    #[serde(default)]
    pub json_keys: Vec<String>,
    /// 1-based column fallback, read as `col<N>`.
    #[serde(default)]
    pub column_index: Option<usize>,
}

impl FieldRule {
    fn new(labels: &[&str], json_keys: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|s| (*s).to_string()).collect(),
            json_keys: json_keys.iter().map(|s| (*s).to_string()).collect(),
            column_index: None,
        }
    }

    /// Non-empty lists and a set index in `other` replace ours.
    fn merge(&mut self, other: FieldRule) {
        if !other.labels.is_empty() {
            self.labels = other.labels;
        }
        if !other.json_keys.is_empty() {
            self.json_keys = other.json_keys;
        }
        if other.column_index.is_some() {
            self.column_index = other.column_index;
        }
    }
}

/// Process-wide synonym configuration. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// Indexed by `CanonicalField as usize`, same order as [`CanonicalField::ALL`].
    rules: [FieldRule; 6],
}

impl Default for FieldMapping {
    fn default() -> Self {
        let rules = [
            FieldRule::new(
                &["Customer", "Customer Name", "Name", "Client"],
                &[
                    "customer_name",
                    "customername",
                    "customer",
                    "customer.name",
                    "client_name",
                    "client",
                    "name",
                ],
            ),
            FieldRule::new(
                &["Address", "Delivery Address", "Site Address", "Location"],
                &[
                    "address",
                    "delivery_address",
                    "site_address",
                    "service_address",
                    "address1",
                    "address.line1",
                    "street",
                    "location",
                ],
            ),
            FieldRule::new(
                &["Phone", "Phone Number", "Mobile", "Contact"],
                &[
                    "phone",
                    "phone_number",
                    "customer_phone",
                    "customer.phone",
                    "mobile",
                    "telephone",
                ],
            ),
            FieldRule::new(
                &["Size", "Dumpster Size", "Container Size", "Container", "Item"],
                &[
                    "size",
                    "dumpster_size",
                    "container_size",
                    "container",
                    "item",
                    "product",
                ],
            ),
            FieldRule::new(
                &["Order #", "Order", "Order Number", "Order No", "Order Id", "Id"],
                &[
                    "order_number",
                    "order_no",
                    "order_id",
                    "ordernumber",
                    "order",
                    "number",
                    "id",
                ],
            ),
            FieldRule::new(&["Status", "State"], &["status", "order_status", "state"]),
        ];
        Self { rules }
    }
}

impl FieldMapping {
    #[must_use]
    pub fn rule(&self, field: CanonicalField) -> &FieldRule {
        &self.rules[field as usize]
    }

    /// Sets the 1-based column fallback for `field`.
    #[must_use]
    pub fn with_column_index(mut self, field: CanonicalField, index: usize) -> Self {
        self.rules[field as usize].column_index = Some(index);
        self
    }

    /// Applies a YAML override document on top of the defaults.
    ///
    /// The document maps canonical field names to partial rules:
    ///
    /// ```yaml
    /// customer:
    ///   labels: ["Renter", "Customer"]
    /// order_number:
    ///   column_index: 1
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FieldMapParse`] for malformed YAML or unknown
    /// field names.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let overrides: HashMap<CanonicalField, FieldRule> = serde_yaml::from_str(yaml)?;
        let mut mapping = Self::default();
        for (field, rule) in overrides {
            mapping.rules[field as usize].merge(rule);
        }
        Ok(mapping)
    }

    /// Loads a YAML override file. See [`Self::from_yaml_str`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FieldMapIo {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }
}

/// Display names of the canonical fields in the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSchema {
    pub date: String,
    pub customer: String,
    pub address: String,
    pub phone: String,
    pub size: String,
    pub order_number: String,
    pub status: String,
}

impl Default for TargetSchema {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            customer: "Customer".to_string(),
            address: "Address".to_string(),
            phone: "Phone".to_string(),
            size: "Dumpster Size".to_string(),
            order_number: "Order #".to_string(),
            status: "Status".to_string(),
        }
    }
}

impl TargetSchema {
    #[must_use]
    pub fn display_name(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::Customer => &self.customer,
            CanonicalField::Address => &self.address,
            CanonicalField::Phone => &self.phone,
            CanonicalField::Size => &self.size,
            CanonicalField::OrderNumber => &self.order_number,
            CanonicalField::Status => &self.status,
        }
    }

    pub fn set_display_name(&mut self, field: CanonicalField, name: String) {
        let slot = match field {
            CanonicalField::Customer => &mut self.customer,
            CanonicalField::Address => &mut self.address,
            CanonicalField::Phone => &mut self.phone,
            CanonicalField::Size => &mut self.size,
            CanonicalField::OrderNumber => &mut self.order_number,
            CanonicalField::Status => &mut self.status,
        };
        *slot = name;
    }
}

use async_trait::async_trait;
use drsync_core::CanonicalRecord;

use crate::error::StoreError;

/// Keyed record store the reconciler writes into.
///
/// Records are identified by `(date, order number)`. Implementations map the
/// canonical fields onto their own column names.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short name used for logs and for the `<store>-error.txt` artifact.
    fn name(&self) -> &str;

    /// Returns the id of a stored record whose date and order number equal the
    /// given values exactly, if one exists.
    async fn find_record_id(
        &self,
        date: &str,
        order_number: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Creates every record in `records`. Callers keep batches at or below
    /// [`crate::BATCH_SIZE`].
    async fn create_records(&self, records: &[&CanonicalRecord]) -> Result<usize, StoreError>;

    /// Overwrites the stored record named by each id.
    async fn update_records(
        &self,
        records: &[(String, &CanonicalRecord)],
    ) -> Result<usize, StoreError>;
}

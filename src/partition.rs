//! Partition path derivation for raw object keys.
//!
//! A raw upload is named `<prefix><label>-<site>-<year>-<month>-<day><suffix>`.
//! The site and date segments become Hive-style partition directories under
//! the final prefix. The date always comes from the file name, never from the
//! processing clock, so reprocessing an old upload rewrites the same file.

use crate::config::StorageConfig;
use crate::models::PartitionKey;

impl PartitionKey {
    /// Parse a raw object key. `None` when the key is outside the raw
    /// folder, lacks the raw suffix, or does not split into exactly five
    /// dash-separated parts.
    pub fn from_object_key(key: &str, storage: &StorageConfig) -> Option<Self> {
        let stem = key
            .strip_prefix(storage.raw_prefix.as_str())?
            .strip_suffix(storage.raw_suffix.as_str())?;

        let parts: Vec<&str> = stem.split('-').collect();
        let [label, site, year, month, day] = parts.as_slice() else {
            return None;
        };

        Some(PartitionKey {
            label: label.to_string(),
            site: site.to_string(),
            year: year.to_string(),
            month: month.to_string(),
            day: day.to_string(),
        })
    }

    /// Destination key of the CSV for this partition.
    pub fn csv_key(&self, storage: &StorageConfig) -> String {
        format!(
            "{}/periodico={}/year={}/month={}/day={}/{}",
            storage.final_prefix.trim_end_matches('/'),
            self.site,
            self.year,
            self.month,
            self.day,
            storage.output_file
        )
    }
}

/// Whether `key` is a raw upload the extractor should look at.
pub fn is_raw_object(key: &str, storage: &StorageConfig) -> bool {
    key.starts_with(storage.raw_prefix.as_str()) && key.ends_with(storage.raw_suffix.as_str())
}

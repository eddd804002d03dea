//! Blake3 hashing of query definitions

use anyhow::{Context, Result};
use reportline_core::QueryDefinition;

/// Hash raw bytes with blake3.
pub fn hash_bytes(data: &[u8]) -> blake3::Hash {
    blake3::hash(data)
}

/// Identity of a report batch: blake3 of its JSON serialization.
///
/// Field order is fixed by the struct definitions, so equal batches always
/// hash equal. Reordering reports changes the identity.
pub fn query_identity(queries: &[QueryDefinition]) -> Result<blake3::Hash> {
    let json = serde_json::to_vec(queries).context("failed to serialize query definitions")?;
    Ok(hash_bytes(&json))
}

/// Return the first 8 hex characters of a blake3 hash.
pub fn short_hash(hash: &blake3::Hash) -> String {
    hash.to_hex()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportline_core::{DimensionFilter, FilterOperator};

    fn pages_query() -> QueryDefinition {
        QueryDefinition::new("150538750")
            .metric("ga:pageviews")
            .dimension("ga:pagePath")
    }

    #[test]
    fn hash_bytes_deterministic() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn short_hash_length() {
        assert_eq!(short_hash(&hash_bytes(b"test")).len(), 8);
    }

    #[test]
    fn identity_deterministic() {
        let a = query_identity(&[pages_query()]).unwrap();
        let b = query_identity(&[pages_query()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn identity_changes_with_filter() {
        let plain = query_identity(&[pages_query()]).unwrap();
        let filtered = query_identity(&[pages_query().filter(
            DimensionFilter::new("ga:pagePath", FilterOperator::Regexp, ["\\?.*"]).negated(),
        )])
        .unwrap();
        assert_ne!(plain, filtered);
    }

    #[test]
    fn identity_depends_on_report_order() {
        let events = QueryDefinition::new("150538750")
            .metric("ga:totalEvents")
            .dimension("ga:eventCategory");
        let ab = query_identity(&[pages_query(), events.clone()]).unwrap();
        let ba = query_identity(&[events, pages_query()]).unwrap();
        assert_ne!(ab, ba);
    }
}

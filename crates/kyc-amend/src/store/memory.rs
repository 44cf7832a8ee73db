//! In-memory version store.
//!
//! Versions are kept per case in ascending order. Locks are held only for
//! the duration of a single call, never across an `.await`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use kyc_core::Timestamp;

use super::{
    AmendmentRecord, CaseSummary, CaseVersion, NewAmendment, NewValidation, NewVersion,
    ValidationRecord, VersionInfo, VersionStore,
};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    versions: RwLock<BTreeMap<String, Vec<CaseVersion>>>,
    amendments: RwLock<Vec<AmendmentRecord>>,
    validations: RwLock<Vec<ValidationRecord>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored versions across all cases.
    pub fn version_count(&self) -> usize {
        self.versions.read().values().map(Vec::len).sum()
    }

    /// Total number of amendment records across all cases.
    pub fn amendment_count(&self) -> usize {
        self.amendments.read().len()
    }

    /// Total number of validation verdicts across all cases.
    pub fn validation_count(&self) -> usize {
        self.validations.read().len()
    }
}

fn not_found(case: &str) -> StoreError {
    StoreError::NotFound {
        case: case.to_string(),
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn latest_version(&self, case: &str) -> Result<CaseVersion, StoreError> {
        self.versions
            .read()
            .get(case)
            .and_then(|v| v.last())
            .cloned()
            .ok_or_else(|| not_found(case))
    }

    async fn next_version_number(&self, case: &str) -> Result<u32, StoreError> {
        let max = self
            .versions
            .read()
            .get(case)
            .and_then(|v| v.last())
            .map_or(0, |v| v.version);
        Ok(max + 1)
    }

    async fn insert_version(&self, version: NewVersion) -> Result<CaseVersion, StoreError> {
        let mut versions = self.versions.write();
        let existing = versions.entry(version.case_name.clone()).or_default();
        let pos = match existing.binary_search_by_key(&version.version, |v| v.version) {
            Ok(_) => {
                return Err(StoreError::Conflict {
                    case: version.case_name,
                    version: version.version,
                })
            }
            Err(pos) => pos,
        };
        let stored = CaseVersion {
            case_name: version.case_name,
            version: version.version,
            snapshot: version.snapshot,
            content_hash: version.content_hash,
            status: version.status,
            created_at: Timestamp::now(),
        };
        existing.insert(pos, stored.clone());
        Ok(stored)
    }

    async fn insert_amendment(&self, amendment: NewAmendment) -> Result<AmendmentRecord, StoreError> {
        let mut amendments = self.amendments.write();
        let record = AmendmentRecord {
            id: amendments.len() as i64 + 1,
            case_name: amendment.case_name,
            step: amendment.step,
            classification: amendment.classification,
            diff: amendment.diff,
            created_at: Timestamp::now(),
        };
        amendments.push(record.clone());
        Ok(record)
    }

    async fn list_versions(&self, case: &str) -> Result<Vec<VersionInfo>, StoreError> {
        Ok(self
            .versions
            .read()
            .get(case)
            .map(|versions| {
                versions
                    .iter()
                    .map(|v| VersionInfo {
                        version: v.version,
                        content_hash: v.content_hash.clone(),
                        created_at: v.created_at,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_cases(&self) -> Result<Vec<CaseSummary>, StoreError> {
        let mut cases: Vec<CaseSummary> = self
            .versions
            .read()
            .iter()
            .filter_map(|(name, versions)| {
                let latest = versions.last()?;
                let last_updated = versions.iter().map(|v| v.created_at).max()?;
                Some(CaseSummary {
                    name: name.clone(),
                    version_count: versions.len() as u32,
                    status: latest.status,
                    last_updated,
                })
            })
            .collect();
        // Stable sort keeps name order among cases updated in the same second.
        cases.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(cases)
    }

    async fn get_version(&self, case: &str, version: u32) -> Result<CaseVersion, StoreError> {
        self.versions
            .read()
            .get(case)
            .and_then(|versions| versions.iter().find(|v| v.version == version))
            .cloned()
            .ok_or_else(|| not_found(case))
    }

    async fn list_amendments(&self, case: &str) -> Result<Vec<AmendmentRecord>, StoreError> {
        Ok(self
            .amendments
            .read()
            .iter()
            .filter(|a| a.case_name == case)
            .cloned()
            .collect())
    }

    async fn insert_validation(&self, validation: NewValidation) -> Result<ValidationRecord, StoreError> {
        let mut validations = self.validations.write();
        let record =
            ValidationRecord::stored(validations.len() as i64 + 1, validation, Timestamp::now());
        validations.push(record.clone());
        Ok(record)
    }

    async fn list_validations(&self, case: &str) -> Result<Vec<ValidationRecord>, StoreError> {
        Ok(self
            .validations
            .read()
            .iter()
            .rev()
            .filter(|v| v.case_name == case)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyc_core::{snapshot_hash, CaseStatus};

    fn new_version(case: &str, version: u32, snapshot: &str) -> NewVersion {
        NewVersion {
            case_name: case.to_string(),
            version,
            snapshot: snapshot.to_string(),
            content_hash: snapshot_hash(snapshot),
            status: CaseStatus::Pending,
        }
    }

    #[tokio::test]
    async fn unknown_case() {
        let store = MemoryVersionStore::new();
        assert_eq!(
            store.latest_version("NOPE").await,
            Err(StoreError::NotFound {
                case: "NOPE".into()
            })
        );
        assert_eq!(store.next_version_number("NOPE").await, Ok(1));
        assert!(store.list_versions("NOPE").await.unwrap().is_empty());
        assert!(store.get_version("NOPE", 1).await.is_err());
    }

    #[tokio::test]
    async fn versions_accumulate_in_order() {
        let store = MemoryVersionStore::new();
        store.insert_version(new_version("A", 1, "one")).await.unwrap();
        store.insert_version(new_version("A", 2, "two")).await.unwrap();

        assert_eq!(store.next_version_number("A").await, Ok(3));
        let latest = store.latest_version("A").await.unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.snapshot, "two");
        assert_eq!(latest.content_hash, snapshot_hash("two"));
        assert_eq!(store.get_version("A", 1).await.unwrap().snapshot, "one");

        let listed: Vec<u32> = store
            .list_versions("A")
            .await
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(listed, vec![1, 2]);
    }

    #[tokio::test]
    async fn duplicate_version_conflicts() {
        let store = MemoryVersionStore::new();
        store.insert_version(new_version("A", 1, "one")).await.unwrap();
        assert_eq!(
            store.insert_version(new_version("A", 1, "again")).await,
            Err(StoreError::Conflict {
                case: "A".into(),
                version: 1
            })
        );
        assert_eq!(store.latest_version("A").await.unwrap().snapshot, "one");
        assert_eq!(store.version_count(), 1);
    }

    #[tokio::test]
    async fn case_summaries_use_latest_status() {
        let store = MemoryVersionStore::new();
        store.insert_version(new_version("A", 1, "a1")).await.unwrap();
        let mut done = new_version("A", 2, "a2");
        done.status = CaseStatus::Complete;
        store.insert_version(done).await.unwrap();
        store.insert_version(new_version("B", 1, "b1")).await.unwrap();

        let cases = store.list_cases().await.unwrap();
        assert_eq!(cases.len(), 2);
        let a = cases.iter().find(|c| c.name == "A").unwrap();
        assert_eq!(a.version_count, 2);
        assert_eq!(a.status, CaseStatus::Complete);
    }

    #[tokio::test]
    async fn amendments_are_filtered_by_case() {
        let store = MemoryVersionStore::new();
        for case in ["A", "B", "A"] {
            store
                .insert_amendment(NewAmendment {
                    case_name: case.to_string(),
                    step: "policy-discovery".into(),
                    classification: "policy-injection".into(),
                    diff: "+ (policy P)\n".into(),
                })
                .await
                .unwrap();
        }
        let log = store.list_amendments("A").await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id, 1);
        assert_eq!(log[1].id, 3);
        assert_eq!(store.amendment_count(), 3);
    }

    #[tokio::test]
    async fn validations_are_listed_newest_first() {
        use crate::store::ValidationStatus;

        let store = MemoryVersionStore::new();
        for (case, status) in [
            ("A", ValidationStatus::Pass),
            ("B", ValidationStatus::Pass),
            ("A", ValidationStatus::Fail),
        ] {
            store
                .insert_validation(NewValidation {
                    case_name: case.to_string(),
                    version: 1,
                    step: "validate".into(),
                    actor: "System".into(),
                    schema_ref: None,
                    status,
                    error_message: None,
                    total_checks: 1,
                    passed_checks: u32::from(status == ValidationStatus::Pass),
                    failed_checks: u32::from(status == ValidationStatus::Fail),
                })
                .await
                .unwrap();
        }
        let history = store.list_validations("A").await.unwrap();
        let ids: Vec<i64> = history.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(history[0].status, ValidationStatus::Fail);
        assert!(store.list_validations("C").await.unwrap().is_empty());
        assert_eq!(store.validation_count(), 3);
    }
}

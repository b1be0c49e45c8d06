use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;

use super::error::{BatchError, UploadError};
use super::model::{ImageBlob, ImageRecord, ImageSlot, UploadBatch};
use super::store::AssetStore;

/// What an update does to a stored image set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdatePlan {
    /// Stored assets no longer referenced; deleted remotely.
    pub to_delete: BTreeSet<String>,
    /// Existing records still referenced, in the order the client listed them.
    pub retained: Vec<ImageRecord>,
}

/// Keeps a parent's image set in step with the remote asset host.
///
/// Every remote call in a batch is issued concurrently and joined before
/// returning. Deletion failures are logged and swallowed.
#[derive(Clone)]
pub struct ImageReconciler {
    store: Arc<dyn AssetStore>,
}

impl ImageReconciler {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        Self { store }
    }

    /// Compute the update plan without touching the asset host.
    pub fn plan_update(existing: &[ImageRecord], incoming: &[ImageSlot]) -> UpdatePlan {
        let incoming_ids: HashSet<&str> = incoming.iter().filter_map(ImageSlot::public_id).collect();

        let to_delete = existing
            .iter()
            .filter(|record| !incoming_ids.contains(record.public_id.as_str()))
            .map(|record| record.public_id.clone())
            .collect();

        let by_id: HashMap<&str, &ImageRecord> = existing
            .iter()
            .map(|record| (record.public_id.as_str(), record))
            .collect();

        let mut seen = HashSet::new();
        let retained = incoming
            .iter()
            .filter_map(ImageSlot::public_id)
            .filter(|id| seen.insert(*id))
            .filter_map(|id| by_id.get(id).map(|record| (*record).clone()))
            .collect();

        UpdatePlan { to_delete, retained }
    }

    /// Diff `existing` against `incoming` and delete the assets that dropped out.
    pub async fn reconcile_on_update(
        &self,
        existing: &[ImageRecord],
        incoming: &[ImageSlot],
    ) -> UpdatePlan {
        let plan = Self::plan_update(existing, incoming);
        if !plan.to_delete.is_empty() {
            tracing::info!("🗑️ Removing {} orphaned image(s)", plan.to_delete.len());
            self.delete_all(plan.to_delete.iter().map(String::as_str)).await;
        }
        plan
    }

    /// Delete every asset of a parent that is about to be destroyed.
    pub async fn reconcile_on_delete(&self, existing: &[ImageRecord]) {
        self.delete_all(existing.iter().map(|record| record.public_id.as_str()))
            .await;
    }

    /// Whether a client-supplied record points at an asset this host issued.
    pub fn owns(&self, record: &ImageRecord) -> bool {
        self.store.owns(record)
    }

    /// Upload each blob concurrently. Results line up with `files`.
    pub async fn upload_each(&self, files: Vec<ImageBlob>) -> Vec<Result<ImageRecord, UploadError>> {
        join_all(files.into_iter().map(|blob| self.store.upload(blob))).await
    }

    /// Upload a batch, keeping the successes in submission order.
    ///
    /// `max_count` is the caller's ceiling; it is reported, not enforced.
    pub async fn upload_batch(
        &self,
        files: Vec<ImageBlob>,
        max_count: usize,
    ) -> Result<UploadBatch, BatchError> {
        if files.is_empty() {
            return Err(BatchError::Empty);
        }
        if files.len() > max_count {
            tracing::warn!(
                "Upload batch of {} exceeds caller ceiling of {}",
                files.len(),
                max_count
            );
        }

        let mut accepted = Vec::with_capacity(files.len());
        let mut rejected = 0;
        for (index, result) in self.upload_each(files).await.into_iter().enumerate() {
            match result {
                Ok(record) => accepted.push(record),
                Err(e) => {
                    tracing::warn!("Upload #{} failed: {}", index, e);
                    rejected += 1;
                }
            }
        }

        if accepted.is_empty() {
            return Err(BatchError::AllFailed { rejected });
        }

        Ok(UploadBatch { accepted, rejected })
    }

    async fn delete_all<'a>(&self, public_ids: impl Iterator<Item = &'a str>) {
        let deletions = public_ids.map(|public_id| async move {
            if let Err(e) = self.store.delete(public_id).await {
                // The asset stays orphaned on the host
                tracing::warn!("⚠️ {}", e);
            }
        });
        join_all(deletions).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::DeleteError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        uploads: Mutex<usize>,
        deleted: Mutex<Vec<String>>,
        fail_deletes: HashSet<String>,
        fail_upload_marker: Option<u8>,
    }

    #[async_trait]
    impl AssetStore for FakeStore {
        async fn upload(&self, blob: ImageBlob) -> Result<ImageRecord, UploadError> {
            let n = {
                let mut uploads = self.uploads.lock().unwrap();
                *uploads += 1;
                *uploads
            };
            if blob.bytes.first() == self.fail_upload_marker.as_ref() {
                return Err(UploadError::Remote("boom".to_string()));
            }
            let id = format!("listings/{}-{}.{}", blob.bytes[0], n, blob.extension);
            Ok(ImageRecord {
                url: format!("https://cdn.test/{}", id),
                public_id: id,
            })
        }

        async fn delete(&self, public_id: &str) -> Result<(), DeleteError> {
            if self.fail_deletes.contains(public_id) {
                return Err(DeleteError {
                    public_id: public_id.to_string(),
                    reason: "host unavailable".to_string(),
                });
            }
            self.deleted.lock().unwrap().push(public_id.to_string());
            Ok(())
        }

        fn owns(&self, record: &ImageRecord) -> bool {
            record.public_id.starts_with("listings/")
                && record.url == format!("https://cdn.test/{}", record.public_id)
        }
    }

    fn record(id: &str) -> ImageRecord {
        ImageRecord {
            url: format!("https://cdn.test/{}", id),
            public_id: id.to_string(),
        }
    }

    fn stored(id: &str) -> ImageSlot {
        ImageSlot::Stored(record(id))
    }

    fn blob(tag: u8) -> ImageBlob {
        ImageBlob {
            bytes: vec![tag],
            content_type: "image/png".to_string(),
            extension: "png",
        }
    }

    fn ids(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_plan_removes_dropped_ids() {
        let plan = ImageReconciler::plan_update(&[record("a"), record("b")], &[stored("b")]);
        assert_eq!(ids(&plan.to_delete), vec!["a"]);
        assert_eq!(plan.retained, vec![record("b")]);
    }

    #[test]
    fn test_plan_nothing_to_delete_from_empty() {
        let plan = ImageReconciler::plan_update(&[], &[stored("x")]);
        assert!(plan.to_delete.is_empty());
        // "x" was never stored on this parent, so it is not retained either
        assert!(plan.retained.is_empty());
    }

    #[test]
    fn test_plan_superset_keeps_everything() {
        let existing = [record("a"), record("b")];
        let incoming = [stored("b"), ImageSlot::Pending(blob(1)), stored("a"), stored("c")];
        let plan = ImageReconciler::plan_update(&existing, &incoming);
        assert!(plan.to_delete.is_empty());
        // Client order wins
        assert_eq!(plan.retained, vec![record("b"), record("a")]);
    }

    #[test]
    fn test_plan_ignores_pending_entries() {
        let plan = ImageReconciler::plan_update(
            &[record("a")],
            &[ImageSlot::Pending(blob(1)), ImageSlot::Pending(blob(2))],
        );
        assert_eq!(ids(&plan.to_delete), vec!["a"]);
        assert!(plan.retained.is_empty());
    }

    #[test]
    fn test_plan_uses_stored_url_for_retained() {
        let incoming = [ImageSlot::Stored(ImageRecord {
            url: "https://evil.test/swap.png".to_string(),
            public_id: "a".to_string(),
        })];
        let plan = ImageReconciler::plan_update(&[record("a")], &incoming);
        assert_eq!(plan.retained, vec![record("a")]);
    }

    #[test]
    fn test_plan_deduplicates_retained() {
        let plan = ImageReconciler::plan_update(&[record("a")], &[stored("a"), stored("a")]);
        assert_eq!(plan.retained, vec![record("a")]);
    }

    #[tokio::test]
    async fn test_reconcile_on_update_is_idempotent() {
        let store = Arc::new(FakeStore::default());
        let reconciler = ImageReconciler::new(store.clone());
        let existing = [record("a"), record("b"), record("c")];
        let incoming = [stored("c")];

        let first = reconciler.reconcile_on_update(&existing, &incoming).await;
        let second = reconciler.reconcile_on_update(&existing, &incoming).await;

        assert_eq!(first, second);
        assert_eq!(ids(&first.to_delete), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_one_failed_delete_does_not_block_others() {
        let store = Arc::new(FakeStore {
            fail_deletes: HashSet::from(["a".to_string()]),
            ..Default::default()
        });
        let reconciler = ImageReconciler::new(store.clone());

        let plan = reconciler
            .reconcile_on_update(&[record("a"), record("b"), record("c")], &[stored("c")])
            .await;

        assert_eq!(ids(&plan.to_delete), vec!["a", "b"]);
        assert_eq!(*store.deleted.lock().unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_reconcile_on_delete_attempts_every_asset() {
        let store = Arc::new(FakeStore {
            fail_deletes: HashSet::from(["b".to_string()]),
            ..Default::default()
        });
        let reconciler = ImageReconciler::new(store.clone());

        reconciler
            .reconcile_on_delete(&[record("a"), record("b"), record("c")])
            .await;

        let mut deleted = store.deleted.lock().unwrap().clone();
        deleted.sort();
        assert_eq!(deleted, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_owns_defers_to_store() {
        let reconciler = ImageReconciler::new(Arc::new(FakeStore::default()));
        assert!(reconciler.owns(&record("listings/a.png")));
        assert!(!reconciler.owns(&record("avatars/a.png")));
        assert!(!reconciler.owns(&ImageRecord {
            url: "https://evil.test/listings/a.png".to_string(),
            public_id: "listings/a.png".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_upload_batch_empty_makes_no_calls() {
        let store = Arc::new(FakeStore::default());
        let reconciler = ImageReconciler::new(store.clone());

        assert_eq!(reconciler.upload_batch(vec![], 6).await, Err(BatchError::Empty));
        assert_eq!(*store.uploads.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upload_batch_partial_failure_keeps_order() {
        let store = Arc::new(FakeStore {
            fail_upload_marker: Some(2),
            ..Default::default()
        });
        let reconciler = ImageReconciler::new(store.clone());

        let batch = reconciler
            .upload_batch(vec![blob(1), blob(2), blob(3)], 6)
            .await
            .unwrap();

        assert_eq!(batch.rejected, 1);
        assert_eq!(batch.accepted.len(), 2);
        assert!(batch.accepted[0].public_id.starts_with("listings/1-"));
        assert!(batch.accepted[1].public_id.starts_with("listings/3-"));
    }

    #[tokio::test]
    async fn test_upload_batch_total_failure() {
        let store = Arc::new(FakeStore {
            fail_upload_marker: Some(9),
            ..Default::default()
        });
        let reconciler = ImageReconciler::new(store.clone());

        assert_eq!(
            reconciler.upload_batch(vec![blob(9), blob(9)], 6).await,
            Err(BatchError::AllFailed { rejected: 2 })
        );
    }

    #[tokio::test]
    async fn test_upload_batch_does_not_enforce_ceiling() {
        let store = Arc::new(FakeStore::default());
        let reconciler = ImageReconciler::new(store.clone());

        let batch = reconciler
            .upload_batch(vec![blob(1), blob(2), blob(3)], 2)
            .await
            .unwrap();
        assert_eq!(batch.accepted.len(), 3);
    }
}

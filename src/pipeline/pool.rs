//! Bounded-parallel execution of per-track conversion work.
//!
//! At most `workers` units of work are in flight at once; completion order
//! is unspecified. A failing unit is captured into its outcome and never
//! cancels its siblings.

use std::future::Future;

use futures::{StreamExt, stream};

use crate::scanner::WorkItem;

/// Result of one track's transcode + tag-copy unit of work.
#[derive(Debug, Clone)]
pub struct TranscodeOutcome {
    pub item: WorkItem,
    pub ok: bool,
    pub error_detail: Option<String>,
}

impl TranscodeOutcome {
    pub fn success(item: WorkItem) -> Self {
        Self {
            item,
            ok: true,
            error_detail: None,
        }
    }

    pub fn failure(item: WorkItem, detail: impl Into<String>) -> Self {
        Self {
            item,
            ok: false,
            error_detail: Some(detail.into()),
        }
    }
}

/// Run `work` over `items` with at most `workers` units in flight.
///
/// Every started item yields exactly one outcome; `work` may return `None`
/// to decline an item it never started (cancellation), which drops it from
/// the outcome set.
pub async fn run_pool<F, Fut>(items: Vec<WorkItem>, workers: usize, work: F) -> Vec<TranscodeOutcome>
where
    F: Fn(WorkItem) -> Fut,
    Fut: Future<Output = Option<TranscodeOutcome>>,
{
    stream::iter(items)
        .map(work)
        .buffer_unordered(workers.max(1))
        .filter_map(|outcome| async move { outcome })
        .collect()
        .await
}

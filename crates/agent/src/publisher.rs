/*
 * SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

//! The inventory publisher.
//!
//! Each run discovers the site's inventory of one kind, batches it into
//! cloud-sized pages and submits every page as a durable activity. The
//! cloud side ingests idempotently, so pages may be delivered more than
//! once. At least one page is always submitted, even for empty or failed
//! sweeps, so the cloud can tell "nothing there" from "nobody called".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use model::ids::TaskId;
use model::inventory::{InventoryItem, InventoryKind, InventoryPage, PageStatus};
use tokio_util::sync::CancellationToken;
use workflow::{RetryPolicy, SubmitOptions, WorkflowEngine};

use crate::source::{InventorySource, SourceError};

pub const INGEST_QUEUE: &str = "inventory-ingest";

/// Where finished pages go: the production implementation calls the
/// cloud-side ingestion RPC.
#[async_trait::async_trait]
pub trait InventoryIngest: Send + Sync {
    async fn submit_page(&self, page: &InventoryPage) -> eyre::Result<()>;
}

/// Slices the discovered ID set into 1-indexed, disjoint pages whose union
/// is exactly the input. Items travel on the page that carries their ID.
/// An empty ID set still yields one (empty) page.
pub fn build_pages(
    ids: &[String],
    items: &[InventoryItem],
    cloud_page_size: usize,
) -> Vec<InventoryPage> {
    if ids.is_empty() {
        return vec![InventoryPage {
            current_page: 1,
            total_pages: 1,
            page_size: cloud_page_size as u32,
            status: PageStatus::Success,
            ..Default::default()
        }];
    }

    let items_by_id: HashMap<&str, &InventoryItem> =
        items.iter().map(|item| (item.id.as_str(), item)).collect();

    let total_items = ids.len() as u64;
    let total_pages = ids.len().div_ceil(cloud_page_size) as u32;

    let mut pages = Vec::with_capacity(total_pages as usize);
    for (index, chunk) in ids.chunks(cloud_page_size).enumerate() {
        pages.push(InventoryPage {
            current_page: index as u32 + 1,
            total_pages,
            page_size: cloud_page_size as u32,
            total_items,
            item_ids: chunk.to_vec(),
            items: chunk
                .iter()
                .filter_map(|id| items_by_id.get(id.as_str()).map(|item| (*item).clone()))
                .collect(),
            status: PageStatus::Success,
            status_message: String::new(),
        });
    }
    pages
}

pub struct InventoryPublisher {
    source: Arc<dyn InventorySource>,
    ingest: Arc<dyn InventoryIngest>,
    engine: Arc<dyn WorkflowEngine>,
    /// ID chunk size for `find_by_ids` calls against the controller.
    site_page_size: usize,
    /// Page size for cloud submissions.
    cloud_page_size: usize,
}

impl InventoryPublisher {
    pub fn new(
        source: Arc<dyn InventorySource>,
        ingest: Arc<dyn InventoryIngest>,
        engine: Arc<dyn WorkflowEngine>,
        site_page_size: usize,
        cloud_page_size: usize,
    ) -> Self {
        assert!(site_page_size > 0 && cloud_page_size > 0);
        InventoryPublisher {
            source,
            ingest,
            engine,
            site_page_size,
            cloud_page_size,
        }
    }

    /// One full publication run for a kind. Returns the submitted task IDs,
    /// one per page.
    pub async fn publish_once(&self, kind: InventoryKind) -> Vec<TaskId> {
        let pages = match self.discover(kind).await {
            Ok(pages) => pages,
            Err(err) => {
                tracing::error!(%kind, "inventory discovery failed: {err}");
                // The cloud still gets told the sweep happened and failed.
                vec![InventoryPage {
                    current_page: 1,
                    total_pages: 1,
                    page_size: self.cloud_page_size as u32,
                    status: PageStatus::Failure,
                    status_message: err.to_string(),
                    ..Default::default()
                }]
            }
        };

        tracing::info!(%kind, pages = pages.len(), "submitting inventory pages");
        let mut task_ids = Vec::with_capacity(pages.len());
        for page in pages {
            task_ids.push(self.submit(page).await);
        }
        task_ids
    }

    async fn discover(&self, kind: InventoryKind) -> Result<Vec<InventoryPage>, SourceError> {
        let ids = match self.source.find_ids(kind).await {
            Ok(ids) => ids,
            Err(SourceError::Unimplemented) => {
                // Older controllers only ship the full-list call; it
                // returns items directly.
                tracing::debug!(%kind,
                    "controller has no paged ID surface, using legacy listing");
                let items = self.source.list_all(kind).await?;
                let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
                return Ok(build_pages(&ids, &items, self.cloud_page_size));
            }
            Err(err) => return Err(err),
        };

        let mut items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.site_page_size) {
            items.extend(self.source.find_by_ids(kind, chunk).await?);
        }
        Ok(build_pages(&ids, &items, self.cloud_page_size))
    }

    async fn submit(&self, page: InventoryPage) -> TaskId {
        // Two attempts with exponential backoff per the activity contract;
        // the cloud tolerates re-delivery.
        let options = SubmitOptions {
            retry_policy: RetryPolicy {
                initial_interval: Duration::from_secs(5),
                backoff: 2.0,
                max_interval: Duration::from_secs(30),
                max_attempts: 2,
            },
            start_to_close_timeout: Duration::from_secs(60),
        };

        let ingest = Arc::clone(&self.ingest);
        self.engine
            .submit(
                INGEST_QUEUE,
                Box::new(move || {
                    let ingest = Arc::clone(&ingest);
                    let page = page.clone();
                    Box::pin(async move { ingest.submit_page(&page).await })
                }),
                options,
            )
            .await
    }

    /// The periodic publication loop; runs until cancelled.
    pub async fn run(&self, kind: InventoryKind, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("inventory publisher stopping");
                    return;
                }
                _ = interval.tick() => {
                    self.publish_once(kind).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use workflow::{InProcessEngine, TaskState};

    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("machine-{i:03}")).collect()
    }

    fn items_for(ids: &[String]) -> Vec<InventoryItem> {
        ids.iter()
            .map(|id| InventoryItem {
                id: id.clone(),
                serial_number: format!("SN-{id}"),
                kind: "expected-machine".to_string(),
                payload_json: "{}".to_string(),
            })
            .collect()
    }

    // 195 IDs at page size 25: 8 pages, the last one carrying 20.
    #[test]
    fn test_build_pages_195_by_25() {
        let ids = ids(195);
        let items = items_for(&ids);
        let pages = build_pages(&ids, &items, 25);

        assert_eq!(pages.len(), 8);
        for (index, page) in pages.iter().enumerate() {
            assert_eq!(page.current_page, index as u32 + 1);
            assert_eq!(page.total_pages, 8);
            assert_eq!(page.page_size, 25);
            assert_eq!(page.total_items, 195);
            assert_eq!(page.status, PageStatus::Success);
        }
        assert_eq!(pages[7].item_ids.len(), 20);

        // Pages are disjoint and their union is the input set.
        let mut union: Vec<String> = pages.iter().flat_map(|p| p.item_ids.clone()).collect();
        assert_eq!(union.len(), 195);
        union.sort();
        union.dedup();
        assert_eq!(union.len(), 195);
        let mut sorted_input = ids.clone();
        sorted_input.sort();
        assert_eq!(union, sorted_input);
    }

    #[test]
    fn test_build_pages_empty_set_yields_one_page() {
        let pages = build_pages(&[], &[], 25);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].current_page, 1);
        assert_eq!(pages[0].total_pages, 1);
        assert_eq!(pages[0].total_items, 0);
        assert!(pages[0].item_ids.is_empty());
        assert_eq!(pages[0].status, PageStatus::Success);
    }

    #[test]
    fn test_build_pages_exact_multiple() {
        let ids = ids(50);
        let pages = build_pages(&ids, &items_for(&ids), 25);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].item_ids.len(), 25);
    }

    struct FakeSource {
        ids: Vec<String>,
        items: Vec<InventoryItem>,
        paged_surface: bool,
        fail_find_by_ids: bool,
        chunk_sizes: Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl InventorySource for FakeSource {
        async fn find_ids(&self, _kind: InventoryKind) -> Result<Vec<String>, SourceError> {
            if !self.paged_surface {
                return Err(SourceError::Unimplemented);
            }
            Ok(self.ids.clone())
        }

        async fn find_by_ids(
            &self,
            _kind: InventoryKind,
            ids: &[String],
        ) -> Result<Vec<InventoryItem>, SourceError> {
            if self.fail_find_by_ids {
                return Err(SourceError::Transport("controller went away".to_string()));
            }
            self.chunk_sizes.lock().unwrap().push(ids.len());
            Ok(self
                .items
                .iter()
                .filter(|item| ids.contains(&item.id))
                .cloned()
                .collect())
        }

        async fn list_all(&self, _kind: InventoryKind) -> Result<Vec<InventoryItem>, SourceError> {
            Ok(self.items.clone())
        }
    }

    #[derive(Default)]
    struct RecordingIngest {
        pages: Mutex<Vec<InventoryPage>>,
    }

    #[async_trait::async_trait]
    impl InventoryIngest for RecordingIngest {
        async fn submit_page(&self, page: &InventoryPage) -> eyre::Result<()> {
            self.pages.lock().unwrap().push(page.clone());
            Ok(())
        }
    }

    async fn run_publisher(source: FakeSource) -> (Vec<InventoryPage>, Vec<TaskState>) {
        let engine = Arc::new(InProcessEngine::new());
        let ingest = Arc::new(RecordingIngest::default());
        let publisher = InventoryPublisher::new(
            Arc::new(source),
            ingest.clone(),
            engine.clone(),
            10, // site page size
            25, // cloud page size
        );

        let task_ids = publisher.publish_once(InventoryKind::ExpectedMachine).await;
        let mut states = Vec::new();
        for task_id in task_ids {
            states.push(engine.wait(task_id).await.unwrap());
        }

        let mut pages = ingest.pages.lock().unwrap().clone();
        pages.sort_by_key(|p| p.current_page);
        (pages, states)
    }

    #[tokio::test]
    async fn test_publish_once_pages_through_controller() {
        let all_ids = ids(42);
        let source = FakeSource {
            ids: all_ids.clone(),
            items: items_for(&all_ids),
            paged_surface: true,
            fail_find_by_ids: false,
            chunk_sizes: Mutex::new(Vec::new()),
        };
        let (pages, states) = run_publisher(source).await;

        assert_eq!(pages.len(), 2);
        assert!(states.iter().all(|s| *s == TaskState::Completed));
        assert_eq!(pages[0].item_ids.len(), 25);
        assert_eq!(pages[1].item_ids.len(), 17);
        assert_eq!(pages[0].items.len(), 25);
        assert_eq!(pages[1].total_items, 42);
    }

    #[tokio::test]
    async fn test_site_chunking_respects_site_page_size() {
        let all_ids = ids(23);
        let chunk_sizes = {
            let source = FakeSource {
                ids: all_ids.clone(),
                items: items_for(&all_ids),
                paged_surface: true,
                fail_find_by_ids: false,
                chunk_sizes: Mutex::new(Vec::new()),
            };
            let engine = Arc::new(InProcessEngine::new());
            let ingest = Arc::new(RecordingIngest::default());
            let source = Arc::new(source);
            let publisher = InventoryPublisher::new(
                source.clone(),
                ingest,
                engine.clone(),
                10,
                25,
            );
            for task_id in publisher.publish_once(InventoryKind::ExpectedMachine).await {
                engine.wait(task_id).await;
            }
            source.chunk_sizes.lock().unwrap().clone()
        };
        assert_eq!(chunk_sizes, vec![10, 10, 3]);
    }

    #[tokio::test]
    async fn test_legacy_fallback_on_unimplemented() {
        let all_ids = ids(5);
        let source = FakeSource {
            ids: Vec::new(), // never consulted
            items: items_for(&all_ids),
            paged_surface: false,
            fail_find_by_ids: false,
            chunk_sizes: Mutex::new(Vec::new()),
        };
        let (pages, states) = run_publisher(source).await;

        assert_eq!(pages.len(), 1);
        assert_eq!(states, vec![TaskState::Completed]);
        assert_eq!(pages[0].item_ids.len(), 5);
        assert_eq!(pages[0].items.len(), 5);
    }

    #[tokio::test]
    async fn test_discovery_failure_still_submits_one_page() {
        let all_ids = ids(5);
        let source = FakeSource {
            ids: all_ids.clone(),
            items: items_for(&all_ids),
            paged_surface: true,
            fail_find_by_ids: true,
            chunk_sizes: Mutex::new(Vec::new()),
        };
        let (pages, states) = run_publisher(source).await;

        assert_eq!(pages.len(), 1);
        assert_eq!(states, vec![TaskState::Completed]);
        assert_eq!(pages[0].status, PageStatus::Failure);
        assert!(pages[0].status_message.contains("controller went away"));
        assert!(pages[0].item_ids.is_empty());
    }

    #[tokio::test]
    async fn test_empty_inventory_still_submits_one_page() {
        let source = FakeSource {
            ids: Vec::new(),
            items: Vec::new(),
            paged_surface: true,
            fail_find_by_ids: false,
            chunk_sizes: Mutex::new(Vec::new()),
        };
        let (pages, states) = run_publisher(source).await;
        assert_eq!(pages.len(), 1);
        assert_eq!(states, vec![TaskState::Completed]);
        assert_eq!(pages[0].total_items, 0);
        assert_eq!(pages[0].status, PageStatus::Success);
    }
}

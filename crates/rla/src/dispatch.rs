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

//! The task dispatcher: expands heterogeneous operation targets to racks
//! and submits exactly one durable task per distinct rack.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use db::DatabaseResult;
use model::component::{Component, ComponentType};
use model::firmware::FirmwareVersion;
use model::ids::{RackId, TaskId};
use model::rack::Rack;
use rpc::rla;
use sqlx::PgConnection;
use tonic::Status;
use workflow::{RetryPolicy, SubmitOptions, WorkflowEngine};

use crate::conv;

pub const RACK_TASK_QUEUE: &str = "rack-operations";

/// The operation a per-rack task executes.
#[derive(Clone, Debug, PartialEq)]
pub enum RackOperation {
    PowerOn {
        forced: bool,
    },
    PowerOff {
        forced: bool,
    },
    PowerReset {
        forced: bool,
    },
    UpgradeFirmware {
        target_version: FirmwareVersion,
        /// Validated but not yet honored by the executors.
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    },
}

impl RackOperation {
    pub fn name(&self) -> &'static str {
        match self {
            RackOperation::PowerOn { .. } => "power-on",
            RackOperation::PowerOff { .. } => "power-off",
            RackOperation::PowerReset { .. } => "power-reset",
            RackOperation::UpgradeFirmware { .. } => "upgrade-firmware",
        }
    }
}

/// Where per-rack tasks land: the production implementation forwards power
/// shelf work to the powershelf manager; tests record.
#[async_trait::async_trait]
pub trait RackOperationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        operation: &RackOperation,
        rack: &Rack,
        components: &[Component],
    ) -> eyre::Result<()>;
}

/// One rack of the expanded target set, with its locally-resolved
/// component list.
#[derive(Clone, Debug)]
pub struct RackScope {
    pub rack: Rack,
    pub component_type: Option<ComponentType>,
    pub components: Vec<Component>,
}

/// Deduplicates resolved rack targets: the first occurrence of a rack wins,
/// except that a later unfiltered occurrence widens the component scope to
/// all types.
pub fn dedupe_targets(
    targets: Vec<(Rack, Option<ComponentType>)>,
) -> Vec<(Rack, Option<ComponentType>)> {
    let mut out: Vec<(Rack, Option<ComponentType>)> = Vec::with_capacity(targets.len());
    for (rack, component_type) in targets {
        match out.iter_mut().find(|(seen, _)| seen.id == rack.id) {
            Some((_, seen_filter)) => {
                if component_type.is_none() {
                    *seen_filter = None;
                }
            }
            None => out.push((rack, component_type)),
        }
    }
    out
}

fn wire_type_filter(raw: i32) -> Result<Option<ComponentType>, Status> {
    let component_type = conv::component_type_from_wire(raw).map_err(Status::from)?;
    Ok(match component_type {
        ComponentType::Unknown => None,
        other => Some(other),
    })
}

/// Expands an `OperationTargetSpec` into distinct racks with resolved
/// component lists. Soft-deleted racks never resolve; a component target
/// must belong to a rack.
pub async fn resolve_scope(
    txn: &mut PgConnection,
    spec: &rla::OperationTargetSpec,
) -> Result<Vec<RackScope>, Status> {
    let mut targets: Vec<(Rack, Option<ComponentType>)> = Vec::new();

    for rack_target in &spec.racks {
        let component_type = wire_type_filter(rack_target.component_type)?;
        let rack = match &rack_target.rack {
            Some(rla::rack_target::Rack::RackId(raw)) => {
                let rack_id = conv::rack_id_from_wire(raw).map_err(Status::from)?;
                db::rack::find_by_id(&mut *txn, rack_id).await?
            }
            Some(rla::rack_target::Rack::RackName(name)) => {
                db::rack::find_by_name(&mut *txn, name).await?
            }
            None => {
                return Err(Status::invalid_argument(
                    "rack target must name a rack by id or name",
                ));
            }
        };
        targets.push((rack, component_type));
    }

    for component_target in &spec.components {
        let component = match &component_target.target {
            Some(rla::component_target::Target::ExternalId(external_id)) => {
                db::component::find_by_external_id(&mut *txn, external_id).await?
            }
            Some(rla::component_target::Target::ComponentId(raw)) => {
                let component_id = conv::component_id_from_wire(raw).map_err(Status::from)?;
                db::component::find_by_id(&mut *txn, component_id).await?
            }
            None => {
                return Err(Status::invalid_argument(
                    "component target must carry an external id or a component id",
                ));
            }
        };
        let rack_id = component.rack_id.ok_or_else(|| {
            Status::failed_precondition(format!(
                "component {} is not assigned to a rack",
                component.serial_number
            ))
        })?;
        let rack = db::rack::find_by_id(&mut *txn, rack_id).await?;
        targets.push((rack, Some(component.component_type)));
    }

    let mut scopes = Vec::new();
    for (rack, component_type) in dedupe_targets(targets) {
        let components = components_in_scope(&mut *txn, rack.id, component_type).await?;
        scopes.push(RackScope {
            rack,
            component_type,
            components,
        });
    }
    Ok(scopes)
}

async fn components_in_scope(
    txn: &mut PgConnection,
    rack_id: RackId,
    component_type: Option<ComponentType>,
) -> DatabaseResult<Vec<Component>> {
    let mut components = db::component::list_by_rack(txn, rack_id).await?;
    if let Some(wanted) = component_type {
        components.retain(|c| c.component_type == wanted);
    }
    Ok(components)
}

/// Parses and validates the optional firmware scheduling window: RFC 3339
/// timestamps, `end` after `start`, both in the future. Accepted but not
/// yet scheduled on.
pub fn validate_schedule_window(
    start_time: Option<&str>,
    end_time: Option<&str>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, Status> {
    let parse = |raw: &str| {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| Status::invalid_argument(format!("timestamp {raw} is not valid")))
    };

    match (start_time, end_time) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            let start = parse(start)?;
            let end = parse(end)?;
            if end <= start {
                return Err(Status::invalid_argument(
                    "schedule window end must be after its start",
                ));
            }
            if end <= Utc::now() {
                return Err(Status::invalid_argument(
                    "schedule window lies in the past",
                ));
            }
            Ok(Some((start, end)))
        }
        _ => Err(Status::invalid_argument(
            "schedule window needs both a start and an end time",
        )),
    }
}

/// Submits one durable task per rack scope and returns the task IDs in
/// scope order. Retry policy per the workflow contract: two attempts,
/// 5 s → 30 s exponential backoff.
pub async fn submit_tasks(
    engine: &dyn WorkflowEngine,
    dispatcher: Arc<dyn RackOperationDispatcher>,
    operation: RackOperation,
    scopes: Vec<RackScope>,
) -> Vec<TaskId> {
    let options = SubmitOptions {
        retry_policy: RetryPolicy {
            initial_interval: Duration::from_secs(5),
            backoff: 2.0,
            max_interval: Duration::from_secs(30),
            max_attempts: 2,
        },
        start_to_close_timeout: Duration::from_secs(300),
    };

    let mut task_ids = Vec::with_capacity(scopes.len());
    for scope in scopes {
        let dispatcher = Arc::clone(&dispatcher);
        let operation = operation.clone();
        tracing::info!(
            rack = %scope.rack.name,
            operation = operation.name(),
            components = scope.components.len(),
            "submitting rack task"
        );
        let task_id = engine
            .submit(
                RACK_TASK_QUEUE,
                Box::new(move || {
                    let dispatcher = Arc::clone(&dispatcher);
                    let operation = operation.clone();
                    let rack = scope.rack.clone();
                    let components = scope.components.clone();
                    Box::pin(async move {
                        dispatcher.dispatch(&operation, &rack, &components).await
                    })
                }),
                options,
            )
            .await;
        task_ids.push(task_id);
    }
    task_ids
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use workflow::InProcessEngine;

    use super::*;

    fn rack(name: &str) -> Rack {
        Rack {
            id: RackId::new(),
            name: name.to_string(),
            serial_number: format!("SN-{name}"),
            ..Default::default()
        }
    }

    #[test]
    fn test_dedupe_targets_one_entry_per_rack() {
        let r1 = rack("R1");
        let r2 = rack("R2");

        // R1 named twice (by id and by name, say) collapses to one entry.
        let deduped = dedupe_targets(vec![
            (r1.clone(), Some(ComponentType::PowerShelf)),
            (r2.clone(), None),
            (r1.clone(), None),
        ]);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].0.id, r1.id);
        // The later unfiltered occurrence widened the scope.
        assert_eq!(deduped[0].1, None);
        assert_eq!(deduped[1].0.id, r2.id);
    }

    #[test]
    fn test_dedupe_keeps_first_filter_otherwise() {
        let r1 = rack("R1");
        let deduped = dedupe_targets(vec![
            (r1.clone(), Some(ComponentType::PowerShelf)),
            (r1.clone(), Some(ComponentType::Compute)),
        ]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].1, Some(ComponentType::PowerShelf));
    }

    #[test]
    fn test_validate_schedule_window() {
        assert_eq!(validate_schedule_window(None, None).unwrap(), None);

        let start = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        let end = (Utc::now() + chrono::Duration::hours(2)).to_rfc3339();
        assert!(
            validate_schedule_window(Some(&start), Some(&end))
                .unwrap()
                .is_some()
        );

        // End before start
        assert!(validate_schedule_window(Some(&end), Some(&start)).is_err());
        // Half-open windows are rejected
        assert!(validate_schedule_window(Some(&start), None).is_err());
        // Entirely in the past
        let past_start = (Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
        let past_end = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        assert!(validate_schedule_window(Some(&past_start), Some(&past_end)).is_err());
        // Garbage timestamps are rejected
        assert!(validate_schedule_window(Some("yesterday"), Some(&end)).is_err());
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        dispatched: Mutex<Vec<(String, String, usize)>>,
    }

    #[async_trait::async_trait]
    impl RackOperationDispatcher for RecordingDispatcher {
        async fn dispatch(
            &self,
            operation: &RackOperation,
            rack: &Rack,
            components: &[Component],
        ) -> eyre::Result<()> {
            self.dispatched.lock().unwrap().push((
                operation.name().to_string(),
                rack.name.clone(),
                components.len(),
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_submit_tasks_one_per_rack() {
        let engine = InProcessEngine::new();
        let dispatcher = Arc::new(RecordingDispatcher::default());

        let scopes = vec![
            RackScope {
                rack: rack("R1"),
                component_type: Some(ComponentType::PowerShelf),
                components: vec![Component::default()],
            },
            RackScope {
                rack: rack("R2"),
                component_type: None,
                components: Vec::new(),
            },
        ];

        let task_ids = submit_tasks(
            &engine,
            dispatcher.clone(),
            RackOperation::PowerOn { forced: false },
            scopes,
        )
        .await;

        assert_eq!(task_ids.len(), 2);
        for task_id in &task_ids {
            assert_eq!(
                engine.wait(*task_id).await,
                Some(workflow::TaskState::Completed)
            );
        }

        let dispatched = dispatcher.dispatched.lock().unwrap();
        assert_eq!(dispatched.len(), 2);
        assert_eq!(dispatched[0], ("power-on".to_string(), "R1".to_string(), 1));
        assert_eq!(dispatched[1], ("power-on".to_string(), "R2".to_string(), 0));
    }
}

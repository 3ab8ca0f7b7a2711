//! Workflow status views.
//!
//! Everything here is a pure function of a [`Workflow`] and the current time,
//! apart from [`fetch_view`] which loads the workflow first.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::WorkflowConfig;
use crate::interfaces::tracking_api::{ApiError, TrackingApi};
use crate::model::{ApprovalStatus, EntityRef, Workflow};

/// Completion percentage in `[0, 100]`.
///
/// Completed stages count one each, plus one for an approved workflow.
/// An empty pipeline is 0%.
pub fn progress(workflow: &Workflow) -> f64 {
    if workflow.pipeline.is_empty() {
        return 0.0;
    }
    let approved = usize::from(workflow.approval_status == ApprovalStatus::Approved);
    let done = (workflow.completed_stages.len() + approved) as f64;
    (done / workflow.pipeline.len() as f64 * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaState {
    Overdue,
    DueSoon,
    Normal,
}

/// SLA state at `now`, or `None` when the stage has no deadline.
pub fn sla_state(workflow: &Workflow, now: DateTime<Utc>, due_soon: Duration) -> Option<SlaState> {
    let expires = workflow.current_sla_expires_at?;
    let remaining = expires - now;
    Some(if remaining <= Duration::zero() {
        SlaState::Overdue
    } else if remaining < due_soon {
        SlaState::DueSoon
    } else {
        SlaState::Normal
    })
}

/// Human countdown, e.g. `"1d 4h left"` or `"overdue by 35m"`.
pub fn countdown_text(expires: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = expires - now;
    if remaining <= Duration::zero() {
        format!("overdue by {}", span_text(-remaining))
    } else {
        format!("{} left", span_text(remaining))
    }
}

fn span_text(span: Duration) -> String {
    let days = span.num_days();
    let hours = span.num_hours() % 24;
    let minutes = span.num_minutes() % 60;
    match (days, hours) {
        (0, 0) => format!("{}m", minutes.max(1)),
        (0, _) => format!("{hours}h {minutes}m"),
        _ => format!("{days}d {hours}h"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Completed,
    Current,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageView {
    pub name: String,
    pub state: StageState,
}

/// Pipeline stages in order, each marked completed, current or pending.
pub fn stages(workflow: &Workflow) -> Vec<StageView> {
    workflow
        .pipeline
        .iter()
        .map(|name| {
            let state = if workflow.completed_stages.contains(name) {
                StageState::Completed
            } else if workflow.current_stage.as_deref() == Some(name.as_str()) {
                StageState::Current
            } else {
                StageState::Pending
            };
            StageView {
                name: name.clone(),
                state,
            }
        })
        .collect()
}

/// Everything a status badge needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowView {
    pub progress: f64,
    pub approval_status: ApprovalStatus,
    pub current_stage: Option<String>,
    pub sla: Option<SlaState>,
    pub countdown: Option<String>,
    pub stages: Vec<StageView>,
}

impl WorkflowView {
    pub fn new(workflow: &Workflow, now: DateTime<Utc>, config: &WorkflowConfig) -> Self {
        let due_soon = config.due_soon();
        Self {
            progress: progress(workflow),
            approval_status: workflow.approval_status,
            current_stage: workflow.current_stage.clone(),
            sla: sla_state(workflow, now, due_soon),
            countdown: workflow
                .current_sla_expires_at
                .map(|expires| countdown_text(expires, now)),
            stages: stages(workflow),
        }
    }
}

/// Load an entity's workflow and derive its view at the current time.
#[tracing::instrument(name = "workflow.fetch", skip(api, config), fields(entity = %entity.kind, id = %entity.id))]
pub async fn fetch_view(
    api: &dyn TrackingApi,
    entity: &EntityRef,
    config: &WorkflowConfig,
) -> Result<WorkflowView, ApiError> {
    let workflow = api.workflow(entity).await?;
    let view = WorkflowView::new(&workflow, Utc::now(), config);
    debug!(progress = view.progress, sla = ?view.sla, "Workflow loaded");
    Ok(view)
}

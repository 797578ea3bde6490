// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline engine: schedules DAG stages into orchestrator tasks.
//!
//! A stage is ready when every dependency is completed (or skipped). On run
//! start and on every stage completion the engine recomputes ready stages
//! and materialises one task per stage — `fanOutCount` siblings for
//! fan-out stages. Conditional stages whose condition fails are recorded
//! as skipped and count as satisfied downstream.

use hq_core::{
    Clock, Event, KanbanColumn, Pipeline, PipelineError, PipelineRun, RunStatus, Stage,
    StageRef, StageStatus, StageType, Task, TaskStatus,
};
use hq_storage::{Store, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event_bus::EventBus;
use crate::orchestrator::{OrchError, OrchestratorHandle};

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("pipeline not found: {0}")]
    PipelineNotFound(String),
    #[error("run not found: {0}")]
    RunNotFound(String),
    #[error("invalid pipeline: {0}")]
    Invalid(#[from] PipelineError),
    #[error("run is {0}, cannot {1}")]
    BadTransition(RunStatus, &'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Orchestrator(#[from] OrchError),
}

pub struct PipelineEngine<C: Clock> {
    store: Arc<dyn Store>,
    bus: EventBus,
    orchestrator: OrchestratorHandle,
    clock: C,
}

impl<C: Clock> PipelineEngine<C> {
    pub fn new(
        store: Arc<dyn Store>,
        bus: EventBus,
        orchestrator: OrchestratorHandle,
        clock: C,
    ) -> Self {
        Self { store, bus, orchestrator, clock }
    }

    // -- definitions --

    pub fn create_pipeline(
        &self,
        name: String,
        stages: Vec<Stage>,
    ) -> Result<Pipeline, EngineError> {
        let pipeline = Pipeline::new(name, stages, self.clock.now_utc());
        pipeline.validate()?;
        self.store.put_pipeline(&pipeline)?;
        Ok(pipeline)
    }

    pub fn list_pipelines(&self) -> Result<Vec<Pipeline>, EngineError> {
        let mut pipelines = self.store.list_pipelines()?;
        pipelines.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pipelines)
    }

    pub fn get_pipeline(&self, id: &str) -> Result<Pipeline, EngineError> {
        self.store
            .get_pipeline(id)?
            .ok_or_else(|| EngineError::PipelineNotFound(id.to_string()))
    }

    // -- runs --

    pub async fn start_run(&self, pipeline_id: &str) -> Result<PipelineRun, EngineError> {
        let pipeline = self.get_pipeline(pipeline_id)?;
        let mut run = PipelineRun::new(&pipeline, self.clock.now_utc());
        run.status = RunStatus::Running;
        self.store.put_run(&run)?;
        self.bus.publish(Event::PipelineRunStarted { run_id: run.id.clone() });
        info!(run = %run.id, pipeline = %pipeline.id, "pipeline run started");

        self.schedule_ready(&mut run, &pipeline).await?;
        self.finalize_if_done(&mut run)?;
        Ok(run)
    }

    pub fn get_run(&self, id: &str) -> Result<PipelineRun, EngineError> {
        self.store.get_run(id)?.ok_or_else(|| EngineError::RunNotFound(id.to_string()))
    }

    pub fn active_runs(&self) -> Result<Vec<PipelineRun>, EngineError> {
        Ok(self.store.active_runs()?)
    }

    /// Pause: no new stages materialise; in-flight tasks finish.
    pub fn pause(&self, run_id: &str) -> Result<PipelineRun, EngineError> {
        let mut run = self.get_run(run_id)?;
        if run.status != RunStatus::Running {
            return Err(EngineError::BadTransition(run.status, "pause"));
        }
        run.status = RunStatus::Paused;
        self.store.put_run(&run)?;
        Ok(run)
    }

    pub async fn resume(&self, run_id: &str) -> Result<PipelineRun, EngineError> {
        let mut run = self.get_run(run_id)?;
        if run.status != RunStatus::Paused {
            return Err(EngineError::BadTransition(run.status, "resume"));
        }
        run.status = RunStatus::Running;
        self.store.put_run(&run)?;

        let pipeline = self.get_pipeline(run.pipeline_id.as_str())?;
        self.schedule_ready(&mut run, &pipeline).await?;
        self.finalize_if_done(&mut run)?;
        Ok(run)
    }

    /// Cancel: in-flight tasks of the run are cancelled.
    pub async fn cancel(&self, run_id: &str) -> Result<PipelineRun, EngineError> {
        let mut run = self.get_run(run_id)?;
        if run.status.is_terminal() {
            return Ok(run); // idempotent
        }
        run.status = RunStatus::Cancelled;
        run.completed_at = Some(self.clock.now_utc());
        self.store.put_run(&run)?;

        for task in self.store.tasks_for_run(run_id)? {
            if !task.status.is_terminal() {
                if let Err(e) = self.orchestrator.cancel_task(task.id.clone()).await {
                    warn!(task = %task.id, error = %e, "cancel of run task failed");
                }
            }
        }
        self.bus.publish(Event::PipelineRunFinished {
            run_id: run.id.clone(),
            status: RunStatus::Cancelled,
        });
        Ok(run)
    }

    /// React to a finished task that belongs to a run.
    pub async fn handle_task_finished(&self, task: &Task) -> Result<(), EngineError> {
        let Some(stage_ref) = &task.stage_ref else {
            return Ok(());
        };
        let Some(mut run) = self.store.get_run(stage_ref.run_id.as_str())? else {
            return Ok(());
        };
        if run.status.is_terminal() {
            return Ok(());
        }
        let pipeline = self.get_pipeline(run.pipeline_id.as_str())?;
        let Some(stage) = pipeline.stage(&stage_ref.stage_id) else {
            return Ok(());
        };

        let failed = task.status == TaskStatus::Failed || task.status == TaskStatus::Cancelled;
        let now = self.clock.now_utc();
        let expected = match stage.stage_type {
            StageType::FanOut => stage.fan_out_count.unwrap_or(1),
            _ => 1,
        };

        {
            let result = run
                .stage_results
                .entry(stage_ref.stage_id.clone())
                .or_insert_with(hq_core::StageResult::pending);

            if failed {
                result.status = StageStatus::Failed;
                result.completed_at = Some(now);
                result.error_message =
                    Some(task.output.clone().unwrap_or_else(|| "task failed".to_string()));
            } else {
                result.branches_done += 1;
                if let Some(output) = &task.output {
                    match &mut result.output {
                        Some(existing) => {
                            existing.push('\n');
                            existing.push_str(output);
                        }
                        None => result.output = Some(output.clone()),
                    }
                }
                result.agent_id = task.assigned_agent_id.clone();
                if result.branches_done >= expected {
                    result.status = StageStatus::Completed;
                    result.completed_at = Some(now);
                }
            }
        }

        let stage_status = run.stage_results[&stage_ref.stage_id].status;
        if matches!(stage_status, StageStatus::Completed | StageStatus::Failed) {
            self.bus.publish(Event::PipelineStageCompleted {
                run_id: run.id.clone(),
                stage_id: stage_ref.stage_id.clone(),
                status: stage_status,
            });
        }

        if stage_status == StageStatus::Failed {
            // No recovery path: the run fails, nothing further materialises
            run.status = RunStatus::Failed;
            run.completed_at = Some(now);
            self.store.put_run(&run)?;
            self.bus.publish(Event::PipelineRunFinished {
                run_id: run.id.clone(),
                status: RunStatus::Failed,
            });
            return Ok(());
        }

        self.store.put_run(&run)?;
        if run.status == RunStatus::Running {
            self.schedule_ready(&mut run, &pipeline).await?;
        }
        self.finalize_if_done(&mut run)?;
        Ok(())
    }

    /// Materialise every pending stage whose dependencies are satisfied.
    /// Conditional stages with failing conditions are skipped in place,
    /// which can unblock further stages, so this loops to a fixpoint.
    async fn schedule_ready(
        &self,
        run: &mut PipelineRun,
        pipeline: &Pipeline,
    ) -> Result<(), EngineError> {
        loop {
            let mut progressed = false;

            for stage in &pipeline.stages {
                let pending = run
                    .stage_results
                    .get(&stage.id)
                    .map(|r| r.status == StageStatus::Pending)
                    .unwrap_or(true);
                if !pending || !self.deps_satisfied(run, stage) {
                    continue;
                }

                if stage.stage_type == StageType::Conditional
                    && !self.condition_matches(run, stage)
                {
                    let result = run
                        .stage_results
                        .entry(stage.id.clone())
                        .or_insert_with(hq_core::StageResult::pending);
                    result.status = StageStatus::Skipped;
                    result.completed_at = Some(self.clock.now_utc());
                    debug!(run = %run.id, stage = %stage.id, "conditional stage skipped");
                    self.bus.publish(Event::PipelineStageCompleted {
                        run_id: run.id.clone(),
                        stage_id: stage.id.clone(),
                        status: StageStatus::Skipped,
                    });
                    progressed = true;
                    continue;
                }

                self.materialise(run, stage).await?;
                progressed = true;
            }

            if !progressed {
                break;
            }
        }
        self.store.put_run(run)?;
        Ok(())
    }

    fn deps_satisfied(&self, run: &PipelineRun, stage: &Stage) -> bool {
        stage.depends_on.iter().all(|dep| {
            run.stage_results
                .get(dep)
                .map(|r| r.status.satisfies_dependency())
                .unwrap_or(false)
        })
    }

    /// Substring match of the condition against the concatenated outputs of
    /// the stage's predecessors.
    fn condition_matches(&self, run: &PipelineRun, stage: &Stage) -> bool {
        let Some(condition) = &stage.condition else {
            return true;
        };
        let combined: String = stage
            .depends_on
            .iter()
            .filter_map(|dep| run.stage_results.get(dep).and_then(|r| r.output.clone()))
            .collect::<Vec<_>>()
            .join("\n");
        combined.contains(condition.as_str())
    }

    /// Create the stage's tasks and hand them to the orchestrator queue.
    async fn materialise(&self, run: &mut PipelineRun, stage: &Stage) -> Result<(), EngineError> {
        let now = self.clock.now_utc();
        let count = match stage.stage_type {
            StageType::FanOut => stage.fan_out_count.unwrap_or(1),
            _ => 1,
        };

        for branch in 0..count {
            let mut task = Task::new(stage.task_description.clone(), now);
            task.target_role = Some(stage.agent_role.clone());
            task.column = KanbanColumn::Todo;
            task.stage_ref = Some(StageRef {
                run_id: run.id.clone(),
                stage_id: stage.id.clone(),
                branch: (stage.stage_type == StageType::FanOut).then_some(branch),
            });
            self.store.put_task(&task)?;
            self.bus.publish(Event::TaskSubmitted { id: task.id.clone() });
            self.orchestrator.enqueue_task(task.id).await?;
        }

        let result = run
            .stage_results
            .entry(stage.id.clone())
            .or_insert_with(hq_core::StageResult::pending);
        result.status = StageStatus::Running;
        result.started_at = Some(now);
        self.bus.publish(Event::PipelineStageStarted {
            run_id: run.id.clone(),
            stage_id: stage.id.clone(),
        });
        debug!(run = %run.id, stage = %stage.id, tasks = count, "stage materialised");
        Ok(())
    }

    /// Mark the run completed once every stage is completed or skipped.
    fn finalize_if_done(&self, run: &mut PipelineRun) -> Result<(), EngineError> {
        if run.status != RunStatus::Running {
            return Ok(());
        }
        let all_done = run
            .stage_results
            .values()
            .all(|r| matches!(r.status, StageStatus::Completed | StageStatus::Skipped));
        if !all_done {
            return Ok(());
        }
        run.status = RunStatus::Completed;
        run.completed_at = Some(self.clock.now_utc());
        self.store.put_run(run)?;
        self.bus.publish(Event::PipelineRunFinished {
            run_id: run.id.clone(),
            status: RunStatus::Completed,
        });
        info!(run = %run.id, "pipeline run completed");
        Ok(())
    }

    /// Event loop: wakes on finished-task notifications from the bus.
    pub async fn run_loop(self: Arc<Self>, mut rx: mpsc::Receiver<hq_core::TaskId>) {
        while let Some(task_id) = rx.recv().await {
            let task = match self.store.get_task(task_id.as_str()) {
                Ok(Some(task)) => task,
                Ok(None) => continue,
                Err(e) => {
                    warn!(task = %task_id, error = %e, "engine task lookup failed");
                    continue;
                }
            };
            if let Err(e) = self.handle_task_finished(&task).await {
                warn!(task = %task_id, error = %e, "stage completion handling failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

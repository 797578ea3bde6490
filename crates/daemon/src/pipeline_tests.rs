// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hq_adapters::{FakeRuntime, RuntimeManager};
use hq_core::{AgentRole, SystemClock};
use hq_storage::FileStore;

struct Harness {
    engine: PipelineEngine<SystemClock>,
    store: Arc<dyn Store>,
}

fn harness() -> Harness {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let bus = EventBus::new();
    let runtimes = Arc::new(RuntimeManager::with_adapters(
        vec![Arc::new(FakeRuntime::new("local"))],
        Some("local".to_string()),
    ));
    let orchestrator =
        crate::orchestrator::spawn(Arc::clone(&store), runtimes, bus.clone(), SystemClock);
    let engine = PipelineEngine::new(Arc::clone(&store), bus, orchestrator, SystemClock);
    Harness { engine, store }
}

fn stage(id: &str, deps: &[&str]) -> Stage {
    Stage {
        id: id.to_string(),
        name: id.to_string(),
        stage_type: StageType::Sequential,
        agent_role: AgentRole::Coder,
        task_description: format!("run {id}"),
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
        condition: None,
        fan_out_count: None,
        timeout_secs: None,
    }
}

fn fan_out(id: &str, deps: &[&str], count: u32) -> Stage {
    let mut s = stage(id, deps);
    s.stage_type = StageType::FanOut;
    s.fan_out_count = Some(count);
    s
}

fn conditional(id: &str, deps: &[&str], condition: &str) -> Stage {
    let mut s = stage(id, deps);
    s.stage_type = StageType::Conditional;
    s.condition = Some(condition.to_string());
    s
}

/// Complete every live task of one stage and feed the results back.
async fn finish_stage(h: &Harness, run_id: &str, stage_id: &str, output: Option<&str>) {
    let tasks: Vec<Task> = h
        .store
        .tasks_for_run(run_id)
        .unwrap()
        .into_iter()
        .filter(|t| {
            t.stage_ref.as_ref().is_some_and(|r| r.stage_id == stage_id)
                && !t.status.is_terminal()
        })
        .collect();
    assert!(!tasks.is_empty(), "no live tasks for stage {stage_id}");
    for task in tasks {
        h.engine
            .orchestrator
            .complete_task(task.id.clone(), true, output.map(str::to_string))
            .await
            .unwrap();
        let reloaded = h.store.get_task(task.id.as_str()).unwrap().unwrap();
        h.engine.handle_task_finished(&reloaded).await.unwrap();
    }
}

#[tokio::test]
async fn invalid_pipeline_rejected() {
    let h = harness();
    let err = h
        .engine
        .create_pipeline("bad".to_string(), vec![stage("a", &["a"])])
        .unwrap_err();
    assert!(matches!(err, EngineError::Invalid(_)));
}

#[tokio::test]
async fn diamond_with_fan_out_completes_in_order() {
    let h = harness();
    // A → B, A → C (fan-out ×3), (B, C) → D
    let pipeline = h
        .engine
        .create_pipeline(
            "diamond".to_string(),
            vec![
                stage("a", &[]),
                stage("b", &["a"]),
                fan_out("c", &["a"], 3),
                stage("d", &["b", "c"]),
            ],
        )
        .unwrap();

    let run = h.engine.start_run(pipeline.id.as_str()).await.unwrap();
    // Only A materialises at start
    assert_eq!(h.store.tasks_for_run(run.id.as_str()).unwrap().len(), 1);

    finish_stage(&h, run.id.as_str(), "a", None).await;
    let run = h.engine.get_run(run.id.as_str()).unwrap();
    assert_eq!(run.stage_results["a"].status, StageStatus::Completed);
    assert_eq!(run.stage_results["b"].status, StageStatus::Running);
    assert_eq!(run.stage_results["c"].status, StageStatus::Running);
    // B + 3 fan-out siblings
    assert_eq!(h.store.tasks_for_run(run.id.as_str()).unwrap().len(), 5);

    // B done, C partially done: D must not start
    finish_stage(&h, run.id.as_str(), "b", None).await;
    let tasks = h.store.tasks_for_run(run.id.as_str()).unwrap();
    let c_tasks: Vec<_> = tasks
        .iter()
        .filter(|t| t.stage_ref.as_ref().is_some_and(|r| r.stage_id == "c"))
        .collect();
    assert_eq!(c_tasks.len(), 3);
    h.engine
        .orchestrator
        .complete_task(c_tasks[0].id.clone(), true, None)
        .await
        .unwrap();
    let reloaded = h.store.get_task(c_tasks[0].id.as_str()).unwrap().unwrap();
    h.engine.handle_task_finished(&reloaded).await.unwrap();

    let run_mid = h.engine.get_run(run.id.as_str()).unwrap();
    assert_eq!(run_mid.stage_results["c"].status, StageStatus::Running);
    assert_eq!(run_mid.stage_results["c"].branches_done, 1);
    assert_eq!(run_mid.stage_results["d"].status, StageStatus::Pending);

    // Finish the remaining siblings → C completes → D materialises
    for t in &c_tasks[1..] {
        h.engine.orchestrator.complete_task(t.id.clone(), true, None).await.unwrap();
        let reloaded = h.store.get_task(t.id.as_str()).unwrap().unwrap();
        h.engine.handle_task_finished(&reloaded).await.unwrap();
    }
    let run_after = h.engine.get_run(run.id.as_str()).unwrap();
    assert_eq!(run_after.stage_results["c"].status, StageStatus::Completed);
    assert_eq!(run_after.stage_results["d"].status, StageStatus::Running);

    finish_stage(&h, run.id.as_str(), "d", None).await;
    let done = h.engine.get_run(run.id.as_str()).unwrap();
    assert_eq!(done.status, RunStatus::Completed);
    assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn failed_stage_fails_the_run() {
    let h = harness();
    let pipeline = h
        .engine
        .create_pipeline("p".to_string(), vec![stage("a", &[]), stage("b", &["a"])])
        .unwrap();
    let run = h.engine.start_run(pipeline.id.as_str()).await.unwrap();

    let task = &h.store.tasks_for_run(run.id.as_str()).unwrap()[0];
    h.engine.orchestrator.complete_task(task.id.clone(), false, None).await.unwrap();
    let reloaded = h.store.get_task(task.id.as_str()).unwrap().unwrap();
    h.engine.handle_task_finished(&reloaded).await.unwrap();

    let run = h.engine.get_run(run.id.as_str()).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.stage_results["a"].status, StageStatus::Failed);
    // B never materialised
    assert_eq!(run.stage_results["b"].status, StageStatus::Pending);
    assert_eq!(h.store.tasks_for_run(run.id.as_str()).unwrap().len(), 1);
}

#[tokio::test]
async fn failed_condition_skips_stage_and_unblocks_downstream() {
    let h = harness();
    let pipeline = h
        .engine
        .create_pipeline(
            "p".to_string(),
            vec![
                stage("build", &[]),
                conditional("deploy", &["build"], "DEPLOY"),
                stage("report", &["deploy"]),
            ],
        )
        .unwrap();
    let run = h.engine.start_run(pipeline.id.as_str()).await.unwrap();

    finish_stage(&h, run.id.as_str(), "build", Some("build ok, no release")).await;

    let run = h.engine.get_run(run.id.as_str()).unwrap();
    assert_eq!(run.stage_results["deploy"].status, StageStatus::Skipped);
    // Skipped counts as satisfied: report materialised
    assert_eq!(run.stage_results["report"].status, StageStatus::Running);

    finish_stage(&h, run.id.as_str(), "report", None).await;
    assert_eq!(h.engine.get_run(run.id.as_str()).unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn matching_condition_materialises_stage() {
    let h = harness();
    let pipeline = h
        .engine
        .create_pipeline(
            "p".to_string(),
            vec![stage("build", &[]), conditional("deploy", &["build"], "DEPLOY")],
        )
        .unwrap();
    let run = h.engine.start_run(pipeline.id.as_str()).await.unwrap();

    finish_stage(&h, run.id.as_str(), "build", Some("all green: DEPLOY")).await;
    let run = h.engine.get_run(run.id.as_str()).unwrap();
    assert_eq!(run.stage_results["deploy"].status, StageStatus::Running);
}

#[tokio::test]
async fn pause_suppresses_materialisation_until_resume() {
    let h = harness();
    let pipeline = h
        .engine
        .create_pipeline("p".to_string(), vec![stage("a", &[]), stage("b", &["a"])])
        .unwrap();
    let run = h.engine.start_run(pipeline.id.as_str()).await.unwrap();

    h.engine.pause(run.id.as_str()).unwrap();

    // In-flight A finishes while paused; B must not start
    finish_stage(&h, run.id.as_str(), "a", None).await;
    let paused = h.engine.get_run(run.id.as_str()).unwrap();
    assert_eq!(paused.status, RunStatus::Paused);
    assert_eq!(paused.stage_results["a"].status, StageStatus::Completed);
    assert_eq!(paused.stage_results["b"].status, StageStatus::Pending);

    h.engine.resume(run.id.as_str()).await.unwrap();
    let resumed = h.engine.get_run(run.id.as_str()).unwrap();
    assert_eq!(resumed.status, RunStatus::Running);
    assert_eq!(resumed.stage_results["b"].status, StageStatus::Running);
}

#[tokio::test]
async fn cancel_cancels_in_flight_tasks() {
    let h = harness();
    let pipeline =
        h.engine.create_pipeline("p".to_string(), vec![stage("a", &[])]).unwrap();
    let run = h.engine.start_run(pipeline.id.as_str()).await.unwrap();

    let cancelled = h.engine.cancel(run.id.as_str()).await.unwrap();
    assert_eq!(cancelled.status, RunStatus::Cancelled);

    let tasks = h.store.tasks_for_run(run.id.as_str()).unwrap();
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Cancelled));

    // Cancel is idempotent
    let again = h.engine.cancel(run.id.as_str()).await.unwrap();
    assert_eq!(again.status, RunStatus::Cancelled);
}

#[tokio::test]
async fn bad_transitions_rejected() {
    let h = harness();
    let pipeline =
        h.engine.create_pipeline("p".to_string(), vec![stage("a", &[])]).unwrap();
    let run = h.engine.start_run(pipeline.id.as_str()).await.unwrap();

    assert!(matches!(
        h.engine.resume(run.id.as_str()).await.unwrap_err(),
        EngineError::BadTransition(RunStatus::Running, "resume")
    ));
    h.engine.pause(run.id.as_str()).unwrap();
    assert!(matches!(
        h.engine.pause(run.id.as_str()).unwrap_err(),
        EngineError::BadTransition(RunStatus::Paused, "pause")
    ));
}

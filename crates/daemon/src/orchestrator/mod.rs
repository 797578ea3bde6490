// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator: agent registry, task queue, and assignment.
//!
//! All registry and queue writes go through one serialised actor task.
//! Handlers talk to it through [`OrchestratorHandle`] (mpsc command +
//! oneshot reply); reads go against a shared snapshot that only the actor
//! writes, so queries never wait on mutations.

use hq_core::{
    AgentId, AgentInstance, AgentProvider, AgentRole, AgentState, AgentTemplate, Clock, Event,
    KanbanColumn, Location, Task, TaskId, TaskStatus, TeamId,
};
use hq_adapters::{
    with_deadline, AdapterError, RuntimeAdapter, RuntimeManager, SpawnSpec, DEFAULT_DEADLINE,
};
use hq_storage::{Store, StoreError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::event_bus::EventBus;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

/// Command channel depth. Senders briefly queue when the actor is busy.
const COMMAND_BUFFER: usize = 64;

/// Orchestrator errors, converted to RPC errors at the router boundary.
#[derive(Debug, Error)]
pub enum OrchError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("runtime {0} is unhealthy, refusing to spawn")]
    RuntimeUnhealthy(String),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("orchestrator is shut down")]
    Closed,
}

/// Inputs to `agent.spawn`.
#[derive(Debug, Clone, Default)]
pub struct SpawnRequest {
    pub role: Option<AgentRole>,
    pub provider: Option<AgentProvider>,
    pub template: Option<AgentTemplate>,
    pub working_dir: Option<PathBuf>,
    pub runtime_id: Option<String>,
    pub team_id: Option<TeamId>,
    /// Task description enqueued (targeting this role) once the spawn succeeds.
    pub task: Option<String>,
}

/// Result of `agent.spawn`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SpawnReply {
    pub id: AgentId,
    pub state: AgentState,
}

/// Filter for `agent.list`.
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub state: Option<AgentState>,
    pub role: Option<AgentRole>,
    pub team: Option<TeamId>,
    pub runtime: Option<String>,
}

impl AgentFilter {
    fn matches(&self, agent: &AgentInstance) -> bool {
        self.state.map(|s| agent.state == s).unwrap_or(true)
            && self.role.as_ref().map(|r| &agent.role == r).unwrap_or(true)
            && self.team.as_ref().map(|t| agent.team_id.as_ref() == Some(t)).unwrap_or(true)
            && self.runtime.as_ref().map(|r| &agent.runtime_id == r).unwrap_or(true)
    }
}

/// Where a prompt was delivered, returned so the caller can poll output.
#[derive(Clone)]
pub struct SendTarget {
    pub adapter: Arc<dyn RuntimeAdapter>,
    pub location: Location,
}

enum Command {
    Spawn(Box<SpawnRequest>, oneshot::Sender<Result<SpawnReply, OrchError>>),
    Kill(AgentId, oneshot::Sender<Result<(), OrchError>>),
    Send {
        id: AgentId,
        prompt: String,
        reply: oneshot::Sender<Result<SendTarget, OrchError>>,
    },
    Enqueue(TaskId, oneshot::Sender<Result<(), OrchError>>),
    Dequeue(TaskId, oneshot::Sender<Result<bool, OrchError>>),
    CompleteTask {
        id: TaskId,
        success: bool,
        output: Option<String>,
        reply: oneshot::Sender<Result<(), OrchError>>,
    },
    CancelTask(TaskId, oneshot::Sender<Result<(), OrchError>>),
    MarkAgentState {
        id: AgentId,
        state: AgentState,
        message: Option<String>,
        reply: oneshot::Sender<Result<(), OrchError>>,
    },
    Reconnect {
        instance: Box<AgentInstance>,
        announce: bool,
        reply: oneshot::Sender<Result<(), OrchError>>,
    },
    Fanout {
        prompt: String,
        count: u32,
        provider: Option<AgentProvider>,
        runtime_id: Option<String>,
        reply: oneshot::Sender<Result<Vec<AgentId>, OrchError>>,
    },
    Tick,
}

/// Cloneable front door to the orchestrator actor.
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<Command>,
    registry: Arc<RwLock<HashMap<AgentId, AgentInstance>>>,
    runtimes: Arc<RuntimeManager>,
}

impl OrchestratorHandle {
    /// Lock-free snapshot read of the registry.
    pub fn list_agents(&self, filter: &AgentFilter) -> Vec<AgentInstance> {
        let mut agents: Vec<_> =
            self.registry.read().values().filter(|a| filter.matches(a)).cloned().collect();
        agents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        agents
    }

    pub fn get_agent(&self, id: &str) -> Option<AgentInstance> {
        self.registry.read().get(id).cloned()
    }

    /// Attach command line for an agent's terminal.
    pub fn attach_command(&self, id: &str) -> Result<String, OrchError> {
        let agent =
            self.get_agent(id).ok_or_else(|| OrchError::AgentNotFound(id.to_string()))?;
        let adapter = self
            .runtimes
            .get(&agent.runtime_id)
            .ok_or_else(|| OrchError::RuntimeUnhealthy(agent.runtime_id.clone()))?;
        Ok(adapter.attach_command(&agent.location))
    }

    /// Capture the last `lines` of an agent's terminal.
    pub async fn agent_output(&self, id: &str, lines: u32) -> Result<String, OrchError> {
        let agent =
            self.get_agent(id).ok_or_else(|| OrchError::AgentNotFound(id.to_string()))?;
        let adapter = self
            .runtimes
            .get(&agent.runtime_id)
            .ok_or_else(|| OrchError::RuntimeUnhealthy(agent.runtime_id.clone()))?;
        Ok(adapter.capture(&agent.location, lines).await)
    }

    pub async fn spawn_agent(&self, request: SpawnRequest) -> Result<SpawnReply, OrchError> {
        self.call(|reply| Command::Spawn(Box::new(request), reply)).await
    }

    pub async fn kill_agent(&self, id: AgentId) -> Result<(), OrchError> {
        self.call(|reply| Command::Kill(id, reply)).await
    }

    /// Deliver a prompt. With `wait`, polls the terminal with exponential
    /// backoff (up to `wait_ceiling`) and returns the captured tail.
    pub async fn send_prompt(
        &self,
        id: AgentId,
        prompt: String,
        wait: bool,
        wait_ceiling: Duration,
    ) -> Result<Option<String>, OrchError> {
        let target =
            self.call(|reply| Command::Send { id, prompt, reply }).await?;
        if !wait {
            return Ok(None);
        }

        let mut delay = Duration::from_millis(200);
        let mut waited = Duration::ZERO;
        let mut last = String::new();
        while waited < wait_ceiling {
            tokio::time::sleep(delay).await;
            waited += delay;
            delay = (delay * 2).min(Duration::from_secs(2));

            let captured = target.adapter.capture(&target.location, 40).await;
            // Stable output two polls in a row means the agent settled
            if !captured.is_empty() && captured == last {
                break;
            }
            last = captured;
        }
        Ok(Some(last))
    }

    pub async fn enqueue_task(&self, id: TaskId) -> Result<(), OrchError> {
        self.call(|reply| Command::Enqueue(id, reply)).await
    }

    /// Remove a task from the queue without cancelling it (kanban stop).
    pub async fn dequeue_task(&self, id: TaskId) -> Result<bool, OrchError> {
        self.call(|reply| Command::Dequeue(id, reply)).await
    }

    pub async fn complete_task(
        &self,
        id: TaskId,
        success: bool,
        output: Option<String>,
    ) -> Result<(), OrchError> {
        self.call(|reply| Command::CompleteTask { id, success, output, reply }).await
    }

    pub async fn cancel_task(&self, id: TaskId) -> Result<(), OrchError> {
        self.call(|reply| Command::CancelTask(id, reply)).await
    }

    /// Hook for state detectors and the reconciler.
    pub async fn mark_agent_state(
        &self,
        id: AgentId,
        state: AgentState,
        message: Option<String>,
    ) -> Result<(), OrchError> {
        self.call(|reply| Command::MarkAgentState { id, state, message, reply }).await
    }

    /// Re-register a persisted agent after reconciliation, announcing
    /// `agent.reconnected` to subscribers.
    pub async fn reconnect(&self, instance: AgentInstance) -> Result<(), OrchError> {
        self.call(|reply| Command::Reconnect {
            instance: Box::new(instance),
            announce: true,
            reply,
        })
        .await
    }

    /// Register an agent in the registry without announcing it (used for
    /// lost agents kept visible in error state).
    pub async fn mark_lost_registration(&self, instance: AgentInstance) -> Result<(), OrchError> {
        self.call(|reply| Command::Reconnect {
            instance: Box::new(instance),
            announce: false,
            reply,
        })
        .await
    }

    pub async fn fanout(
        &self,
        prompt: String,
        count: u32,
        provider: Option<AgentProvider>,
        runtime_id: Option<String>,
    ) -> Result<Vec<AgentId>, OrchError> {
        self.call(|reply| Command::Fanout { prompt, count, provider, runtime_id, reply }).await
    }

    /// Periodic nudge for the assignment loop.
    pub fn tick(&self) {
        let _ = self.tx.try_send(Command::Tick);
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, OrchError>>) -> Command,
    ) -> Result<T, OrchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(make(reply_tx)).await.map_err(|_| OrchError::Closed)?;
        reply_rx.await.map_err(|_| OrchError::Closed)?
    }
}

/// The actor. Owns every write to the registry and the queue.
pub struct Orchestrator<C: Clock> {
    store: Arc<dyn Store>,
    runtimes: Arc<RuntimeManager>,
    bus: EventBus,
    clock: C,
    registry: Arc<RwLock<HashMap<AgentId, AgentInstance>>>,
    queue: Vec<TaskId>,
    rx: mpsc::Receiver<Command>,
}

/// Spawn the orchestrator actor task and return its handle.
pub fn spawn<C: Clock>(
    store: Arc<dyn Store>,
    runtimes: Arc<RuntimeManager>,
    bus: EventBus,
    clock: C,
) -> OrchestratorHandle {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let registry = Arc::new(RwLock::new(HashMap::new()));

    let actor = Orchestrator {
        store,
        runtimes: Arc::clone(&runtimes),
        bus,
        clock,
        registry: Arc::clone(&registry),
        queue: Vec::new(),
        rx,
    };
    tokio::spawn(actor.run());

    OrchestratorHandle { tx, registry, runtimes }
}

impl<C: Clock> Orchestrator<C> {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Spawn(request, reply) => {
                    let _ = reply.send(self.handle_spawn(*request).await);
                }
                Command::Kill(id, reply) => {
                    let _ = reply.send(self.handle_kill(&id).await);
                }
                Command::Send { id, prompt, reply } => {
                    let _ = reply.send(self.handle_send(&id, &prompt).await);
                }
                Command::Enqueue(id, reply) => {
                    let _ = reply.send(self.handle_enqueue(id).await);
                }
                Command::Dequeue(id, reply) => {
                    let before = self.queue.len();
                    self.queue.retain(|queued| queued != &id);
                    let _ = reply.send(Ok(self.queue.len() != before));
                }
                Command::CompleteTask { id, success, output, reply } => {
                    let _ = reply.send(self.handle_complete(&id, success, output).await);
                }
                Command::CancelTask(id, reply) => {
                    let _ = reply.send(self.handle_cancel(&id).await);
                }
                Command::MarkAgentState { id, state, message, reply } => {
                    let _ = reply.send(self.handle_mark_state(&id, state, message).await);
                }
                Command::Reconnect { instance, announce, reply } => {
                    let _ = reply.send(self.handle_reconnect(*instance, announce));
                }
                Command::Fanout { prompt, count, provider, runtime_id, reply } => {
                    let _ =
                        reply.send(self.handle_fanout(prompt, count, provider, runtime_id).await);
                }
                Command::Tick => self.try_assign().await,
            }
        }
        debug!("orchestrator actor stopped");
    }

    fn persist_agent(&self, agent: &AgentInstance) -> Result<(), OrchError> {
        self.registry.write().insert(agent.id.clone(), agent.clone());
        self.store.put_agent(agent)?;
        Ok(())
    }

    async fn handle_spawn(&mut self, request: SpawnRequest) -> Result<SpawnReply, OrchError> {
        let role = request
            .role
            .clone()
            .or_else(|| request.template.as_ref().map(|t| t.role.clone()))
            .unwrap_or(AgentRole::Coder);
        let template = request
            .template
            .clone()
            .unwrap_or_else(|| AgentTemplate::default_for_role(role.clone()));
        let provider = request.provider.clone().unwrap_or_else(|| template.provider.clone());

        let adapter = self
            .runtimes
            .select(request.runtime_id.as_deref(), template.preferred_runtime.as_deref())?;
        if !self.runtimes.is_healthy(adapter.id()) {
            return Err(OrchError::RuntimeUnhealthy(adapter.id().to_string()));
        }

        let id = AgentId::new();
        let mut spec = SpawnSpec::new(id.clone(), provider.command());
        spec.working_dir =
            request.working_dir.clone().or_else(|| template.working_directory.clone());
        spec.env = template.env.clone();
        spec.env.push(("HQ_AGENT_ID".to_string(), id.as_str().to_string()));

        let location = with_deadline(DEFAULT_DEADLINE, adapter.spawn_agent(&spec)).await?;

        let now = self.clock.now_utc();
        let mut agent = AgentInstance {
            id: id.clone(),
            template_id: Some(template.id.clone()),
            name: format!("{}-{}", role.as_str(), id.short(10)),
            role: role.clone(),
            provider,
            state: AgentState::Spawning,
            runtime_id: adapter.id().to_string(),
            location,
            team_id: request.team_id.clone(),
            current_task_id: None,
            created_at: now,
            last_activity_at: now,
            error_message: None,
        };
        self.persist_agent(&agent)?;
        self.bus.publish(Event::AgentSpawned {
            id: id.clone(),
            role: role.as_str().to_string(),
            runtime_id: agent.runtime_id.clone(),
        });
        info!(agent = %id, role = %role, runtime = %agent.runtime_id, "agent spawned");

        // The session exists; the agent is assignable as soon as we return.
        agent.state = AgentState::Idle;
        agent.last_activity_at = self.clock.now_utc();
        self.persist_agent(&agent)?;
        self.bus.publish(Event::AgentStateChanged {
            id: id.clone(),
            from: AgentState::Spawning,
            to: AgentState::Idle,
        });

        if let Some(description) = &request.task {
            let mut task = Task::new(description.clone(), self.clock.now_utc());
            task.target_role = Some(role);
            task.column = KanbanColumn::Todo;
            self.store.put_task(&task)?;
            self.bus.publish(Event::TaskSubmitted { id: task.id.clone() });
            self.queue.push(task.id);
        }
        self.try_assign().await;

        Ok(SpawnReply { id, state: AgentState::Spawning })
    }

    async fn handle_kill(&mut self, id: &AgentId) -> Result<(), OrchError> {
        let in_registry = self.registry.read().get(id).cloned();
        let mut agent = match in_registry {
            Some(agent) => agent,
            // Fall back to the store so kill works after a restart
            None => self
                .store
                .get_agent(id.as_str())?
                .ok_or_else(|| OrchError::AgentNotFound(id.as_str().to_string()))?,
        };

        if agent.state == AgentState::Terminated {
            return Ok(()); // kill is idempotent
        }

        if let Some(adapter) = self.runtimes.get(&agent.runtime_id) {
            if let Err(e) = with_deadline(DEFAULT_DEADLINE, adapter.kill(&agent.location)).await {
                warn!(agent = %id, error = %e, "runtime kill failed, terminating anyway");
            }
        }

        // Whatever it was doing goes back to the queue
        if let Some(task_id) = agent.current_task_id.clone() {
            if let Some(mut task) = self.store.get_task(task_id.as_str())? {
                task.assigned_agent_id = None;
                task.set_status(TaskStatus::Pending, self.clock.now_utc());
                self.store.put_task(&task)?;
                self.queue.push(task.id);
            }
        }

        agent.terminate(self.clock.now_utc());
        self.persist_agent(&agent)?;
        self.bus.publish(Event::AgentTerminated { id: id.clone() });
        info!(agent = %id, "agent terminated");
        Ok(())
    }

    async fn handle_send(
        &mut self,
        id: &AgentId,
        prompt: &str,
    ) -> Result<SendTarget, OrchError> {
        let mut agent = self
            .registry
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| OrchError::AgentNotFound(id.as_str().to_string()))?;
        let adapter = self
            .runtimes
            .get(&agent.runtime_id)
            .ok_or_else(|| OrchError::RuntimeUnhealthy(agent.runtime_id.clone()))?;

        deliver(adapter.as_ref(), &agent.location, prompt).await?;

        agent.last_activity_at = self.clock.now_utc();
        self.persist_agent(&agent)?;
        Ok(SendTarget { adapter, location: agent.location })
    }

    async fn handle_enqueue(&mut self, id: TaskId) -> Result<(), OrchError> {
        if self.store.get_task(id.as_str())?.is_none() {
            return Err(OrchError::TaskNotFound(id.as_str().to_string()));
        }
        if !self.queue.contains(&id) {
            self.queue.push(id);
        }
        self.try_assign().await;
        Ok(())
    }

    async fn handle_complete(
        &mut self,
        id: &TaskId,
        success: bool,
        output: Option<String>,
    ) -> Result<(), OrchError> {
        let mut task = self
            .store
            .get_task(id.as_str())?
            .ok_or_else(|| OrchError::TaskNotFound(id.as_str().to_string()))?;

        let now = self.clock.now_utc();
        let status = if success { TaskStatus::Completed } else { TaskStatus::Failed };
        task.set_status(status, now);
        task.column = KanbanColumn::Done;
        task.done_at = Some(now);
        if output.is_some() {
            task.output = output;
        }
        self.store.put_task(&task)?;

        if let Some(agent_id) = task.assigned_agent_id.clone() {
            let in_registry = self.registry.read().get(&agent_id).cloned();
            if let Some(mut agent) = in_registry {
                let from = agent.state;
                agent.release_task(now);
                self.persist_agent(&agent)?;
                self.bus.publish(Event::AgentStateChanged {
                    id: agent_id,
                    from,
                    to: AgentState::Idle,
                });
            }
        }

        self.bus.publish(Event::TaskCompleted { id: id.clone(), status });
        self.bus.publish(Event::TaskMoved { id: id.clone(), column: KanbanColumn::Done });
        self.try_assign().await;
        Ok(())
    }

    async fn handle_cancel(&mut self, id: &TaskId) -> Result<(), OrchError> {
        let mut task = self
            .store
            .get_task(id.as_str())?
            .ok_or_else(|| OrchError::TaskNotFound(id.as_str().to_string()))?;

        self.queue.retain(|queued| queued != id);

        if let Some(agent_id) = task.assigned_agent_id.clone() {
            let in_registry = self.registry.read().get(&agent_id).cloned();
            if let Some(mut agent) = in_registry {
                if let Some(adapter) = self.runtimes.get(&agent.runtime_id) {
                    if let Err(e) =
                        with_deadline(DEFAULT_DEADLINE, adapter.interrupt(&agent.location)).await
                    {
                        warn!(agent = %agent_id, error = %e, "interrupt failed during cancel");
                    }
                }
                let from = agent.state;
                agent.release_task(self.clock.now_utc());
                self.persist_agent(&agent)?;
                self.bus.publish(Event::AgentStateChanged {
                    id: agent_id,
                    from,
                    to: AgentState::Idle,
                });
            }
        }

        task.assigned_agent_id = None;
        task.set_status(TaskStatus::Cancelled, self.clock.now_utc());
        self.store.put_task(&task)?;
        self.bus.publish(Event::TaskCancelled { id: id.clone() });
        Ok(())
    }

    async fn handle_mark_state(
        &mut self,
        id: &AgentId,
        state: AgentState,
        message: Option<String>,
    ) -> Result<(), OrchError> {
        let mut agent = self
            .registry
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| OrchError::AgentNotFound(id.as_str().to_string()))?;

        let from = agent.state;
        let now = self.clock.now_utc();
        match state {
            AgentState::Error => {
                agent.mark_error(message.unwrap_or_else(|| "unknown error".to_string()), now)
            }
            AgentState::Idle => agent.release_task(now),
            AgentState::Terminated => agent.terminate(now),
            other => {
                agent.state = other;
                agent.last_activity_at = now;
            }
        }
        self.persist_agent(&agent)?;
        self.bus.publish(Event::AgentStateChanged { id: id.clone(), from, to: state });
        if state == AgentState::Idle {
            self.try_assign().await;
        }
        Ok(())
    }

    fn handle_reconnect(&mut self, instance: AgentInstance, announce: bool) -> Result<(), OrchError> {
        let id = instance.id.clone();
        self.registry.write().insert(id.clone(), instance);
        if announce {
            self.bus.publish(Event::AgentReconnected { id });
        }
        Ok(())
    }

    async fn handle_fanout(
        &mut self,
        prompt: String,
        count: u32,
        provider: Option<AgentProvider>,
        runtime_id: Option<String>,
    ) -> Result<Vec<AgentId>, OrchError> {
        let mut ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let request = SpawnRequest {
                role: Some(AgentRole::Researcher),
                provider: provider.clone(),
                runtime_id: runtime_id.clone(),
                ..Default::default()
            };
            let reply = self.handle_spawn(request).await?;
            ids.push(reply.id);
        }
        for id in &ids {
            let target = self.handle_send(id, &prompt).await?;
            drop(target);
        }
        Ok(ids)
    }

    /// Dependencies are satisfied when every upstream task completed.
    fn deps_satisfied(&self, task: &Task) -> bool {
        task.depends_on.iter().all(|dep| {
            matches!(
                self.store.get_task(dep.as_str()),
                Ok(Some(t)) if t.status == TaskStatus::Completed
            )
        })
    }

    /// Assignment loop: run until the head task has no matching idle agent.
    async fn try_assign(&mut self) {
        loop {
            // Prune the queue down to live pending tasks
            let mut pending: Vec<Task> = Vec::new();
            let mut keep = Vec::new();
            for id in &self.queue {
                match self.store.get_task(id.as_str()) {
                    Ok(Some(task)) if task.status == TaskStatus::Pending => {
                        keep.push(id.clone());
                        pending.push(task);
                    }
                    Ok(_) => {} // finished or deleted, drop from queue
                    Err(e) => {
                        warn!(task = %id, error = %e, "queue read failed");
                        keep.push(id.clone());
                    }
                }
            }
            self.queue = keep;

            pending.sort_by(|a, b| {
                b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at))
            });

            let Some(task) = pending.into_iter().find(|t| self.deps_satisfied(t)) else {
                return;
            };

            let agent_id = {
                let registry = self.registry.read();
                let mut idle: Vec<&AgentInstance> = registry
                    .values()
                    .filter(|a| a.state == AgentState::Idle)
                    .filter(|a| {
                        task.target_role.as_ref().map(|r| &a.role == r).unwrap_or(true)
                    })
                    .collect();
                idle.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                idle.first().map(|a| a.id.clone())
            };
            let Some(agent_id) = agent_id else {
                return; // no matching idle agent: stop until one frees up
            };

            if let Err(e) = self.assign(task, &agent_id).await {
                warn!(agent = %agent_id, error = %e, "assignment failed");
                return;
            }
        }
    }

    async fn assign(&mut self, mut task: Task, agent_id: &AgentId) -> Result<(), OrchError> {
        let now = self.clock.now_utc();
        let mut agent = self
            .registry
            .read()
            .get(agent_id)
            .cloned()
            .ok_or_else(|| OrchError::AgentNotFound(agent_id.as_str().to_string()))?;

        task.assigned_agent_id = Some(agent_id.clone());
        task.set_status(TaskStatus::Assigned, now);
        agent.start_task(task.id.clone(), now);
        self.store.put_task(&task)?;
        self.persist_agent(&agent)?;

        self.bus
            .publish(Event::TaskAssigned { id: task.id.clone(), agent_id: agent_id.clone() });
        self.bus.publish(Event::AgentStateChanged {
            id: agent_id.clone(),
            from: AgentState::Idle,
            to: AgentState::Working,
        });

        let prompt = self.compose_prompt(&task);
        let adapter = self
            .runtimes
            .get(&agent.runtime_id)
            .ok_or_else(|| OrchError::RuntimeUnhealthy(agent.runtime_id.clone()))?;

        match deliver(adapter.as_ref(), &agent.location, &prompt).await {
            Ok(()) => {
                task.set_status(TaskStatus::InProgress, self.clock.now_utc());
                task.column = KanbanColumn::InProgress;
                self.store.put_task(&task)?;
                self.queue.retain(|id| id != &task.id);
                debug!(task = %task.id, agent = %agent_id, "task assigned");
                Ok(())
            }
            Err(e) => {
                // Undo: the task goes back to pending, the agent is suspect
                task.assigned_agent_id = None;
                task.set_status(TaskStatus::Pending, self.clock.now_utc());
                self.store.put_task(&task)?;
                agent.mark_error(format!("prompt delivery failed: {e}"), self.clock.now_utc());
                self.persist_agent(&agent)?;
                self.bus.publish(Event::AgentStateChanged {
                    id: agent_id.clone(),
                    from: AgentState::Working,
                    to: AgentState::Error,
                });
                Err(e.into())
            }
        }
    }

    /// Compose the prompt sent to an agent for a task: lane context first,
    /// then the description, then any structured input.
    fn compose_prompt(&self, task: &Task) -> String {
        let mut parts = Vec::new();
        if let Some(lane_id) = &task.lane_id {
            if let Ok(Some(lane)) = self.store.get_lane(lane_id.as_str()) {
                if let Some(instructions) = lane.context_instructions {
                    parts.push(instructions);
                }
            }
        }
        parts.push(task.description.clone());
        if let Some(input) = &task.input {
            parts.push(format!("Input: {input}"));
        }
        parts.join("\n\n")
    }
}

/// Deliver text to a terminal: multi-line or control-heavy prompts go
/// through the backend's paste primitive, plain lines are typed.
async fn deliver(
    adapter: &dyn RuntimeAdapter,
    location: &Location,
    text: &str,
) -> Result<(), AdapterError> {
    let needs_paste = text.contains('\n') || text.contains(|c: char| c.is_control());
    if needs_paste {
        with_deadline(DEFAULT_DEADLINE, adapter.paste(location, text)).await?;
        with_deadline(DEFAULT_DEADLINE, adapter.send_keys(location, "")).await
    } else {
        with_deadline(DEFAULT_DEADLINE, adapter.send_keys(location, text)).await
    }
}

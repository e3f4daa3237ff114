//! In-memory doubles for the process and transport ports, shared by unit and
//! integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, DuplexStream};
use tokio::sync::{mpsc, Notify};

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{
    ChildProcess, InboundMessage, MessageTransport, ProcessLauncher, TransportSession,
};
use crate::domain::value_objects::{PipelineExit, PipelineRole, PipelineSpec};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Buffer of a fake stderr pipe; writers block once it is full
const STDERR_BUFFER: usize = 64;

/// Poll `condition` every few milliseconds; panics after two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

struct ChildSlot {
    role: PipelineRole,
    exit: Mutex<Option<PipelineExit>>,
    exited: Notify,
}

impl ChildSlot {
    fn finish(&self, exit: PipelineExit) {
        *lock(&self.exit) = Some(exit);
        self.exited.notify_one();
    }
}

#[derive(Default)]
struct LauncherState {
    spawned: HashMap<PipelineRole, Vec<PipelineSpec>>,
    kills: HashMap<PipelineRole, usize>,
    running: Vec<Arc<ChildSlot>>,
    stderr_writers: HashMap<PipelineRole, DuplexStream>,
    fail_spawns: bool,
}

/// Records every launch; processes run until a test ends them or they are killed
#[derive(Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<LauncherState>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_spawns(&self, fail: bool) {
        lock(&self.state).fail_spawns = fail;
    }

    /// Successful launches of `role`
    pub fn spawn_count(&self, role: PipelineRole) -> usize {
        lock(&self.state).spawned.get(&role).map_or(0, Vec::len)
    }

    pub fn kill_count(&self, role: PipelineRole) -> usize {
        lock(&self.state).kills.get(&role).copied().unwrap_or(0)
    }

    /// Processes of `role` that have not exited yet
    pub fn running(&self, role: PipelineRole) -> usize {
        lock(&self.state)
            .running
            .iter()
            .filter(|slot| slot.role == role)
            .count()
    }

    pub fn last_spec(&self, role: PipelineRole) -> Option<PipelineSpec> {
        lock(&self.state)
            .spawned
            .get(&role)
            .and_then(|specs| specs.last().cloned())
    }

    /// Make every running process of `role` exit with `code`
    pub fn exit_running(&self, role: PipelineRole, code: i32) {
        let exiting: Vec<Arc<ChildSlot>> = {
            let mut state = lock(&self.state);
            let (exiting, running): (Vec<_>, Vec<_>) =
                state.running.drain(..).partition(|slot| slot.role == role);
            state.running = running;
            exiting
        };
        for slot in exiting {
            slot.finish(PipelineExit { code: Some(code) });
        }
    }

    /// Writing end of the stderr of the latest `role` process that asked for capture
    pub fn take_stderr_writer(&self, role: PipelineRole) -> Option<DuplexStream> {
        lock(&self.state).stderr_writers.remove(&role)
    }

    pub async fn wait_for_spawns(&self, role: PipelineRole, count: usize) {
        wait_until(|| self.spawn_count(role) >= count).await;
    }
}

impl ProcessLauncher for FakeLauncher {
    fn spawn(&self, spec: &PipelineSpec) -> Result<Box<dyn ChildProcess>> {
        let mut state = lock(&self.state);
        if state.fail_spawns {
            return Err(DomainError::PipelineSpawnFailed(format!(
                "{}: not found",
                spec.program
            )));
        }

        let slot = Arc::new(ChildSlot {
            role: spec.role,
            exit: Mutex::new(None),
            exited: Notify::new(),
        });
        state.running.push(slot.clone());
        let stderr = spec.capture_stderr.then(|| {
            let (reader, writer) = tokio::io::duplex(STDERR_BUFFER);
            state.stderr_writers.insert(spec.role, writer);
            reader
        });
        let spawned = state.spawned.entry(spec.role).or_default();
        spawned.push(spec.clone());
        let id = spawned.len() as u32;

        Ok(Box::new(FakeChild {
            id,
            slot,
            stderr,
            launcher: self.state.clone(),
        }))
    }
}

struct FakeChild {
    id: u32,
    slot: Arc<ChildSlot>,
    stderr: Option<DuplexStream>,
    launcher: Arc<Mutex<LauncherState>>,
}

impl FakeChild {
    fn remove_from_running(&self) -> bool {
        let mut state = lock(&self.launcher);
        let before = state.running.len();
        state.running.retain(|slot| !Arc::ptr_eq(slot, &self.slot));
        state.running.len() != before
    }
}

#[async_trait]
impl ChildProcess for FakeChild {
    fn id(&self) -> Option<u32> {
        Some(self.id)
    }

    fn take_stderr(&mut self) -> Option<Box<dyn AsyncRead + Send + Unpin>> {
        self.stderr
            .take()
            .map(|reader| Box::new(reader) as Box<dyn AsyncRead + Send + Unpin>)
    }

    async fn wait(&mut self) -> Result<PipelineExit> {
        loop {
            let exit = *lock(&self.slot.exit);
            if let Some(exit) = exit {
                return Ok(exit);
            }
            self.slot.exited.notified().await;
        }
    }

    fn start_kill(&mut self) -> Result<()> {
        if !self.remove_from_running() {
            return Err(DomainError::PipelineKillFailed("process already exited".to_string()));
        }
        *lock(&self.launcher).kills.entry(self.slot.role).or_default() += 1;
        self.slot.finish(PipelineExit { code: None });
        Ok(())
    }
}

impl Drop for FakeChild {
    fn drop(&mut self) {
        self.remove_from_running();
    }
}

type Inbound = mpsc::UnboundedSender<Result<InboundMessage>>;

#[derive(Default)]
struct TransportState {
    connects: usize,
    failing_connects: usize,
    subscriptions: Vec<String>,
    published: Vec<(String, Vec<u8>)>,
    current: Option<(Inbound, Arc<AtomicBool>)>,
}

/// Records subscriptions and publishes; tests inject messages and failures
#[derive(Default)]
pub struct FakeTransport {
    state: Arc<Mutex<TransportState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `count` connection attempts
    pub fn fail_next_connects(&self, count: usize) {
        lock(&self.state).failing_connects = count;
    }

    /// Connection attempts, successful or not
    pub fn connect_count(&self) -> usize {
        lock(&self.state).connects
    }

    /// Every subscription across all sessions, in order
    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.state).subscriptions.clone()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.state).published.clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        lock(&self.state)
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Deliver a message to the current session; returns `false` without one
    pub fn inject(&self, topic: &str, payload: &[u8]) -> bool {
        let state = lock(&self.state);
        match &state.current {
            Some((inbound, _)) => inbound
                .send(Ok(InboundMessage {
                    topic: topic.to_string(),
                    payload: payload.to_vec(),
                }))
                .is_ok(),
            None => false,
        }
    }

    /// Break the current session as a lost broker connection would
    pub fn drop_connection(&self) {
        if let Some((inbound, closed)) = lock(&self.state).current.take() {
            closed.store(true, Ordering::SeqCst);
            let _ = inbound.send(Err(DomainError::Transport("connection lost".to_string())));
        }
    }
}

#[async_trait]
impl MessageTransport for FakeTransport {
    async fn connect(&self) -> Result<Arc<dyn TransportSession>> {
        let mut state = lock(&self.state);
        state.connects += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(DomainError::Transport("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        state.current = Some((tx, closed.clone()));

        Ok(Arc::new(FakeSession {
            state: self.state.clone(),
            inbound: tokio::sync::Mutex::new(rx),
            closed,
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<TransportState>>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<InboundMessage>>>,
    closed: Arc<AtomicBool>,
}

impl FakeSession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DomainError::TransportClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl TransportSession for FakeSession {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.ensure_open()?;
        lock(&self.state).subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.ensure_open()?;
        lock(&self.state).published.push((topic.to_string(), payload));
        Ok(())
    }

    async fn next_message(&self) -> Result<InboundMessage> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .unwrap_or(Err(DomainError::TransportClosed))
    }
}

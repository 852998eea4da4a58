mod command;
mod id;

pub use self::{command::GraphUpdate, id::SessionId};
use self::command::{Command, Reply};
use crate::{EngineConfig, SessionError, shutdown::ShutdownReceiver, stream::SnapshotStream};
use flowsim_core::{
    Simulation, TickSnapshot,
    node::{ConfigPatch, NodeId},
    topology::TopologyDelta,
    wire::ArchitectureSpec,
};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::{
    select,
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};
use tracing::{debug, info, trace, warn};

/// Cheap, cloneable address of a running session engine.
///
/// Every method enqueues a command and waits for the engine to apply it.
/// Commands only mutate state; the flow is recomputed on the next tick.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// `true` once the engine has exited.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Stopped(self.id.clone()))?;
        answer
            .await
            .map_err(|_| SessionError::Stopped(self.id.clone()))?
    }

    /// `Created → Running`: install the simulation and start ticking.
    pub async fn start(&self, simulation: Simulation) -> Result<(), SessionError> {
        self.request(|reply| Command::Start(Box::new(simulation), reply))
            .await
    }

    /// Stop the engine. Stopping an already stopped session succeeds.
    pub async fn stop(&self) -> Result<(), SessionError> {
        match self.request(Command::Stop).await {
            Err(SessionError::Stopped(_)) => Ok(()),
            result => result,
        }
    }

    pub async fn update_graph(&self, delta: TopologyDelta) -> Result<(), SessionError> {
        self.request(|reply| Command::UpdateGraph(GraphUpdate::Delta(delta), reply))
            .await
    }

    /// Replace the graph, keeping the metrics of nodes that remain.
    pub async fn replace_graph(&self, spec: ArchitectureSpec) -> Result<(), SessionError> {
        self.request(|reply| Command::UpdateGraph(GraphUpdate::Replace(spec), reply))
            .await
    }

    pub async fn update_config(
        &self,
        node_id: impl Into<NodeId>,
        patch: ConfigPatch,
    ) -> Result<(), SessionError> {
        let node_id = node_id.into();
        self.request(|reply| Command::UpdateConfig {
            node_id,
            patch,
            reply,
        })
        .await
    }

    pub async fn toggle_node(
        &self,
        node_id: impl Into<NodeId>,
        down: bool,
    ) -> Result<(), SessionError> {
        let node_id = node_id.into();
        self.request(|reply| Command::ToggleNode {
            node_id,
            down,
            reply,
        })
        .await
    }

    pub async fn set_traffic_spike(&self, active: bool) -> Result<(), SessionError> {
        self.request(|reply| Command::SetTrafficSpike(active, reply))
            .await
    }

    pub async fn set_traffic_rps(&self, rps: f64) -> Result<(), SessionError> {
        self.request(|reply| Command::SetTrafficRps(rps, reply))
            .await
    }

    pub async fn reset_queues(&self) -> Result<(), SessionError> {
        self.request(Command::ResetQueues).await
    }

    /// Receive every snapshot from the next tick on.
    pub async fn subscribe(&self) -> Result<SnapshotStream, SessionError> {
        self.request(Command::Subscribe).await
    }

    /// The most recent snapshot, `None` before the first tick.
    pub async fn snapshot(&self) -> Result<Option<Arc<TickSnapshot>>, SessionError> {
        self.request(Command::Snapshot).await
    }
}

/// Spawn the engine of a new session in the `Created` state.
pub(crate) fn spawn(
    id: SessionId,
    config: EngineConfig,
    shutdown: ShutdownReceiver,
) -> (SessionHandle, JoinHandle<()>) {
    let config = config.sanitized();
    let (commands, mailbox) = mpsc::channel(config.command_buffer);
    let engine = Engine::new(id.clone(), config, mailbox, shutdown);
    let task = tokio::spawn(run_engine(engine));

    (SessionHandle { id, commands }, task)
}

enum Phase {
    Created,
    Running(Box<Simulation>),
}

/// The actor owning one session. Commands and ticks are handled strictly
/// one after the other, so a tick always sees fully applied commands.
struct Engine {
    id: SessionId,
    config: EngineConfig,
    phase: Phase,

    mailbox: mpsc::Receiver<Command>,
    snapshots: broadcast::Sender<Arc<TickSnapshot>>,
    latest: Option<Arc<TickSnapshot>>,

    ticker: Interval,
    last_command: Instant,

    shutdown: ShutdownReceiver,
}

impl Engine {
    fn new(
        id: SessionId,
        config: EngineConfig,
        mailbox: mpsc::Receiver<Command>,
        shutdown: ShutdownReceiver,
    ) -> Self {
        let (snapshots, _) = broadcast::channel(config.snapshot_buffer);
        let mut ticker = interval_at(Instant::now() + config.tick_period, config.tick_period);
        // a slow tick pushes the next one back, ticks never overlap
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            id,
            config,
            phase: Phase::Created,
            mailbox,
            snapshots,
            latest: None,
            ticker,
            last_command: Instant::now(),
            shutdown,
        }
    }

    fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running(_))
    }

    fn simulation(&mut self) -> Result<&mut Simulation, SessionError> {
        match &mut self.phase {
            Phase::Running(simulation) => Ok(simulation.as_mut()),
            Phase::Created => Err(SessionError::NotStarted(self.id.clone())),
        }
    }

    /// Execute one command. Returns `false` when the engine must stop.
    fn handle(&mut self, command: Command) -> bool {
        self.last_command = Instant::now();
        trace!(session = %self.id, command = command.name(), "command");

        match command {
            Command::Start(simulation, reply) => {
                let result = if self.is_running() {
                    Err(SessionError::AlreadyRunning(self.id.clone()))
                } else {
                    let simulation = (*simulation).with_tick_seconds(self.config.tick_duration);
                    info!(
                        session = %self.id,
                        nodes = simulation.topology().len(),
                        edges = simulation.topology().edges().len(),
                        "session started"
                    );
                    self.phase = Phase::Running(Box::new(simulation));
                    self.ticker.reset();
                    Ok(())
                };
                respond(&self.id, "start", reply, result);
            }
            Command::Stop(reply) => {
                let _ = reply.send(Ok(()));
                return false;
            }
            Command::UpdateGraph(update, reply) => {
                let result = self.simulation().and_then(|sim| {
                    match update {
                        GraphUpdate::Delta(delta) => sim.update_graph(delta),
                        GraphUpdate::Replace(spec) => sim.replace_graph(spec),
                    }
                    .map_err(SessionError::from)
                });
                respond(&self.id, "update_graph", reply, result);
            }
            Command::UpdateConfig {
                node_id,
                patch,
                reply,
            } => {
                let result = self.simulation().and_then(|sim| {
                    sim.update_config(node_id.as_str(), patch)
                        .map_err(SessionError::from)
                });
                respond(&self.id, "update_config", reply, result);
            }
            Command::ToggleNode {
                node_id,
                down,
                reply,
            } => {
                let result = self.simulation().and_then(|sim| {
                    sim.toggle_node(node_id.as_str(), down)
                        .map_err(SessionError::from)
                });
                respond(&self.id, "toggle_node", reply, result);
            }
            Command::SetTrafficSpike(active, reply) => {
                let result = self.simulation().map(|sim| sim.set_traffic_spike(active));
                respond(&self.id, "set_traffic_spike", reply, result);
            }
            Command::SetTrafficRps(rps, reply) => {
                let result = self
                    .simulation()
                    .and_then(|sim| sim.set_traffic_rps(rps).map_err(SessionError::from));
                respond(&self.id, "set_traffic_rps", reply, result);
            }
            Command::ResetQueues(reply) => {
                let result = self.simulation().map(|sim| sim.reset_queues());
                respond(&self.id, "reset_queues", reply, result);
            }
            Command::Subscribe(reply) => {
                let stream = SnapshotStream::new(self.id.clone(), self.snapshots.subscribe());
                respond(&self.id, "subscribe", reply, Ok(stream));
            }
            Command::Snapshot(reply) => {
                respond(&self.id, "snapshot", reply, Ok(self.latest.clone()));
            }
        }

        true
    }

    /// Run one tick and publish its snapshot. Returns `false` when the
    /// session has been idle for too long.
    fn tick(&mut self) -> bool {
        let timestamp = unix_millis();
        let Phase::Running(simulation) = &mut self.phase else {
            return true;
        };
        let snapshot = Arc::new(simulation.step(timestamp));

        // no subscriber is not an error, the snapshot is still retained
        let _ = self.snapshots.send(Arc::clone(&snapshot));
        self.latest = Some(snapshot);

        let idle = self.snapshots.receiver_count() == 0
            && self.last_command.elapsed() >= self.config.idle_timeout;
        if idle {
            warn!(
                session = %self.id,
                idle_for = ?self.last_command.elapsed(),
                "session idle, stopping"
            );
        }
        !idle
    }

    async fn step(&mut self) -> bool {
        let mut shutdown = self.shutdown.clone();
        let is_shutting_down = shutdown.is_shutting_down();
        let running = self.is_running();

        select! {
            biased;

            true = is_shutting_down => false,
            command = self.mailbox.recv() => match command {
                Some(command) => self.handle(command),
                // every handle is gone, nobody can reach this session anymore
                None => false,
            },
            _ = self.ticker.tick(), if running => self.tick(),
        }
    }

    /// `Running → Stopped`: refuse what is still queued and go back to
    /// idle metrics. Subscribers see their stream end when the engine is
    /// dropped.
    fn close(&mut self) {
        self.mailbox.close();
        while let Ok(command) = self.mailbox.try_recv() {
            match command {
                Command::Stop(reply) => {
                    let _ = reply.send(Ok(()));
                }
                command => command.reject(SessionError::Stopped(self.id.clone())),
            }
        }

        if let Phase::Running(simulation) = &mut self.phase {
            simulation.reset_runtime();
            info!(session = %self.id, ticks = simulation.tick(), "session stopped");
        } else {
            info!(session = %self.id, "session stopped before starting");
        }
    }
}

fn respond<T>(id: &SessionId, command: &str, reply: Reply<T>, result: Result<T, SessionError>) {
    if let Err(error) = &result {
        debug!(session = %id, command, %error, "command rejected");
    }
    let _ = reply.send(result);
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

async fn run_engine(mut engine: Engine) {
    while engine.step().await {}

    engine.close();
}

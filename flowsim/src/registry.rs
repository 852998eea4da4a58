use crate::{
    RegistryConfig, SessionError,
    defaults::DEFAULT_REAP_INTERVAL,
    session::{self, SessionHandle, SessionId},
    shutdown::ShutdownController,
    stream::SnapshotStream,
};
use anyhow::{Context as _, Result};
use flowsim_core::{Simulation, wire::ArchitectureSpec};
use rand_chacha::ChaChaRng;
use rand_core::{Rng, SeedableRng as _};
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::{
    select,
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, error, info, warn};

/// Owns every live session, keyed by a generated [`SessionId`].
///
/// The registry is cheap to clone; all clones share the same sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    config: RegistryConfig,
    sessions: Mutex<Sessions>,
    shutdown: ShutdownController,
}

struct Sessions {
    map: HashMap<SessionId, Session>,
    rng: ChaChaRng,
}

struct Session {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl Sessions {
    /// An id not used by any session in the map.
    fn fresh_id(&mut self) -> SessionId {
        loop {
            let id = SessionId::from_bits(self.rng.next_u64());
            if !self.map.contains_key(&id) {
                return id;
            }
        }
    }

    /// Remove the sessions whose engine has exited by itself.
    fn reap(&mut self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, session| !session.handle.is_closed());
        before - self.map.len()
    }
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let seed = config.id_seed.unwrap_or_else(clock_seed);
        let sessions = Sessions {
            map: HashMap::new(),
            rng: ChaChaRng::seed_from_u64(seed),
        };

        Self {
            inner: Arc::new(Inner {
                config,
                sessions: Mutex::new(sessions),
                shutdown: ShutdownController::new(),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Validate `spec`, then spawn and start a session running it.
    ///
    /// Nothing is registered when the topology is rejected.
    pub async fn create_session(
        &self,
        spec: ArchitectureSpec,
    ) -> Result<SessionHandle, SessionError> {
        let simulation = Simulation::from_spec(spec)?;

        let handle = {
            let mut sessions = self.inner.sessions.lock().await;
            sessions.reap();

            let limit = self.inner.config.max_sessions;
            if sessions.map.len() >= limit {
                warn!(limit, "refusing new session, limit reached");
                return Err(SessionError::SessionLimitReached { limit });
            }

            let id = sessions.fresh_id();
            let (handle, task) = session::spawn(
                id.clone(),
                self.inner.config.engine,
                self.inner.shutdown.subscribe(),
            );
            sessions.map.insert(
                id,
                Session {
                    handle: handle.clone(),
                    task,
                },
            );
            handle
        };

        if let Err(error) = handle.start(simulation).await {
            self.inner.sessions.lock().await.map.remove(handle.id());
            return Err(error);
        }

        info!(session = %handle.id(), "session created");
        Ok(handle)
    }

    /// The handle of a live session.
    pub async fn get(&self, id: &str) -> Result<SessionHandle, SessionError> {
        let sessions = self.inner.sessions.lock().await;
        sessions
            .map
            .get(id)
            .filter(|session| !session.handle.is_closed())
            .map(|session| session.handle.clone())
            .ok_or_else(|| SessionError::SessionNotFound(SessionId::from(id)))
    }

    pub async fn subscribe(&self, id: &str) -> Result<SnapshotStream, SessionError> {
        self.get(id).await?.subscribe().await
    }

    /// Stop a session and forget it. Its subscribers see their stream end.
    pub async fn stop(&self, id: &str) -> Result<(), SessionError> {
        let session = self
            .inner
            .sessions
            .lock()
            .await
            .map
            .remove(id)
            .ok_or_else(|| SessionError::SessionNotFound(SessionId::from(id)))?;

        session.handle.stop().await?;
        if let Err(error) = session.task.await {
            error!(session = %id, %error, "session engine failed");
        }
        Ok(())
    }

    /// Ids of the live sessions, sorted.
    pub async fn list(&self) -> Vec<SessionId> {
        let sessions = self.inner.sessions.lock().await;
        let mut ids: Vec<_> = sessions
            .map
            .values()
            .filter(|session| !session.handle.is_closed())
            .map(|session| session.handle.id().clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.list().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Forget the sessions that stopped on their own (idle timeout).
    /// Returns how many were removed.
    pub async fn reap(&self) -> usize {
        let reaped = self.inner.sessions.lock().await.reap();
        if reaped > 0 {
            debug!(reaped, "reaped stopped sessions");
        }
        reaped
    }

    /// Periodically [`reap`] in the background until the registry shuts
    /// down or is dropped.
    ///
    /// [`reap`]: Self::reap
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        let registry = Arc::downgrade(&self.inner);
        let mut shutdown = self.inner.shutdown.subscribe();
        let period = match self.inner.config.reap_interval {
            period if period.is_zero() => DEFAULT_REAP_INTERVAL,
            period => period,
        };

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                select! {
                    biased;

                    true = shutdown.is_shutting_down() => break,
                    _ = ticker.tick() => {}
                }

                let Some(inner) = Weak::upgrade(&registry) else {
                    break;
                };
                SessionRegistry { inner }.reap().await;
            }
        })
    }

    /// Stop every session and wait for their engines to exit.
    ///
    /// Sessions created afterwards stop immediately.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.shutdown.shutdown();

        let sessions: Vec<_> = self.inner.sessions.lock().await.map.drain().collect();
        let count = sessions.len();

        let mut result = Ok(());
        for (id, session) in sessions {
            let joined = session
                .task
                .await
                .with_context(|| format!("session ({id}) engine panicked"));
            if result.is_ok() {
                result = joined;
            }
        }

        info!(sessions = count, "registry shut down");
        result
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

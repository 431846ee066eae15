use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::RwLock;

use super::data::SessionData;
use super::error::SessionError;
use super::id::{validate_id_shape, SessionId, SessionKind};
use super::record::Session;

/// Default session lifetime.
pub const DEFAULT_SESSION_DURATION_HOURS: i64 = 12;
/// Default sweeper period.
pub const DEFAULT_CLEANUP_INTERVAL_MINUTES: i64 = 30;

pub type CleanupHook = Arc<dyn Fn(&Session) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SessionRegistryConfig {
    pub session_duration: Duration,
}

impl Default for SessionRegistryConfig {
    fn default() -> Self {
        SessionRegistryConfig {
            session_duration: Duration::hours(DEFAULT_SESSION_DURATION_HOURS),
        }
    }
}

/// Keyed store of session records with creation/expiry/terminate/
/// cleanup-hook lifecycle.
///
/// Concurrency: a single `parking_lot::RwLock` guards the id→session
/// map. All mutators take the write lock for the whole transition,
/// including `get_or_create_data`'s factory call — callers must keep
/// factories short and non-blocking.
pub struct SessionRegistry {
    sessions: RwLock<std::collections::HashMap<String, Session>>,
    hooks: RwLock<Vec<CleanupHook>>,
    config: SessionRegistryConfig,
}

impl SessionRegistry {
    pub fn new(config: SessionRegistryConfig) -> Arc<Self> {
        Arc::new(SessionRegistry {
            sessions: RwLock::new(std::collections::HashMap::new()),
            hooks: RwLock::new(Vec::new()),
            config,
        })
    }

    pub fn add_cleanup_hook(&self, hook: impl Fn(&Session) + Send + Sync + 'static) {
        self.hooks.write().push(Arc::new(hook));
    }

    fn run_hooks(&self, session: &Session) {
        for hook in self.hooks.read().iter() {
            hook(session);
        }
    }

    /// `Mint(initialData) -> id`.
    pub fn mint(&self, kind: SessionKind, initial_data: SessionData) -> SessionId {
        let id = SessionId::mint();
        let now = Utc::now();
        let session = Session::new(id.as_str().to_string(), kind, now, self.config.session_duration)
            .with_data(initial_data);
        self.sessions.write().insert(id.as_str().to_string(), session);
        id
    }

    /// `GetOrCreate(id) -> (session, isNew, err)`.
    pub fn get_or_create(&self, id: &str, kind: SessionKind) -> Result<(Session, bool), SessionError> {
        validate_id_shape(id)?;
        let now = Utc::now();
        let mut map = self.sessions.write();

        if let Some(existing) = map.get(id) {
            if existing.terminated {
                return Err(SessionError::Terminated);
            }
            if !existing.is_expired(now) {
                return Ok((existing.clone(), false));
            }
            // Expired but never explicitly terminated: resurrect under
            // the same externally-supplied id (invariant c: expiration
            // is evaluated live, not just by the sweeper).
        }

        let fresh = Session::new(id.to_string(), kind, now, self.config.session_duration);
        map.insert(id.to_string(), fresh.clone());
        Ok((fresh, true))
    }

    /// `Get(id) -> (session, err)`.
    pub fn get(&self, id: &str) -> Result<Session, SessionError> {
        validate_id_shape(id)?;
        let now = Utc::now();
        let mut map = self.sessions.write();
        match map.get_mut(id) {
            None => Err(SessionError::NotFound),
            Some(session) => {
                if session.terminated {
                    return Err(SessionError::NotFound);
                }
                if session.is_expired(now) {
                    session.terminated = true;
                    return Err(SessionError::NotFound);
                }
                Ok(session.clone())
            }
        }
    }

    /// `Validate(id) -> (terminated, err)`. Side effect: marks the
    /// session terminated when expired.
    pub fn validate(&self, id: &str) -> Result<bool, SessionError> {
        validate_id_shape(id)?;
        let now = Utc::now();
        let mut map = self.sessions.write();
        match map.get_mut(id) {
            None => Err(SessionError::NotFound),
            Some(session) => {
                if !session.terminated && session.is_expired(now) {
                    session.terminated = true;
                }
                Ok(session.terminated)
            }
        }
    }

    /// `UpdateData(id, data) -> err`.
    pub fn update_data(&self, id: &str, data: SessionData) -> Result<(), SessionError> {
        validate_id_shape(id)?;
        let now = Utc::now();
        let mut map = self.sessions.write();
        match map.get_mut(id) {
            None => Err(SessionError::NotFound),
            Some(session) => {
                if session.terminated {
                    return Err(SessionError::Terminated);
                }
                if session.is_expired(now) {
                    session.terminated = true;
                    return Err(SessionError::Terminated);
                }
                session.data = data;
                Ok(())
            }
        }
    }

    /// `GetOrCreateData(id, factory) -> (data, isNew, err)`. The
    /// factory runs inside the write-lock critical section, so two
    /// concurrent callers for the same id can never both observe
    /// `isNew = true`.
    pub fn get_or_create_data<F>(&self, id: &str, factory: F) -> Result<(SessionData, bool), SessionError>
    where
        F: FnOnce() -> SessionData,
    {
        validate_id_shape(id)?;
        let now = Utc::now();
        let mut map = self.sessions.write();

        if let Some(session) = map.get(id) {
            if session.terminated {
                return Err(SessionError::Terminated);
            }
            if !session.is_expired(now) {
                return Ok((session.data.clone(), false));
            }
        }

        let data = factory();
        let session = Session::new(id.to_string(), SessionKind::Unknown, now, self.config.session_duration)
            .with_data(data.clone());
        map.insert(id.to_string(), session);
        Ok((data, true))
    }

    /// `Terminate(id) -> err`. Idempotent; runs all cleanup hooks
    /// exactly once, then deletes the record.
    pub fn terminate(&self, id: &str) -> Result<(), SessionError> {
        validate_id_shape(id)?;
        let removed = {
            let mut map = self.sessions.write();
            map.remove(id)
        };
        match removed {
            Some(session) => {
                self.run_hooks(&session);
                Ok(())
            }
            None => Ok(()), // idempotent: already gone
        }
    }

    /// `Sweep() -> n`. Evicts expired or already-marked-terminated
    /// records, invoking cleanup hooks exactly once per record.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let evicted: Vec<Session> = {
            let mut map = self.sessions.write();
            let stale_ids: Vec<String> = map
                .iter()
                .filter(|(_, s)| s.terminated || s.is_expired(now))
                .map(|(id, _)| id.clone())
                .collect();
            stale_ids
                .into_iter()
                .filter_map(|id| map.remove(&id))
                .collect()
        };

        for session in &evicted {
            self.run_hooks(session);
        }
        evicted.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> Arc<SessionRegistry> {
        SessionRegistry::new(SessionRegistryConfig::default())
    }

    #[test]
    fn mint_then_get_round_trips() {
        let reg = registry();
        let id = reg.mint(SessionKind::Mcp, SessionData::Empty);
        let session = reg.get(id.as_str()).unwrap();
        assert_eq!(session.id, id.as_str());
        assert!(!session.terminated);
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let reg = registry();
        let err = reg.get(&uuid::Uuid::new_v4().to_string()).unwrap_err();
        assert_eq!(err, SessionError::NotFound);
    }

    #[test]
    fn empty_id_is_invalid_argument() {
        let reg = registry();
        assert_eq!(reg.get("").unwrap_err(), SessionError::EmptyId);
    }

    #[test]
    fn expired_session_is_not_found_and_terminated_by_validate() {
        let reg = SessionRegistry::new(SessionRegistryConfig {
            session_duration: Duration::milliseconds(1),
        });
        let id = reg.mint(SessionKind::Mcp, SessionData::Empty);
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert_eq!(reg.get(id.as_str()).unwrap_err(), SessionError::NotFound);
        // get() already flipped terminated=true; validate reflects it.
        assert!(reg.validate(id.as_str()).unwrap());
    }

    #[test]
    fn terminate_runs_hooks_exactly_once() {
        let reg = registry();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = counter.clone();
        reg.add_cleanup_hook(move |_| {
            counter2.fetch_add(1, Ordering::SeqCst);
        });

        let id = reg.mint(SessionKind::Mcp, SessionData::Empty);
        reg.terminate(id.as_str()).unwrap();
        reg.terminate(id.as_str()).unwrap(); // idempotent, no double hook
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sweep_evicts_expired_and_runs_hooks_once() {
        let reg = SessionRegistry::new(SessionRegistryConfig {
            session_duration: Duration::milliseconds(1),
        });
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = counter.clone();
        reg.add_cleanup_hook(move |_| {
            counter2.fetch_add(1, Ordering::SeqCst);
        });

        let _id = reg.mint(SessionKind::Mcp, SessionData::Empty);
        std::thread::sleep(std::time::Duration::from_millis(5));

        let evicted = reg.sweep();
        assert_eq!(evicted, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn get_or_create_data_runs_factory_exactly_once_under_concurrency() {
        use std::thread;

        let reg = registry();
        let id = uuid::Uuid::new_v4().to_string();
        let factory_calls = Arc::new(AtomicUsize::new(0));
        let new_count = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let reg = reg.clone();
            let id = id.clone();
            let factory_calls = factory_calls.clone();
            let new_count = new_count.clone();
            handles.push(thread::spawn(move || {
                let (_data, is_new) = reg
                    .get_or_create_data(&id, || {
                        factory_calls.fetch_add(1, Ordering::SeqCst);
                        SessionData::Brokerage(Default::default())
                    })
                    .unwrap();
                if is_new {
                    new_count.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
        assert_eq!(new_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_or_create_resurrects_expired_external_id() {
        let reg = SessionRegistry::new(SessionRegistryConfig {
            session_duration: Duration::milliseconds(1),
        });
        let id = uuid::Uuid::new_v4().to_string();
        let (_first, is_new1) = reg.get_or_create(&id, SessionKind::Sse).unwrap();
        assert!(is_new1);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let (_second, is_new2) = reg.get_or_create(&id, SessionKind::Sse).unwrap();
        assert!(is_new2);
    }

    #[test]
    fn get_or_create_fails_for_explicitly_terminated_id() {
        let reg = registry();
        let id = reg.mint(SessionKind::Mcp, SessionData::Empty);
        reg.terminate(id.as_str()).unwrap();
        // After Terminate, the record is gone entirely, so GetOrCreate
        // simply mints a fresh record rather than erroring — Terminate
        // deletes, it doesn't tombstone (see registry.terminate doc).
        let (_session, is_new) = reg.get_or_create(id.as_str(), SessionKind::Mcp).unwrap();
        assert!(is_new);
    }
}

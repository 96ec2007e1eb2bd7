use crate::collaborators::{DirectoryResolver, ProcessExecutor};
use crate::config::Config;
use crate::error::AppError;
use crate::router::{Dispatch, HostPlatform};
use crate::session::{DispatchOutcome, PendingDispatch, Session, SessionId, SessionSnapshot};
use crate::utils::command_log::CommandLogger;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub type SessionHandle = Arc<Mutex<Session>>;

// The guard is never held across an await, so a poisoned lock only means a
// panic elsewhere mid-update; the state is still usable.
fn lock_session(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs accepted dispatches against the collaborators.
pub struct Dispatcher {
    executor: Arc<dyn ProcessExecutor>,
    resolver: Arc<dyn DirectoryResolver>,
    platform: HostPlatform,
    clear_delay: Duration,
    command_log: Option<Arc<CommandLogger>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("platform", &self.platform)
            .field("clear_delay", &self.clear_delay)
            .field("command_log", &self.command_log)
            .finish()
    }
}

impl Dispatcher {
    pub fn platform(&self) -> HostPlatform {
        self.platform
    }

    /// Awaits the collaborator for `pending` with the session unlocked, then
    /// applies the outcome. The session's busy flag keeps it serialized.
    #[instrument(skip(self, handle, pending), fields(session_id = %pending.session_id))]
    pub async fn drive(&self, handle: &SessionHandle, pending: PendingDispatch) {
        if let Some(logger) = &self.command_log {
            logger
                .log_command(pending.session_id, &pending.working_dir, &pending.input)
                .await;
        }

        let outcome = match pending.dispatch {
            Dispatch::Clear => {
                tokio::time::sleep(self.clear_delay).await;
                DispatchOutcome::Cleared
            }
            Dispatch::ChangeDirectory { path } => {
                let result = self.resolver.change_directory(&path, &pending.working_dir).await;
                if let Err(e) = &result {
                    debug!(path = %path, error = %e, "Directory change failed");
                }
                DispatchOutcome::DirectoryChanged(result)
            }
            Dispatch::Execute(invocation) => {
                debug!(program = %invocation.program, args = ?invocation.args, "Executing");
                let result = self
                    .executor
                    .execute(&invocation.program, &invocation.args, &pending.working_dir)
                    .await;
                if let Err(e) = &result {
                    warn!(program = %invocation.program, error = %e, "Command execution failed");
                }
                DispatchOutcome::Executed(result)
            }
        };

        lock_session(handle).complete(outcome);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// The session is the only one left; closing it means closing the whole window.
    LastSession,
    NotFound,
}

#[derive(Debug, Clone)]
pub enum ActiveSession {
    Loading,
    Ready(SessionSnapshot),
}

/// Owns every tab and the active pointer. Mutated only from the UI loop;
/// in-flight dispatches hold their own handle to the session they serve.
pub struct SessionRegistry {
    sessions: Vec<(SessionId, SessionHandle)>,
    active: Option<SessionId>,
    dispatcher: Arc<Dispatcher>,
    resolver: Arc<dyn DirectoryResolver>,
    placeholder_directory: String,
    resolutions: HashMap<SessionId, JoinHandle<()>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("active", &self.active)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl SessionRegistry {
    pub fn new(
        config: &Config,
        executor: Arc<dyn ProcessExecutor>,
        resolver: Arc<dyn DirectoryResolver>,
    ) -> Self {
        let dispatcher = Dispatcher {
            executor,
            resolver: resolver.clone(),
            platform: config.platform,
            clear_delay: config.clear_delay,
            command_log: CommandLogger::from_config(config).map(Arc::new),
        };
        Self {
            sessions: Vec::new(),
            active: None,
            dispatcher: Arc::new(dispatcher),
            resolver,
            placeholder_directory: config.placeholder_directory(),
            resolutions: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn platform(&self) -> HostPlatform {
        self.dispatcher.platform()
    }

    pub fn active_id(&self) -> Option<SessionId> {
        self.active
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|(id, _)| *id).collect()
    }

    pub fn handle(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions
            .iter()
            .find(|(sid, _)| *sid == id)
            .map(|(_, handle)| handle.clone())
    }

    fn require(&self, id: SessionId) -> Result<SessionHandle, AppError> {
        self.handle(id)
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))
    }

    /// Opens a new tab and makes it active. Its directory starts as the
    /// placeholder and is replaced once the background lookup finishes; a
    /// failed lookup is logged and the placeholder stays.
    pub fn create(&mut self) -> SessionId {
        let session = Session::new(self.placeholder_directory.clone());
        let id = session.id();
        let handle: SessionHandle = Arc::new(Mutex::new(session));
        self.sessions.push((id, handle.clone()));
        self.active = Some(id);
        info!(session_id = %id, total = self.sessions.len(), "Session created");

        let resolver = self.resolver.clone();
        let task = tokio::spawn(async move {
            match resolver.current_directory().await {
                Ok(path) => {
                    if lock_session(&handle).apply_initial_directory(path.clone()) {
                        debug!(session_id = %id, path = %path, "Initial directory resolved");
                    }
                }
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Failed to resolve initial directory; keeping placeholder");
                }
            }
        });
        self.resolutions.insert(id, task);
        id
    }

    /// Creates the first session if the registry is still empty.
    pub fn bootstrap(&mut self) -> SessionId {
        match self.active {
            Some(id) => id,
            None => self.create(),
        }
    }

    /// Waits for the initial directory lookup of `id`, if one is still pending.
    pub async fn settle_directory(&mut self, id: SessionId) {
        if let Some(task) = self.resolutions.remove(&id) {
            if let Err(e) = task.await {
                warn!(session_id = %id, error = %e, "Directory resolution task failed");
            }
        }
    }

    pub fn close(&mut self, id: SessionId) -> CloseOutcome {
        let Some(index) = self.sessions.iter().position(|(sid, _)| *sid == id) else {
            return CloseOutcome::NotFound;
        };
        if self.sessions.len() == 1 {
            debug!(session_id = %id, "Refusing to close the last session");
            return CloseOutcome::LastSession;
        }

        self.sessions.remove(index);
        if let Some(task) = self.resolutions.remove(&id) {
            task.abort();
        }

        if self.active == Some(id) {
            // Move left, or to the new first tab when the first one closed.
            let next_index = index.saturating_sub(1);
            self.active = self.sessions.get(next_index).map(|(sid, _)| *sid);
        }
        info!(session_id = %id, active = ?self.active, remaining = self.sessions.len(), "Session closed");
        CloseOutcome::Closed
    }

    pub fn set_active(&mut self, id: SessionId) -> bool {
        if self.handle(id).is_some() {
            self.active = Some(id);
            true
        } else {
            debug!(session_id = %id, "Ignoring switch to unknown session");
            false
        }
    }

    pub fn active_session(&self) -> ActiveSession {
        match self.active.and_then(|id| self.handle(id)) {
            Some(handle) => ActiveSession::Ready(lock_session(&handle).snapshot()),
            None => ActiveSession::Loading,
        }
    }

    pub fn snapshot(&self, id: SessionId) -> Option<SessionSnapshot> {
        self.handle(id).map(|handle| lock_session(&handle).snapshot())
    }

    /// All sessions in creation order.
    pub fn sessions(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .iter()
            .map(|(_, handle)| lock_session(handle).snapshot())
            .collect()
    }

    pub fn set_pending_input(&self, id: SessionId, text: &str) -> Result<(), AppError> {
        lock_session(&self.require(id)?).set_pending_input(text);
        Ok(())
    }

    pub fn history_up(&self, id: SessionId) -> Result<(), AppError> {
        lock_session(&self.require(id)?).history_up();
        Ok(())
    }

    pub fn history_down(&self, id: SessionId) -> Result<(), AppError> {
        lock_session(&self.require(id)?).history_down();
        Ok(())
    }

    fn begin(&self, id: SessionId, raw: Option<&str>) -> Result<Option<(SessionHandle, PendingDispatch)>, AppError> {
        let handle = self.require(id)?;
        let pending = {
            let mut session = lock_session(&handle);
            match raw {
                Some(raw) => session.submit(raw, self.dispatcher.platform()),
                None => session.submit_pending(self.dispatcher.platform()),
            }
        };
        Ok(pending.map(|pending| (handle, pending)))
    }

    /// Submits `raw` to session `id` and waits for the dispatch to finish.
    /// Returns `Ok(false)` when the session rejected the line (busy or blank).
    pub async fn submit(&self, id: SessionId, raw: &str) -> Result<bool, AppError> {
        match self.begin(id, Some(raw))? {
            Some((handle, pending)) => {
                self.dispatcher.drive(&handle, pending).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Like [`submit`](Self::submit) but runs the dispatch on its own task. The
    /// session is marked busy before this returns. `None` means rejected.
    pub fn spawn_submit(&self, id: SessionId, raw: &str) -> Result<Option<JoinHandle<()>>, AppError> {
        Ok(self.begin(id, Some(raw))?.map(|(handle, pending)| self.spawn_drive(handle, pending)))
    }

    /// Submits whatever the session is currently composing.
    pub fn spawn_submit_pending(&self, id: SessionId) -> Result<Option<JoinHandle<()>>, AppError> {
        Ok(self.begin(id, None)?.map(|(handle, pending)| self.spawn_drive(handle, pending)))
    }

    fn spawn_drive(&self, handle: SessionHandle, pending: PendingDispatch) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move { dispatcher.drive(&handle, pending).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::DirectoryChange;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingExecutor {
        calls: StdMutex<Vec<(String, Vec<String>, String)>>,
    }

    #[async_trait]
    impl ProcessExecutor for RecordingExecutor {
        async fn execute(&self, program: &str, args: &[String], working_dir: &str) -> Result<String, AppError> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec(), working_dir.to_string()));
            Ok(format!("ran {}", args.join(" ")))
        }
    }

    struct FixedResolver {
        cwd: Result<String, ()>,
    }

    #[async_trait]
    impl DirectoryResolver for FixedResolver {
        async fn current_directory(&self) -> Result<String, AppError> {
            self.cwd
                .clone()
                .map_err(|_| AppError::DirectoryResolution("no cwd".to_string()))
        }

        async fn change_directory(&self, requested: &str, context_cwd: &str) -> Result<DirectoryChange, AppError> {
            Ok(DirectoryChange {
                path: format!("{}/{}", context_cwd.trim_end_matches('/'), requested),
                message: None,
            })
        }
    }

    fn unix_config() -> Config {
        Config {
            platform: HostPlatform::Unix,
            clear_delay: Duration::from_millis(1),
            ..Config::default()
        }
    }

    fn registry_with(cwd: Result<String, ()>) -> (SessionRegistry, Arc<RecordingExecutor>) {
        let executor = Arc::new(RecordingExecutor::default());
        let registry = SessionRegistry::new(
            &unix_config(),
            executor.clone(),
            Arc::new(FixedResolver { cwd }),
        );
        (registry, executor)
    }

    #[tokio::test]
    async fn empty_registry_reports_loading() {
        let (registry, _) = registry_with(Ok("/work".to_string()));
        assert!(matches!(registry.active_session(), ActiveSession::Loading));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn create_makes_the_new_session_active_and_resolves_its_directory() {
        let (mut registry, _) = registry_with(Ok("/work".to_string()));
        let first = registry.bootstrap();
        let second = registry.create();
        assert_ne!(first, second);
        assert_eq!(registry.active_id(), Some(second));
        assert_eq!(registry.bootstrap(), second);

        registry.settle_directory(second).await;
        let snapshot = registry.snapshot(second).unwrap();
        assert_eq!(snapshot.current_directory, "/work");
        assert!(snapshot.output_log.is_empty());
        assert_eq!(snapshot.history_index, -1);
    }

    #[tokio::test]
    async fn failed_resolution_keeps_the_placeholder() {
        let (mut registry, _) = registry_with(Err(()));
        let id = registry.bootstrap();
        registry.settle_directory(id).await;

        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.current_directory, "/home");
        assert!(snapshot.output_log.is_empty());
    }

    #[tokio::test]
    async fn closing_the_only_session_is_refused() {
        let (mut registry, _) = registry_with(Ok("/".to_string()));
        let id = registry.bootstrap();
        assert_eq!(registry.close(id), CloseOutcome::LastSession);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.active_id(), Some(id));
    }

    #[tokio::test]
    async fn closing_the_active_session_moves_left_or_to_the_next_first() {
        let (mut registry, _) = registry_with(Ok("/".to_string()));
        let a = registry.create();
        let b = registry.create();
        let c = registry.create();

        assert_eq!(registry.close(c), CloseOutcome::Closed);
        assert_eq!(registry.active_id(), Some(b));

        registry.set_active(a);
        assert_eq!(registry.close(a), CloseOutcome::Closed);
        assert_eq!(registry.active_id(), Some(b));
        assert_eq!(registry.ids(), vec![b]);
    }

    #[tokio::test]
    async fn closing_an_inactive_session_keeps_the_active_one() {
        let (mut registry, _) = registry_with(Ok("/".to_string()));
        let a = registry.create();
        let b = registry.create();
        registry.set_active(a);

        assert_eq!(registry.close(b), CloseOutcome::Closed);
        assert_eq!(registry.active_id(), Some(a));
        assert_eq!(registry.close(b), CloseOutcome::NotFound);
    }

    #[tokio::test]
    async fn set_active_ignores_unknown_ids() {
        let (mut registry, _) = registry_with(Ok("/".to_string()));
        let id = registry.bootstrap();
        assert!(!registry.set_active(uuid::Uuid::new_v4()));
        assert_eq!(registry.active_id(), Some(id));
    }

    #[tokio::test]
    async fn submit_runs_in_the_session_directory() {
        let (mut registry, executor) = registry_with(Ok("/work".to_string()));
        let id = registry.bootstrap();
        registry.settle_directory(id).await;

        assert!(registry.submit(id, "ls -la | grep foo").await.unwrap());

        let calls = executor.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![("bash".to_string(), vec!["ls -la | grep foo".to_string()], "/work".to_string())]
        );
        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.output_log, vec!["/work> ls -la | grep foo", "ran ls -la | grep foo"]);
        assert!(!snapshot.is_busy);
    }

    #[tokio::test]
    async fn cd_then_command_uses_the_new_directory() {
        let (mut registry, executor) = registry_with(Ok("/work".to_string()));
        let id = registry.bootstrap();
        registry.settle_directory(id).await;

        registry.submit(id, "cd src").await.unwrap();
        registry.submit(id, "pwd").await.unwrap();

        assert_eq!(registry.snapshot(id).unwrap().current_directory, "/work/src");
        assert_eq!(executor.calls.lock().unwrap()[0].2, "/work/src");
    }

    #[tokio::test]
    async fn clear_never_reaches_the_executor() {
        let (mut registry, executor) = registry_with(Ok("/".to_string()));
        let id = registry.bootstrap();
        registry.submit(id, "echo hi").await.unwrap();
        registry.submit(id, "Clear").await.unwrap();

        assert_eq!(executor.calls.lock().unwrap().len(), 1);
        assert!(registry.snapshot(id).unwrap().output_log.is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_an_error() {
        let (registry, _) = registry_with(Ok("/".to_string()));
        let missing = uuid::Uuid::new_v4();
        assert!(matches!(
            registry.submit(missing, "ls").await,
            Err(AppError::SessionNotFound(_))
        ));
        assert!(registry.history_up(missing).is_err());
    }

    #[tokio::test]
    async fn pending_input_submission_and_history_recall() {
        let (mut registry, _) = registry_with(Ok("/".to_string()));
        let id = registry.bootstrap();
        registry.set_pending_input(id, "ls").unwrap();
        registry.spawn_submit_pending(id).unwrap().unwrap().await.unwrap();
        registry.set_pending_input(id, "pwd").unwrap();
        registry.spawn_submit_pending(id).unwrap().unwrap().await.unwrap();

        registry.history_up(id).unwrap();
        registry.history_up(id).unwrap();
        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!((snapshot.history_index, snapshot.pending_input.as_str()), (0, "ls"));

        registry.history_down(id).unwrap();
        registry.history_down(id).unwrap();
        assert_eq!(registry.snapshot(id).unwrap().pending_input, "");
    }

    #[tokio::test]
    async fn dispatches_are_written_to_the_command_log_before_completing() {
        let temp = tempfile::tempdir().unwrap();
        let log_path = temp.path().join("commands.log");
        let config = Config {
            command_log_file: Some(log_path.clone()),
            ..unix_config()
        };
        let mut registry = SessionRegistry::new(
            &config,
            Arc::new(RecordingExecutor::default()),
            Arc::new(FixedResolver { cwd: Ok("/work".to_string()) }),
        );
        let first = registry.bootstrap();
        registry.settle_directory(first).await;
        let second = registry.create();
        registry.settle_directory(second).await;

        registry.submit(first, "make build").await.unwrap();
        registry.submit(second, "cd src").await.unwrap();
        registry.submit(first, "clear").await.unwrap();

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let inputs: Vec<&str> = contents
            .lines()
            .filter_map(|line| line.rsplit(" | ").next())
            .collect();
        assert_eq!(inputs, vec!["\"make build\"", "\"cd src\"", "\"clear\""]);
        assert!(contents.lines().nth(1).unwrap().contains(&second.to_string()));
    }
}

//! Serialized engine worker.
//!
//! # Responsibility
//! - Own the database connection and the list engine on one thread.
//! - Run view intents strictly one at a time, in submission order.
//!
//! # Invariants
//! - Commands are processed FIFO; a command runs to completion once dequeued.
//! - An operation error is returned to its caller and never stops the worker.
//! - Dropping the handle stops the worker after already queued commands.

use crate::config::{ConfigError, EngineConfig};
use crate::db::{open_db, DbError};
use crate::logging::{init_logging, LoggingError};
use crate::model::item::{CommittedId, ItemId, ItemRecord};
use crate::repo::order_repo::SqliteOrderRepository;
use crate::repo::record_repo::SqliteRecordRepository;
use crate::service::list_engine::{
    ConsistencyReport, EditOutcome, EngineError, EngineResult, ListEngine, ListSnapshot,
    MissingEditPolicy,
};
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

const WORKER_THREAD_NAME: &str = "orderly-engine";

type Reply<T> = SyncSender<EngineResult<T>>;

/// Startup failures raised on the worker thread.
enum StartFailure {
    Db(DbError),
    Engine(EngineError),
}

impl From<StartFailure> for WorkerStartError {
    fn from(value: StartFailure) -> Self {
        match value {
            StartFailure::Db(err) => Self::Db(err),
            StartFailure::Engine(err) => Self::Engine(err),
        }
    }
}

enum Command {
    Load(Reply<ListSnapshot>),
    Create {
        text: String,
        reply: Reply<ItemRecord>,
    },
    Edit {
        id: ItemId,
        text: String,
        reply: Reply<EditOutcome>,
    },
    Delete {
        id: ItemId,
        visual_order: Vec<CommittedId>,
        reply: Reply<()>,
    },
    Reorder {
        visual_order: Vec<CommittedId>,
        reply: Reply<()>,
    },
    ClearAll(Reply<()>),
    CheckConsistency(Reply<ConsistencyReport>),
    Repair(Reply<ConsistencyReport>),
    Shutdown,
}

/// Errors preventing the worker from starting.
#[derive(Debug)]
pub enum WorkerStartError {
    Config(ConfigError),
    Logging(LoggingError),
    Db(DbError),
    Engine(EngineError),
    Spawn(std::io::Error),
    /// Worker thread ended before reporting readiness.
    WorkerExited,
}

impl Display for WorkerStartError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Engine(err) => write!(f, "{err}"),
            Self::Spawn(err) => write!(f, "failed to spawn engine worker: {err}"),
            Self::WorkerExited => write!(f, "engine worker exited during startup"),
        }
    }
}

impl Error for WorkerStartError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Engine(err) => Some(err),
            Self::Spawn(err) => Some(err),
            Self::WorkerExited => None,
        }
    }
}

impl From<ConfigError> for WorkerStartError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for WorkerStartError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for WorkerStartError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<EngineError> for WorkerStartError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

/// Reply to a submitted command, received once the worker ran it.
#[must_use = "dropping a pending reply discards the operation result"]
pub struct PendingReply<T> {
    rx: mpsc::Receiver<EngineResult<T>>,
}

impl<T> PendingReply<T> {
    /// Blocks until the worker has run the command.
    pub fn wait(self) -> EngineResult<T> {
        self.rx
            .recv()
            .unwrap_or(Err(EngineError::WorkerUnavailable))
    }
}

/// Handle to a running engine worker.
///
/// `submit_*` methods enqueue and return immediately; the plain methods
/// enqueue and wait. Either way the worker runs commands in the order they
/// were enqueued, so the last submitted order write is the one that sticks.
pub struct EngineHandle {
    commands: SyncSender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Validates `config`, starts logging if configured, opens the database
    /// on a new worker thread and waits until the engine is ready.
    pub fn spawn(config: &EngineConfig) -> Result<Self, WorkerStartError> {
        config.validate()?;
        if let Some(log_dir) = &config.log_dir {
            init_logging(&config.log_level, log_dir)?;
        }

        let (commands, inbox) = mpsc::sync_channel(config.queue_capacity);
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let db_path = config.db_path.clone();
        let policy = config.missing_edit_policy;

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(db_path, policy, inbox, ready_tx))
            .map_err(WorkerStartError::Spawn)?;

        let ready = ready_rx
            .recv()
            .map_err(|_| WorkerStartError::WorkerExited)
            .and_then(|started| started.map_err(WorkerStartError::from));
        match ready {
            Ok(()) => Ok(Self {
                commands,
                worker: Some(worker),
            }),
            Err(err) => {
                let _ = worker.join();
                Err(err)
            }
        }
    }

    pub fn submit_load(&self) -> EngineResult<PendingReply<ListSnapshot>> {
        self.submit(Command::Load)
    }

    pub fn submit_create_item(
        &self,
        text: impl Into<String>,
    ) -> EngineResult<PendingReply<ItemRecord>> {
        let text = text.into();
        self.submit(|reply| Command::Create { text, reply })
    }

    pub fn submit_edit_item(
        &self,
        id: ItemId,
        text: impl Into<String>,
    ) -> EngineResult<PendingReply<EditOutcome>> {
        let text = text.into();
        self.submit(|reply| Command::Edit { id, text, reply })
    }

    pub fn submit_delete_item(
        &self,
        id: ItemId,
        visual_order: Vec<CommittedId>,
    ) -> EngineResult<PendingReply<()>> {
        self.submit(|reply| Command::Delete {
            id,
            visual_order,
            reply,
        })
    }

    pub fn submit_reorder(&self, visual_order: Vec<CommittedId>) -> EngineResult<PendingReply<()>> {
        self.submit(|reply| Command::Reorder {
            visual_order,
            reply,
        })
    }

    pub fn submit_clear_all(&self) -> EngineResult<PendingReply<()>> {
        self.submit(Command::ClearAll)
    }

    pub fn load(&self) -> EngineResult<ListSnapshot> {
        self.submit_load()?.wait()
    }

    pub fn create_item(&self, text: impl Into<String>) -> EngineResult<ItemRecord> {
        self.submit_create_item(text)?.wait()
    }

    pub fn edit_item(&self, id: ItemId, text: impl Into<String>) -> EngineResult<EditOutcome> {
        self.submit_edit_item(id, text)?.wait()
    }

    pub fn delete_item(&self, id: ItemId, visual_order: Vec<CommittedId>) -> EngineResult<()> {
        self.submit_delete_item(id, visual_order)?.wait()
    }

    pub fn reorder(&self, visual_order: Vec<CommittedId>) -> EngineResult<()> {
        self.submit_reorder(visual_order)?.wait()
    }

    pub fn clear_all(&self) -> EngineResult<()> {
        self.submit_clear_all()?.wait()
    }

    pub fn check_consistency(&self) -> EngineResult<ConsistencyReport> {
        self.submit(Command::CheckConsistency)?.wait()
    }

    pub fn repair(&self) -> EngineResult<ConsistencyReport> {
        self.submit(Command::Repair)?.wait()
    }

    /// Stops the worker after it drains already queued commands.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn submit<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> EngineResult<PendingReply<T>> {
        let (reply, rx) = mpsc::sync_channel(1);
        self.commands
            .send(build(reply))
            .map_err(|_| EngineError::WorkerUnavailable)?;
        Ok(PendingReply { rx })
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // A send error means the worker already exited; join still reaps it.
        let _ = self.commands.send(Command::Shutdown);
        if worker.join().is_err() {
            error!("event=worker_stop module=worker status=error error_code=worker_panicked");
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

type SqliteListEngine<'conn> =
    ListEngine<SqliteRecordRepository<'conn>, SqliteOrderRepository<'conn>>;

fn run_worker(
    db_path: PathBuf,
    policy: MissingEditPolicy,
    inbox: Receiver<Command>,
    ready: SyncSender<Result<(), StartFailure>>,
) {
    let conn = match open_db(&db_path) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready.send(Err(StartFailure::Db(err)));
            return;
        }
    };
    let mut engine = match build_engine(&conn, policy) {
        Ok(engine) => engine,
        Err(err) => {
            let _ = ready.send(Err(StartFailure::Engine(err)));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    info!(
        "event=worker_start module=worker status=ok db_path={}",
        db_path.display()
    );
    let mut processed: u64 = 0;
    while let Ok(command) = inbox.recv() {
        if !dispatch(&mut engine, command) {
            break;
        }
        processed += 1;
    }
    info!("event=worker_stop module=worker status=ok processed={processed}");
}

fn build_engine(
    conn: &Connection,
    policy: MissingEditPolicy,
) -> EngineResult<SqliteListEngine<'_>> {
    let records = SqliteRecordRepository::try_new(conn)?;
    let orders = SqliteOrderRepository::try_new(conn)?;
    Ok(ListEngine::new(records, orders)?.with_missing_edit_policy(policy))
}

/// Runs one command. Returns `false` when the worker should stop.
///
/// Reply send errors are ignored: the caller dropped its `PendingReply`.
fn dispatch(engine: &mut SqliteListEngine<'_>, command: Command) -> bool {
    match command {
        Command::Load(reply) => {
            let _ = reply.send(engine.load());
        }
        Command::Create { text, reply } => {
            let _ = reply.send(engine.create_item(&text));
        }
        Command::Edit { id, text, reply } => {
            let _ = reply.send(engine.edit_item(id, &text));
        }
        Command::Delete {
            id,
            visual_order,
            reply,
        } => {
            let _ = reply.send(engine.delete_item(id, &visual_order));
        }
        Command::Reorder {
            visual_order,
            reply,
        } => {
            let _ = reply.send(engine.reorder(&visual_order));
        }
        Command::ClearAll(reply) => {
            let _ = reply.send(engine.clear_all());
        }
        Command::CheckConsistency(reply) => {
            let _ = reply.send(engine.check_consistency());
        }
        Command::Repair(reply) => {
            let _ = reply.send(engine.repair());
        }
        Command::Shutdown => return false,
    }
    true
}

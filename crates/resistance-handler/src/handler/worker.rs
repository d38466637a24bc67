use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use resistance_bot::Agent;
use tracing::{Level, event};

use super::{Backend, Call, InvokeError, Reply};

/// Builds a fresh strategy when a stalled worker has to be abandoned.
pub type AgentFactory = Box<dyn Fn() -> Box<dyn Agent> + Send>;

type JobResult = Result<Reply, InvokeError>;

struct Job {
    call: Call,
    deadline: Instant,
    reply: SyncSender<JobResult>,
}

/// A thread that owns one strategy and runs its calls in order.
struct Worker {
    jobs: Option<Sender<Job>>,
    busy: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(name: &str, agent: Box<dyn Agent>) -> Self {
        let (jobs, queue) = mpsc::channel();
        let busy = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&busy);
        let label = name.to_string();
        let handle = thread::Builder::new()
            .name(format!("agent-{name}"))
            .spawn(move || run_jobs(label, agent, queue, flag));

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                // Without a thread every call reports Disconnected.
                event!(
                    target: "resistance_handler::worker",
                    Level::ERROR,
                    agent = %name,
                    error = %err,
                    "failed to spawn strategy worker"
                );
                None
            }
        };

        Self {
            jobs: handle.as_ref().map(|_| jobs),
            busy,
            handle,
        }
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Detaches the thread; it exits once its current call returns.
    fn abandon(mut self) {
        self.jobs.take();
        self.handle.take();
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take()
            && !self.busy.load(Ordering::SeqCst)
        {
            let _ = handle.join();
        }
    }
}

fn run_jobs(name: String, mut agent: Box<dyn Agent>, queue: Receiver<Job>, busy: Arc<AtomicBool>) {
    while let Ok(job) = queue.recv() {
        let operation = job.call.operation();
        if Instant::now() >= job.deadline {
            event!(
                target: "resistance_handler::worker",
                Level::DEBUG,
                agent = %name,
                operation,
                "skipping call whose deadline already passed"
            );
            continue;
        }

        busy.store(true, Ordering::SeqCst);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.call.apply(agent.as_mut())));
        busy.store(false, Ordering::SeqCst);

        let result = outcome.map_err(|payload| InvokeError::Panicked {
            operation,
            message: panic_message(payload.as_ref()),
        });
        // The caller may have given up already.
        let _ = job.reply.send(result);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs an in-process strategy on its own thread so a call can be abandoned
/// at its deadline whatever the strategy is doing.
pub struct WorkerBackend {
    name: String,
    factory: Option<AgentFactory>,
    worker: Worker,
}

impl WorkerBackend {
    /// Keeps the same strategy for the handler's whole life.
    pub fn new(agent: Box<dyn Agent>) -> Self {
        let name = agent.name().to_string();
        let worker = Worker::spawn(&name, agent);
        Self {
            name,
            factory: None,
            worker,
        }
    }

    /// Builds the strategy from `factory`, and builds it again whenever a
    /// stalled worker has to be replaced at a game boundary.
    pub fn with_factory(factory: AgentFactory) -> Self {
        let agent = factory();
        let mut backend = Self::new(agent);
        backend.factory = Some(factory);
        backend
    }
}

impl Backend for WorkerBackend {
    fn label(&self) -> &str {
        &self.name
    }

    fn call(&mut self, call: &Call, deadline: Duration) -> Result<Reply, InvokeError> {
        let operation = call.operation();
        let Some(jobs) = self.worker.jobs.as_ref() else {
            return Err(InvokeError::Disconnected { operation });
        };

        let (reply, response) = mpsc::sync_channel(1);
        let job = Job {
            call: call.clone(),
            deadline: Instant::now() + deadline,
            reply,
        };
        jobs.send(job)
            .map_err(|_| InvokeError::Disconnected { operation })?;

        match response.recv_timeout(deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(InvokeError::TimedOut {
                operation,
                deadline_ms: deadline.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(InvokeError::Disconnected { operation }),
        }
    }

    fn before_new_game(&mut self) {
        if !self.worker.is_busy() {
            return;
        }
        let Some(factory) = self.factory.as_ref() else {
            event!(
                target: "resistance_handler::worker",
                Level::WARN,
                agent = %self.name,
                "worker still busy at new game and no factory to replace it"
            );
            return;
        };

        event!(
            target: "resistance_handler::worker",
            Level::WARN,
            agent = %self.name,
            "abandoning stalled worker and starting a fresh strategy"
        );
        let fresh = Worker::spawn(&self.name, factory());
        std::mem::replace(&mut self.worker, fresh).abandon();
    }
}

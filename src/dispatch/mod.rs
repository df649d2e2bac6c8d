//! Sentence-by-sentence speech delivery
//!
//! Generated text arrives as an ordered stream of fragments per device. The
//! dispatcher cuts it into sentences, synthesizes each one and publishes the
//! audio as numbered chunks. Sentences for one device are always spoken in
//! order by a single worker; different devices run independently.
//!
//! The device -> worker map is owned by one actor task. Callers talk to it
//! through a bounded command queue, and a worker is only retired once the
//! actor has confirmed nothing was queued behind its last end marker.

mod outbound;
mod sentence;

pub use outbound::AudioPublisher;
pub use sentence::{SentenceSplitter, SENTENCE_TERMINATORS};

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::speech::Synthesizer;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("sentence dispatcher has shut down")]
    Closed,
}

enum Command {
    Text { device_id: String, text: String },
    End { device_id: String },
    WorkerIdle { device_id: String, generation: u64 },
    ActiveWorkers(oneshot::Sender<usize>),
}

enum WorkerItem {
    Text(String),
    End,
}

struct WorkerHandle {
    tx: mpsc::UnboundedSender<WorkerItem>,
    generation: u64,
    /// End markers forwarded but not yet confirmed by the worker
    pending_ends: u32,
    /// Text forwarded after the most recent end marker
    dirty: bool,
}

/// Handle to the dispatcher actor
#[derive(Clone)]
pub struct SentenceDispatcher {
    tx: mpsc::Sender<Command>,
}

impl SentenceDispatcher {
    /// Start the dispatcher actor
    pub fn spawn(
        synthesizer: Arc<dyn Synthesizer>,
        publisher: AudioPublisher,
        queue_capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let actor = Actor {
            commands: tx.downgrade(),
            synthesizer,
            publisher,
            workers: HashMap::new(),
            next_generation: 0,
        };

        let handle = tokio::spawn(actor.run(rx));

        (Self { tx }, handle)
    }

    /// Queue a text fragment for `device_id`, starting its worker if needed
    pub async fn push(&self, device_id: &str, text: impl Into<String>) -> Result<(), DispatchError> {
        self.send(Command::Text {
            device_id: device_id.to_string(),
            text: text.into(),
        })
        .await
    }

    /// Mark the end of the current text stream for `device_id`
    pub async fn end(&self, device_id: &str) -> Result<(), DispatchError> {
        self.send(Command::End {
            device_id: device_id.to_string(),
        })
        .await
    }

    /// Speak a complete utterance
    pub async fn say(&self, device_id: &str, text: impl Into<String>) -> Result<(), DispatchError> {
        self.push(device_id, text).await?;
        self.end(device_id).await
    }

    /// Number of devices with a live worker
    pub async fn active_workers(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::ActiveWorkers(tx)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    async fn send(&self, command: Command) -> Result<(), DispatchError> {
        self.tx.send(command).await.map_err(|_| DispatchError::Closed)
    }
}

struct Actor {
    commands: mpsc::WeakSender<Command>,
    synthesizer: Arc<dyn Synthesizer>,
    publisher: AudioPublisher,
    workers: HashMap<String, WorkerHandle>,
    next_generation: u64,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        info!("Sentence dispatcher started");

        while let Some(command) = rx.recv().await {
            match command {
                Command::Text { device_id, text } => {
                    let worker = self.worker_for(&device_id);
                    worker.dirty = true;
                    if worker.tx.send(WorkerItem::Text(text)).is_err() {
                        error!("Sentence worker for {} is gone, dropping text", device_id);
                        self.workers.remove(&device_id);
                    }
                }
                Command::End { device_id } => match self.workers.get_mut(&device_id) {
                    Some(worker) => {
                        worker.pending_ends += 1;
                        worker.dirty = false;
                        if worker.tx.send(WorkerItem::End).is_err() {
                            self.workers.remove(&device_id);
                        }
                    }
                    None => debug!("End of stream for {} with no active worker", device_id),
                },
                Command::WorkerIdle {
                    device_id,
                    generation,
                } => {
                    let retire = match self.workers.get_mut(&device_id) {
                        Some(worker) if worker.generation == generation => {
                            worker.pending_ends = worker.pending_ends.saturating_sub(1);
                            worker.pending_ends == 0 && !worker.dirty
                        }
                        _ => false,
                    };

                    if retire {
                        // Dropping the sender lets the worker drain and exit
                        self.workers.remove(&device_id);
                        debug!("Released sentence worker for {}", device_id);
                    }
                }
                Command::ActiveWorkers(reply) => {
                    let _ = reply.send(self.workers.len());
                }
            }
        }

        info!("Sentence dispatcher stopped");
    }

    fn worker_for(&mut self, device_id: &str) -> &mut WorkerHandle {
        self.workers
            .entry(device_id.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                let generation = self.next_generation;
                self.next_generation += 1;

                let worker = Worker {
                    device_id: device_id.to_string(),
                    generation,
                    synthesizer: Arc::clone(&self.synthesizer),
                    publisher: self.publisher.clone(),
                    commands: self.commands.clone(),
                };
                tokio::spawn(worker.run(rx));
                debug!("Started sentence worker for {}", device_id);

                WorkerHandle {
                    tx,
                    generation,
                    pending_ends: 0,
                    dirty: false,
                }
            })
    }
}

struct Worker {
    device_id: String,
    generation: u64,
    synthesizer: Arc<dyn Synthesizer>,
    publisher: AudioPublisher,
    commands: mpsc::WeakSender<Command>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<WorkerItem>) {
        let mut splitter = SentenceSplitter::new();

        while let Some(item) = rx.recv().await {
            match item {
                WorkerItem::Text(fragment) => {
                    for sentence in splitter.push(&fragment) {
                        self.speak(&sentence).await;
                    }
                }
                WorkerItem::End => {
                    if let Some(residual) = splitter.finish() {
                        self.speak(&residual).await;
                    }
                    self.report_idle().await;
                }
            }
        }

        debug!("Sentence worker for {} finished", self.device_id);
    }

    async fn speak(&self, sentence: &str) {
        let audio = match self.synthesizer.synthesize(sentence).await {
            Ok(audio) => audio,
            Err(e) => {
                error!("TTS error for {}: {}", self.device_id, e);
                return;
            }
        };

        if let Err(e) = self.publisher.send(&self.device_id, &audio).await {
            error!("Failed to send audio to {}: {}", self.device_id, e);
        }
    }

    async fn report_idle(&self) {
        let Some(commands) = self.commands.upgrade() else {
            return;
        };

        let _ = commands
            .send(Command::WorkerIdle {
                device_id: self.device_id.clone(),
                generation: self.generation,
            })
            .await;
    }
}

//! Single-consumer driver pairing the model with the dispatcher.
//!
//! The runtime owns the inbox. Each `step` takes one message, folds it into
//! the model and hands the resulting command to the dispatcher, so updates
//! are strictly serialized no matter how many tasks are in flight.

use std::sync::Arc;
use std::time::Duration;

use pipedeck_client::{PipelineClient, Repository};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::SyncConfig;
use crate::dispatch::Dispatcher;
use crate::message::Msg;
use crate::model::Model;

#[derive(Debug)]
pub struct SyncRuntime<C> {
    model: Model,
    dispatcher: Dispatcher<C>,
    tx: UnboundedSender<Msg>,
    rx: UnboundedReceiver<Msg>,
}

impl<C: PipelineClient + 'static> SyncRuntime<C> {
    pub fn new(client: Arc<C>, repo: Repository, cfg: &SyncConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            model: Model::new(cfg),
            dispatcher: Dispatcher::new(client, repo, cfg, tx.clone()),
            tx,
            rx,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn dispatcher(&self) -> &Dispatcher<C> {
        &self.dispatcher
    }

    /// Handle for injecting messages (user intents, external ticks).
    pub fn sender(&self) -> UnboundedSender<Msg> {
        self.tx.clone()
    }

    /// Dispatch the model's startup commands.
    pub fn start(&mut self) {
        tracing::info!(event = "sync.runtime.started");
        let cmd = self.model.init();
        self.dispatcher.dispatch(cmd);
    }

    /// Apply `msg` immediately, bypassing the inbox.
    pub fn handle(&mut self, msg: Msg) {
        tracing::trace!(event = "sync.runtime.msg", kind = msg.kind());
        let cmd = self.model.update(msg);
        self.dispatcher.dispatch(cmd);
    }

    /// Wait for one message and apply it. Returns `false` once the inbox is
    /// closed.
    pub async fn step(&mut self) -> bool {
        match self.rx.recv().await {
            Some(msg) => {
                self.handle(msg);
                true
            }
            None => false,
        }
    }

    /// Apply every message that is already queued without waiting.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.rx.try_recv() {
            self.handle(msg);
            applied += 1;
        }
        applied
    }

    /// Step until `done` holds for the model. Returns `false` on timeout.
    pub async fn run_until<P>(&mut self, mut done: P, timeout: Duration) -> bool
    where
        P: FnMut(&Model) -> bool,
    {
        let run = async {
            loop {
                if done(&self.model) {
                    return true;
                }
                if !self.step().await {
                    return false;
                }
            }
        };
        tokio::time::timeout(timeout, run).await.unwrap_or(false)
    }

    /// Stop polling and abandon in-flight work. Queued messages are dropped.
    pub fn shutdown(&mut self) {
        self.dispatcher.shutdown();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        tracing::info!(event = "sync.runtime.stopped");
    }
}

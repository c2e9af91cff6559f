//! Outbound plumbing shared by protocol plugins.
//!
//! Every protocol plugin needs the same two things: a queue that
//! `send_message` can push into without blocking, and a sender thread that
//! drains it and hands each message to the worker pool for the actual
//! transmission. [`ProtocolEndpoint`] packages both, plus a shortcut for
//! pushing received traffic into the router.

use super::PluginContext;
use super::error::{PluginError, PluginResult};
use crate::message::MetaMessage;
use crate::queue::{BlockingQueue, Closed};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

type Transmit = Arc<dyn Fn(MetaMessage) + Send + Sync>;

pub struct ProtocolEndpoint {
    scheme: String,
    context: PluginContext,
    outbound: Arc<BlockingQueue<MetaMessage>>,
    sender: Mutex<Option<JoinHandle<()>>>,
}

impl ProtocolEndpoint {
    pub fn new(scheme: impl Into<String>, context: PluginContext) -> Self {
        Self {
            scheme: scheme.into(),
            context,
            outbound: Arc::new(BlockingQueue::new()),
            sender: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// Start the sender thread. `transmit` runs on the worker pool, once per
    /// outbound message. A second call is a no-op.
    pub fn start<F>(&self, transmit: F) -> PluginResult<()>
    where
        F: Fn(MetaMessage) + Send + Sync + 'static,
    {
        let mut sender = self.sender.lock();
        if sender.is_some() {
            return Ok(());
        }

        let transmit: Transmit = Arc::new(transmit);
        let outbound = Arc::clone(&self.outbound);
        let pool = Arc::clone(&self.context.pool);
        let scheme = self.scheme.clone();

        let handle = thread::Builder::new()
            .name(format!("fifu-{}-sender", self.scheme))
            .spawn(move || {
                loop {
                    match outbound.pop() {
                        Ok(message) => {
                            trace!(scheme = %scheme, uri = %message.uri, "dispatching outbound message");
                            let transmit = Arc::clone(&transmit);
                            pool.schedule(move || transmit(message));
                        }
                        Err(Closed) => break,
                    }
                }
                debug!(scheme = %scheme, "sender loop finished");
            })
            .map_err(|e| PluginError::StartFailed(format!("{}: {e}", self.scheme)))?;

        *sender = Some(handle);
        Ok(())
    }

    /// Queue a message for transmission.
    pub fn enqueue(&self, message: MetaMessage) {
        if self.outbound.is_stopped() {
            warn!(scheme = %self.scheme, uri = %message.uri, "endpoint stopped, dropping outbound message");
            return;
        }
        self.outbound.push(message);
    }

    /// Push a received message into the router's inbound queue.
    pub fn deliver(&self, message: MetaMessage) {
        trace!(scheme = %self.scheme, uri = %message.uri, "delivering inbound message");
        self.context.inbound.push(message);
    }

    /// Messages waiting for the sender thread.
    pub fn backlog(&self) -> usize {
        self.outbound.len()
    }

    /// Stop the sender thread and wait for it. Messages still queued are
    /// discarded.
    pub fn stop(&self) {
        self.outbound.stop();
        if let Some(handle) = self.sender.lock().take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!(scheme = %self.scheme, "sender thread terminated abnormally");
            }
        }
    }
}

impl Drop for ProtocolEndpoint {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Node runtime.
//!
//! Reads messages line by line, answers `init`, hands every other request to
//! a [`Handler`] on its own task and routes replies to outbound calls back to
//! their waiters. All output goes through a single writer task so lines never
//! interleave.
//!
//! # Shutdown
//!
//! When the input ends, pending outbound calls fail immediately (no reply can
//! arrive any more), in-flight requests are awaited, and the writer drains
//! every queued line before `serve` returns.

#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{NodeError, NodeResult};
use crate::protocol::{self, Body, ErrorCode, Message, Payload, Rejection, RpcError};

/// Outbound queue depth.
const OUTBOX_CAPACITY: usize = 1024;

/// Serves requests other than `init`.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handles one request payload and returns the reply payload.
    ///
    /// # Errors
    ///
    /// Returns the failure to report to the caller.
    async fn handle(&self, payload: Payload) -> Result<Payload, RpcError>;
}

/// Cluster identity received in `init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// This node's id.
    pub node_id: String,
    /// Every node in the cluster, including this one.
    pub node_ids: Vec<String>,
}

/// Waiters for outbound calls, keyed by `msg_id`. `None` once the input has
/// closed.
type Pending = Option<HashMap<u64, oneshot::Sender<Body>>>;

#[derive(Debug)]
struct Inner {
    identity: OnceLock<Identity>,
    next_msg_id: AtomicU64,
    pending: Mutex<Pending>,
    outbox: mpsc::Sender<Message>,
}

/// Receiving end of the outbound queue, consumed by [`Node::serve`].
#[derive(Debug)]
pub struct Outbox(mpsc::Receiver<Message>);

/// Handle to a node runtime.
///
/// Clones share the same identity, message ids and outbound queue.
#[derive(Debug, Clone)]
pub struct Node {
    inner: Arc<Inner>,
}

impl Node {
    /// Creates a node and the outbox its [`serve`](Self::serve) loop drains.
    #[must_use]
    pub fn new() -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let node = Self {
            inner: Arc::new(Inner {
                identity: OnceLock::new(),
                next_msg_id: AtomicU64::new(1),
                pending: Mutex::new(Some(HashMap::new())),
                outbox: tx,
            }),
        };
        (node, Outbox(rx))
    }

    /// Returns the identity from `init`, if it has arrived.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.inner.identity.get()
    }

    /// Queues a message for output.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the writer has stopped.
    pub async fn send(&self, message: Message) -> NodeResult<()> {
        self.inner
            .outbox
            .send(message)
            .await
            .map_err(|_| NodeError::Closed)
    }

    /// Sends `payload` to `dest` and waits for the reply.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before `init`, `Timeout` if no reply arrives
    /// within `timeout`, or `Closed` if the runtime stops first.
    pub async fn rpc(&self, dest: &str, payload: Payload, timeout: Duration) -> NodeResult<Payload> {
        let src = self
            .identity()
            .ok_or(NodeError::NotInitialized)?
            .node_id
            .clone();
        let msg_id = self.next_msg_id();
        let (tx, rx) = oneshot::channel();
        let _waiter = self.register(msg_id, tx)?;

        self.send(Message {
            src,
            dest: dest.to_string(),
            body: Body {
                msg_id: Some(msg_id),
                in_reply_to: None,
                payload,
            },
        })
        .await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(body)) => Ok(body.payload),
            Ok(Err(_)) => Err(NodeError::Closed),
            Err(_) => {
                let waited_us = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);
                warn!(dest, msg_id, waited_us, "Call timed out");
                Err(NodeError::Timeout {
                    dest: dest.to_string(),
                    msg_id,
                    waited_us,
                })
            }
        }
    }

    /// Runs the node until `input` ends.
    ///
    /// # Errors
    ///
    /// Returns error if reading the input or writing the output fails.
    pub async fn serve<R, W, H>(
        &self,
        input: R,
        output: W,
        outbox: Outbox,
        handler: Arc<H>,
    ) -> NodeResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        H: Handler,
    {
        let (stop_tx, stop_rx) = oneshot::channel();
        let writer = tokio::spawn(write_loop(output, outbox.0, stop_rx));

        let mut lines = input.lines();
        let mut requests = JoinSet::new();
        let read_result = loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.dispatch(&line, &handler, &mut requests).await,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                },
                Some(joined) = requests.join_next(), if !requests.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Request task failed");
                    }
                }
            }
        };

        info!(in_flight = requests.len(), "Input closed, draining requests");
        self.close_pending();
        while let Some(joined) = requests.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Request task failed");
            }
        }

        let _ = stop_tx.send(());
        let write_result = writer.await.map_err(|e| NodeError::Io(io::Error::other(e)))?;
        read_result?;
        write_result
    }

    // -------------------------------------------------------------------------
    // Inbound
    // -------------------------------------------------------------------------

    async fn dispatch<H: Handler>(
        &self,
        line: &str,
        handler: &Arc<H>,
        requests: &mut JoinSet<()>,
    ) {
        if line.trim().is_empty() {
            return;
        }

        let Message { src, dest, body } = match protocol::decode(line) {
            Ok(message) => message,
            Err(rejection) => {
                self.reject(rejection).await;
                return;
            }
        };

        if let Some(in_reply_to) = body.in_reply_to {
            self.complete(&src, in_reply_to, body);
            return;
        }

        let msg_id = body.msg_id;
        match body.payload {
            Payload::Init { node_id, node_ids } => {
                self.init(node_id, node_ids);
                self.reply(dest, src, msg_id, Payload::InitOk).await;
            }
            payload if self.identity().is_none() => {
                debug!(src = %src, kind = payload.kind(), "Request before init");
                let error = RpcError::new(ErrorCode::TemporarilyUnavailable, "node not initialized");
                self.reply(dest, src, msg_id, error.into_payload()).await;
            }
            payload => {
                let node = self.clone();
                let handler = Arc::clone(handler);
                requests.spawn(async move {
                    let kind = payload.kind();
                    debug!(src = %src, msg_id, kind, "Handling request");
                    let reply = match handler.handle(payload).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            debug!(src = %src, msg_id, kind, error = %e, "Request failed");
                            e.into_payload()
                        }
                    };
                    node.reply(dest, src, msg_id, reply).await;
                });
            }
        }
    }

    fn init(&self, node_id: String, node_ids: Vec<String>) {
        let identity = Identity { node_id, node_ids };
        let peers = identity.node_ids.len();
        let node_id = identity.node_id.clone();
        if self.inner.identity.set(identity).is_err() {
            warn!(node_id = %node_id, "Ignoring repeated init");
        } else {
            info!(node_id = %node_id, peers, "Node initialized");
        }
    }

    async fn reject(&self, rejection: Rejection) {
        let Rejection {
            src,
            dest,
            msg_id,
            error,
        } = rejection;

        let Some(src) = src else {
            warn!(error = %error, "Dropping unreadable line");
            return;
        };
        let dest = dest
            .or_else(|| self.identity().map(|id| id.node_id.clone()))
            .unwrap_or_default();

        debug!(src = %src, msg_id, error = %error, "Rejecting message");
        self.reply(dest, src, msg_id, error.into_payload()).await;
    }

    /// Sends `payload` from `from` to `to`, answering `in_reply_to`.
    async fn reply(&self, from: String, to: String, in_reply_to: Option<u64>, payload: Payload) {
        let message = Message {
            src: from,
            dest: to,
            body: Body {
                msg_id: Some(self.next_msg_id()),
                in_reply_to,
                payload,
            },
        };
        if let Err(e) = self.send(message).await {
            warn!(error = %e, "Reply dropped");
        }
    }

    // -------------------------------------------------------------------------
    // Outbound call tracking
    // -------------------------------------------------------------------------

    fn next_msg_id(&self) -> u64 {
        self.inner.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register(&self, msg_id: u64, waiter: oneshot::Sender<Body>) -> NodeResult<PendingCall<'_>> {
        let mut pending = self.inner.pending.lock().expect("pending lock poisoned");
        let calls = pending.as_mut().ok_or(NodeError::Closed)?;
        calls.insert(msg_id, waiter);
        Ok(PendingCall {
            inner: &self.inner,
            msg_id,
        })
    }

    fn complete(&self, src: &str, in_reply_to: u64, body: Body) {
        let waiter = {
            let mut pending = self.inner.pending.lock().expect("pending lock poisoned");
            pending.as_mut().and_then(|calls| calls.remove(&in_reply_to))
        };

        match waiter {
            Some(waiter) => {
                if waiter.send(body).is_err() {
                    debug!(src, in_reply_to, "Reply arrived after caller gave up");
                }
            }
            None => warn!(src, in_reply_to, "Dropping reply with no pending call"),
        }
    }

    fn close_pending(&self) {
        let mut pending = self.inner.pending.lock().expect("pending lock poisoned");
        if let Some(calls) = pending.take() {
            if !calls.is_empty() {
                debug!(count = calls.len(), "Failing pending calls");
            }
        }
    }
}

/// Removes a waiter from the pending map when its call ends, however it ends.
struct PendingCall<'a> {
    inner: &'a Inner,
    msg_id: u64,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.inner.pending.lock() {
            if let Some(calls) = pending.as_mut() {
                calls.remove(&self.msg_id);
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------------

async fn write_loop<W>(
    mut output: W,
    mut outbox: mpsc::Receiver<Message>,
    mut stop: oneshot::Receiver<()>,
) -> NodeResult<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            message = outbox.recv() => match message {
                Some(message) => write_line(&mut output, &message).await?,
                None => break,
            },
            _ = &mut stop => {
                while let Ok(message) = outbox.try_recv() {
                    write_line(&mut output, &message).await?;
                }
                break;
            }
        }
    }

    output.flush().await?;
    Ok(())
}

async fn write_line<W>(output: &mut W, message: &Message) -> NodeResult<()>
where
    W: AsyncWrite + Unpin,
{
    let line = protocol::encode(message).map_err(NodeError::encode)?;
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

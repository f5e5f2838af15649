//! Running a stack on its own thread.
//!
//! The thread owns the [`SipStack`] and its `mio::Poll`. Other threads talk
//! to it through a [`StackSender`], which pushes onto the state-machine
//! queue and wakes the poll. Messages for the transaction user stay on the
//! stack's TU queue, or are forwarded to a tokio channel when the thread
//! was started with [`StackThread::spawn_async`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mio::{Poll, Waker};
use sipwire_infra_common::Fifo;
use sipwire_sip_core::{SipMessage, Tuple};
use sipwire_transaction_core::TransactionMessage;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::stack::{SipStack, WAKE_TOKEN};

/// Longest the thread sleeps between passes. Transports that cannot be
/// registered with a poll (in-memory ones) are serviced at this interval.
pub const MAX_WAIT: Duration = Duration::from_millis(10);

/// Thread-safe handle for feeding a running stack.
#[derive(Debug, Clone)]
pub struct StackSender {
    state_machine: Fifo<TransactionMessage>,
    waker: Arc<Waker>,
    shutdown: Arc<AtomicBool>,
}

impl StackSender {
    fn post(&self, msg: TransactionMessage) -> Result<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        self.state_machine.add(msg);
        self.waker.wake()?;
        Ok(())
    }

    pub fn send(&self, mut msg: SipMessage) -> Result<()> {
        msg.set_from_wire(false);
        self.post(TransactionMessage::from(msg))
    }

    pub fn send_to(&self, mut msg: SipMessage, destination: Tuple) -> Result<()> {
        msg.set_fixed_destination(destination);
        self.send(msg)
    }

    pub fn cancel_client_invite(&self, transaction_id: impl Into<String>) -> Result<()> {
        self.post(TransactionMessage::CancelClientInvite(transaction_id.into()))
    }

    pub fn abandon_server_transaction(&self, transaction_id: impl Into<String>) -> Result<()> {
        self.post(TransactionMessage::AbandonServer(transaction_id.into()))
    }
}

/// A [`SipStack`] processing on a dedicated thread.
#[derive(Debug)]
pub struct StackThread {
    sender: StackSender,
    tu_fifo: Fifo<SipMessage>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl StackThread {
    /// Start processing `stack`. The transaction user reads from
    /// [`tu_fifo`](Self::tu_fifo).
    pub fn spawn(stack: SipStack) -> Result<Self> {
        Self::start(stack, None)
    }

    /// Start processing `stack`, delivering TU messages to an async handle.
    pub fn spawn_async(stack: SipStack) -> Result<(Self, AsyncTuHandle)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let thread = Self::start(stack, Some(tx))?;
        let handle = AsyncTuHandle {
            sender: thread.sender(),
            rx,
        };
        Ok((thread, handle))
    }

    fn start(stack: SipStack, forward: Option<mpsc::UnboundedSender<SipMessage>>) -> Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKE_TOKEN)?);
        let shutdown = Arc::new(AtomicBool::new(false));
        let sender = StackSender {
            state_machine: stack.state_machine_fifo().clone(),
            waker,
            shutdown: shutdown.clone(),
        };
        let tu_fifo = stack.tu_fifo().clone();

        let handle = thread::Builder::new()
            .name("sipwire-stack".to_string())
            .spawn(move || run(stack, poll, shutdown, forward))?;

        info!("Stack thread started");
        Ok(StackThread {
            sender,
            tu_fifo,
            handle: Some(handle),
        })
    }

    pub fn sender(&self) -> StackSender {
        self.sender.clone()
    }

    /// Messages for the transaction user. Empty when started with
    /// [`spawn_async`](Self::spawn_async).
    pub fn tu_fifo(&self) -> &Fifo<SipMessage> {
        &self.tu_fifo
    }

    pub fn send(&self, msg: SipMessage) -> Result<()> {
        self.sender.send(msg)
    }

    /// Stop the thread and wait for it.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.sender.shutdown.store(true, Ordering::Release);
        self.sender.waker.wake()?;
        let result = handle.join().map_err(|_| Error::Shutdown)?;
        info!("Stack thread stopped");
        result
    }
}

impl Drop for StackThread {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Stack thread ended with error: {}", e);
        }
    }
}

fn run(
    mut stack: SipStack,
    mut poll: Poll,
    shutdown: Arc<AtomicBool>,
    forward: Option<mpsc::UnboundedSender<SipMessage>>,
) -> Result<()> {
    while !shutdown.load(Ordering::Acquire) {
        stack.wait_and_process(&mut poll, MAX_WAIT)?;

        if let Some(tx) = &forward {
            while let Some(msg) = stack.tu_fifo().try_get() {
                if tx.send(msg).is_err() {
                    break;
                }
            }
            // nobody is left to read TU messages
            if tx.is_closed() {
                info!("Async TU dropped its receiver, stopping stack thread");
                shutdown.store(true, Ordering::Release);
                while stack.tu_fifo().try_get().is_some() {}
                break;
            }
        }
    }
    debug!("Stack thread loop finished");
    Ok(())
}

/// Transaction user side of a stack started with [`StackThread::spawn_async`].
#[derive(Debug)]
pub struct AsyncTuHandle {
    sender: StackSender,
    rx: mpsc::UnboundedReceiver<SipMessage>,
}

impl AsyncTuHandle {
    pub fn send(&self, msg: SipMessage) -> Result<()> {
        self.sender.send(msg)
    }

    pub fn send_to(&self, msg: SipMessage, destination: Tuple) -> Result<()> {
        self.sender.send_to(msg, destination)
    }

    pub fn cancel_client_invite(&self, transaction_id: impl Into<String>) -> Result<()> {
        self.sender.cancel_client_invite(transaction_id)
    }

    pub fn abandon_server_transaction(&self, transaction_id: impl Into<String>) -> Result<()> {
        self.sender.abandon_server_transaction(transaction_id)
    }

    /// Next message for the transaction user. `None` once the stack thread
    /// has stopped. Dropping the handle stops the thread.
    pub async fn recv(&mut self) -> Option<SipMessage> {
        self.rx.recv().await
    }
}

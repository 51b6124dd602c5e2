//! Peer session state machine.
//!
//! One session runs per accepted peer stream. It greets the peer with the
//! current pool state, then answers every inbound message:
//!
//! ```text
//! Local                                Peer
//!   |-------- Greeting --------------->|
//!   |<------- Greeting ----------------|
//!   |-------- Backoff ---------------->|   we hold a shared candidate and rank first
//!   |-------- Kick(claimed) ---------->|   peer offers the name we claimed
//!   |<------- Kick(name) --------------|   drop `name`, end the session
//!   |<------- Backoff -----------------|   pause the timer, sleep, greet again
//! ```
//!
//! Codec failures end only this session. They never reach the scheduler.

use std::sync::Arc;
use std::time::Duration;

use nameclaim_core::{
    message_pair, CodecError, Decoded, Greeting, Message, MessageDecoder, MessageEncoder,
};
use nameclaim_pool::CandidatePool;
use tokio::io::{ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::timer::ClaimTimer;
use crate::transport::PeerStream;

/// Everything a session shares with the rest of the node.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// The node's candidate pool.
    pub pool: Arc<CandidatePool>,
    /// The scheduler's decision timer.
    pub timer: ClaimTimer,
    /// How long to pause after a backoff, and how long to re-arm the timer
    /// for afterwards.
    pub backoff: Duration,
    /// Fires when the node shuts down.
    pub cancel: CancellationToken,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer kicked us off a name.
    Kicked(String),
    /// The peer closed the stream between messages.
    PeerClosed,
    /// The node shut down.
    Cancelled,
    /// The stream broke.
    Failed(String),
}

/// Summary of one peer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Local sequence number of the peer stream.
    pub peer: u64,
    /// Why the session stopped.
    pub end: SessionEnd,
    /// Greetings sent, including re-greetings after a backoff.
    pub greetings_sent: usize,
    /// Backoffs sent.
    pub backoffs_sent: usize,
    /// Kicks sent.
    pub kicks_sent: usize,
    /// Backoffs received.
    pub backoffs_received: usize,
    /// Documents skipped as unknown or malformed.
    pub skipped: usize,
}

impl SessionReport {
    fn new(peer: u64) -> Self {
        Self {
            peer,
            end: SessionEnd::PeerClosed,
            greetings_sent: 0,
            backoffs_sent: 0,
            kicks_sent: 0,
            backoffs_received: 0,
            skipped: 0,
        }
    }
}

/// Why the receive loop stopped early.
enum Halt {
    Cancelled,
    Codec(CodecError),
}

impl From<CodecError> for Halt {
    fn from(e: CodecError) -> Self {
        Halt::Codec(e)
    }
}

/// A negotiation session with one peer.
pub struct PeerSession<S: PeerStream> {
    decoder: MessageDecoder<ReadHalf<S>>,
    encoder: MessageEncoder<WriteHalf<S>>,
    ctx: SessionContext,
    report: SessionReport,
}

impl<S: PeerStream> PeerSession<S> {
    /// Bind a session to a freshly accepted stream.
    pub fn new(peer: u64, stream: S, ctx: SessionContext) -> Self {
        let (decoder, encoder) = message_pair(stream);
        Self {
            decoder,
            encoder,
            ctx,
            report: SessionReport::new(peer),
        }
    }

    /// Run the session to completion.
    pub async fn run(mut self) -> SessionReport {
        self.report.end = match self.negotiate().await {
            Ok(end) => end,
            Err(Halt::Cancelled) => SessionEnd::Cancelled,
            Err(Halt::Codec(e)) if e.is_closed() => SessionEnd::PeerClosed,
            Err(Halt::Codec(e)) => SessionEnd::Failed(e.to_string()),
        };

        debug!(peer = self.report.peer, end = ?self.report.end, "peer session finished");
        self.report
    }

    async fn negotiate(&mut self) -> Result<SessionEnd, Halt> {
        self.greet().await?;

        loop {
            match self.recv().await? {
                Decoded::Message(Message::Greeting(greeting)) => {
                    self.on_greeting(greeting).await?;
                }
                Decoded::Message(Message::Kick(kick)) => {
                    let removed = self.ctx.pool.remove(&kick.id);
                    debug!(peer = self.report.peer, name = %kick.id, removed, "kicked by peer");
                    return Ok(SessionEnd::Kicked(kick.id));
                }
                Decoded::Message(Message::Backoff) => {
                    self.report.backoffs_received += 1;
                    self.on_backoff().await?;
                }
                Decoded::Unrecognized(kind) => {
                    self.report.skipped += 1;
                    debug!(peer = self.report.peer, %kind, "skipping unknown message type");
                }
                Decoded::Malformed(reason) => {
                    self.report.skipped += 1;
                    debug!(peer = self.report.peer, %reason, "skipping malformed message");
                }
            }
        }
    }

    async fn on_greeting(&mut self, greeting: Greeting) -> Result<(), Halt> {
        if self.ctx.pool.outranks(&greeting.ids, greeting.timestamp) {
            self.report.backoffs_sent += 1;
            return self.send(Message::Backoff).await;
        }

        if let Some(claimed) = self.ctx.pool.claimed_name() {
            if greeting.ids.contains(&claimed) {
                self.report.kicks_sent += 1;
                return self.send(Message::kick(claimed)).await;
            }
        }

        Ok(())
    }

    async fn on_backoff(&mut self) -> Result<(), Halt> {
        self.ctx.timer.stop();

        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => return Err(Halt::Cancelled),
            _ = tokio::time::sleep(self.ctx.backoff) => {}
        }

        // The timer must come back even if this peer is gone, or the node
        // would never decide.
        let greeted = self.greet().await;
        self.ctx.timer.arm(self.ctx.backoff);
        greeted
    }

    async fn greet(&mut self) -> Result<(), Halt> {
        let greeting = self.ctx.pool.greeting();
        self.report.greetings_sent += 1;
        self.send(greeting).await
    }

    async fn send(&mut self, message: Message) -> Result<(), Halt> {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => Err(Halt::Cancelled),
            sent = self.encoder.encode(&message) => sent.map_err(Halt::from),
        }
    }

    async fn recv(&mut self) -> Result<Decoded, Halt> {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => Err(Halt::Cancelled),
            decoded = self.decoder.decode() => decoded.map_err(Halt::from),
        }
    }
}

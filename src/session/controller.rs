use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::connection::{Connection, ConnectionId, Frame};
use crate::error::{MalformedPayloadError, SessionError};
use crate::metrics::{MessageMetrics, SessionMetrics};
use crate::room::Member;
use crate::websocket::{ClientMessage, ServerMessage};

use super::Relay;

/// How long a closing session keeps flushing its outbox
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on the transport close handshake
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Placeholder deadline when no idle timeout is configured
const IDLE_DISABLED: Duration = Duration::from_secs(3600);

/// Lifecycle of one connection: `Accepted -> Joined -> Active -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Joined,
    Active,
    Closed,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer disconnected or the transport failed on receive
    PeerClosed(String),
    /// Writing to the transport failed
    SendFailed(String),
    /// A broadcast could not reach this member, or the server is shutting down
    Evicted,
    /// No inbound frame within the configured idle timeout
    IdleTimeout,
}

impl From<SessionError> for CloseReason {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Closed(e) => Self::PeerClosed(e.reason),
            SessionError::Send(e) => Self::SendFailed(e.reason),
        }
    }
}

/// Outcome of a finished session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub connection_id: ConnectionId,
    pub room_id: String,
    pub display_name: String,
    pub messages_relayed: u64,
    pub malformed_payloads: u64,
    pub close_reason: CloseReason,
    /// Always `Closed` once `run` returns
    pub state: SessionState,
    pub duration: Duration,
}

/// Drives one connection through its lifecycle.
///
/// [`run`](Self::run) consumes the controller, so a closed session can never
/// be resumed.
pub struct SessionController<C: Connection> {
    connection_id: ConnectionId,
    room_id: String,
    display_name: String,
    connection: C,
    relay: Relay,
    state: SessionState,
    messages_relayed: u64,
    malformed_payloads: u64,
}

impl<C: Connection> SessionController<C> {
    /// A controller in the `Accepted` state; room id and display name come
    /// from the routing layer already validated.
    pub fn new(
        relay: Relay,
        connection: C,
        room_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            connection_id: ConnectionId::new_v4(),
            room_id: room_id.into(),
            display_name: display_name.into(),
            connection,
            relay,
            state: SessionState::Accepted,
            messages_relayed: 0,
            malformed_payloads: 0,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion
    #[tracing::instrument(
        name = "session",
        skip(self),
        fields(
            connection_id = %self.connection_id,
            room_id = %self.room_id,
            display_name = %self.display_name
        )
    )]
    pub async fn run(mut self) -> SessionSummary {
        let started = Instant::now();
        SessionMetrics::record_opened();

        let (tx, mut outbox) = mpsc::channel(self.relay.config.outbox_capacity.max(1));
        let member = self.join(tx);

        self.transition(SessionState::Active);
        let close_reason = self.message_loop(&member, &mut outbox).await;

        self.close(&member, &mut outbox, &close_reason).await;

        let duration = started.elapsed();
        SessionMetrics::record_closed(duration.as_secs_f64());

        tracing::info!(
            reason = ?close_reason,
            messages_relayed = self.messages_relayed,
            duration_secs = duration.as_secs_f64(),
            "Session closed"
        );

        SessionSummary {
            connection_id: self.connection_id,
            room_id: self.room_id,
            display_name: self.display_name,
            messages_relayed: self.messages_relayed,
            malformed_payloads: self.malformed_payloads,
            close_reason,
            state: self.state,
            duration,
        }
    }

    /// Accepted -> Joined
    fn join(&mut self, outbox: mpsc::Sender<ServerMessage>) -> Arc<Member> {
        let outcome = self.relay.registry.join(
            &self.room_id,
            self.connection_id,
            &self.display_name,
            outbox,
        );
        self.transition(SessionState::Joined);

        self.relay.presence.announce_join(
            &self.room_id,
            &outcome.member,
            outcome.room_created,
            &outcome.other_members,
        );

        outcome.member
    }

    /// Active: pump inbound frames to the room and the outbox to the peer
    async fn message_loop(
        &mut self,
        member: &Member,
        outbox: &mut mpsc::Receiver<ServerMessage>,
    ) -> CloseReason {
        let idle_timeout = self.relay.config.idle_timeout();
        let idle = tokio::time::sleep(idle_timeout.unwrap_or(IDLE_DISABLED));
        tokio::pin!(idle);

        loop {
            let step = tokio::select! {
                _ = member.evicted() => Err(CloseReason::Evicted),
                outbound = outbox.recv() => match outbound {
                    Some(message) => self.write(member, &message).await,
                    // The registry and this task both hold the sender, so
                    // the queue only ends once the member is gone
                    None => Err(CloseReason::Evicted),
                },
                inbound = self.connection.receive() => match inbound {
                    Ok(frame) => {
                        if let Some(timeout) = idle_timeout {
                            idle.as_mut().reset(tokio::time::Instant::now() + timeout);
                        }
                        self.handle_frame(member, frame).await
                    }
                    Err(e) => Err(SessionError::from(e).into()),
                },
                _ = &mut idle, if idle_timeout.is_some() => Err(CloseReason::IdleTimeout),
            };

            if let Err(reason) = step {
                return reason;
            }
        }
    }

    /// Write one record to the transport.
    ///
    /// A peer that stops reading can park the write indefinitely, so it is
    /// raced against eviction: once a broadcast gives up on this member the
    /// session closes instead of waiting on the socket.
    async fn write(&mut self, member: &Member, message: &ServerMessage) -> Result<(), CloseReason> {
        tokio::select! {
            sent = self.connection.send(message) => {
                sent.map_err(|e| SessionError::from(e).into())
            }
            _ = member.evicted() => Err(CloseReason::Evicted),
        }
    }

    async fn handle_frame(&mut self, member: &Member, frame: Frame) -> Result<(), CloseReason> {
        let text = match frame {
            Frame::Text(text) => text,
            Frame::Binary(_) => {
                let error = MalformedPayloadError::new("binary frames are not supported");
                return self.reject(member, error).await;
            }
        };

        let inbound = match ClientMessage::parse(&text) {
            Ok(inbound) => inbound,
            Err(e) => return self.reject(member, e).await,
        };

        let record = ServerMessage::chat(self.display_name.as_str(), inbound.content);
        self.relay
            .engine
            .broadcast(&self.room_id, &record, Some(self.connection_id));
        self.messages_relayed += 1;

        // Echo once to the author
        self.write(member, &record).await
    }

    /// Report a malformed payload to this sender only
    async fn reject(
        &mut self,
        member: &Member,
        error: MalformedPayloadError,
    ) -> Result<(), CloseReason> {
        self.malformed_payloads += 1;
        MessageMetrics::record_malformed();
        tracing::warn!(error = %error, "Rejected inbound frame");

        self.write(member, &ServerMessage::error(error.reason)).await
    }

    /// Active -> Closed
    async fn close(
        &mut self,
        member: &Member,
        outbox: &mut mpsc::Receiver<ServerMessage>,
        reason: &CloseReason,
    ) {
        let outcome = self
            .relay
            .registry
            .leave(&self.room_id, self.connection_id);

        if outcome.removed.is_some() && !outcome.room_deleted {
            self.relay
                .presence
                .announce_leave(&self.room_id, &member.display_name);
        }

        // Notices queued before eviction (e.g. the shutdown reason) still
        // go out if the transport is alive
        if matches!(reason, CloseReason::Evicted) {
            outbox.close();
            let connection = &mut self.connection;
            let flush = async {
                while let Some(message) = outbox.recv().await {
                    if connection.send(&message).await.is_err() {
                        break;
                    }
                }
            };
            let _ = tokio::time::timeout(FLUSH_TIMEOUT, flush).await;
        }

        if tokio::time::timeout(CLOSE_TIMEOUT, self.connection.close())
            .await
            .is_err()
        {
            tracing::debug!("Transport close timed out");
        }
        self.transition(SessionState::Closed);
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "Session state changed");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::channel_pair;
    use crate::error::{ClosedError, SendError};

    #[test]
    fn test_new_controller_is_accepted() {
        let (conn, _peer) = channel_pair(4);
        let controller = Relay::default().session(conn, "r1", "A");

        assert_eq!(controller.state(), SessionState::Accepted);
        assert!(!controller.connection_id().is_nil());
    }

    #[test]
    fn test_close_reason_from_session_error() {
        let closed: SessionError = ClosedError::new("peer disconnected").into();
        assert_eq!(
            CloseReason::from(closed),
            CloseReason::PeerClosed("peer disconnected".to_string())
        );

        let failed: SessionError = SendError::new("peer dropped").into();
        assert_eq!(
            CloseReason::from(failed),
            CloseReason::SendFailed("peer dropped".to_string())
        );
    }

    #[tokio::test]
    async fn test_run_returns_summary_after_disconnect() {
        let relay = Relay::default();
        let (conn, mut peer) = channel_pair(4);

        peer.send_content("hello").await.unwrap();
        peer.send_text("{").await.unwrap();
        peer.disconnect();

        let summary = relay.session(conn, "r1", "A").run().await;

        assert_eq!(summary.messages_relayed, 1);
        assert_eq!(summary.malformed_payloads, 1);
        assert_eq!(summary.state, SessionState::Closed);
        assert_eq!(summary.close_reason, CloseReason::PeerClosed("peer disconnected".into()));
        assert!(!relay.registry.contains("r1"));

        assert_eq!(peer.recv().await, Some(ServerMessage::chat("A", "hello")));
        assert!(matches!(peer.recv().await, Some(ServerMessage::Error { .. })));
    }
}

//! Point-to-point protocol session
//!
//! An ordered, reliable channel between two parties. `receive` is the only
//! place a protocol task suspends; it is bounded by the session's receive
//! timeout and fails instead of retrying.

use super::envelope::{Envelope, SessionId};
use super::SessionError;
use crate::core_identity::Party;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::trace;

/// Per-session settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// How long `receive` waits for the counterparty
    pub receive_timeout: Duration,
    /// Frames buffered in each direction
    pub buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_secs(30),
            buffer: 16,
        }
    }
}

/// One end of a session
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    local: Party,
    counterparty: Party,
    outbound: mpsc::Sender<Vec<u8>>,
    inbound: mpsc::Receiver<Vec<u8>>,
    receive_timeout: Duration,
}

impl Session {
    /// Create both ends of a session between `initiator` and `responder`
    ///
    /// The first element is held by the initiator, the second by the responder.
    pub fn pair(initiator: Party, responder: Party, settings: SessionSettings) -> (Session, Session) {
        Self::pair_with(initiator, settings, responder, settings)
    }

    /// Like [`Session::pair`], with each end using its own settings
    ///
    /// Each end's buffer sizes the channel it receives on.
    pub fn pair_with(
        initiator: Party,
        initiator_settings: SessionSettings,
        responder: Party,
        responder_settings: SessionSettings,
    ) -> (Session, Session) {
        let id = SessionId::generate();
        let (to_responder, from_initiator) = mpsc::channel(responder_settings.buffer.max(1));
        let (to_initiator, from_responder) = mpsc::channel(initiator_settings.buffer.max(1));

        let initiator_end = Session {
            id,
            local: initiator.clone(),
            counterparty: responder.clone(),
            outbound: to_responder,
            inbound: from_responder,
            receive_timeout: initiator_settings.receive_timeout,
        };
        let responder_end = Session {
            id,
            local: responder,
            counterparty: initiator,
            outbound: to_initiator,
            inbound: from_initiator,
            receive_timeout: responder_settings.receive_timeout,
        };

        (initiator_end, responder_end)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn local(&self) -> &Party {
        &self.local
    }

    pub fn counterparty(&self) -> &Party {
        &self.counterparty
    }

    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    /// Send one payload
    pub async fn send<T: Serialize>(&self, payload: &T) -> Result<(), SessionError> {
        self.send_frame(Envelope::seal(self.id, payload)?).await
    }

    /// Send a pre-encoded frame
    pub async fn send_frame(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        trace!(session = %self.id, bytes = frame.len(), "Sending frame");
        self.outbound.send(frame).await.map_err(|_| SessionError::Closed {
            party: self.counterparty.name().clone(),
        })
    }

    /// Wait for the counterparty's next payload
    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<T, SessionError> {
        let frame = timeout(self.receive_timeout, self.inbound.recv())
            .await
            .map_err(|_| SessionError::Timeout {
                party: self.counterparty.name().clone(),
                after: self.receive_timeout,
            })?
            .ok_or_else(|| SessionError::Closed {
                party: self.counterparty.name().clone(),
            })?;

        trace!(session = %self.id, bytes = frame.len(), "Received frame");
        Envelope::open(self.id, &frame)
    }

    /// Send `payload`, then wait for the reply
    pub async fn send_and_receive<S, R>(&mut self, payload: &S) -> Result<R, SessionError>
    where
        S: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.send(payload).await?;
        self.receive().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_identity::{Keypair, PartyName};

    fn party(name: &str) -> Party {
        Party::new(PartyName::new(name), Keypair::generate().public_key())
    }

    fn settings(ms: u64) -> SessionSettings {
        SessionSettings {
            receive_timeout: Duration::from_millis(ms),
            buffer: 4,
        }
    }

    #[tokio::test]
    async fn test_messages_arrive_in_order() {
        let (a, mut b) = Session::pair(party("alice"), party("bob"), settings(1_000));

        a.send(&1u32).await.unwrap();
        a.send(&2u32).await.unwrap();

        assert_eq!(b.receive::<u32>().await.unwrap(), 1);
        assert_eq!(b.receive::<u32>().await.unwrap(), 2);
        assert_eq!(b.counterparty().name().as_str(), "alice");
        assert_eq!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let (mut a, mut b) = Session::pair(party("alice"), party("bob"), settings(1_000));

        let responder = tokio::spawn(async move {
            let n: u32 = b.receive().await.unwrap();
            b.send(&(n * 2)).await.unwrap();
        });

        let reply: u32 = a.send_and_receive(&21u32).await.unwrap();
        assert_eq!(reply, 42);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_times_out() {
        let (mut a, _b) = Session::pair(party("alice"), party("bob"), settings(20));
        let err = a.receive::<u32>().await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_ends_keep_their_own_timeout() {
        let (mut a, b) = Session::pair_with(party("alice"), settings(20), party("bob"), settings(5_000));
        assert_eq!(a.receive_timeout(), Duration::from_millis(20));
        assert_eq!(b.receive_timeout(), Duration::from_millis(5_000));

        let err = a.receive::<u32>().await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout { after, .. } if after == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_receive_after_counterparty_dropped() {
        let (mut a, b) = Session::pair(party("alice"), party("bob"), settings(1_000));
        drop(b);
        let err = a.receive::<u32>().await.unwrap_err();
        assert!(matches!(err, SessionError::Closed { .. }));
    }

    #[tokio::test]
    async fn test_frame_from_other_session_rejected() {
        let (a, _b) = Session::pair(party("alice"), party("bob"), settings(1_000));
        let (c, mut d) = Session::pair(party("carol"), party("bob"), settings(1_000));

        // Frame sealed for a's session, injected into d's inbound queue.
        let frame = Envelope::seal(a.id(), &5u32).unwrap();
        c.send_frame(frame).await.unwrap();

        let err = d.receive::<u32>().await.unwrap_err();
        assert!(matches!(err, SessionError::WrongSession { .. }));
    }
}

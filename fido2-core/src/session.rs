//! Ceremony session: single-slot completion tracking per ceremony kind.
//!
//! Registration and authentication each own one slot. Submitting a ceremony
//! parks a one-shot responder in the slot; the provider later resolves it
//! through a [`CompletionSink`] from whatever thread delivers platform
//! events. Taking the responder out of the slot is the only way to resolve
//! a ceremony, so every submission is resolved exactly once and late or
//! duplicate deliveries find an empty slot and are dropped.
//!
//! Each slot has its own lock, so the two kinds never contend.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Fido2Error, Result};
use crate::outcome::CeremonyOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

impl CeremonyKind {
    pub(crate) fn verb(&self) -> &'static str {
        match self {
            Self::Registration => "Register",
            Self::Authentication => "Sign",
        }
    }
}

impl fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration => write!(f, "registration"),
            Self::Authentication => write!(f, "authentication"),
        }
    }
}

/// Identifies one submitted ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CeremonyTicket {
    pub kind: CeremonyKind,
    pub id: Uuid,
}

impl fmt::Display for CeremonyTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Terminal event handed to the waiting caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The provider finished the ceremony.
    Outcome(CeremonyOutcome),
    /// The provider delivered a payload that could not be decoded.
    Undecodable(String),
    /// The provider could not start the ceremony.
    SubmissionFailed(String),
    /// Every completion handle was dropped without a delivery.
    Abandoned,
}

struct PendingCeremony {
    id: Uuid,
    responder: oneshot::Sender<Completion>,
}

#[derive(Default)]
struct Slot {
    pending: Mutex<Option<PendingCeremony>>,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, Option<PendingCeremony>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-kind completion registry.
#[derive(Default)]
pub struct CeremonySession {
    registration: Slot,
    authentication: Slot,
}

impl CeremonySession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn slot(&self, kind: CeremonyKind) -> &Slot {
        match kind {
            CeremonyKind::Registration => &self.registration,
            CeremonyKind::Authentication => &self.authentication,
        }
    }

    /// Claim the slot for `kind`.
    ///
    /// Fails with [`Fido2Error::CeremonyInProgress`] while another ceremony
    /// of the same kind is outstanding and its caller is still waiting. A
    /// pending ceremony whose caller has gone away is discarded instead.
    pub fn begin(self: &Arc<Self>, kind: CeremonyKind) -> Result<(CompletionSink, PendingCompletion)> {
        let (responder, receiver) = oneshot::channel();
        let ticket = CeremonyTicket {
            kind,
            id: Uuid::new_v4(),
        };

        {
            let mut pending = self.slot(kind).lock();
            if let Some(existing) = pending.as_ref() {
                if !existing.responder.is_closed() {
                    return Err(Fido2Error::CeremonyInProgress(kind));
                }
                debug!(
                    kind = %kind,
                    ceremony_id = %existing.id,
                    "Discarding pending ceremony with no waiting caller"
                );
            }
            *pending = Some(PendingCeremony {
                id: ticket.id,
                responder,
            });
        }

        debug!(ticket = %ticket, "Ceremony slot claimed");
        let sink = CompletionSink {
            inner: Arc::new(SinkInner {
                ticket,
                session: Arc::clone(self),
            }),
        };
        Ok((sink, PendingCompletion { ticket, receiver }))
    }

    /// Whether a ceremony of `kind` is currently outstanding.
    pub fn is_pending(&self, kind: CeremonyKind) -> bool {
        self.slot(kind).lock().is_some()
    }

    /// Resolve the ceremony identified by `ticket`.
    ///
    /// Returns `false` when the slot is idle or holds a different ceremony;
    /// such deliveries are duplicates or stale and are ignored.
    pub fn complete(&self, ticket: CeremonyTicket, completion: Completion) -> bool {
        let taken = {
            let mut pending = self.slot(ticket.kind).lock();
            match pending.as_ref() {
                Some(current) if current.id == ticket.id => pending.take(),
                _ => None,
            }
        };

        let Some(ceremony) = taken else {
            debug!(ticket = %ticket, "Ignoring completion for idle or replaced slot");
            return false;
        };

        if ceremony.responder.send(completion).is_err() {
            info!(ticket = %ticket, "Ceremony completed after its caller went away");
        }
        true
    }
}

impl fmt::Debug for CeremonySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CeremonySession")
            .field("registration_pending", &self.is_pending(CeremonyKind::Registration))
            .field(
                "authentication_pending",
                &self.is_pending(CeremonyKind::Authentication),
            )
            .finish()
    }
}

/// Caller side of a submitted ceremony.
#[derive(Debug)]
pub struct PendingCompletion {
    ticket: CeremonyTicket,
    receiver: oneshot::Receiver<Completion>,
}

impl PendingCompletion {
    pub fn ticket(&self) -> CeremonyTicket {
        self.ticket
    }

    /// Wait for the single completion of this ceremony.
    pub async fn wait(self) -> Completion {
        self.receiver.await.unwrap_or(Completion::Abandoned)
    }
}

struct SinkInner {
    ticket: CeremonyTicket,
    session: Arc<CeremonySession>,
}

impl Drop for SinkInner {
    fn drop(&mut self) {
        if self.session.complete(self.ticket, Completion::Abandoned) {
            warn!(ticket = %self.ticket, "Provider dropped ceremony without completing it");
        }
    }
}

/// Provider side of a submitted ceremony.
///
/// Clones share one ticket. Only the first delivery across all clones has an
/// effect. When the last clone is dropped without a delivery the ceremony is
/// resolved as [`Completion::Abandoned`].
#[derive(Clone)]
pub struct CompletionSink {
    inner: Arc<SinkInner>,
}

impl CompletionSink {
    pub fn ticket(&self) -> CeremonyTicket {
        self.inner.ticket
    }

    /// Deliver the provider's completion event.
    pub fn deliver(&self, outcome: CeremonyOutcome) -> bool {
        debug!(ticket = %self.inner.ticket, outcome = outcome.label(), "Completion received");
        self.inner
            .session
            .complete(self.inner.ticket, Completion::Outcome(outcome))
    }

    /// Deliver a completion event serialized as CBOR.
    pub fn deliver_encoded(&self, payload: &[u8]) -> bool {
        let completion = match CeremonyOutcome::from_cbor(payload) {
            Ok(outcome) => Completion::Outcome(outcome),
            Err(e) => {
                warn!(ticket = %self.inner.ticket, error = %e, "Provider sent an undecodable completion");
                Completion::Undecodable(e.to_string())
            }
        };
        self.inner.session.complete(self.inner.ticket, completion)
    }

    /// Report that the provider could not start the ceremony.
    pub fn fail_submission(&self, message: impl Into<String>) -> bool {
        self.inner
            .session
            .complete(self.inner.ticket, Completion::SubmissionFailed(message.into()))
    }
}

impl fmt::Debug for CompletionSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSink")
            .field("ticket", &self.inner.ticket)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_delivery() {
        let session = CeremonySession::new();
        let (sink, pending) = session.begin(CeremonyKind::Registration).unwrap();
        assert!(session.is_pending(CeremonyKind::Registration));

        assert!(sink.deliver(CeremonyOutcome::Cancelled));
        assert!(!session.is_pending(CeremonyKind::Registration));
        assert_eq!(
            pending.wait().await,
            Completion::Outcome(CeremonyOutcome::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_duplicate_delivery_ignored() {
        let session = CeremonySession::new();
        let (sink, pending) = session.begin(CeremonyKind::Authentication).unwrap();
        let duplicate = sink.clone();

        assert!(sink.deliver(CeremonyOutcome::ProviderError {
            message: "first".into()
        }));
        assert!(!duplicate.deliver(CeremonyOutcome::Cancelled));

        assert_eq!(
            pending.wait().await,
            Completion::Outcome(CeremonyOutcome::ProviderError {
                message: "first".into()
            })
        );
    }

    #[test]
    fn test_second_submission_rejected() {
        let session = CeremonySession::new();
        let (_sink, _pending) = session.begin(CeremonyKind::Registration).unwrap();
        let err = session.begin(CeremonyKind::Registration).unwrap_err();
        assert!(matches!(
            err,
            Fido2Error::CeremonyInProgress(CeremonyKind::Registration)
        ));
    }

    #[test]
    fn test_kinds_are_independent() {
        let session = CeremonySession::new();
        let (_reg_sink, _reg) = session.begin(CeremonyKind::Registration).unwrap();
        let (_auth_sink, _auth) = session.begin(CeremonyKind::Authentication).unwrap();
        assert!(session.is_pending(CeremonyKind::Registration));
        assert!(session.is_pending(CeremonyKind::Authentication));
    }

    #[tokio::test]
    async fn test_stale_ticket_ignored() {
        let session = CeremonySession::new();
        let (first_sink, first) = session.begin(CeremonyKind::Registration).unwrap();
        let stale_ticket = first_sink.ticket();
        assert!(first_sink.deliver(CeremonyOutcome::Cancelled));
        first.wait().await;

        let (_second_sink, second) = session.begin(CeremonyKind::Registration).unwrap();
        assert!(!session.complete(stale_ticket, Completion::Abandoned));
        assert!(session.is_pending(CeremonyKind::Registration));
        assert_ne!(second.ticket(), stale_ticket);
    }

    #[tokio::test]
    async fn test_dropping_all_sinks_abandons() {
        let session = CeremonySession::new();
        let (sink, pending) = session.begin(CeremonyKind::Authentication).unwrap();
        let clone = sink.clone();
        drop(sink);
        assert!(session.is_pending(CeremonyKind::Authentication));
        drop(clone);
        assert!(!session.is_pending(CeremonyKind::Authentication));
        assert_eq!(pending.wait().await, Completion::Abandoned);
    }

    #[tokio::test]
    async fn test_drop_after_delivery_is_noop() {
        let session = CeremonySession::new();
        let (sink, pending) = session.begin(CeremonyKind::Registration).unwrap();
        sink.fail_submission("no authenticator");
        drop(sink);
        assert_eq!(
            pending.wait().await,
            Completion::SubmissionFailed("no authenticator".into())
        );
    }

    #[tokio::test]
    async fn test_slot_reusable_after_completion() {
        let session = CeremonySession::new();
        for _ in 0..3 {
            let (sink, pending) = session.begin(CeremonyKind::Registration).unwrap();
            sink.deliver(CeremonyOutcome::Cancelled);
            pending.wait().await;
        }
        assert!(!session.is_pending(CeremonyKind::Registration));
    }

    #[test]
    fn test_abandoned_caller_does_not_block_slot() {
        let session = CeremonySession::new();
        let (_sink, pending) = session.begin(CeremonyKind::Registration).unwrap();
        drop(pending);
        assert!(session.begin(CeremonyKind::Registration).is_ok());
    }

    #[tokio::test]
    async fn test_undecodable_payload() {
        let session = CeremonySession::new();
        let (sink, pending) = session.begin(CeremonyKind::Registration).unwrap();
        assert!(sink.deliver_encoded(b"\xff\xfe"));
        assert!(matches!(pending.wait().await, Completion::Undecodable(_)));
    }

    #[tokio::test]
    async fn test_encoded_payload() {
        let session = CeremonySession::new();
        let (sink, pending) = session.begin(CeremonyKind::Registration).unwrap();
        let payload = CeremonyOutcome::Cancelled.to_cbor().unwrap();
        assert!(sink.deliver_encoded(&payload));
        assert_eq!(
            pending.wait().await,
            Completion::Outcome(CeremonyOutcome::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_delivery_from_other_thread() {
        let session = CeremonySession::new();
        let (sink, pending) = session.begin(CeremonyKind::Authentication).unwrap();
        std::thread::spawn(move || {
            sink.deliver(CeremonyOutcome::Cancelled);
        });
        assert_eq!(
            pending.wait().await,
            Completion::Outcome(CeremonyOutcome::Cancelled)
        );
    }
}

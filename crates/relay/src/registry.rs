//! Session registry
//!
//! Maps tokens to live sessions. Sessions remove themselves on entering a
//! terminal state, so a lookup never returns a finished session. The map lock
//! is only held for the map operation itself, never across an attach.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use transfer_core::{
    RandomTokenGenerator, Result, SessionTimeouts, Token, TokenGenerator, TransferError,
};

use crate::session::new_session;
use crate::{ByteSink, Clock, SessionHandle, TokioClock, Upstream};

struct Inner {
    sessions: Mutex<HashMap<Token, SessionHandle>>,
    generator: Box<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    timeouts: SessionTimeouts,
}

impl Inner {
    fn remove(&self, token: &str) -> bool {
        self.sessions.lock().remove(token).is_some()
    }
}

/// Token → session mapping
///
/// Cheap to clone; clones share the same sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl SessionRegistry {
    /// Registry with random tokens and the tokio clock
    pub fn new(timeouts: SessionTimeouts) -> Self {
        Self::with_parts(
            timeouts,
            Box::new(RandomTokenGenerator::default()),
            Arc::new(TokioClock),
        )
    }

    /// Registry with an explicit token generator and clock
    pub fn with_parts(
        timeouts: SessionTimeouts,
        generator: Box<dyn TokenGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: Mutex::new(HashMap::new()),
                generator,
                clock,
                timeouts,
            }),
        }
    }

    pub fn timeouts(&self) -> SessionTimeouts {
        self.inner.timeouts
    }

    /// Allocate a new session and start its actor.
    ///
    /// Must be called from within a tokio runtime. Fails only if the token
    /// generator fails; a token that is already live is reported as a
    /// generator defect rather than handled.
    pub fn create(&self) -> Result<Token> {
        let token = self.inner.generator.generate()?;

        let registry: Weak<Inner> = Arc::downgrade(&self.inner);
        let detach_token = token.clone();
        let (handle, actor) = new_session(
            token.clone(),
            self.inner.timeouts,
            self.inner.clock.clone(),
            Box::new(move || {
                if let Some(inner) = registry.upgrade() {
                    inner.remove(detach_token.as_str());
                }
            }),
        );

        {
            let mut sessions = self.inner.sessions.lock();
            if sessions.contains_key(token.as_str()) {
                return Err(TransferError::TokenGeneration("token collision".to_string()));
            }
            sessions.insert(token.clone(), handle);
        }

        // Spawned only after insertion so the session's own removal can never
        // run before it is visible.
        tokio::spawn(actor.run());
        info!("Session {} created", token.short());
        Ok(token)
    }

    /// Find a live session. Unknown and finished tokens look the same.
    pub fn lookup(&self, token: &str) -> Option<SessionHandle> {
        self.inner.sessions.lock().get(token).cloned()
    }

    /// Drop a session from the map. Idempotent.
    pub fn remove(&self, token: &str) {
        if self.inner.remove(token) {
            debug!("Session {} removed", Token::from(token).short());
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.lock().is_empty()
    }

    /// Look up `token` and attach the producer to it
    pub async fn attach_producer(
        &self,
        token: &str,
        cancel: CancellationToken,
        upstream: Upstream,
    ) -> Result<()> {
        let session = self.lookup(token).ok_or(TransferError::NotFound)?;
        session.attach_producer(cancel, upstream).await
    }

    /// Look up `token` and attach the consumer to it
    pub async fn attach_consumer(
        &self,
        token: &str,
        cancel: CancellationToken,
        sink: Box<dyn ByteSink>,
    ) -> Result<()> {
        let session = self.lookup(token).ok_or(TransferError::NotFound)?;
        session.attach_consumer(cancel, sink).await
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("timeouts", &self.inner.timeouts)
            .finish()
    }
}

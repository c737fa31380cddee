//! Audio-effects session guard.
//!
//! The platform leaks an effects session if a player is reset or released
//! while one is attached. [`EffectsSession`] closes on drop so no exit path
//! can forget it; callers that care about the close result use
//! [`EffectsSession::close`].

use std::fmt;
use std::sync::Arc;

use bridge_traits::{AudioEffectsBridge, AudioSessionId, BridgeError};
use tracing::{debug, warn};

use crate::error::{PlaybackError, Result};

pub struct EffectsSession {
    bridge: Arc<dyn AudioEffectsBridge>,
    session: AudioSessionId,
    open: bool,
}

impl EffectsSession {
    pub fn open(bridge: Arc<dyn AudioEffectsBridge>, session: AudioSessionId) -> Result<Self> {
        bridge
            .open_session(session)
            .map_err(|e| effects_error(session, e))?;
        debug!(session, "Audio effects session opened");

        Ok(Self {
            bridge,
            session,
            open: true,
        })
    }

    pub fn session(&self) -> AudioSessionId {
        self.session
    }

    pub fn close(mut self) -> Result<()> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.bridge
            .close_session(self.session)
            .map_err(|e| effects_error(self.session, e))?;
        debug!(session = self.session, "Audio effects session closed");
        Ok(())
    }
}

impl Drop for EffectsSession {
    fn drop(&mut self) {
        if let Err(e) = self.close_inner() {
            warn!(session = self.session, error = %e, "Failed to close audio effects session");
        }
    }
}

impl fmt::Debug for EffectsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectsSession")
            .field("session", &self.session)
            .field("open", &self.open)
            .finish()
    }
}

fn effects_error(session: AudioSessionId, err: BridgeError) -> PlaybackError {
    PlaybackError::EffectsSession {
        session,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::{mock, predicate::eq};

    mock! {
        Effects {}

        impl AudioEffectsBridge for Effects {
            fn open_session(&self, session: AudioSessionId) -> bridge_traits::error::Result<()>;
            fn close_session(&self, session: AudioSessionId) -> bridge_traits::error::Result<()>;
        }
    }

    #[test]
    fn test_drop_closes_session() {
        let mut effects = MockEffects::new();
        effects.expect_open_session().with(eq(4)).times(1).returning(|_| Ok(()));
        effects.expect_close_session().with(eq(4)).times(1).returning(|_| Ok(()));

        let guard = EffectsSession::open(Arc::new(effects), 4).unwrap();
        assert_eq!(guard.session(), 4);
        drop(guard);
    }

    #[test]
    fn test_explicit_close_runs_once() {
        let mut effects = MockEffects::new();
        effects.expect_open_session().returning(|_| Ok(()));
        effects.expect_close_session().times(1).returning(|_| Ok(()));

        let guard = EffectsSession::open(Arc::new(effects), 2).unwrap();
        guard.close().unwrap();
    }

    #[test]
    fn test_close_failure_is_reported() {
        let mut effects = MockEffects::new();
        effects.expect_open_session().returning(|_| Ok(()));
        effects
            .expect_close_session()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("busy".into())));

        let guard = EffectsSession::open(Arc::new(effects), 3).unwrap();
        assert!(matches!(
            guard.close(),
            Err(PlaybackError::EffectsSession { session: 3, .. })
        ));
    }

    #[test]
    fn test_open_failure_maps_to_effects_error() {
        let mut effects = MockEffects::new();
        effects
            .expect_open_session()
            .returning(|_| Err(BridgeError::NotAvailable("no service".into())));
        effects.expect_close_session().never();

        let err = EffectsSession::open(Arc::new(effects), 9).unwrap_err();
        assert!(matches!(err, PlaybackError::EffectsSession { session: 9, .. }));
        assert!(err.is_transient());
    }
}

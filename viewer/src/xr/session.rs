//! Session lifecycle tracking.
//!
//! The state only changes on runtime-delivered events. The two client
//! actions are beginning the session when it becomes READY and ending it
//! when it reaches STOPPING.

use tracing::{debug, error, info, warn};

use crate::error::XrError;
use crate::xr::runtime::{SessionState, XrRuntime};

#[derive(Debug, Default)]
pub struct SessionStateMachine {
    state: SessionState,
    /// Between a successful begin-session and end-session.
    running: bool,
    /// Cleared once the session has been ended; no further session calls.
    session_live: bool,
    quit: bool,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            session_live: true,
            ..Self::default()
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_session(&self) -> bool {
        self.session_live
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Host-requested shutdown. A later READY will not begin the session.
    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    /// Frame submission is legal in READY, SYNCHRONIZED, VISIBLE, FOCUSED.
    pub fn can_submit_frame(&self) -> bool {
        self.session_live
            && matches!(
                self.state,
                SessionState::Ready
                    | SessionState::Synchronized
                    | SessionState::Visible
                    | SessionState::Focused
            )
    }

    /// Apply a session-state-changed event. Begin/end failures are fatal:
    /// the quit flag is raised and the error returned.
    pub fn on_event<R: XrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        new_state: SessionState,
    ) -> Result<(), XrError> {
        info!(
            "XR: session state {} -> {}",
            self.state.as_str(),
            new_state.as_str()
        );
        self.state = new_state;

        match new_state {
            SessionState::Ready => {
                if self.quit {
                    debug!("XR: shutdown requested, not beginning session");
                    return Ok(());
                }
                if let Err(e) = runtime.begin_session() {
                    error!("XR: begin session failed: {}", e);
                    self.quit = true;
                    return Err(e);
                }
                self.running = true;
            }
            SessionState::Stopping => {
                self.quit = true;
                self.running = false;
                if !self.session_live {
                    return Ok(());
                }
                self.session_live = false;
                if let Err(e) = runtime.end_session() {
                    error!("XR: end session failed: {}", e);
                    return Err(e);
                }
            }
            SessionState::Exiting | SessionState::LossPending => {
                warn!("XR: session is {}, shutting down", new_state.as_str());
                self.quit = true;
            }
            SessionState::Idle
            | SessionState::Synchronized
            | SessionState::Visible
            | SessionState::Focused => {}
        }
        Ok(())
    }

    /// The instance is about to be lost; nothing more can be done with it.
    pub fn on_instance_loss(&mut self) {
        warn!("XR: instance loss pending, shutting down");
        self.quit = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeCall;
    use crate::sim::{CallLog, SimRuntime};

    const ALL: [SessionState; 8] = [
        SessionState::Idle,
        SessionState::Ready,
        SessionState::Synchronized,
        SessionState::Visible,
        SessionState::Focused,
        SessionState::Stopping,
        SessionState::LossPending,
        SessionState::Exiting,
    ];

    fn machine() -> (SessionStateMachine, SimRuntime, CallLog) {
        let log = CallLog::new();
        (SessionStateMachine::new(), SimRuntime::new(log.clone()), log)
    }

    #[test]
    fn test_initial_state() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.state(), SessionState::Idle);
        assert!(!sm.can_submit_frame());
        assert!(!sm.should_quit());
        assert!(sm.has_session());
    }

    #[test]
    fn test_can_submit_only_in_active_states() {
        let (mut sm, mut rt, _log) = machine();
        for state in ALL {
            let mut fresh = SessionStateMachine::new();
            let _ = fresh.on_event(&mut rt, state);
            let expected = matches!(
                state,
                SessionState::Ready
                    | SessionState::Synchronized
                    | SessionState::Visible
                    | SessionState::Focused
            );
            assert_eq!(fresh.can_submit_frame(), expected, "{:?}", state);
        }
        sm.on_event(&mut rt, SessionState::Focused).unwrap();
        assert!(sm.can_submit_frame());
    }

    #[test]
    fn test_ready_begins_session() {
        let (mut sm, mut rt, log) = machine();
        sm.on_event(&mut rt, SessionState::Ready).unwrap();
        assert!(sm.is_running());
        assert_eq!(log.count("xrBeginSession"), 1);
    }

    #[test]
    fn test_ready_after_quit_does_not_begin() {
        let (mut sm, mut rt, log) = machine();
        sm.request_quit();
        sm.on_event(&mut rt, SessionState::Ready).unwrap();
        assert!(!sm.is_running());
        assert_eq!(log.count("xrBeginSession"), 0);
    }

    #[test]
    fn test_stopping_ends_session_and_quits() {
        let (mut sm, mut rt, log) = machine();
        sm.on_event(&mut rt, SessionState::Ready).unwrap();
        sm.on_event(&mut rt, SessionState::Stopping).unwrap();
        assert_eq!(log.count("xrEndSession"), 1);
        assert!(sm.should_quit());
        assert!(!sm.has_session());
        assert!(!sm.can_submit_frame());

        // A repeated STOPPING does not end twice.
        sm.on_event(&mut rt, SessionState::Stopping).unwrap();
        assert_eq!(log.count("xrEndSession"), 1);
    }

    #[test]
    fn test_exiting_and_loss_pending_quit() {
        for state in [SessionState::Exiting, SessionState::LossPending] {
            let (mut sm, mut rt, log) = machine();
            sm.on_event(&mut rt, state).unwrap();
            assert!(sm.should_quit());
            assert!(log.is_empty());
        }
    }

    #[test]
    fn test_begin_failure_is_fatal() {
        let (mut sm, mut rt, _log) = machine();
        rt.fail_on(RuntimeCall::BeginSession, "XR_ERROR_SESSION_NOT_READY");
        let err = sm.on_event(&mut rt, SessionState::Ready).unwrap_err();
        assert_eq!(err.call(), Some(RuntimeCall::BeginSession));
        assert!(sm.should_quit());
        assert!(!sm.is_running());
    }

    #[test]
    fn test_end_failure_is_fatal() {
        let (mut sm, mut rt, _log) = machine();
        sm.on_event(&mut rt, SessionState::Ready).unwrap();
        rt.fail_on(RuntimeCall::EndSession, "XR_ERROR_SESSION_NOT_STOPPING");
        assert!(sm.on_event(&mut rt, SessionState::Stopping).is_err());
        assert!(sm.should_quit());
    }
}

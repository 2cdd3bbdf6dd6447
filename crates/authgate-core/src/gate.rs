//! Navigation Gate: picks which screen graph is mounted for a session.

use futures::stream::{self, Stream, StreamExt};
use tokio::sync::watch;
use tracing::debug;

use crate::auth::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    ShowLoadingIndicator,
    ShowAuthenticatedGraph,
    ShowUnauthenticatedGraph,
}

impl RenderMode {
    /// Total over every `(loading, token)` combination. Loading wins
    /// regardless of the token.
    pub fn decide(session: &Session) -> Self {
        match (session.loading, session.token.is_some()) {
            (true, _) => RenderMode::ShowLoadingIndicator,
            (false, true) => RenderMode::ShowAuthenticatedGraph,
            (false, false) => RenderMode::ShowUnauthenticatedGraph,
        }
    }
}

pub fn decide(session: &Session) -> RenderMode {
    RenderMode::decide(session)
}

/// Follows a session subscription and recomputes the render mode on every
/// published snapshot.
pub struct NavigationGate {
    rx: watch::Receiver<Session>,
    current: RenderMode,
}

impl NavigationGate {
    pub fn new(mut rx: watch::Receiver<Session>) -> Self {
        let current = RenderMode::decide(&rx.borrow_and_update());
        Self { rx, current }
    }

    pub fn current(&self) -> RenderMode {
        self.current
    }

    /// Wait until the render mode differs from `current()`.
    ///
    /// Snapshots that map to the same mode are absorbed. Returns `None` once
    /// the session manager has been dropped.
    pub async fn changed(&mut self) -> Option<RenderMode> {
        loop {
            self.rx.changed().await.ok()?;
            let next = RenderMode::decide(&self.rx.borrow_and_update());
            if next != self.current {
                debug!(from = ?self.current, to = ?next, "Render mode changed");
                self.current = next;
                return Some(next);
            }
        }
    }

    /// The current mode followed by every subsequent change.
    pub fn into_stream(self) -> impl Stream<Item = RenderMode> {
        let first = self.current;
        stream::once(async move { first }).chain(stream::unfold(self, |mut gate| async move {
            gate.changed().await.map(|mode| (mode, gate))
        }))
    }
}

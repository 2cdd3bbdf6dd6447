//! Screen graphs mounted by the Navigation Gate.
//!
//! Screens hold no session logic. They read the session and call the
//! Session Manager's mutators; which graph is mounted is decided by
//! `RenderMode` alone.

use crate::gate::RenderMode;

/// Address shown on the password reset screen.
pub const SUPPORT_EMAIL: &str = "test@gmail.com";

/// Screens reachable without a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedRoute {
    Login,
    Register,
    ForgetPassword,
}

impl UnauthenticatedRoute {
    pub const ALL: [UnauthenticatedRoute; 3] = [
        UnauthenticatedRoute::Login,
        UnauthenticatedRoute::Register,
        UnauthenticatedRoute::ForgetPassword,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            UnauthenticatedRoute::Login => "Login",
            UnauthenticatedRoute::Register => "Register",
            UnauthenticatedRoute::ForgetPassword => "Forget Password",
        }
    }

    /// Whether the stack may move from `self` to `to`.
    ///
    /// Login links out to Register and ForgetPassword; both of those only
    /// lead back to Login.
    pub fn can_navigate(&self, to: UnauthenticatedRoute) -> bool {
        use UnauthenticatedRoute::*;
        matches!(
            (*self, to),
            (Login, Register)
                | (Login, ForgetPassword)
                | (Register, Login)
                | (ForgetPassword, Login)
        )
    }
}

/// Tabs of the home area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatedRoute {
    Home,
    Profile,
}

impl AuthenticatedRoute {
    pub const ALL: [AuthenticatedRoute; 2] =
        [AuthenticatedRoute::Home, AuthenticatedRoute::Profile];

    pub fn title(&self) -> &'static str {
        match self {
            AuthenticatedRoute::Home => "Home",
            AuthenticatedRoute::Profile => "Profile",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            AuthenticatedRoute::Home => AuthenticatedRoute::Profile,
            AuthenticatedRoute::Profile => AuthenticatedRoute::Home,
        }
    }
}

/// The graph mounted for a render mode, with its initial route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenGraph {
    Loading,
    Authenticated(AuthenticatedRoute),
    Unauthenticated(UnauthenticatedRoute),
}

impl ScreenGraph {
    /// Mounting a graph always starts at its initial route; the previous
    /// graph's navigation history is discarded.
    pub fn for_mode(mode: RenderMode) -> Self {
        match mode {
            RenderMode::ShowLoadingIndicator => ScreenGraph::Loading,
            RenderMode::ShowAuthenticatedGraph => {
                ScreenGraph::Authenticated(AuthenticatedRoute::Home)
            }
            RenderMode::ShowUnauthenticatedGraph => {
                ScreenGraph::Unauthenticated(UnauthenticatedRoute::Login)
            }
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ScreenGraph::Loading => "Loading",
            ScreenGraph::Authenticated(route) => route.title(),
            ScreenGraph::Unauthenticated(route) => route.title(),
        }
    }

    /// Move within the unauthenticated stack. Returns `None` for a
    /// transition the graph doesn't offer.
    pub fn navigate(&self, to: UnauthenticatedRoute) -> Option<Self> {
        match self {
            ScreenGraph::Unauthenticated(from) if from.can_navigate(to) => {
                Some(ScreenGraph::Unauthenticated(to))
            }
            _ => None,
        }
    }

    pub fn select_tab(&self, tab: AuthenticatedRoute) -> Option<Self> {
        match self {
            ScreenGraph::Authenticated(_) => Some(ScreenGraph::Authenticated(tab)),
            _ => None,
        }
    }
}

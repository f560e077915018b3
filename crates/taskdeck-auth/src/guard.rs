//! Route guard.
//!
//! Decides, from an [`AuthState`] snapshot, whether a protected view may
//! render.
//!
//! # State Machine
//!
//! ```text
//!                    loading
//!   ┌─────────┐ ◄──────────────── any
//!   │ Loading │
//!   └────┬────┘
//!        │ settled
//!        ├── user = None ───────────────────────► Unauthenticated ─► Redirect(redirect_to)
//!        ├── require_admin && !admin ───────────► Unauthorized ────► fallback | Redirect(unauthorized)
//!        ├── role grants nothing ───────────────► Unauthenticated ─► Redirect(redirect_to)
//!        └── otherwise ─────────────────────────► Authorized ──────► RenderChildren
//! ```
//!
//! Every role comparison goes through [`Permissions`]. The guard never fetches
//! data; it is a pure function of its configuration and the snapshot.
//! Redirects always replace the current history entry.

use crate::{AuthState, Permissions};
use std::fmt;

/// Default redirect for signed-out visitors.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Default redirect for signed-in users lacking the required role.
pub const DEFAULT_UNAUTHORIZED_PATH: &str = "/home";

/// Guard configuration.
///
/// `F` is whatever the front end renders as a fallback (a widget, a message,
/// a view id). It defaults to `()` for guards that never use one.
///
/// # Example
///
/// ```
/// use taskdeck_auth::GuardConfig;
///
/// let config: GuardConfig<&str> = GuardConfig::new()
///     .require_admin()
///     .with_fallback("admins only")
///     .redirect_to("/signin");
///
/// assert!(config.requires_admin());
/// assert_eq!(config.login_path(), "/signin");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig<F = ()> {
    require_admin: bool,
    fallback: Option<F>,
    redirect_to: String,
    unauthorized_redirect: String,
}

impl<F> GuardConfig<F> {
    /// Member-level guard with the default redirect targets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            require_admin: false,
            fallback: None,
            redirect_to: DEFAULT_LOGIN_PATH.to_string(),
            unauthorized_redirect: DEFAULT_UNAUTHORIZED_PATH.to_string(),
        }
    }

    /// Restricts the route to admins.
    #[must_use]
    pub fn require_admin(mut self) -> Self {
        self.require_admin = true;
        self
    }

    /// Sets or clears the admin requirement.
    #[must_use]
    pub fn with_require_admin(mut self, require_admin: bool) -> Self {
        self.require_admin = require_admin;
        self
    }

    /// Renders `fallback` instead of redirecting unauthorized users.
    #[must_use]
    pub fn with_fallback(mut self, fallback: F) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Sets the redirect target for unauthenticated visitors.
    #[must_use]
    pub fn redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = path.into();
        self
    }

    /// Sets the redirect target for unauthorized users without a fallback.
    #[must_use]
    pub fn unauthorized_redirect(mut self, path: impl Into<String>) -> Self {
        self.unauthorized_redirect = path.into();
        self
    }

    #[must_use]
    pub fn requires_admin(&self) -> bool {
        self.require_admin
    }

    #[must_use]
    pub fn fallback(&self) -> Option<&F> {
        self.fallback.as_ref()
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.redirect_to
    }

    #[must_use]
    pub fn unauthorized_path(&self) -> &str {
        &self.unauthorized_redirect
    }
}

impl<F> Default for GuardConfig<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the guard state machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardState {
    /// Auth state still resolving; no decision yet.
    Loading,
    /// No usable user: signed out, lookup failed, or role grants nothing.
    Unauthenticated,
    /// Signed in but lacking the admin role the route requires.
    Unauthorized,
    /// Protected content may render.
    Authorized,
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Loading => "loading",
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized => "unauthorized",
            Self::Authorized => "authorized",
        };
        f.write_str(s)
    }
}

/// What the front end should do for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision<'a, F> {
    /// Show a loading indicator.
    Loading,
    /// Navigate to `to`, replacing the current history entry when `replace`.
    Redirect { to: &'a str, replace: bool },
    /// Render the configured fallback.
    RenderFallback(&'a F),
    /// Render the protected content.
    RenderChildren,
}

impl<'a, F> GuardDecision<'a, F> {
    /// Returns the redirect target, if this is a redirect.
    #[must_use]
    pub fn redirect_target(&self) -> Option<&'a str> {
        match self {
            Self::Redirect { to, .. } => Some(to),
            _ => None,
        }
    }

    /// Returns `true` only for [`GuardDecision::RenderChildren`].
    #[must_use]
    pub fn renders_children(&self) -> bool {
        matches!(self, Self::RenderChildren)
    }
}

/// Route guard over a [`GuardConfig`].
///
/// # Example
///
/// ```
/// use taskdeck_auth::{AuthState, GuardDecision, RouteGuard};
///
/// let guard: RouteGuard = RouteGuard::default();
///
/// // Still resolving: no redirect, no content.
/// assert_eq!(guard.evaluate(&AuthState::initial()), GuardDecision::Loading);
///
/// // Signed out: go to the login page.
/// let signed_out = AuthState::resolved(None, None, 1);
/// assert_eq!(guard.evaluate(&signed_out).redirect_target(), Some("/login"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteGuard<F = ()> {
    config: GuardConfig<F>,
}

impl<F> RouteGuard<F> {
    #[must_use]
    pub fn new(config: GuardConfig<F>) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GuardConfig<F> {
        &self.config
    }

    /// Computes the guard state for `auth`.
    #[must_use]
    pub fn state(&self, auth: &AuthState) -> GuardState {
        if auth.loading {
            return GuardState::Loading;
        }
        let Some(user) = auth.user.as_ref() else {
            return GuardState::Unauthenticated;
        };

        let permissions = Permissions::for_user(Some(user));
        if self.config.require_admin && !permissions.is_admin() {
            GuardState::Unauthorized
        } else if permissions.is_empty() {
            GuardState::Unauthenticated
        } else {
            GuardState::Authorized
        }
    }

    /// Computes the render decision for `auth`.
    #[must_use]
    pub fn evaluate(&self, auth: &AuthState) -> GuardDecision<'_, F> {
        let state = self.state(auth);
        let decision = match state {
            GuardState::Loading => GuardDecision::Loading,
            GuardState::Unauthenticated => GuardDecision::Redirect {
                to: &self.config.redirect_to,
                replace: true,
            },
            GuardState::Unauthorized => match self.config.fallback.as_ref() {
                Some(fallback) => GuardDecision::RenderFallback(fallback),
                None => GuardDecision::Redirect {
                    to: &self.config.unauthorized_redirect,
                    replace: true,
                },
            },
            GuardState::Authorized => GuardDecision::RenderChildren,
        };
        tracing::trace!(
            %state,
            generation = auth.generation,
            require_admin = self.config.require_admin,
            redirect = decision.redirect_target(),
            "route guard evaluated"
        );
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, Session, User};
    use taskdeck_types::UserId;

    fn signed_in(role: Option<Role>) -> AuthState {
        let id = UserId::new();
        AuthState::resolved(
            Some(Session::new("t", id)),
            Some(User::new(id, "Tamar", role)),
            1,
        )
    }

    fn loading_with(role: Option<Role>) -> AuthState {
        let mut state = signed_in(role);
        state.loading = true;
        state
    }

    #[test]
    fn loading_never_redirects_or_renders() {
        let guards: Vec<RouteGuard<&str>> = vec![
            RouteGuard::default(),
            RouteGuard::new(GuardConfig::new().require_admin()),
            RouteGuard::new(GuardConfig::new().require_admin().with_fallback("nope")),
        ];
        let states = [
            AuthState::initial(),
            loading_with(Some(Role::Admin)),
            loading_with(Some(Role::Member)),
            loading_with(None),
        ];
        for guard in &guards {
            for state in &states {
                assert_eq!(guard.state(state), GuardState::Loading);
                assert_eq!(guard.evaluate(state), GuardDecision::Loading);
            }
        }
    }

    #[test]
    fn signed_out_redirects_to_login() {
        let guard: RouteGuard = RouteGuard::default();
        let state = AuthState::resolved(None, None, 1);
        assert_eq!(guard.state(&state), GuardState::Unauthenticated);
        assert_eq!(
            guard.evaluate(&state),
            GuardDecision::Redirect {
                to: "/login",
                replace: true
            }
        );
    }

    #[test]
    fn custom_login_path() {
        let guard: RouteGuard = RouteGuard::new(GuardConfig::new().redirect_to("/auth"));
        let state = AuthState::resolved(None, None, 1);
        assert_eq!(guard.evaluate(&state).redirect_target(), Some("/auth"));
    }

    #[test]
    fn session_without_user_shows_nothing() {
        let guard: RouteGuard = RouteGuard::default();
        let state = AuthState::resolved(Some(Session::new("t", UserId::new())), None, 2);
        assert_eq!(guard.state(&state), GuardState::Unauthenticated);
        let decision = guard.evaluate(&state);
        assert!(!decision.renders_children());
        assert_eq!(decision.redirect_target(), Some("/login"));
    }

    #[test]
    fn member_on_admin_route_without_fallback_redirects() {
        let guard: RouteGuard = RouteGuard::new(GuardConfig::new().require_admin());
        let state = signed_in(Some(Role::Member));
        assert_eq!(guard.state(&state), GuardState::Unauthorized);
        assert_eq!(
            guard.evaluate(&state),
            GuardDecision::Redirect {
                to: "/home",
                replace: true
            }
        );
    }

    #[test]
    fn member_on_admin_route_with_fallback_renders_fallback() {
        let guard = RouteGuard::new(GuardConfig::new().require_admin().with_fallback("denied"));
        let state = signed_in(Some(Role::Member));
        assert_eq!(guard.evaluate(&state), GuardDecision::RenderFallback(&"denied"));
    }

    #[test]
    fn custom_unauthorized_path() {
        let guard: RouteGuard =
            RouteGuard::new(GuardConfig::new().require_admin().unauthorized_redirect("/"));
        let state = signed_in(Some(Role::Member));
        assert_eq!(guard.evaluate(&state).redirect_target(), Some("/"));
    }

    #[test]
    fn unknown_role_on_admin_route_is_unauthorized() {
        let guard: RouteGuard = RouteGuard::new(GuardConfig::new().require_admin());
        assert_eq!(guard.state(&signed_in(None)), GuardState::Unauthorized);
    }

    #[test]
    fn unknown_role_on_member_route_is_unauthenticated() {
        let guard: RouteGuard<&str> = RouteGuard::new(GuardConfig::new().with_fallback("x"));
        let state = signed_in(None);
        assert_eq!(guard.state(&state), GuardState::Unauthenticated);
        assert_eq!(guard.evaluate(&state).redirect_target(), Some("/login"));
    }

    #[test]
    fn admin_is_authorized_everywhere() {
        let state = signed_in(Some(Role::Admin));
        let member_route: RouteGuard = RouteGuard::default();
        let admin_route: RouteGuard = RouteGuard::new(GuardConfig::new().require_admin());
        assert!(member_route.evaluate(&state).renders_children());
        assert!(admin_route.evaluate(&state).renders_children());
    }

    #[test]
    fn member_is_authorized_on_member_routes() {
        let guard: RouteGuard = RouteGuard::default();
        assert_eq!(guard.state(&signed_in(Some(Role::Member))), GuardState::Authorized);
    }

    #[test]
    fn guard_state_display() {
        assert_eq!(GuardState::Unauthorized.to_string(), "unauthorized");
    }
}

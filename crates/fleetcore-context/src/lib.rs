//! The [`Context`] is a general purpose immutable container carrying request-scoped
//! values across every boundary operation in the engine.
//!
//! Contexts are organised into a tree:
//!
//! - A root context represents the process-wide scope (just a [`Logger`]).
//! - Derived contexts narrow that scope for a single operation, attaching the
//!   caller's identity (`project`, `user`, `domain`), auth material, a request id,
//!   an admin flag and an optional deadline.
//!
//! Contexts are passed by value (cheaply cloned) as the first argument to every
//! operation that needs to know who is asking and how long it may take; they are
//! never stored on long-lived objects.
use slog::Logger;
use slog::OwnedKV;
use slog::SendSyncRefUnwindSafeKV;
use time::OffsetDateTime;

/// A request-scoped bag of values threaded through engine operations.
///
/// Refer to the [crate level docs](crate) for details.
#[derive(Clone, Debug)]
pub struct Context {
    /// Logger with contextual attributes attached to it.
    pub logger: Logger,

    /// Project (tenant) the caller is operating within, if any.
    pub project: Option<String>,
    /// User id of the caller, if any.
    pub user: Option<String>,
    /// Domain the caller's project belongs to, if any.
    pub domain: Option<String>,
    /// Opaque auth token forwarded to downstream capability calls.
    pub auth_token: Option<String>,
    /// Correlates all operations spawned from a single originating request.
    pub request_id: Option<String>,
    /// True when the caller is allowed to bypass project scoping.
    pub is_admin: bool,
    /// Deadline after which long running operations should give up.
    pub deadline: Option<OffsetDateTime>,
}

impl Context {
    /// Derive a new [`Context`] by making changes to the current one.
    pub fn derive(&self) -> ContextBuilder {
        ContextBuilder {
            logger: self.logger.clone(),
            project: self.project.clone(),
            user: self.user.clone(),
            domain: self.domain.clone(),
            auth_token: self.auth_token.clone(),
            request_id: self.request_id.clone(),
            is_admin: self.is_admin,
            deadline: self.deadline,
        }
    }

    /// Derive a new [`Context`] by making changes to the current one using a callback.
    pub fn derive_with<F>(&self, callback: F) -> Context
    where
        F: FnOnce(ContextBuilder) -> ContextBuilder,
    {
        let builder = callback(self.derive());
        builder.build()
    }

    /// Initialise a new root context with no identity attached.
    pub fn root(logger: Logger) -> ContextBuilder {
        ContextBuilder {
            logger,
            project: None,
            user: None,
            domain: None,
            auth_token: None,
            request_id: None,
            is_admin: false,
            deadline: None,
        }
    }

    /// True when the caller did not supply a project and is not an admin.
    ///
    /// Store lookups use this to decide whether a `project_safe` scoping
    /// predicate can be skipped.
    pub fn project_safe(&self) -> bool {
        !self.is_admin
    }

    /// True once `deadline` has passed relative to `now`.
    pub fn expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }
}

/// A builder for root and derived contexts.
pub struct ContextBuilder {
    logger: Logger,
    project: Option<String>,
    user: Option<String>,
    domain: Option<String>,
    auth_token: Option<String>,
    request_id: Option<String>,
    is_admin: bool,
    deadline: Option<OffsetDateTime>,
}

impl ContextBuilder {
    /// Finalise the build process and return a new [`Context`].
    pub fn build(self) -> Context {
        Context {
            logger: self.logger,
            project: self.project,
            user: self.user,
            domain: self.domain,
            auth_token: self.auth_token,
            request_id: self.request_id,
            is_admin: self.is_admin,
            deadline: self.deadline,
        }
    }

    /// Update the [`Context`] logger to attach new log key/value pairs.
    pub fn log_values<T>(mut self, entries: OwnedKV<T>) -> Self
    where
        T: SendSyncRefUnwindSafeKV + 'static,
    {
        self.logger = self.logger.new(entries);
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn deadline(mut self, deadline: OffsetDateTime) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Context {
    /// Create an empty admin context useful for tests.
    pub fn fixture() -> Context {
        let logger = Logger::root(slog::Discard, slog::o!());
        Context {
            logger,
            project: None,
            user: None,
            domain: None,
            auth_token: None,
            request_id: None,
            is_admin: true,
            deadline: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Context;
    use time::OffsetDateTime;

    #[test]
    fn derive_log_attributes() {
        let root = Context::fixture();
        let parent = root
            .derive()
            .log_values(slog::o!("root" => "value", "test" => "root"))
            .build();
        let context = parent
            .derive()
            .log_values(slog::o!("test" => "override"))
            .build();
        assert_eq!(format!("{:?}", context.logger.list()), "(test, test, root)");
    }

    #[test]
    fn derive_noop() {
        let parent = Context::fixture();
        let context = parent.derive().build();
        assert_eq!(
            format!("{:?}", parent.logger.list()),
            format!("{:?}", context.logger.list()),
        );
    }

    #[test]
    fn derive_carries_identity() {
        let root = Context::root(slog::Logger::root(slog::Discard, slog::o!()))
            .project("proj-1")
            .user("user-1")
            .build();
        let child = root.derive().request_id("req-1").build();
        assert_eq!(child.project.as_deref(), Some("proj-1"));
        assert_eq!(child.user.as_deref(), Some("user-1"));
        assert_eq!(child.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn project_safe_tracks_admin_flag() {
        let root = Context::root(slog::Logger::root(slog::Discard, slog::o!())).build();
        assert!(root.project_safe());
        let admin = root.derive().admin(true).build();
        assert!(!admin.project_safe());
    }

    #[test]
    fn expired_checks_deadline() {
        let now = OffsetDateTime::now_utc();
        let root = Context::root(slog::Logger::root(slog::Discard, slog::o!()))
            .deadline(now)
            .build();
        assert!(root.expired(now + time::Duration::seconds(1)));
        assert!(!root.expired(now - time::Duration::seconds(1)));
    }
}

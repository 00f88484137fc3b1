//! Call-scoped context: an immutable bag passed through the handler
//! pipeline so middleware can see the active session and parameter view,
//! and so convenience shortcuts can find the current manager.

use std::sync::Arc;
use std::time::Instant;

use crate::engine::Manager;
use crate::error::{Error, Result};
use crate::param::ParamView;
use crate::session::Session;

#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<Slots>,
}

#[derive(Clone, Default)]
struct Slots {
    session: Option<Arc<dyn Session>>,
    params: Option<Arc<dyn ParamView>>,
    manager: Option<Arc<dyn Manager>>,
    deadline: Option<Instant>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    fn derive(&self, mutate: impl FnOnce(&mut Slots)) -> Context {
        let mut slots = (*self.inner).clone();
        mutate(&mut slots);
        Context {
            inner: Arc::new(slots),
        }
    }

    pub fn with_session(&self, session: Arc<dyn Session>) -> Context {
        self.derive(|slots| slots.session = Some(session))
    }

    pub fn session(&self) -> Option<&Arc<dyn Session>> {
        self.inner.session.as_ref()
    }

    pub fn with_params(&self, params: Arc<dyn ParamView>) -> Context {
        self.derive(|slots| slots.params = Some(params))
    }

    pub fn params(&self) -> Option<&Arc<dyn ParamView>> {
        self.inner.params.as_ref()
    }

    pub fn with_manager(&self, manager: Arc<dyn Manager>) -> Context {
        self.derive(|slots| slots.manager = Some(manager))
    }

    /// The manager attached to this context; transactional scopes attach
    /// themselves so nested helpers and shortcuts find them.
    pub fn manager(&self) -> Result<Arc<dyn Manager>> {
        self.inner
            .manager
            .clone()
            .ok_or(Error::NoManagerInContext)
    }

    pub fn has_manager(&self) -> bool {
        self.inner.manager.is_some()
    }

    pub fn with_deadline(&self, deadline: Instant) -> Context {
        self.derive(|slots| slots.deadline = Some(deadline))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Whether the deadline, if any, has passed. Sessions are expected to
    /// check this at their blocking boundaries.
    pub fn expired(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

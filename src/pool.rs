//! Named environments and lazy, single-flight session creation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use crate::driver::{driver_named, Driver};
use crate::error::{Error, Result};
use crate::session::Session;

/// Opens the pooled session for an environment. The factory owns the
/// actual pooling; the returned session is shared for the environment's
/// lifetime.
pub trait SessionFactory: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn Session>>;
}

impl<F> SessionFactory for F
where
    F: Fn() -> Result<Arc<dyn Session>> + Send + Sync,
{
    fn connect(&self) -> Result<Arc<dyn Session>> {
        self()
    }
}

struct Source {
    driver: Arc<dyn Driver>,
    factory: Arc<dyn SessionFactory>,
    // Single-flight slot: the pool for a name is created exactly once.
    session: OnceCell<Arc<dyn Session>>,
}

/// Registry of named environments. Registration and close take a coarse
/// lock; session creation is per-source single-flight.
#[derive(Default)]
pub struct Environments {
    sources: Mutex<HashMap<String, Arc<Source>>>,
}

impl Environments {
    pub fn new() -> Environments {
        Environments::default()
    }

    /// Register `name` with its driver and session factory. Replaces any
    /// previous registration of the same name.
    pub fn register(
        &self,
        name: &str,
        driver_name: &str,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<()> {
        let driver = driver_named(driver_name)?;
        self.sources
            .lock()
            .expect("environment registry poisoned")
            .insert(
                name.to_string(),
                Arc::new(Source {
                    driver,
                    factory,
                    session: OnceCell::new(),
                }),
            );
        Ok(())
    }

    fn source(&self, name: &str) -> Result<Arc<Source>> {
        self.sources
            .lock()
            .expect("environment registry poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownEnvironment {
                name: name.to_string(),
            })
    }

    pub fn driver(&self, name: &str) -> Result<Arc<dyn Driver>> {
        Ok(Arc::clone(&self.source(name)?.driver))
    }

    /// The environment's session, created on first use.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Session>> {
        let source = self.source(name)?;
        let session = source.session.get_or_try_init(|| source.factory.connect())?;
        Ok(Arc::clone(session))
    }

    /// Close every session that was actually created. The first failure is
    /// reported after all sessions have been visited.
    pub fn close(&self) -> Result<()> {
        let sources: Vec<Arc<Source>> = {
            let mut guard = self.sources.lock().expect("environment registry poisoned");
            guard.drain().map(|(_, source)| source).collect()
        };
        let mut first_error = None;
        for source in sources {
            if let Some(session) = source.session.get() {
                if let Err(e) = session.close() {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

//! Task spawning abstraction for the single-threaded load pipeline.
//!
//! Loads run as `!Send` futures on a local executor: every row source and
//! loader lives on one thread and shares state through `Rc<RefCell<..>>`.
//! Any executor implementing [`LocalSpawn`] can host them, e.g.
//! `futures::executor::LocalPool` (tests, command-line tools) or an adapter
//! around `tokio::task::spawn_local`.

use std::{future::Future, rc::Rc};

use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::{Result, error::Error};

/// Cheaply clonable handle used to spawn local tasks.
#[derive(Clone)]
pub struct LocalScheduler(Rc<dyn LocalSpawn>);

impl LocalScheduler {
    pub fn new(spawner: impl LocalSpawn + 'static) -> LocalScheduler {
        LocalScheduler(Rc::new(spawner))
    }

    /// Spawns `future` on the local executor.
    ///
    /// The future never runs synchronously inside this call; it is polled on a
    /// later turn of the executor.
    pub fn spawn<F>(&self, future: F) -> Result<()>
    where
        F: Future<Output = ()> + 'static,
    {
        self.0
            .as_ref()
            .spawn_local(future)
            .map_err(|e| Error::spawn("local executor", e))
    }
}

impl std::fmt::Debug for LocalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalScheduler").finish_non_exhaustive()
    }
}

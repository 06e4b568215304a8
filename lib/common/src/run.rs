//! Run group for long-lived actors that live and die together.
//!
//! Every actor is a future paired with an interrupt. All actors start at
//! once; the first one to return, for any reason, causes every interrupt to
//! be called exactly once. [`Group::run`] then waits for the remaining
//! actors and returns the result of the one that returned first.

use std::future::Future;
use std::pin::Pin;

use anyhow::{Result, anyhow};
use futures::FutureExt;
use futures::future::{join_all, select_all};
use log::{debug, error, info, warn};

type Execute = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type Interrupt = Box<dyn FnOnce() + Send>;

struct Actor {
    name: &'static str,
    execute: Execute,
    interrupt: Interrupt,
}

#[derive(Default)]
pub struct Group {
    actors: Vec<Actor>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor. `interrupt` must make `execute` return promptly;
    /// it can be called before `execute` has been polled.
    pub fn add<F, I>(&mut self, name: &'static str, execute: F, interrupt: I)
    where
        F: Future<Output = Result<()>> + Send + 'static,
        I: FnOnce() + Send + 'static,
    {
        self.actors.push(Actor {
            name,
            execute: Box::pin(execute),
            interrupt: Box::new(interrupt),
        });
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub async fn run(self) -> Result<()> {
        if self.actors.is_empty() {
            return Ok(());
        }

        let mut interrupts = Vec::with_capacity(self.actors.len());
        let mut running = Vec::with_capacity(self.actors.len());
        for actor in self.actors {
            let name = actor.name;
            debug!("starting {}", name);
            interrupts.push((name, actor.interrupt));
            running.push(tokio::spawn(actor.execute).map(move |joined| (name, joined)));
        }

        let ((name, joined), _, rest) = select_all(running).await;
        let result = outcome(name, joined);
        match &result {
            Ok(()) => info!("{} stopped, shutting down", name),
            Err(e) => error!("{:#}, shutting down", e),
        }

        for (name, interrupt) in interrupts {
            debug!("interrupting {}", name);
            interrupt();
        }

        for (name, joined) in join_all(rest).await {
            match outcome(name, joined) {
                Ok(()) => debug!("{} stopped", name),
                Err(e) => warn!("{:#}", e),
            }
        }

        result
    }
}

fn outcome(
    name: &'static str,
    joined: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match joined {
        Ok(result) => result.map_err(|e| e.context(format!("{} failed", name))),
        Err(e) => Err(anyhow!("{} did not complete: {}", name, e)),
    }
}

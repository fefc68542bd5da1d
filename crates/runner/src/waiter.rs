//! The advancement gate invoked before each HTTP dispatch.

use std::io::Write;

use async_trait::async_trait;
use colored::Colorize;

/// A blocking hook gating request dispatch. The default does nothing;
/// the prompt implementation drives gradual, request-by-request runs.
#[async_trait]
pub trait Waiter: Send + Sync {
    async fn wait(&self);
}

pub struct NoopWaiter;

#[async_trait]
impl Waiter for NoopWaiter {
    async fn wait(&self) {}
}

/// Blocks until the user hits ENTER.
pub struct PromptWaiter;

#[async_trait]
impl Waiter for PromptWaiter {
    async fn wait(&self) {
        let _ = tokio::task::spawn_blocking(|| {
            eprint!("{}", "press ENTER to continue ... ".dimmed());
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            let _ = std::io::stdin().read_line(&mut line);
        })
        .await;
    }
}

//! Retry loop around a single request

use super::cancel::Cancellation;
use super::policy::RetryPolicy;
use crate::error::{Disposition, Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Runs one logical request until it succeeds or fails for good
///
/// The operation receives the attempt number (0 for the first try) so the
/// callee can tell a retry of the identical request from a new one.
#[derive(Debug, Default)]
pub struct RetryController {
    policy: RetryPolicy,
    cancel: Cancellation,
    retries: AtomicU64,
}

impl RetryController {
    /// Create a controller with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: Cancellation::new(),
            retries: AtomicU64::new(0),
        }
    }

    /// Interrupt sleeps through this handle
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// The retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The cancellation handle raced by every sleep
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// Total retries performed so far, across all requests
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Run `operation`, retrying according to each error's disposition
    ///
    /// `reauthenticate` is called at most once per expired-credentials
    /// streak; a second consecutive expiry is fatal.
    pub async fn execute<T, Op, OpFut, Re, ReFut>(
        &self,
        mut operation: Op,
        mut reauthenticate: Re,
    ) -> Result<T>
    where
        Op: FnMut(u32) -> OpFut,
        OpFut: Future<Output = Result<T>>,
        Re: FnMut() -> ReFut,
        ReFut: Future<Output = Result<()>>,
    {
        let mut attempt: u32 = 0;
        let mut retried: u32 = 0;
        let mut refreshed = false;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let err = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match err.disposition() {
                Disposition::Fatal => return Err(err),

                Disposition::AuthExpired if refreshed => {
                    return Err(Error::auth(format!(
                        "credentials rejected again after refresh: {err}"
                    )));
                }

                Disposition::AuthExpired => {
                    warn!("{err}, refreshing credentials");
                    reauthenticate().await?;
                    refreshed = true;
                }

                Disposition::Retry(announced) => {
                    refreshed = false;
                    if retried >= self.policy.max_retries {
                        return Err(Error::RetriesExhausted {
                            attempts: attempt + 1,
                            last: Box::new(err),
                        });
                    }

                    let delay = announced.unwrap_or_else(|| self.policy.backoff(retried));
                    warn!(
                        "{err}, attempt {}/{}, retrying in {:?}",
                        retried + 1,
                        self.policy.max_retries + 1,
                        delay
                    );
                    self.cancel.sleep(delay).await?;
                    retried += 1;
                }
            }

            attempt += 1;
            self.retries.fetch_add(1, Ordering::Relaxed);
            debug!("Retrying request, attempt {attempt}");
        }
    }
}

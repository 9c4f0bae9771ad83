//! The validate, prepare, transport, finalize pipeline every RPC runs through.
//!
//! Each stage is an ordinary closure:
//!
//! 1. `validate` inspects (and may adjust) the request before anything is sent
//! 2. `transport` performs one attempt; it is re-run by the retry executor
//! 3. `finalize` converts the response into the caller's result type
//!
//! Validation failures never reach the network.

use std::time::Duration;

use crate::error::Result;
use crate::retry::{self, RetryPolicy, RpcFailure};

/// Retry policy and deadline shared by the stages of one RPC.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    policy: &'a RetryPolicy,
    deadline: Duration,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline.
    #[must_use]
    pub const fn new(policy: &'a RetryPolicy, deadline: Duration) -> Self {
        Self { policy, deadline }
    }

    /// Run the stages in order.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage; transport failures are classified
    /// by the retry executor.
    pub fn run<Req, Resp, T>(
        &self,
        mut request: Req,
        validate: impl FnOnce(&mut Req) -> Result<()>,
        mut transport: impl FnMut(&Req, Duration) -> std::result::Result<Resp, RpcFailure>,
        finalize: impl FnOnce(Resp) -> Result<T>,
    ) -> Result<T> {
        validate(&mut request)?;
        let deadline = self.deadline;
        let response = retry::execute(self.policy, || transport(&request, deadline))?;
        finalize(response)
    }
}

/// A validate stage that accepts every request.
pub fn no_validation<Req>(_: &mut Req) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use manifoldb_wire::protocol::TransportCode;

    #[test]
    fn test_validation_failure_skips_transport() {
        let policy = RetryPolicy::new();
        let mut sent = 0;
        let result: Result<u32> = Pipeline::new(&policy, Duration::from_secs(1)).run(
            String::new(),
            |req: &mut String| {
                if req.is_empty() {
                    Err(Error::invalid_argument("empty request"))
                } else {
                    Ok(())
                }
            },
            |_, _| {
                sent += 1;
                Ok(1)
            },
            Ok,
        );
        assert_eq!(result.expect_err("invalid").kind(), ErrorKind::InvalidArgument);
        assert_eq!(sent, 0);
    }

    #[test]
    fn test_stages_run_in_order() {
        let policy = RetryPolicy::new().initial_backoff_ms(1).max_backoff_ms(1);
        let mut attempts = 0;
        let result = Pipeline::new(&policy, Duration::from_millis(250)).run(
            vec![1, 2],
            |req: &mut Vec<i32>| {
                req.push(3);
                Ok(())
            },
            |req, deadline| {
                attempts += 1;
                assert_eq!(deadline, Duration::from_millis(250));
                if attempts == 1 {
                    Err(RpcFailure::transport(TransportCode::Unavailable, "blip"))
                } else {
                    Ok(req.iter().sum::<i32>())
                }
            },
            |sum| Ok(sum * 10),
        );
        assert_eq!(result, Ok(60));
        assert_eq!(attempts, 2);
    }
}

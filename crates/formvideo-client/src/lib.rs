//! formvideo-client – submit a video to a formvideo server and wait for the
//! extracted form.
//!
//! The server never pushes: [`Client::wait`] polls the status endpoint under a
//! [`PollPolicy`] until the job completes, fails, or the policy's `max_wait`
//! runs out.

mod client;
mod error;
mod poll;

pub use client::{Client, JobState, Submission, VideoStatus, DEFAULT_SERVER};
pub use error::ClientError;
pub use poll::PollPolicy;

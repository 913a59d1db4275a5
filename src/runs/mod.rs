//! Streaming run plumbing.
//!
//! [`RunService`] is the seam to the remote assistant service;
//! [`RunStreamClient`] owns the one-open-sequence-per-thread rule and hands
//! out [`EventSequence`]s; the HTTP implementation speaks the service's SSE
//! protocol and the scripted one replays deterministic event sequences for
//! tests and demos.

mod client;
mod http;
mod scripted;
mod service;

pub use client::{EventSequence, RunConfig, RunStreamClient};
pub use http::HttpRunService;
pub use scripted::{ScriptItem, ScriptedRunService, SubmittedOutputs};
pub use service::{EventReceiver, RemoteThread, RunService};

use thiserror::Error;

/// Errors from opening or consuming a run stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A second sequence was opened while one is still live on the thread.
    /// Programmer error; the call fails and the live run is untouched.
    #[error("a run is already streaming on this thread")]
    ConflictingRun,

    /// The remote service failed mid-stream or rejected the request. The
    /// current run is over; the session surfaces the failure and stays
    /// open for a retry.
    #[error("run stream failed: {0}")]
    Stream(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed event payload: {0}")]
    Decode(#[from] serde_json::Error),
}

//! Souschef - AI-powered kitchen assistant
//!
//! A streaming chat engine over a remote assistant service, with tool
//! calls wired to a recipe/shopping/meal record store. The layers, bottom
//! up:
//!
//! - [`protocol`]: the run event wire format and its decoder
//! - [`transcript`]: ordered message accumulation from streamed events
//! - [`dispatch`]: one pure function from event to transcript mutation
//! - [`runs`]: the remote service seam, stream client, and SSE plumbing
//! - [`store`]: the record store behind the kitchen tools
//! - [`tools`]: tool handlers and the fan-out/fan-in call coordinator
//! - [`session`]: the per-thread run lifecycle state machine
//! - [`threads`]: the thread registry joining remote threads with stubs
//! - [`config`], [`cli`]: settings, directories, and the REPL

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod protocol;
pub mod runs;
pub mod session;
pub mod store;
pub mod threads;
pub mod tools;
pub mod transcript;

pub use config::{Settings, XdgDirs};
pub use dispatch::{dispatch_event, DispatchOutcome};
pub use protocol::{FileAnnotation, RunEvent, ToolCallKind, ToolCallRequest, ToolOutput};
pub use runs::{
    EventSequence, HttpRunService, RunConfig, RunService, RunStreamClient, ScriptItem,
    ScriptedRunService, StreamError,
};
pub use session::{RunLifecycle, SessionError, ThreadSession};
pub use store::{HttpRecordStore, MemoryRecordStore, Record, RecordStore, MAX_BATCH_RECORDS};
pub use threads::{merge_thread, Thread, ThreadRegistry, ThreadStub};
pub use tools::{
    KitchenTool, RecipeDraft, RecipeDrafter, ToolCallCoordinator, ToolError, ToolRegistry,
};
pub use transcript::{Message, MessageAccumulator, Role, Segment};

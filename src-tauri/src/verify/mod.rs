//! Locator Verification Engine
//!
//! - selector: locator strategy + value → selector string
//! - sanitize / url: strip executable content from snapshots, absolutize references
//! - document / context: isolated rendering context answering lookups
//! - poll / batch: readiness polling and the batch validation state machine

mod batch;
mod context;
mod document;
mod poll;
mod sanitize;
mod selector;
mod url;
mod xpath;

pub use batch::{BatchOutcome, BatchReport, BatchSummary, SessionSnapshot, ValidationSession, ValidationState};
pub use context::{
    ContextLoader, ContextState, ContextStatus, ElementVerifier, RenderContext, RenderOptions,
    SnapshotContext, ThreadContextLoader, VerifyOptions, VerifyOutcome,
};
pub use document::{compose_document, Viewport, HIGHLIGHT_CLASS};
pub use poll::{poll_bounded, PollPolicy, PollResult, Probe};
pub use sanitize::{sanitize, SanitizedSnapshot};
pub use selector::{generate_selector, selector_for, Selector};
pub use self::url::BaseUrl;
pub use xpath::{xpath_to_css, XPathError};

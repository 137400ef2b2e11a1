//! Progress observation for long-running external tools.
//!
//! [`parser`] turns raw tool output lines into [`ProgressSample`]s;
//! [`reporter`] throttles samples into status edits.
//!
//! [`ProgressSample`]: crate::models::progress::ProgressSample

pub mod parser;
pub mod reporter;

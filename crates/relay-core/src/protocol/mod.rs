//! Wire-level helpers shared by both connection roles.
//!
//! # Sub-modules
//!
//! - **`line_buffer`** – Turns an arbitrary sequence of TCP reads into
//!   complete newline-terminated lines.
//! - **`log_line`** – Stamps an event with an ISO-8601 timestamp for
//!   delivery to admins.

pub mod line_buffer;
pub mod log_line;

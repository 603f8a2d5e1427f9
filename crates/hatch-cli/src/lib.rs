// ABOUTME: CLI library components for the hatch binary.
// ABOUTME: Terminal rendering of activity blocks and the side effects a terminal session reacts to.

//! # hatch-cli
//!
//! Command-line front end for the hatch agent pipeline.
//!
//! ```text
//! hatch
//! ├── init                          # Write the default config
//! ├── replay <file>                 # Feed a recorded transcript through the pipeline
//! ├── send <prompt>                 # Stream a turn from the HTTP endpoint
//! ├── run <prompt>                  # Spawn the agent CLI directly
//! │   └── --resume <session-id>     # Continue an earlier agent session
//! ├── history <project>             # Print stored blocks
//! └── reset <project>               # Forget a project's conversation
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # First-time setup
//! hatch init
//!
//! # Build something, then continue the same agent session
//! hatch run "add a contact form" --project bakery
//! hatch run "make the button blue" --project bakery --resume 3f2c9a
//!
//! # Inspect what a recorded stream would look like in Hebrew
//! hatch replay turn.jsonl --locale he
//! ```

pub mod effects;
pub mod render;

/// Version of the hatch CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

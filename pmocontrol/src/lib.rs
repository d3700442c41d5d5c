//! Text control surface for playlist and queue sources.
//!
//! Commands are scoped by instance id: `<id>.<command> [args]`.
//!
//! | kind | command | reply |
//! |---|---|---|
//! | both | `skip` | `OK` |
//! | playlist | `reload` | `OK` |
//! | playlist | `uri [<uri>]` | current uri, or `OK` after setting it |
//! | playlist | `next` | prefetched ids |
//! | queue | `push <uri>` | new item id |
//! | queue | `queue` | prefetched then pending ids |
//!
//! `help` and `list` are global. Failures are replied as `ERROR: <message>`.

pub mod commands;
pub mod errors;
pub mod registry;

pub use commands::{Command, CommandHelp, Controllable, InstanceKind, OK};
pub use errors::{ControlError, Result};
pub use registry::ControlRegistry;

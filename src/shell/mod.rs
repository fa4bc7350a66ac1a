//! Line-oriented shell over a mirror
//!
//! Commands are parsed one per line, executed against a
//! [`KeyValueMirror`](crate::mirror::KeyValueMirror) and answered with a
//! text [`Reply`].

pub mod command;
pub mod reply;
pub mod repl;

pub use command::Command;
pub use reply::Reply;
pub use repl::run;

//! Terminal-free shell core: input, session, lock patterns, windows and the
//! library feed. Nothing in here touches the filesystem or the screen.

pub mod feed;
pub mod host;
pub mod input;
pub mod menu;
pub mod pattern;
pub mod profile;
pub mod session;
pub mod shell;
pub mod window;

pub use host::Host;
pub use session::{Outcome, SessionPhase};
pub use shell::{Shell, ShellConfig};

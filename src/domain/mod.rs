//! Domain types shared by the codec, registry, coordinator and UI projection.

pub mod breakpoint;
pub mod change;
pub mod commit;
pub mod event;
pub mod run;

pub use breakpoint::Breakpoint;
pub use change::{Change, ChangeKind};
pub use commit::Commit;
pub use event::{Event, EventKind};
pub use run::Run;

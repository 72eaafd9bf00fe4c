//! Infrastructure Layer
//!
//! Background loops (checker dispatch, cleanup, source refresh) and the
//! shutdown coordinator.

pub mod checker;
pub mod refresher;
pub mod scheduler;
pub mod shutdown;
pub mod sweeper;

pub use checker::{CheckerConfig, HttpProber};
pub use refresher::{RefresherConfig, SourceRefresher};
pub use scheduler::{CheckScheduler, SchedulerConfig};
pub use shutdown::{shutdown_signal, ShutdownController};
pub use sweeper::{CleanupSweeper, SweeperConfig};

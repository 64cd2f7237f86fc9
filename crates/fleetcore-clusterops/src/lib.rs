//! Resize arithmetic, batch wave planning and victim selection shared by the
//! `CLUSTER_RESIZE`/`CLUSTER_SCALE_IN`/`CLUSTER_SCALE_OUT` action bodies.
//!
//! Pure functions only: no store access, no locks, no async. The engine
//! crate calls into these while building child actions.
mod batching;
mod resize;
mod victims;

pub use self::batching::pause_between_waves;
pub use self::batching::plan_waves;
pub use self::batching::Wave;
pub use self::resize::resize;
pub use self::resize::AdjustmentType;
pub use self::resize::ResizeOutcome;
pub use self::resize::ResizeRequest;
pub use self::victims::select_victims;

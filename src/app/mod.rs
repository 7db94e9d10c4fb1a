//! Binary-only plumbing: the run itself, terminal setup, progress and the
//! completion banner.

pub(crate) mod banner;
pub(crate) mod progress;
pub(crate) mod runtime;
pub(crate) mod terminal;

//! Collectors gather raw observations from the host or from input files.
//! They never classify: rule evaluation happens afterwards, so a collector
//! failure can degrade to an empty section instead of aborting the run.

pub mod email;
pub mod filesystem;
pub mod hardening;
pub mod logcheck;

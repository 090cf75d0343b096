//! Extract numeric fields from fixed lines of benchmark logs, average them
//! per log, and report one series of means per experiment.

pub mod averager;
pub mod collect;
pub mod config;
pub mod report;
pub mod template;

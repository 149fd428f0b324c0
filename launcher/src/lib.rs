//! Launch management for the `actkbd` keyboard daemon: an application log,
//! duplicate-instance detection, device listing, command construction and
//! login auto-start.

pub mod config;
pub mod controller;
pub mod device_list;
pub mod error;
pub mod options;
pub mod paths;
pub mod process_finder;
pub mod ring_log;
pub mod runner;
pub mod startup;
pub mod status;

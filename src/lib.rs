pub mod calibration;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod estimate;
pub mod events;
pub mod gauge;
pub mod history;
pub mod monitor;
pub mod output;
pub mod sample;
pub mod source;
pub mod status;
pub mod sysfs;

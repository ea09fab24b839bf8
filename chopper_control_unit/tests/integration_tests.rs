//! Integration tests for the Chopper Control Unit.
//!
//! These exercise several modules together: the real watchdog thread against
//! live drives, servo retargeting over many ticks, property checks across
//! every drive model, and the control loop built from the shipped
//! configuration file.

mod integration;

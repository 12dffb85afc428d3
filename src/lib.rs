//! guardpost library — portable intrusion alarm controller core.
//!
//! The controller polls contact switches, PIR detectors, temperature probes
//! and IR/RF receivers, and talks to a companion wireless module over a
//! byte-oriented slave bus. This crate holds the sensor monitoring engine,
//! the bus command protocol and the alarm handling with no platform
//! dependencies, testable on any host with `cargo test`. The firmware binary
//! (`firmware-std/`) is a thin consumer that provides pins, the bus driver and
//! the siren.
//!
//! Modules:
//! - `sensor`, `registry`: per-sensor evaluation and the indexed registry.
//! - `flags`, `queue`, `protocol`, `comm`, `shared`: guard flags, text queues,
//!   the wire format and the controller context both execution contexts share.
//! - `alarm`: what a confirmed trigger does.
//! - `board`, `defaults`: compile-time configuration.
//!
//! `no_std`, no allocator.

#![cfg_attr(not(test), no_std)]

pub mod alarm;
pub mod board;
pub mod comm;
pub mod defaults;
pub mod flags;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod sensor;
pub mod shared;

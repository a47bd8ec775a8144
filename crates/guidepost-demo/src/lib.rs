#![forbid(unsafe_code)]

//! Guidepost walkthrough demo.
//!
//! Runs a tour against the in-memory harness page the way a host
//! application would: forwarding renderer events, advancing time in ticks,
//! and acting as a user who reads each step and presses next.

pub mod cli;
pub mod walkthrough;

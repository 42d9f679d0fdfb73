//! Safety module root.
//!
//! Deviation guard, standstill detection and emergency-stop recovery.

pub mod guard;
pub mod recovery;
pub mod standstill;

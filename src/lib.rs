//! Ship Sync - state synchronization and hit detection for multiplayer space combat
//!
//! The authority owns every object and decides hits; clients mirror it
//! from snapshots while predicting their own ship locally.

pub mod config;
pub mod control;
pub mod game;
pub mod net;
pub mod session;
pub mod state;
pub mod util;

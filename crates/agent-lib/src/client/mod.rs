//! Local game-client control plane
//!
//! This module provides the loopback-only plane toward the running client:
//! process and lockfile discovery, the REST surface used for identity and
//! rank context, and the WebSocket event stream that surfaces end-of-game
//! signals.

mod discovery;
mod rest;
mod stream;

pub use discovery::{parse_lockfile, ClientDiscovery, ClientProbe, DiscoveryConfig, DiscoveryEvent};
pub use rest::{ClientRest, RankedQueueDto, RankedStatsDto};
pub use stream::{EventStream, StreamConfig, END_OF_GAME_URI};

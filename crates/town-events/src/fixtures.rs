//! Sample data fixtures for testing.
//!
//! This module provides ready-made test data for other crates to use.
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // town-events = { path = "../town-events", features = ["test-fixtures"] }
//!
//! use town_events::fixtures;
//!
//! let profiles = fixtures::sample_profiles();
//! ```

use crate::AgentProfile;

/// Returns sample agent profiles from the fixtures file.
///
/// Contains 3 agents:
/// - Isabella, a café owner near the town square
/// - Klaus, a student living close to Isabella (within 100 units)
/// - Maria, a painter on the far side of town
pub fn sample_profiles() -> Vec<AgentProfile> {
    let json = include_str!("../tests/fixtures/sample_agents.json");
    serde_json::from_str(json).expect("Failed to parse sample_agents.json")
}

/// Returns a specific profile by agent ID.
pub fn get_profile(agent_id: &str) -> Option<AgentProfile> {
    sample_profiles()
        .into_iter()
        .find(|p| p.id.as_str() == agent_id)
}

/// Returns Isabella's profile.
pub fn isabella() -> AgentProfile {
    get_profile("isabella").expect("Sample should contain isabella")
}

/// Returns Klaus's profile.
pub fn klaus() -> AgentProfile {
    get_profile("klaus").expect("Sample should contain klaus")
}

/// Returns Maria's profile.
pub fn maria() -> AgentProfile {
    get_profile("maria").expect("Sample should contain maria")
}

pub mod ghost;
pub mod movement;
pub mod registry;
pub mod remote;

/// Unique peer identifier, assigned by the relay per connection
pub type PeerId = u32;

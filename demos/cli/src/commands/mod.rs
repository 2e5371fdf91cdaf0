pub mod devices;
pub mod in_mix;
pub mod mute;
pub mod sink;
pub mod state;
pub mod volume;

// Core infrastructure shared by every tether module

pub mod errors;

pub use errors::{Result, TetherError};

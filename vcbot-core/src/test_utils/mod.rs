//! In-memory stand-ins for the platform seams, used by unit and integration tests.

pub mod fakes;
pub mod helpers;

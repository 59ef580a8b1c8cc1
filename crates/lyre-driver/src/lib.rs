//! Driver support: the bundled demo programs, shared between the binary
//! and the integration tests.
pub mod demos;

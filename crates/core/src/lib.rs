//! Bindless descriptor lifecycle and command-list core for a D3D12-style RHI.
//!
//! The crate is split into the adapter-scoped descriptor index allocators
//! ([`allocator`]), the device-scoped GPU-visible heap managers
//! ([`descriptor`]), and the command-list/barrier state machine ([`command`]).
//! The native graphics API is abstracted behind the object-safe traits in
//! [`platform`]; [`platform::null`] provides the headless backend used by the
//! test suites.

pub mod access;
pub mod adapter;
pub mod allocator;
pub mod barrier;
pub mod command;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod platform;
pub mod query;
pub mod queue;
pub mod residency;

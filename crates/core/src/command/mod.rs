//! Command-list lifecycle: allocators, lists and the recording context.
//!
//! A [`list::CommandList`] cycles between *open* (recording) and *closed*
//! (ready for submission). Its identity — the native object, the residency
//! set — persists across [`list::CommandList::reset`]; its per-recording
//! [`list::LocalQueries`] state does not. [`context::CommandContext`] couples
//! a list with its bindless heap assignment and the barrier batcher.

pub mod allocator;
pub mod context;
pub mod list;

pub use allocator::CommandAllocator;
pub use context::CommandContext;
pub use list::{CommandList, LocalQueries};

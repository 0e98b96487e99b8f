//! Interface to the resource-barrier batching collaborator.
//!
//! The batcher owns coalescing and native barrier emission; this core only
//! guarantees that every transition is handed to it and that the transitioned
//! resource is registered for residency at the point the barrier is recorded.

use crate::access::Access;
use crate::platform::PlatformCommandList;
use crate::residency::Resource;
use std::sync::Arc;

/// All subresources of a resource.
pub const ALL_SUBRESOURCES: u32 = u32::MAX;

pub trait BarrierBatcher: Send {
	/// Queues one state transition. `resource` is `None` for global
	/// (resource-independent) barriers.
	fn add_transition(&mut self, resource: Option<&Arc<Resource>>, before: Access, after: Access, subresource: u32);

	/// Coalesces and records everything queued so far into the native list.
	fn flush(&mut self, list: &mut dyn PlatformCommandList);
}

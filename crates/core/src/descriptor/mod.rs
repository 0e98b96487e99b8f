//! Bindless descriptor management.
//!
//! [`allocator::BindlessDescriptorAllocator`] is adapter-scoped: one index
//! space shared by every GPU in the group. [`resource_manager`] and
//! [`sampler_manager`] are device-scoped and own the GPU-visible heaps bound
//! during rendering; [`manager::BindlessDescriptorManager`] composes them
//! behind a single per-device facade.

pub mod allocator;
pub mod handle;
pub mod manager;
pub mod moving_max;
pub mod resource_manager;
pub mod sampler_manager;

pub use handle::{DescriptorAllocation, DescriptorData, DescriptorHandle, DescriptorType, DescriptorTypeMask};

use parking_lot::{Mutex, MutexGuard};

/// Critical section shared by every device on an adapter, held whenever
/// active/pooled GPU heap lists are mutated or walked, and while the shared
/// index space is resized. Always acquired before any per-manager state lock.
#[derive(Default)]
pub struct HeapsCriticalSection {
	lock: Mutex<()>,
}

impl HeapsCriticalSection {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn lock(&self) -> HeapsGuard<'_> {
		HeapsGuard(self.lock.lock())
	}
}

/// Proof that the adapter-wide heaps critical section is held. Functions that
/// require the section take one of these instead of locking again.
pub struct HeapsGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

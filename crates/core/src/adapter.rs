//! Adapter-level context: everything shared by the GPUs of one group.
//!
//! All cross-device state — the configuration, the heaps critical section
//! and the canonical index allocator — is constructed here once and handed
//! down by reference. There are no hidden globals; whatever needs shared
//! state receives it from the adapter at initialization.

use crate::config::BindlessConfig;
use crate::descriptor::allocator::BindlessDescriptorAllocator;
use crate::descriptor::HeapsCriticalSection;
use crate::device::Device;
use crate::platform::PlatformDevice;
use static_assertions::assert_impl_all;
use std::sync::Arc;

pub struct Adapter {
	allocator: Arc<BindlessDescriptorAllocator>,
}

assert_impl_all!(Adapter: Send, Sync);

impl Adapter {
	pub fn new(config: BindlessConfig) -> Arc<Self> {
		config.validate();
		let heaps_cs = Arc::new(HeapsCriticalSection::new());
		Arc::new(Self {
			allocator: BindlessDescriptorAllocator::new(config, heaps_cs),
		})
	}

	#[inline]
	pub fn config(&self) -> &BindlessConfig {
		self.allocator.config()
	}

	#[inline]
	pub fn descriptor_allocator(&self) -> &Arc<BindlessDescriptorAllocator> {
		&self.allocator
	}

	/// Brings up one GPU of the group. Every device shares this adapter's
	/// index allocator and critical section; the GPUs are fully symmetric,
	/// distinguished only by their index.
	pub fn create_device(&self, gpu_index: u32, platform: Arc<dyn PlatformDevice>) -> Arc<Device> {
		Device::new(gpu_index, platform, self.allocator.clone())
	}
}

impl Drop for Adapter {
	fn drop(&mut self) {
		// teardown happens after all owners returned their handles
		if !std::thread::panicking() {
			self.allocator.assert_no_outstanding_allocations();
		}
	}
}

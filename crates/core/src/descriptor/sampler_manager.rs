//! Device-scoped sampler heap management.
//!
//! Samplers change far less often than resource views, so there is no
//! per-context renaming here: one shader-visible heap, written once per
//! descriptor, bound directly by any context that asks for it.

use crate::descriptor::allocator::BindlessDescriptorAllocator;
use crate::descriptor::handle::{DescriptorData, DescriptorHandle, DescriptorType};
use crate::platform::{verify, DescriptorHeapKind, PlatformDescriptorHeap, PlatformDevice};
use std::sync::Arc;

/// The single shader-visible sampler heap of one device.
pub struct SamplerHeap {
	native: Box<dyn PlatformDescriptorHeap>,
}

impl SamplerHeap {
	#[inline]
	pub fn native(&self) -> &dyn PlatformDescriptorHeap {
		self.native.as_ref()
	}

	#[inline]
	pub fn capacity(&self) -> u32 {
		self.native.capacity()
	}
}

pub struct BindlessSamplerManager {
	gpu_index: u32,
	device: Arc<dyn PlatformDevice>,
	heap: Arc<SamplerHeap>,
}

impl BindlessSamplerManager {
	pub fn new(gpu_index: u32, device: Arc<dyn PlatformDevice>, allocator: &BindlessDescriptorAllocator) -> Self {
		let native = verify(
			device.create_descriptor_heap(DescriptorHeapKind::Sampler, allocator.sampler_capacity(), true),
			"bindless sampler heap creation",
		);
		Self {
			gpu_index,
			device,
			heap: Arc::new(SamplerHeap { native }),
		}
	}

	#[inline]
	pub fn gpu_index(&self) -> u32 {
		self.gpu_index
	}

	/// The heap a context binds when it wants bindless sampler access.
	pub fn explicit_heap_for_context(&self) -> &Arc<SamplerHeap> {
		&self.heap
	}

	/// Writes a sampler descriptor. Sampler slots are written exactly once,
	/// when the owning sampler object is created.
	pub fn initialize_descriptor(&self, handle: DescriptorHandle, data: &DescriptorData) {
		assert_eq!(
			handle.descriptor_type(),
			DescriptorType::Sampler,
			"{:?} descriptors do not live in the sampler heap",
			handle.descriptor_type()
		);
		assert!(handle.is_valid(), "initialization of an invalid descriptor handle");
		assert!(handle.index() < self.heap.capacity(), "sampler index out of heap bounds");
		self.device.write_descriptor(self.heap.native(), handle.index(), data);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::BindlessConfig;
	use crate::descriptor::HeapsCriticalSection;
	use crate::platform::null::{NullDescriptorHeap, NullDevice};

	fn sampler_setup() -> (Arc<BindlessDescriptorAllocator>, BindlessSamplerManager) {
		let device = NullDevice::new();
		let allocator = BindlessDescriptorAllocator::new(
			BindlessConfig {
				resources_enabled: false,
				sampler_heap_size: 8,
				..BindlessConfig::default()
			},
			Arc::new(HeapsCriticalSection::new()),
		);
		let manager = BindlessSamplerManager::new(0, device, &allocator);
		(allocator, manager)
	}

	#[test]
	fn initialize_writes_into_the_explicit_heap() {
		let (allocator, manager) = sampler_setup();
		let handle = allocator.allocate_descriptor(DescriptorType::Sampler).unwrap();
		manager.initialize_descriptor(handle, &DescriptorData([3, 1, 0, 0]));

		let written = manager
			.explicit_heap_for_context()
			.native()
			.as_any()
			.downcast_ref::<NullDescriptorHeap>()
			.unwrap()
			.read(handle.index());
		assert_eq!(written, DescriptorData([3, 1, 0, 0]));
		allocator.free_descriptor(handle);
	}

	#[test]
	#[should_panic(expected = "do not live in the sampler heap")]
	fn resource_handle_rejected() {
		let (_allocator, manager) = sampler_setup();
		manager.initialize_descriptor(
			DescriptorHandle::new(DescriptorType::ShaderResource, 0),
			&DescriptorData::ZERO,
		);
	}
}

//! Adapter-scoped bindless index allocation.
//!
//! One [`BindlessDescriptorAllocator`] serves every GPU in a multi-GPU group:
//! each device keeps its own physical heaps, but allocation decisions are
//! made once here so a descriptor index is valid on all GPUs simultaneously.

use crate::allocator::HeapDescriptorAllocator;
use crate::config::BindlessConfig;
use crate::descriptor::handle::{DescriptorAllocation, DescriptorHandle, DescriptorType, DescriptorTypeMask};
use crate::descriptor::{HeapsCriticalSection, HeapsGuard};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Device-scope observer of resource index-space growth. Implemented by the
/// per-device resource managers, which mirror the canonical CPU staging heap.
pub trait ResourceHeapGrower: Send + Sync {
	/// Grows the device's CPU staging heap to match the resized index space.
	/// Called with the heaps critical section held.
	fn grow_cpu_heap(&self, cs: &HeapsGuard<'_>, old_capacity: u32, new_capacity: u32);
}

pub struct BindlessDescriptorAllocator {
	config: BindlessConfig,
	resources: Option<HeapDescriptorAllocator>,
	samplers: Option<HeapDescriptorAllocator>,
	heaps_cs: Arc<HeapsCriticalSection>,
	growers: Mutex<Vec<Weak<dyn ResourceHeapGrower>>>,
}

impl BindlessDescriptorAllocator {
	pub fn new(config: BindlessConfig, heaps_cs: Arc<HeapsCriticalSection>) -> Arc<Self> {
		config.validate();
		let resources = config
			.resources_enabled
			.then(|| HeapDescriptorAllocator::new(DescriptorTypeMask::RESOURCES, config.initial_resource_heap_size));
		let samplers = config
			.samplers_enabled
			.then(|| HeapDescriptorAllocator::new(DescriptorTypeMask::SAMPLERS, config.sampler_heap_size));
		Arc::new(Self {
			config,
			resources,
			samplers,
			heaps_cs,
			growers: Mutex::new(Vec::new()),
		})
	}

	#[inline]
	pub fn config(&self) -> &BindlessConfig {
		&self.config
	}

	#[inline]
	pub fn heaps_cs(&self) -> &Arc<HeapsCriticalSection> {
		&self.heaps_cs
	}

	/// Union of the descriptor types this allocator can serve.
	pub fn type_mask(&self) -> DescriptorTypeMask {
		let mut mask = DescriptorTypeMask::empty();
		if self.resources.is_some() {
			mask |= DescriptorTypeMask::RESOURCES;
		}
		if self.samplers.is_some() {
			mask |= DescriptorTypeMask::SAMPLERS;
		}
		mask
	}

	#[inline]
	pub fn handles_allocation(&self, ty: DescriptorType) -> bool {
		self.type_mask().contains(ty.mask())
	}

	pub fn resource_capacity(&self) -> u32 {
		self.resources.as_ref().map_or(0, HeapDescriptorAllocator::capacity)
	}

	pub fn sampler_capacity(&self) -> u32 {
		self.samplers.as_ref().map_or(0, HeapDescriptorAllocator::capacity)
	}

	/// Registers a device-scope manager to be notified of index-space growth.
	pub fn register_grower(&self, grower: Weak<dyn ResourceHeapGrower>) {
		self.growers.lock().push(grower);
	}

	fn allocator_for(&self, ty: DescriptorType) -> &HeapDescriptorAllocator {
		let allocator = if DescriptorTypeMask::SAMPLERS.contains(ty.mask()) {
			self.samplers.as_ref()
		} else {
			self.resources.as_ref()
		};
		// reaching a disabled allocator is a caller contract violation
		allocator.unwrap_or_else(|| panic!("bindless allocation of {ty:?} is not configured"))
	}

	pub fn allocate_descriptor(&self, ty: DescriptorType) -> Option<DescriptorHandle> {
		self.allocate_descriptors(ty, 1)
			.map(|allocation| DescriptorHandle::new(ty, allocation.first_index()))
	}

	/// Allocates `count` contiguous indices, growing the resource index space
	/// when exhausted. Sampler exhaustion is returned to the caller; resource
	/// exhaustion at the configured maximum is a fatal configuration error.
	pub fn allocate_descriptors(&self, ty: DescriptorType, count: u32) -> Option<DescriptorAllocation> {
		let allocator = self.allocator_for(ty);
		if let Some(allocation) = allocator.allocate_range(ty, count) {
			return Some(allocation);
		}
		if DescriptorTypeMask::SAMPLERS.contains(ty.mask()) {
			// the sampler heap never grows
			return None;
		}
		Some(self.grow_and_allocate(ty, count))
	}

	/// Slow path: resize the resource index space and retry. The critical
	/// section keeps device-side heap copies from racing the new capacity.
	#[cold]
	fn grow_and_allocate(&self, ty: DescriptorType, count: u32) -> DescriptorAllocation {
		let cs = self.heaps_cs.lock();
		let allocator = self.allocator_for(ty);

		// a concurrent grow may already have made room
		if let Some(allocation) = allocator.allocate_range(ty, count) {
			return allocation;
		}

		let old_capacity = allocator.capacity();
		let max = self.config.max_resource_heap_size;
		assert!(
			old_capacity < max && count <= max - old_capacity,
			"bindless resource heap exhausted at its configured maximum of {max} descriptors"
		);
		let new_capacity = old_capacity.saturating_mul(2).clamp(old_capacity + count, max);
		let allocation = allocator.resize_grow_and_allocate(ty, new_capacity, count);

		let growers = self.growers.lock();
		for grower in growers.iter().filter_map(Weak::upgrade) {
			grower.grow_cpu_heap(&cs, old_capacity, new_capacity);
		}
		allocation
	}

	pub fn free_descriptor(&self, handle: DescriptorHandle) {
		if !handle.is_valid() {
			return;
		}
		self.allocator_for(handle.descriptor_type()).free(handle);
	}

	pub fn free_descriptors(&self, ty: DescriptorType, allocation: DescriptorAllocation) {
		if allocation.is_empty() {
			return;
		}
		self.allocator_for(ty).free_range(ty, allocation);
	}

	/// Bounding range of live resource descriptor indices, for binding-table
	/// bounds queries. `None` when nothing is allocated.
	pub fn allocated_resource_range(&self) -> Option<(u32, u32)> {
		self.resources.as_ref().and_then(HeapDescriptorAllocator::allocated_range)
	}

	/// Shutdown check: every handle must have been returned.
	pub fn assert_no_outstanding_allocations(&self) {
		if let Some(resources) = &self.resources {
			assert!(
				resources.allocated_range().is_none(),
				"bindless resource descriptors leaked at shutdown"
			);
		}
		if let Some(samplers) = &self.samplers {
			assert!(
				samplers.allocated_range().is_none(),
				"bindless sampler descriptors leaked at shutdown"
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex as PlMutex;

	fn allocator_with(config: BindlessConfig) -> Arc<BindlessDescriptorAllocator> {
		BindlessDescriptorAllocator::new(config, Arc::new(HeapsCriticalSection::new()))
	}

	fn small_config() -> BindlessConfig {
		BindlessConfig {
			initial_resource_heap_size: 8,
			max_resource_heap_size: 32,
			sampler_heap_size: 4,
			..BindlessConfig::default()
		}
	}

	#[test]
	fn routes_by_descriptor_type() {
		let allocator = allocator_with(small_config());
		let srv = allocator.allocate_descriptor(DescriptorType::ShaderResource).unwrap();
		let sampler = allocator.allocate_descriptor(DescriptorType::Sampler).unwrap();
		assert_eq!(srv.index(), 0);
		assert_eq!(sampler.index(), 0);
		allocator.free_descriptor(srv);
		allocator.free_descriptor(sampler);
		allocator.assert_no_outstanding_allocations();
	}

	#[test]
	fn resource_exhaustion_grows_and_notifies() {
		struct Spy(PlMutex<Vec<(u32, u32)>>);
		impl ResourceHeapGrower for Spy {
			fn grow_cpu_heap(&self, _cs: &HeapsGuard<'_>, old: u32, new: u32) {
				self.0.lock().push((old, new));
			}
		}

		let allocator = allocator_with(small_config());
		let spy = Arc::new(Spy(PlMutex::new(Vec::new())));
		allocator.register_grower(Arc::downgrade(&spy) as Weak<dyn ResourceHeapGrower>);

		let full = allocator.allocate_descriptors(DescriptorType::ShaderResource, 8).unwrap();
		let grown = allocator.allocate_descriptors(DescriptorType::ShaderResource, 4).unwrap();
		assert_eq!(grown.first_index(), 8);
		assert_eq!(allocator.resource_capacity(), 16);
		assert_eq!(spy.0.lock().as_slice(), &[(8, 16)]);

		allocator.free_descriptors(DescriptorType::ShaderResource, full);
		allocator.free_descriptors(DescriptorType::ShaderResource, grown);
	}

	#[test]
	#[should_panic(expected = "exhausted at its configured maximum")]
	fn resource_exhaustion_at_max_is_fatal() {
		let allocator = allocator_with(small_config());
		let _a = allocator.allocate_descriptors(DescriptorType::ShaderResource, 8).unwrap();
		let _b = allocator.allocate_descriptors(DescriptorType::ShaderResource, 24).unwrap();
		assert_eq!(allocator.resource_capacity(), 32);
		let _ = allocator.allocate_descriptor(DescriptorType::ShaderResource);
	}

	#[test]
	fn sampler_exhaustion_is_recoverable() {
		let allocator = allocator_with(small_config());
		let all = allocator.allocate_descriptors(DescriptorType::Sampler, 4).unwrap();
		assert!(allocator.allocate_descriptor(DescriptorType::Sampler).is_none());
		allocator.free_descriptors(DescriptorType::Sampler, all);
	}

	#[test]
	#[should_panic(expected = "is not configured")]
	fn disabled_sampler_allocation_panics() {
		let allocator = allocator_with(BindlessConfig {
			samplers_enabled: false,
			..small_config()
		});
		let _ = allocator.allocate_descriptor(DescriptorType::Sampler);
	}

	#[test]
	#[should_panic(expected = "leaked at shutdown")]
	fn shutdown_check_catches_leaks() {
		let allocator = allocator_with(small_config());
		let _leak = allocator.allocate_descriptor(DescriptorType::ShaderResource).unwrap();
		allocator.assert_no_outstanding_allocations();
	}
}

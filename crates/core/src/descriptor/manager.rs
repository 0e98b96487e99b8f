//! Per-device facade over the resource and sampler managers.
//!
//! Callers allocate, initialize, update and free descriptors through one API
//! keyed by descriptor type. The facade also owns the deferred-free queue:
//! handles whose owning resource died while command lists may still be
//! executing against the old descriptor are queued here and only returned to
//! the index allocator by the next garbage-collection sweep.

use crate::descriptor::allocator::{BindlessDescriptorAllocator, ResourceHeapGrower};
use crate::descriptor::handle::{DescriptorData, DescriptorHandle, DescriptorType, DescriptorTypeMask};
use crate::descriptor::resource_manager::{BindlessResourceManager, ContextBindlessState};
use crate::descriptor::sampler_manager::{BindlessSamplerManager, SamplerHeap};
use crate::platform::PlatformDevice;
use crossbeam_queue::SegQueue;
use static_assertions::assert_impl_all;
use std::sync::Arc;

pub struct BindlessDescriptorManager {
	allocator: Arc<BindlessDescriptorAllocator>,
	resources: Option<Arc<BindlessResourceManager>>,
	samplers: Option<BindlessSamplerManager>,
	deferred_free: SegQueue<DescriptorHandle>,
}

assert_impl_all!(BindlessDescriptorManager: Send, Sync);

impl BindlessDescriptorManager {
	pub fn new(gpu_index: u32, device: Arc<dyn PlatformDevice>, allocator: Arc<BindlessDescriptorAllocator>) -> Arc<Self> {
		let resources = allocator.config().resources_enabled.then(|| {
			let manager = BindlessResourceManager::new(gpu_index, device.clone(), &allocator);
			let weak = Arc::downgrade(&manager) as std::sync::Weak<dyn ResourceHeapGrower>;
			allocator.register_grower(weak);
			manager
		});
		let samplers = allocator
			.config()
			.samplers_enabled
			.then(|| BindlessSamplerManager::new(gpu_index, device.clone(), &allocator));
		Arc::new(Self {
			allocator,
			resources,
			samplers,
			deferred_free: SegQueue::new(),
		})
	}

	#[inline]
	pub fn type_mask(&self) -> DescriptorTypeMask {
		self.allocator.type_mask()
	}

	#[inline]
	pub fn handles_allocation(&self, ty: DescriptorType) -> bool {
		self.allocator.handles_allocation(ty)
	}

	#[inline]
	pub fn allocator(&self) -> &Arc<BindlessDescriptorAllocator> {
		&self.allocator
	}

	pub fn resource_manager(&self) -> Option<&Arc<BindlessResourceManager>> {
		self.resources.as_ref()
	}

	/// The sampler heap contexts bind alongside the resource heap, when
	/// samplers are bindless.
	pub fn sampler_heap(&self) -> Option<&Arc<SamplerHeap>> {
		self.samplers.as_ref().map(BindlessSamplerManager::explicit_heap_for_context)
	}

	pub fn allocate_descriptor(&self, ty: DescriptorType) -> Option<DescriptorHandle> {
		self.allocator.allocate_descriptor(ty)
	}

	/// Bounding range of live resource descriptor indices, e.g. for clamping
	/// a shader-visible binding table.
	pub fn allocated_resource_range(&self) -> Option<(u32, u32)> {
		self.allocator.allocated_resource_range()
	}

	/// First write of a freshly allocated descriptor.
	pub fn initialize_descriptor(&self, handle: DescriptorHandle, data: &DescriptorData) {
		if handle.descriptor_type() == DescriptorType::Sampler {
			self.samplers
				.as_ref()
				.unwrap_or_else(|| panic!("samplers are not bindless on this device"))
				.initialize_descriptor(handle, data);
		} else {
			self.resource_manager_for(handle).update_descriptor(handle, data);
		}
	}

	/// Rewrite of a live resource descriptor (view recreation). Sampler
	/// descriptors are write-once and cannot be updated.
	pub fn update_descriptor(&self, handle: DescriptorHandle, data: &DescriptorData) {
		assert_ne!(
			handle.descriptor_type(),
			DescriptorType::Sampler,
			"sampler descriptors are write-once"
		);
		self.resource_manager_for(handle).update_descriptor(handle, data);
	}

	fn resource_manager_for(&self, handle: DescriptorHandle) -> &BindlessResourceManager {
		self.resources
			.as_ref()
			.unwrap_or_else(|| panic!("{:?} descriptors are not bindless on this device", handle.descriptor_type()))
	}

	/// Returns the handle to the index allocator immediately.
	///
	/// Only safe when the caller guarantees no in-flight command list can
	/// still reference the handle, e.g. after a full GPU flush. When in doubt
	/// use [`Self::free_deferred`].
	pub fn free_now(&self, handle: DescriptorHandle) {
		self.allocator.free_descriptor(handle);
	}

	/// Queues the handle for release by the next [`Self::garbage_collect`]
	/// sweep. Always safe: the slot stays allocated (and the descriptor
	/// readable by executing command lists) until the sweep runs.
	///
	/// This is the path resource destructors take, since the owner being
	/// destroyed says nothing about what the GPU is still reading.
	pub fn free_deferred(&self, handle: DescriptorHandle) {
		if handle.is_valid() {
			self.deferred_free.push(handle);
		}
	}

	/// One garbage-collection sweep: releases deferred frees and retires GPU
	/// heaps no in-flight context references.
	pub fn garbage_collect(&self) {
		while let Some(handle) = self.deferred_free.pop() {
			self.allocator.free_descriptor(handle);
		}
		if let Some(resources) = &self.resources {
			resources.garbage_collect();
		}
	}

	// Context bracket, forwarded to the resource manager when resources are
	// bindless; trivial otherwise.

	pub fn open_command_list(&self, context: &mut ContextBindlessState) {
		if let Some(resources) = &self.resources {
			resources.open_command_list(context);
		}
	}

	pub fn close_command_list(&self, context: &mut ContextBindlessState) {
		if let Some(resources) = &self.resources {
			resources.close_command_list(context);
		}
	}

	pub fn finalize_context(&self, context: ContextBindlessState) {
		if let Some(resources) = &self.resources {
			resources.finalize_context(context);
		}
	}

	pub fn flush_pending_descriptor_updates(&self, context: &mut ContextBindlessState) {
		if let Some(resources) = &self.resources {
			resources.flush_pending_descriptor_updates(context);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::BindlessConfig;
	use crate::descriptor::HeapsCriticalSection;
	use crate::platform::null::NullDevice;
	use std::panic::{catch_unwind, AssertUnwindSafe};

	fn manager_with(config: BindlessConfig) -> Arc<BindlessDescriptorManager> {
		let device = NullDevice::new();
		let allocator = BindlessDescriptorAllocator::new(config, Arc::new(HeapsCriticalSection::new()));
		BindlessDescriptorManager::new(0, device, allocator)
	}

	fn small_config() -> BindlessConfig {
		BindlessConfig {
			initial_resource_heap_size: 16,
			max_resource_heap_size: 64,
			sampler_heap_size: 8,
			..BindlessConfig::default()
		}
	}

	#[test]
	fn sampler_allocation_never_touches_resource_store() {
		let manager = manager_with(BindlessConfig {
			samplers_enabled: false,
			..small_config()
		});
		assert!(!manager.handles_allocation(DescriptorType::Sampler));
		assert!(manager.handles_allocation(DescriptorType::ShaderResource));

		let result = catch_unwind(AssertUnwindSafe(|| manager.allocate_descriptor(DescriptorType::Sampler)));
		assert!(result.is_err(), "sampler allocation must not be silently misrouted");
		// the resource backing store saw no allocation
		assert_eq!(manager.allocator().allocated_resource_range(), None);
	}

	#[test]
	fn deferred_free_waits_for_gc() {
		let manager = manager_with(small_config());
		let handle = manager.allocate_descriptor(DescriptorType::ShaderResource).unwrap();
		manager.free_deferred(handle);

		// still allocated until the sweep
		assert_eq!(manager.allocator().allocated_resource_range(), Some((handle.index(), handle.index())));
		manager.garbage_collect();
		assert_eq!(manager.allocator().allocated_resource_range(), None);
	}

	#[test]
	fn immediate_free_returns_the_slot_at_once() {
		let manager = manager_with(small_config());
		let handle = manager.allocate_descriptor(DescriptorType::ShaderResource).unwrap();
		manager.free_now(handle);
		assert_eq!(manager.allocator().allocated_resource_range(), None);
	}

	#[test]
	fn type_mask_reflects_configuration() {
		let manager = manager_with(small_config());
		assert_eq!(
			manager.type_mask(),
			DescriptorTypeMask::RESOURCES | DescriptorTypeMask::SAMPLERS
		);

		let resources_only = manager_with(BindlessConfig {
			samplers_enabled: false,
			..small_config()
		});
		assert_eq!(resources_only.type_mask(), DescriptorTypeMask::RESOURCES);
	}

	#[test]
	fn initialize_routes_by_type() {
		let manager = manager_with(small_config());
		let srv = manager.allocate_descriptor(DescriptorType::ShaderResource).unwrap();
		let sampler = manager.allocate_descriptor(DescriptorType::Sampler).unwrap();
		manager.initialize_descriptor(srv, &DescriptorData([1, 0, 0, 0]));
		manager.initialize_descriptor(sampler, &DescriptorData([2, 0, 0, 0]));
		manager.free_now(srv);
		manager.free_now(sampler);
	}
}

//! In-memory backend implementing every platform trait.
//!
//! Descriptor heaps are plain vectors, command lists and allocators are state
//! tags, and every entry point bumps a counter on the shared [`NullCounters`]
//! so callers can assert exactly which native calls a code path performed.
//! This is the backend the test suites drive; it is also usable as a headless
//! validation device.

use crate::access::Access;
use crate::barrier::BarrierBatcher;
use crate::descriptor::handle::DescriptorData;
use crate::platform::{
	DescriptorHeapKind, PlatformCommandAllocator, PlatformCommandList, PlatformDescriptorHeap, PlatformDevice,
	PlatformError, PlatformQueryHeap, PlatformResult,
};
use crate::query::QueryKind;
use crate::queue::QueueType;
use crate::residency::Resource;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering::Relaxed};
use std::sync::Arc;

#[derive(Default)]
pub struct NullCounters {
	pub heaps_created: AtomicU32,
	pub descriptor_writes: AtomicU64,
	/// Total descriptors copied, not copy calls.
	pub descriptors_copied: AtomicU64,
	pub copy_calls: AtomicU64,
	pub allocators_created: AtomicU32,
	pub lists_created: AtomicU32,
	pub query_heaps_created: AtomicU32,
	pub queries_begun: AtomicU64,
	pub queries_ended: AtomicU64,
	pub heap_bindings: AtomicU64,
}

pub struct NullDevice {
	counters: Arc<NullCounters>,
}

impl NullDevice {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			counters: Arc::new(NullCounters::default()),
		})
	}

	pub fn counters(&self) -> &Arc<NullCounters> {
		&self.counters
	}
}

pub struct NullDescriptorHeap {
	kind: DescriptorHeapKind,
	shader_visible: bool,
	data: Mutex<Vec<DescriptorData>>,
}

impl NullDescriptorHeap {
	/// Snapshot of one slot, for test assertions.
	pub fn read(&self, index: u32) -> DescriptorData {
		self.data.lock()[index as usize]
	}
}

impl PlatformDescriptorHeap for NullDescriptorHeap {
	fn kind(&self) -> DescriptorHeapKind {
		self.kind
	}

	fn capacity(&self) -> u32 {
		self.data.lock().len() as u32
	}

	fn is_shader_visible(&self) -> bool {
		self.shader_visible
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

fn downcast_heap(heap: &dyn PlatformDescriptorHeap) -> &NullDescriptorHeap {
	heap.as_any()
		.downcast_ref::<NullDescriptorHeap>()
		.expect("descriptor heap was not created by this device")
}

pub struct NullCommandAllocator {
	queue: QueueType,
	pub resets: u32,
}

impl PlatformCommandAllocator for NullCommandAllocator {
	fn reset(&mut self) -> PlatformResult<()> {
		self.resets += 1;
		Ok(())
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

/// One recorded query event: kind, heap slot and whether it was a begin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueryEvent {
	pub kind: QueryKind,
	pub index: u32,
	pub begin: bool,
}

pub struct NullCommandList {
	queue: QueueType,
	recording: bool,
	counters: Arc<NullCounters>,
	pub query_events: Vec<QueryEvent>,
	pub resets: u32,
	pub closes: u32,
}

impl NullCommandList {
	pub fn is_recording(&self) -> bool {
		self.recording
	}
}

impl PlatformCommandList for NullCommandList {
	fn reset(&mut self, allocator: &mut dyn PlatformCommandAllocator) -> PlatformResult<()> {
		if self.recording {
			return Err(PlatformError::InvalidCall("reset of a recording command list"));
		}
		let allocator = allocator
			.as_any()
			.downcast_ref::<NullCommandAllocator>()
			.expect("command allocator was not created by this device");
		if allocator.queue != self.queue {
			return Err(PlatformError::InvalidCall("allocator queue type mismatch"));
		}
		self.recording = true;
		self.resets += 1;
		self.query_events.clear();
		Ok(())
	}

	fn close(&mut self) -> PlatformResult<()> {
		if !self.recording {
			return Err(PlatformError::InvalidCall("close of a non-recording command list"));
		}
		self.recording = false;
		self.closes += 1;
		Ok(())
	}

	fn begin_query(&mut self, heap: &dyn PlatformQueryHeap, kind: QueryKind, index: u32) {
		assert!(self.recording, "query recorded outside of an open command list");
		assert_eq!(heap.kind(), kind, "query heap type mismatch");
		self.counters.queries_begun.fetch_add(1, Relaxed);
		self.query_events.push(QueryEvent { kind, index, begin: true });
	}

	fn end_query(&mut self, heap: &dyn PlatformQueryHeap, kind: QueryKind, index: u32) {
		assert!(self.recording, "query recorded outside of an open command list");
		assert_eq!(heap.kind(), kind, "query heap type mismatch");
		self.counters.queries_ended.fetch_add(1, Relaxed);
		self.query_events.push(QueryEvent { kind, index, begin: false });
	}

	fn set_descriptor_heaps(
		&mut self,
		_resource_heap: Option<&dyn PlatformDescriptorHeap>,
		_sampler_heap: Option<&dyn PlatformDescriptorHeap>,
	) {
		self.counters.heap_bindings.fetch_add(1, Relaxed);
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

pub struct NullQueryHeap {
	kind: QueryKind,
	capacity: u32,
}

impl PlatformQueryHeap for NullQueryHeap {
	fn kind(&self) -> QueryKind {
		self.kind
	}

	fn capacity(&self) -> u32 {
		self.capacity
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

impl PlatformDevice for NullDevice {
	fn create_descriptor_heap(
		&self,
		kind: DescriptorHeapKind,
		capacity: u32,
		shader_visible: bool,
	) -> PlatformResult<Box<dyn PlatformDescriptorHeap>> {
		if capacity == 0 {
			return Err(PlatformError::CreationFailed("zero-capacity descriptor heap"));
		}
		self.counters.heaps_created.fetch_add(1, Relaxed);
		Ok(Box::new(NullDescriptorHeap {
			kind,
			shader_visible,
			data: Mutex::new(vec![DescriptorData::ZERO; capacity as usize]),
		}))
	}

	fn write_descriptor(&self, heap: &dyn PlatformDescriptorHeap, index: u32, data: &DescriptorData) {
		let heap = downcast_heap(heap);
		self.counters.descriptor_writes.fetch_add(1, Relaxed);
		heap.data.lock()[index as usize] = *data;
	}

	fn copy_descriptors(
		&self,
		dst: &dyn PlatformDescriptorHeap,
		dst_first: u32,
		src: &dyn PlatformDescriptorHeap,
		src_first: u32,
		count: u32,
	) {
		let dst = downcast_heap(dst);
		let src = downcast_heap(src);
		assert_eq!(dst.kind, src.kind, "descriptor copy across heap kinds");
		self.counters.copy_calls.fetch_add(1, Relaxed);
		self.counters.descriptors_copied.fetch_add(count as u64, Relaxed);
		if count == 0 {
			return;
		}
		let src_data = src.data.lock()[src_first as usize..(src_first + count) as usize].to_vec();
		dst.data.lock()[dst_first as usize..(dst_first + count) as usize].copy_from_slice(&src_data);
	}

	fn create_command_allocator(&self, queue: QueueType) -> PlatformResult<Box<dyn PlatformCommandAllocator>> {
		self.counters.allocators_created.fetch_add(1, Relaxed);
		Ok(Box::new(NullCommandAllocator { queue, resets: 0 }))
	}

	fn create_command_list(
		&self,
		allocator: &mut dyn PlatformCommandAllocator,
		queue: QueueType,
	) -> PlatformResult<Box<dyn PlatformCommandList>> {
		let null_allocator = allocator
			.as_any()
			.downcast_ref::<NullCommandAllocator>()
			.expect("command allocator was not created by this device");
		if null_allocator.queue != queue {
			return Err(PlatformError::InvalidCall("allocator queue type mismatch"));
		}
		self.counters.lists_created.fetch_add(1, Relaxed);
		Ok(Box::new(NullCommandList {
			queue,
			// native lists are created in the open state
			recording: true,
			counters: self.counters.clone(),
			query_events: Vec::new(),
			resets: 0,
			closes: 0,
		}))
	}

	fn create_query_heap(&self, kind: QueryKind, capacity: u32) -> PlatformResult<Box<dyn PlatformQueryHeap>> {
		if capacity == 0 {
			return Err(PlatformError::CreationFailed("zero-capacity query heap"));
		}
		self.counters.query_heaps_created.fetch_add(1, Relaxed);
		Ok(Box::new(NullQueryHeap { kind, capacity }))
	}
}

/// One transition handed to the batcher, for test assertions.
pub struct RecordedTransition {
	pub resource: Option<Arc<Resource>>,
	pub before: Access,
	pub after: Access,
	pub subresource: u32,
}

/// Barrier-batcher collaborator that records transitions instead of
/// coalescing them into native barriers.
#[derive(Default)]
pub struct NullBarrierBatcher {
	pub transitions: Vec<RecordedTransition>,
	pub flushes: u32,
}

impl BarrierBatcher for NullBarrierBatcher {
	fn add_transition(&mut self, resource: Option<&Arc<Resource>>, before: Access, after: Access, subresource: u32) {
		self.transitions.push(RecordedTransition {
			resource: resource.cloned(),
			before,
			after,
			subresource,
		});
	}

	fn flush(&mut self, _list: &mut dyn PlatformCommandList) {
		self.flushes += 1;
		self.transitions.clear();
	}
}

//! Device-scoped management of the GPU-visible resource descriptor heaps.
//!
//! One manager per device keeps a set of shader-visible heaps mirroring the
//! canonical CPU staging heap, so that every open command-list context sees a
//! complete, consistent snapshot of the bindless table while updates keep
//! accumulating. Heaps move through three states: *active* (assignable to
//! contexts, receiving pending updates), *not in use* (still active but
//! unassigned), and *pooled* (recyclable, refreshed in full on reactivation).

use crate::config::HeapGrowthPolicy;
use crate::descriptor::allocator::{BindlessDescriptorAllocator, ResourceHeapGrower};
use crate::descriptor::handle::{DescriptorData, DescriptorHandle, DescriptorTypeMask};
use crate::descriptor::{HeapsCriticalSection, HeapsGuard};
use crate::descriptor::moving_max::MovingWindowMax;
use crate::platform::{verify, DescriptorHeapKind, PlatformDescriptorHeap, PlatformDevice};
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use rangemap::RangeSet;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::Arc;

/// One shader-visible heap, shared with the contexts it is assigned to.
pub struct GpuHeap {
	inner: Mutex<GpuHeapInner>,
}

struct GpuHeapInner {
	heap: Box<dyn PlatformDescriptorHeap>,
	/// Descriptor slots updated in the CPU heap since this heap's last flush,
	/// coalesced into copy ranges.
	pending_updates: RangeSet<u32>,
	in_use: bool,
	last_used_gc_cycle: u64,
	/// CPU-heap resize generation this heap last mirrored. A mismatch forces
	/// a full refresh instead of the incremental update list.
	refresh_generation: u64,
}

impl GpuHeap {
	/// Runs `f` with the native heap object, e.g. to bind it on a list.
	pub fn with_native<R>(&self, f: impl FnOnce(&dyn PlatformDescriptorHeap) -> R) -> R {
		f(self.inner.lock().heap.as_ref())
	}

	pub fn is_in_use(&self) -> bool {
		self.inner.lock().in_use
	}

	pub fn capacity(&self) -> u32 {
		self.inner.lock().heap.capacity()
	}
}

/// Per-context scratch: the GPU heap currently assigned to the context and
/// whether it still owes a full-table refresh.
#[derive(Default)]
pub struct ContextBindlessState {
	heap: Option<Arc<GpuHeap>>,
	refresh_requested: bool,
}

impl ContextBindlessState {
	pub fn new() -> Self {
		Self::default()
	}

	#[inline]
	pub fn current_heap(&self) -> Option<&Arc<GpuHeap>> {
		self.heap.as_ref()
	}

	#[inline]
	pub fn has_refresh_pending(&self) -> bool {
		self.refresh_requested
	}
}

impl Drop for ContextBindlessState {
	fn drop(&mut self) {
		debug_assert!(!self.refresh_requested, "context state destroyed with a bindless refresh pending");
	}
}

struct ManagerState {
	/// Canonical CPU staging heap; the single source of truth every GPU heap
	/// mirrors.
	cpu_heap: Box<dyn PlatformDescriptorHeap>,
	active: Vec<Arc<GpuHeap>>,
	pooled: Vec<Arc<GpuHeap>>,
	in_use_heaps: u32,
	load: MovingWindowMax,
	request_new_active_heap: bool,
	/// Bumped on every CPU-heap resize; compared against each heap's
	/// `refresh_generation`.
	resize_generation: u64,
}

pub struct BindlessResourceManager {
	gpu_index: u32,
	device: Arc<dyn PlatformDevice>,
	heaps_cs: Arc<HeapsCriticalSection>,
	growth: HeapGrowthPolicy,
	gc_grace_cycles: u64,
	pooled_retirement_cycles: u64,
	/// Monotonic garbage-collection cycle, read by open/close from other
	/// submission threads.
	gc_cycle: CachePadded<AtomicU64>,
	state: Mutex<ManagerState>,
}

impl BindlessResourceManager {
	pub fn new(gpu_index: u32, device: Arc<dyn PlatformDevice>, allocator: &BindlessDescriptorAllocator) -> Arc<Self> {
		let config = allocator.config();
		let cpu_heap = verify(
			device.create_descriptor_heap(DescriptorHeapKind::Resource, allocator.resource_capacity(), false),
			"bindless CPU staging heap creation",
		);
		Arc::new(Self {
			gpu_index,
			device,
			heaps_cs: allocator.heaps_cs().clone(),
			growth: config.growth,
			gc_grace_cycles: config.gc_grace_cycles,
			pooled_retirement_cycles: config.pooled_heap_retirement_cycles,
			gc_cycle: CachePadded::new(AtomicU64::new(0)),
			state: Mutex::new(ManagerState {
				cpu_heap,
				active: Vec::new(),
				pooled: Vec::new(),
				in_use_heaps: 0,
				load: MovingWindowMax::new(config.growth.window),
				request_new_active_heap: false,
				resize_generation: 0,
			}),
		})
	}

	#[inline]
	pub fn gpu_index(&self) -> u32 {
		self.gpu_index
	}

	pub fn cpu_heap_capacity(&self) -> u32 {
		self.state.lock().cpu_heap.capacity()
	}

	pub fn active_heap_count(&self) -> usize {
		self.state.lock().active.len()
	}

	pub fn pooled_heap_count(&self) -> usize {
		self.state.lock().pooled.len()
	}

	pub fn in_use_heap_count(&self) -> u32 {
		self.state.lock().in_use_heaps
	}

	pub fn growth_requested(&self) -> bool {
		self.state.lock().request_new_active_heap
	}

	/// Opens a recording bracket: satisfies a pending heap-growth request,
	/// then assigns a GPU heap to the context and brings it up to date.
	pub fn open_command_list(&self, context: &mut ContextBindlessState) {
		let cs = self.heaps_cs.lock();
		let mut state = self.state.lock();

		if state.request_new_active_heap {
			self.add_active_gpu_heap(&cs, &mut state);
			state.request_new_active_heap = false;
		}
		self.assign_heap_to_state(&cs, &mut state, context);
		self.flush_assigned_heap(&mut state, context);
	}

	/// Closes the recording bracket opened by [`Self::open_command_list`]:
	/// releases the context's heap and feeds the load estimate.
	pub fn close_command_list(&self, context: &mut ContextBindlessState) {
		let _cs = self.heaps_cs.lock();
		let mut state = self.state.lock();

		self.finalize_heap_on_state(&mut state, context);

		// sample while this context still counts as using its heap
		let in_use = state.in_use_heaps;
		state.load.add(in_use);
		self.check_request_new_active_gpu_heap(&mut state);
		state.in_use_heaps -= 1;
	}

	/// Tears down a context's bindless scratch. The context must have closed
	/// its command list (releasing the heap) and completed any refresh.
	pub fn finalize_context(&self, context: ContextBindlessState) {
		assert!(
			context.heap.is_none(),
			"context finalized while still holding a GPU heap assignment"
		);
		assert!(!context.refresh_requested, "context finalized with a bindless refresh pending");
	}

	fn assign_heap_to_state(&self, cs: &HeapsGuard<'_>, state: &mut ManagerState, context: &mut ContextBindlessState) {
		assert!(context.heap.is_none(), "context already holds a GPU heap assignment");

		let cycle = self.gc_cycle.load(Relaxed);
		let available = state.active.iter().find(|heap| !heap.inner.lock().in_use).cloned();
		let heap = match available {
			Some(heap) => heap,
			None => self.add_active_gpu_heap(cs, state),
		};
		{
			let mut inner = heap.inner.lock();
			inner.in_use = true;
			inner.last_used_gc_cycle = cycle;
		}
		state.in_use_heaps += 1;
		context.heap = Some(heap);
		context.refresh_requested = false;
	}

	fn finalize_heap_on_state(&self, _state: &mut ManagerState, context: &mut ContextBindlessState) {
		let heap = context.heap.take().expect("context closed without a GPU heap assignment");
		let mut inner = heap.inner.lock();
		debug_assert!(inner.in_use, "context heap was not marked in use");
		inner.in_use = false;
		inner.last_used_gc_cycle = self.gc_cycle.load(Relaxed);
	}

	fn check_request_new_active_gpu_heap(&self, state: &mut ManagerState) {
		if state.request_new_active_heap {
			return;
		}
		if state.load.max() + self.growth.margin >= state.active.len() as u32 {
			state.request_new_active_heap = true;
		}
	}

	/// Reactivates a pooled heap or allocates a fresh one, and copies the
	/// full current CPU-heap contents into it: every active heap always
	/// carries a complete snapshot of the bindless table, never a diff.
	fn add_active_gpu_heap(&self, _cs: &HeapsGuard<'_>, state: &mut ManagerState) -> Arc<GpuHeap> {
		let heap = match state.pooled.pop() {
			Some(heap) => {
				{
					let mut inner = heap.inner.lock();
					refresh_heap(self.device.as_ref(), state.cpu_heap.as_ref(), state.resize_generation, &mut inner);
					inner.last_used_gc_cycle = self.gc_cycle.load(Relaxed);
				}
				heap
			}
			None => {
				let capacity = state.cpu_heap.capacity();
				let native = verify(
					self.device.create_descriptor_heap(DescriptorHeapKind::Resource, capacity, true),
					"bindless GPU heap creation",
				);
				self.device
					.copy_descriptors(native.as_ref(), 0, state.cpu_heap.as_ref(), 0, capacity);
				Arc::new(GpuHeap {
					inner: Mutex::new(GpuHeapInner {
						heap: native,
						pending_updates: RangeSet::new(),
						in_use: false,
						last_used_gc_cycle: self.gc_cycle.load(Relaxed),
						refresh_generation: state.resize_generation,
					}),
				})
			}
		};
		state.active.push(heap.clone());
		heap
	}

	/// Writes the descriptor into the CPU staging heap immediately and queues
	/// a deferred copy for every *active* GPU heap. Pooled heaps are excluded:
	/// they get a full refresh on reactivation instead, since diffing against
	/// a stale heap is unsound.
	pub fn update_descriptor(&self, handle: DescriptorHandle, data: &DescriptorData) {
		assert!(
			DescriptorTypeMask::RESOURCES.contains(handle.descriptor_type().mask()),
			"{:?} descriptors do not live in the resource heap",
			handle.descriptor_type()
		);
		assert!(handle.is_valid(), "update of an invalid descriptor handle");

		let _cs = self.heaps_cs.lock();
		let state = self.state.lock();
		assert!(handle.index() < state.cpu_heap.capacity(), "descriptor index out of heap bounds");
		self.device.write_descriptor(state.cpu_heap.as_ref(), handle.index(), data);
		for heap in &state.active {
			heap.inner.lock().pending_updates.insert(handle.index()..handle.index() + 1);
		}
	}

	/// Drains the update queue of the context's assigned heap, copying each
	/// updated slot from the CPU staging heap. Deferred so that many updates
	/// accumulated mid-frame are copied at most once per context activation.
	#[profiling::function]
	pub fn flush_pending_descriptor_updates(&self, context: &mut ContextBindlessState) {
		let _cs = self.heaps_cs.lock();
		let mut state = self.state.lock();
		self.flush_assigned_heap(&mut state, context);
	}

	fn flush_assigned_heap(&self, state: &mut ManagerState, context: &mut ContextBindlessState) {
		let heap = context
			.heap
			.clone()
			.expect("descriptor flush without a GPU heap assignment");
		let mut inner = heap.inner.lock();

		if inner.refresh_generation != state.resize_generation {
			// a partial copy would read past the old capacity
			context.refresh_requested = true;
		}
		if context.refresh_requested {
			refresh_heap(self.device.as_ref(), state.cpu_heap.as_ref(), state.resize_generation, &mut inner);
			context.refresh_requested = false;
			return;
		}

		let pending = mem::replace(&mut inner.pending_updates, RangeSet::new());
		for range in pending.iter() {
			self.device.copy_descriptors(
				inner.heap.as_ref(),
				range.start,
				state.cpu_heap.as_ref(),
				range.start,
				range.end - range.start,
			);
		}
	}

	/// Retires active heaps that no context used for a full grace period to
	/// the pool, and destroys pooled heaps past their retirement age.
	#[profiling::function]
	pub fn garbage_collect(&self) {
		let _cs = self.heaps_cs.lock();
		let mut state = self.state.lock();
		let cycle = self.gc_cycle.fetch_add(1, Relaxed) + 1;

		let mut index = 0;
		while index < state.active.len() {
			let retire = {
				let inner = state.active[index].inner.lock();
				!inner.in_use && inner.last_used_gc_cycle + self.gc_grace_cycles < cycle
			};
			if retire {
				let heap = state.active.remove(index);
				heap.inner.lock().last_used_gc_cycle = cycle;
				state.pooled.push(heap);
			} else {
				index += 1;
			}
		}

		let retirement = self.pooled_retirement_cycles;
		state
			.pooled
			.retain(|heap| heap.inner.lock().last_used_gc_cycle + retirement >= cycle);
	}
}

impl ResourceHeapGrower for BindlessResourceManager {
	/// Renames the CPU staging heap to the grown capacity. Every active and
	/// pooled GPU heap is marked stale and will receive a full copy of the
	/// expanded table before it is used again.
	#[profiling::function]
	fn grow_cpu_heap(&self, _cs: &HeapsGuard<'_>, old_capacity: u32, new_capacity: u32) {
		let mut state = self.state.lock();
		debug_assert_eq!(state.cpu_heap.capacity(), old_capacity, "CPU heap capacity out of sync");

		let grown = verify(
			self.device
				.create_descriptor_heap(DescriptorHeapKind::Resource, new_capacity, false),
			"bindless CPU staging heap growth",
		);
		self.device
			.copy_descriptors(grown.as_ref(), 0, state.cpu_heap.as_ref(), 0, old_capacity);
		state.cpu_heap = grown;
		state.resize_generation += 1;
	}
}

/// Brings one GPU heap fully up to date with the CPU staging heap, replacing
/// its native object if the staging heap outgrew it. Clears any queued
/// incremental updates, which the full copy subsumes.
fn refresh_heap(
	device: &dyn PlatformDevice,
	cpu_heap: &dyn PlatformDescriptorHeap,
	resize_generation: u64,
	inner: &mut GpuHeapInner,
) {
	let capacity = cpu_heap.capacity();
	if inner.heap.capacity() < capacity {
		inner.heap = verify(
			device.create_descriptor_heap(DescriptorHeapKind::Resource, capacity, true),
			"bindless GPU heap growth",
		);
	}
	device.copy_descriptors(inner.heap.as_ref(), 0, cpu_heap, 0, capacity);
	inner.pending_updates = RangeSet::new();
	inner.refresh_generation = resize_generation;
}

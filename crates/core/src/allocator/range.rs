//! Free-list allocator over a fixed-capacity descriptor index space.

use crate::descriptor::handle::DescriptorAllocation;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering::Relaxed};

/// Inclusive bounds of one free span.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct FreeRange {
	first: u32,
	last: u32,
}

impl FreeRange {
	#[inline]
	fn len(self) -> u32 {
		self.last - self.first + 1
	}
}

#[derive(Default)]
struct FreeList {
	/// Sorted by `first`, non-overlapping, never mergeable: adjacent spans
	/// are coalesced immediately on free.
	ranges: Vec<FreeRange>,
}

/// Thread-safe free-list of contiguous index ranges over `[0, capacity)`.
///
/// Out-of-space is reported as `None` and left to the caller (grow and retry,
/// or fail the surrounding operation). Freeing a span that is already free or
/// out of range is a caller bug and panics.
pub struct RangeAllocator {
	free: Mutex<FreeList>,
	capacity: AtomicU32,
}

impl RangeAllocator {
	pub fn new(capacity: u32) -> Self {
		let allocator = Self {
			free: Mutex::new(FreeList::default()),
			capacity: AtomicU32::new(0),
		};
		allocator.initialize(capacity);
		allocator
	}

	/// Resets to a single free range covering the whole capacity, discarding
	/// all bookkeeping of previous allocations.
	pub fn initialize(&self, capacity: u32) {
		let mut free = self.free.lock();
		free.ranges.clear();
		if capacity > 0 {
			free.ranges.push(FreeRange {
				first: 0,
				last: capacity - 1,
			});
		}
		self.capacity.store(capacity, Relaxed);
	}

	#[inline]
	pub fn capacity(&self) -> u32 {
		self.capacity.load(Relaxed)
	}

	/// First-fit allocation of `count` contiguous slots, preferring the
	/// lowest-address fitting range and shrinking it from its low end.
	pub fn allocate(&self, count: u32) -> Option<DescriptorAllocation> {
		if count == 0 {
			return None;
		}
		let mut free = self.free.lock();
		Self::allocate_locked(&mut free, count)
	}

	fn allocate_locked(free: &mut FreeList, count: u32) -> Option<DescriptorAllocation> {
		for index in 0..free.ranges.len() {
			let range = free.ranges[index];
			if range.len() >= count {
				let allocation = DescriptorAllocation::new(range.first, count);
				if range.len() == count {
					free.ranges.remove(index);
				} else {
					free.ranges[index].first += count;
				}
				return Some(allocation);
			}
		}
		None
	}

	/// Returns a span to the free list, coalescing with adjacent free spans.
	/// No-ops on the empty sentinel.
	pub fn free(&self, allocation: DescriptorAllocation) {
		if allocation.is_empty() {
			return;
		}
		let first = allocation.first_index();
		let last = allocation.end_index() - 1;
		assert!(
			last < self.capacity(),
			"freed range [{first}, {last}] exceeds allocator capacity {}",
			self.capacity()
		);

		let mut free = self.free.lock();
		let ranges = &mut free.ranges;

		// The list is sorted by `first`; locate the insertion point.
		let index = match ranges.binary_search_by_key(&first, |range| range.first) {
			Ok(_) => panic!("double free of descriptor range [{first}, {last}]"),
			Err(index) => index,
		};
		if index > 0 {
			let prev = ranges[index - 1];
			assert!(prev.last < first, "double free of descriptor range [{first}, {last}]");
		}
		if index < ranges.len() {
			let next = ranges[index];
			assert!(last < next.first, "double free of descriptor range [{first}, {last}]");
		}

		let merges_prev = index > 0 && ranges[index - 1].last + 1 == first;
		let merges_next = index < ranges.len() && last + 1 == ranges[index].first;
		match (merges_prev, merges_next) {
			(true, true) => {
				ranges[index - 1].last = ranges[index].last;
				ranges.remove(index);
			}
			(true, false) => ranges[index - 1].last = last,
			(false, true) => ranges[index].first = first,
			(false, false) => ranges.insert(index, FreeRange { first, last }),
		}
	}

	/// Grows the capacity and immediately serves an allocation out of the
	/// enlarged space. The grow step guarantees room, so the combined
	/// operation cannot fail.
	pub fn resize_grow_and_allocate(&self, new_capacity: u32, count: u32) -> DescriptorAllocation {
		let mut free = self.free.lock();
		let old_capacity = self.capacity();
		assert!(
			new_capacity > old_capacity,
			"resize must grow: {old_capacity} -> {new_capacity}"
		);
		assert!(count <= new_capacity - old_capacity, "grown capacity too small for allocation");

		// Extend the trailing free range over the new capacity, or open one.
		match free.ranges.last_mut() {
			Some(tail) if tail.last + 1 == old_capacity => tail.last = new_capacity - 1,
			_ => free.ranges.push(FreeRange {
				first: old_capacity,
				last: new_capacity - 1,
			}),
		}
		self.capacity.store(new_capacity, Relaxed);

		Self::allocate_locked(&mut free, count).expect("grown allocator must satisfy the allocation")
	}

	/// Bounding range of currently allocated slots, derived from the edges of
	/// the free list. `None` when the entire capacity is free.
	pub fn allocated_range(&self) -> Option<(u32, u32)> {
		let capacity = self.capacity();
		if capacity == 0 {
			return None;
		}
		let free = self.free.lock();
		let ranges = &free.ranges;
		if ranges.len() == 1 && ranges[0].first == 0 && ranges[0].last == capacity - 1 {
			return None;
		}
		let first = match ranges.first() {
			Some(range) if range.first == 0 => range.last + 1,
			_ => 0,
		};
		let last = match ranges.last() {
			Some(range) if range.last == capacity - 1 => range.first - 1,
			_ => capacity - 1,
		};
		Some((first, last))
	}
}

use crate::allocator::range::RangeAllocator;
use crate::descriptor::handle::{DescriptorAllocation, DescriptorHandle, DescriptorType, DescriptorTypeMask};

/// [`RangeAllocator`] plus the descriptor-type mask this heap serves and the
/// handle construction/validation around it.
pub struct HeapDescriptorAllocator {
	ranges: RangeAllocator,
	mask: DescriptorTypeMask,
}

impl HeapDescriptorAllocator {
	pub fn new(mask: DescriptorTypeMask, capacity: u32) -> Self {
		assert!(!mask.is_empty(), "descriptor allocator must serve at least one type");
		Self {
			ranges: RangeAllocator::new(capacity),
			mask,
		}
	}

	#[inline]
	pub fn type_mask(&self) -> DescriptorTypeMask {
		self.mask
	}

	#[inline]
	pub fn handles_allocation(&self, ty: DescriptorType) -> bool {
		self.mask.contains(ty.mask())
	}

	#[inline]
	pub fn capacity(&self) -> u32 {
		self.ranges.capacity()
	}

	pub fn allocate(&self, ty: DescriptorType) -> Option<DescriptorHandle> {
		self.allocate_range(ty, 1)
			.map(|allocation| DescriptorHandle::new(ty, allocation.first_index()))
	}

	pub fn allocate_range(&self, ty: DescriptorType, count: u32) -> Option<DescriptorAllocation> {
		assert!(self.handles_allocation(ty), "allocator does not serve {ty:?} descriptors");
		self.ranges.allocate(count)
	}

	pub fn free(&self, handle: DescriptorHandle) {
		if !handle.is_valid() {
			return;
		}
		assert!(
			self.handles_allocation(handle.descriptor_type()),
			"allocator does not serve {:?} descriptors",
			handle.descriptor_type()
		);
		self.ranges.free(DescriptorAllocation::new(handle.index(), 1));
	}

	pub fn free_range(&self, ty: DescriptorType, allocation: DescriptorAllocation) {
		assert!(self.handles_allocation(ty), "allocator does not serve {ty:?} descriptors");
		self.ranges.free(allocation);
	}

	pub fn resize_grow_and_allocate(&self, ty: DescriptorType, new_capacity: u32, count: u32) -> DescriptorAllocation {
		assert!(self.handles_allocation(ty), "allocator does not serve {ty:?} descriptors");
		self.ranges.resize_grow_and_allocate(new_capacity, count)
	}

	pub fn allocated_range(&self) -> Option<(u32, u32)> {
		self.ranges.allocated_range()
	}
}

/// A [`HeapDescriptorAllocator`] whose externally visible indices are shifted
/// by a fixed heap offset, for logical sub-heaps sharing one physical heap.
pub struct OffsetHeapDescriptorAllocator {
	inner: HeapDescriptorAllocator,
	heap_offset: u32,
}

impl OffsetHeapDescriptorAllocator {
	pub fn new(mask: DescriptorTypeMask, capacity: u32, heap_offset: u32) -> Self {
		Self {
			inner: HeapDescriptorAllocator::new(mask, capacity),
			heap_offset,
		}
	}

	#[inline]
	pub fn heap_offset(&self) -> u32 {
		self.heap_offset
	}

	#[inline]
	pub fn handles_allocation(&self, ty: DescriptorType) -> bool {
		self.inner.handles_allocation(ty)
	}

	#[inline]
	pub fn capacity(&self) -> u32 {
		self.inner.capacity()
	}

	pub fn allocate(&self, ty: DescriptorType) -> Option<DescriptorHandle> {
		self.inner
			.allocate(ty)
			.map(|handle| DescriptorHandle::new(ty, handle.index() + self.heap_offset))
	}

	pub fn allocate_range(&self, ty: DescriptorType, count: u32) -> Option<DescriptorAllocation> {
		self.inner
			.allocate_range(ty, count)
			.map(|allocation| DescriptorAllocation::new(allocation.first_index() + self.heap_offset, allocation.count()))
	}

	pub fn free(&self, handle: DescriptorHandle) {
		if !handle.is_valid() {
			return;
		}
		assert!(
			handle.index() >= self.heap_offset,
			"handle index {} below heap offset {}",
			handle.index(),
			self.heap_offset
		);
		self.inner
			.free(DescriptorHandle::new(handle.descriptor_type(), handle.index() - self.heap_offset));
	}

	pub fn free_range(&self, ty: DescriptorType, allocation: DescriptorAllocation) {
		if allocation.is_empty() {
			return;
		}
		assert!(
			allocation.first_index() >= self.heap_offset,
			"allocation start {} below heap offset {}",
			allocation.first_index(),
			self.heap_offset
		);
		self.inner.free_range(
			ty,
			DescriptorAllocation::new(allocation.first_index() - self.heap_offset, allocation.count()),
		);
	}
}

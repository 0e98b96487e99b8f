//! GPU query heaps and locations within them.

use crate::platform::{PlatformDevice, PlatformQueryHeap};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum QueryKind {
	Occlusion,
	Timestamp,
	PipelineStatistics,
}

/// Wrapper around one native query heap. Shared so [`QueryLocation`]s can
/// outlive the frame that allocated them.
pub struct QueryHeap {
	native: Box<dyn PlatformQueryHeap>,
	kind: QueryKind,
	capacity: u32,
}

impl QueryHeap {
	pub fn new(device: &dyn PlatformDevice, kind: QueryKind, capacity: u32) -> Arc<Self> {
		let native = crate::platform::verify(device.create_query_heap(kind, capacity), "query heap creation");
		Arc::new(Self { native, kind, capacity })
	}

	#[inline]
	pub fn kind(&self) -> QueryKind {
		self.kind
	}

	#[inline]
	pub fn capacity(&self) -> u32 {
		self.capacity
	}

	#[inline]
	pub fn native(&self) -> &dyn PlatformQueryHeap {
		self.native.as_ref()
	}
}

/// One slot of a query heap. Always validated before Begin/EndQuery records
/// against it.
#[derive(Clone)]
pub struct QueryLocation {
	heap: Arc<QueryHeap>,
	index: u32,
}

impl QueryLocation {
	pub fn new(heap: Arc<QueryHeap>, index: u32) -> Self {
		assert!(index < heap.capacity(), "query index {index} outside heap of {}", heap.capacity());
		Self { heap, index }
	}

	#[inline]
	pub fn heap(&self) -> &Arc<QueryHeap> {
		&self.heap
	}

	#[inline]
	pub fn index(&self) -> u32 {
		self.index
	}

	#[inline]
	pub fn kind(&self) -> QueryKind {
		self.heap.kind()
	}
}

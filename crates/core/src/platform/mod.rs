//! Object-safe interfaces to the native graphics API.
//!
//! Everything behind these traits is an opaque collaborator: the core only
//! creates objects, copies descriptors and records queries through them. All
//! calls return checked results; a non-success result is always fatal at this
//! layer (see [`verify`]), there is no fallback device or degraded mode.

pub mod null;

use crate::descriptor::handle::DescriptorData;
use crate::query::QueryKind;
use crate::queue::QueueType;
use std::any::Any;
use thiserror::Error;

pub type PlatformResult<T> = Result<T, PlatformError>;

#[derive(Error, Debug)]
pub enum PlatformError {
	#[error("native object creation failed: {0}")]
	CreationFailed(&'static str),
	#[error("device removed")]
	DeviceRemoved,
	#[error("invalid native call: {0}")]
	InvalidCall(&'static str),
}

/// Unwraps a native API result, aborting on failure. The equivalent of a
/// checked-HRESULT macro: this layer has no recovery path for a failing
/// device object.
#[track_caller]
pub fn verify<T>(result: PlatformResult<T>, what: &str) -> T {
	match result {
		Ok(value) => value,
		Err(err) => panic!("{what}: {err}"),
	}
}

/// Which physical heap a descriptor heap object is created in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DescriptorHeapKind {
	Resource,
	Sampler,
}

pub trait PlatformDescriptorHeap: Send + Sync {
	fn kind(&self) -> DescriptorHeapKind;
	fn capacity(&self) -> u32;
	fn is_shader_visible(&self) -> bool;
	fn as_any(&self) -> &dyn Any;
}

pub trait PlatformCommandAllocator: Send {
	fn reset(&mut self) -> PlatformResult<()>;
	fn as_any(&self) -> &dyn Any;
}

pub trait PlatformCommandList: Send {
	fn reset(&mut self, allocator: &mut dyn PlatformCommandAllocator) -> PlatformResult<()>;
	fn close(&mut self) -> PlatformResult<()>;
	fn begin_query(&mut self, heap: &dyn PlatformQueryHeap, kind: QueryKind, index: u32);
	fn end_query(&mut self, heap: &dyn PlatformQueryHeap, kind: QueryKind, index: u32);
	/// Binds the shader-visible heaps sampled by bindless accesses recorded
	/// from here on.
	fn set_descriptor_heaps(
		&mut self,
		resource_heap: Option<&dyn PlatformDescriptorHeap>,
		sampler_heap: Option<&dyn PlatformDescriptorHeap>,
	);
	fn as_any(&self) -> &dyn Any;
	fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub trait PlatformQueryHeap: Send + Sync {
	fn kind(&self) -> QueryKind;
	fn capacity(&self) -> u32;
	fn as_any(&self) -> &dyn Any;
}

pub trait PlatformDevice: Send + Sync {
	fn create_descriptor_heap(
		&self,
		kind: DescriptorHeapKind,
		capacity: u32,
		shader_visible: bool,
	) -> PlatformResult<Box<dyn PlatformDescriptorHeap>>;

	/// Writes one descriptor into a CPU-writable heap slot.
	fn write_descriptor(&self, heap: &dyn PlatformDescriptorHeap, index: u32, data: &DescriptorData);

	/// Copies `count` descriptors between two heaps of the same kind. Ranges
	/// must be in bounds on both sides; both heaps must originate from this
	/// device.
	fn copy_descriptors(
		&self,
		dst: &dyn PlatformDescriptorHeap,
		dst_first: u32,
		src: &dyn PlatformDescriptorHeap,
		src_first: u32,
		count: u32,
	);

	fn create_command_allocator(&self, queue: QueueType) -> PlatformResult<Box<dyn PlatformCommandAllocator>>;

	/// Creates a command list in the open state, recording into `allocator`.
	fn create_command_list(
		&self,
		allocator: &mut dyn PlatformCommandAllocator,
		queue: QueueType,
	) -> PlatformResult<Box<dyn PlatformCommandList>>;

	fn create_query_heap(&self, kind: QueryKind, capacity: u32) -> PlatformResult<Box<dyn PlatformQueryHeap>>;
}

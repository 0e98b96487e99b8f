use bitflags::bitflags;
use bytemuck_derive::{Pod, Zeroable};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Kind of view a descriptor slot holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DescriptorType {
	ConstantBuffer,
	ShaderResource,
	UnorderedAccess,
	Sampler,
	RenderTarget,
	DepthStencil,
}

bitflags! {
	/// Set of [`DescriptorType`]s an allocator is allowed to serve.
	#[derive(Copy, Clone, Debug, PartialEq, Eq)]
	pub struct DescriptorTypeMask: u8 {
		const CONSTANT_BUFFER = 1 << 0;
		const SHADER_RESOURCE = 1 << 1;
		const UNORDERED_ACCESS = 1 << 2;
		const SAMPLER = 1 << 3;
		const RENDER_TARGET = 1 << 4;
		const DEPTH_STENCIL = 1 << 5;
	}
}

impl DescriptorTypeMask {
	/// View types that live in the shader-visible resource heap.
	pub const RESOURCES: DescriptorTypeMask = DescriptorTypeMask::CONSTANT_BUFFER
		.union(DescriptorTypeMask::SHADER_RESOURCE)
		.union(DescriptorTypeMask::UNORDERED_ACCESS);
	/// View types that live in the shader-visible sampler heap.
	pub const SAMPLERS: DescriptorTypeMask = DescriptorTypeMask::SAMPLER;
}

impl DescriptorType {
	#[inline]
	pub fn mask(self) -> DescriptorTypeMask {
		match self {
			DescriptorType::ConstantBuffer => DescriptorTypeMask::CONSTANT_BUFFER,
			DescriptorType::ShaderResource => DescriptorTypeMask::SHADER_RESOURCE,
			DescriptorType::UnorderedAccess => DescriptorTypeMask::UNORDERED_ACCESS,
			DescriptorType::Sampler => DescriptorTypeMask::SAMPLER,
			DescriptorType::RenderTarget => DescriptorTypeMask::RENDER_TARGET,
			DescriptorType::DepthStencil => DescriptorTypeMask::DEPTH_STENCIL,
		}
	}
}

pub const INVALID_DESCRIPTOR_INDEX: u32 = u32::MAX;

/// A typed index into one of the canonical descriptor heaps.
///
/// Handles are immutable once created, owned by whichever view they identify
/// and freed exactly once through the allocator that produced them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorHandle {
	ty: DescriptorType,
	index: u32,
}

impl DescriptorHandle {
	#[inline]
	pub fn new(ty: DescriptorType, index: u32) -> Self {
		Self { ty, index }
	}

	#[inline]
	pub fn invalid(ty: DescriptorType) -> Self {
		Self {
			ty,
			index: INVALID_DESCRIPTOR_INDEX,
		}
	}

	#[inline]
	pub fn descriptor_type(self) -> DescriptorType {
		self.ty
	}

	#[inline]
	pub fn index(self) -> u32 {
		self.index
	}

	#[inline]
	pub fn is_valid(self) -> bool {
		self.index != INVALID_DESCRIPTOR_INDEX
	}
}

/// A contiguous reservation of descriptor slots.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DescriptorAllocation {
	first_index: u32,
	count: u32,
}

impl DescriptorAllocation {
	pub const EMPTY: DescriptorAllocation = DescriptorAllocation {
		first_index: INVALID_DESCRIPTOR_INDEX,
		count: 0,
	};

	#[inline]
	pub fn new(first_index: u32, count: u32) -> Self {
		debug_assert!(count > 0, "empty allocations must use DescriptorAllocation::EMPTY");
		Self { first_index, count }
	}

	#[inline]
	pub fn first_index(self) -> u32 {
		self.first_index
	}

	#[inline]
	pub fn count(self) -> u32 {
		self.count
	}

	#[inline]
	pub fn is_empty(self) -> bool {
		self.count == 0 || self.first_index == INVALID_DESCRIPTOR_INDEX
	}

	/// One past the highest slot of the reservation.
	#[inline]
	pub fn end_index(self) -> u32 {
		self.first_index + self.count
	}
}

/// Opaque descriptor payload, copied byte-wise between staging and
/// shader-visible heaps. The contents are only meaningful to the platform.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(transparent)]
pub struct DescriptorData(pub [u64; 4]);

impl DescriptorData {
	pub const ZERO: DescriptorData = DescriptorData([0; 4]);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn invalid_handle_sentinel() {
		let handle = DescriptorHandle::invalid(DescriptorType::ShaderResource);
		assert!(!handle.is_valid());
		assert_eq!(handle.index(), INVALID_DESCRIPTOR_INDEX);
		assert!(DescriptorHandle::new(DescriptorType::ShaderResource, 0).is_valid());
	}

	#[test]
	fn type_mask_routing() {
		assert!(DescriptorTypeMask::RESOURCES.contains(DescriptorType::ShaderResource.mask()));
		assert!(DescriptorTypeMask::RESOURCES.contains(DescriptorType::ConstantBuffer.mask()));
		assert!(DescriptorTypeMask::RESOURCES.contains(DescriptorType::UnorderedAccess.mask()));
		assert!(!DescriptorTypeMask::RESOURCES.contains(DescriptorType::Sampler.mask()));
		assert!(DescriptorTypeMask::SAMPLERS.contains(DescriptorType::Sampler.mask()));
	}

	#[test]
	fn empty_allocation_sentinel() {
		assert!(DescriptorAllocation::EMPTY.is_empty());
		assert!(!DescriptorAllocation::new(4, 2).is_empty());
		assert_eq!(DescriptorAllocation::new(4, 2).end_index(), 6);
	}
}

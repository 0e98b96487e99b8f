//! Resource access masks and the barrier validity predicate.
//!
//! [`Access`] is the generic resource-access enumeration extended with the
//! two backend-specific states ([`Access::COMMON`], [`Access::GENERIC_READ`]).
//! Checked builds run every barrier request through
//! [`Access::is_invalid_combination`] before handing it to the batcher.

use bitflags::bitflags;

bitflags! {
	#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
	pub struct Access: u32 {
		// read-only states
		const CPU_READ = 1 << 0;
		const PRESENT = 1 << 1;
		const INDIRECT_ARGS = 1 << 2;
		const VERTEX_OR_INDEX_BUFFER = 1 << 3;
		const SRV_COMPUTE = 1 << 4;
		const SRV_GRAPHICS = 1 << 5;
		const COPY_SRC = 1 << 6;
		const RESOLVE_SRC = 1 << 7;
		const DSV_READ = 1 << 8;

		// readable-and-writable states
		const UAV_COMPUTE = 1 << 9;
		const UAV_GRAPHICS = 1 << 10;

		// write-only states
		const RTV = 1 << 11;
		const COPY_DEST = 1 << 12;
		const RESOLVE_DST = 1 << 13;
		const CPU_WRITE = 1 << 14;

		// writable depth-stencil state
		const DSV_WRITE = 1 << 15;

		// backend-specific states
		const COMMON = 1 << 30;
		const GENERIC_READ = 1 << 31;
	}
}

impl Access {
	pub const SRV_MASK: Access = Access::SRV_COMPUTE.union(Access::SRV_GRAPHICS);
	pub const UAV_MASK: Access = Access::UAV_COMPUTE.union(Access::UAV_GRAPHICS);

	/// States that tolerate no concurrent writer of any kind.
	pub const READ_ONLY_EXCLUSIVE_MASK: Access = Access::CPU_READ
		.union(Access::PRESENT)
		.union(Access::INDIRECT_ARGS)
		.union(Access::VERTEX_OR_INDEX_BUFFER)
		.union(Access::SRV_MASK)
		.union(Access::COPY_SRC)
		.union(Access::RESOLVE_SRC)
		.union(Access::DSV_READ)
		.union(Access::GENERIC_READ);

	/// States that tolerate no concurrent reader of any kind.
	pub const WRITE_ONLY_EXCLUSIVE_MASK: Access = Access::RTV
		.union(Access::COPY_DEST)
		.union(Access::RESOLVE_DST)
		.union(Access::CPU_WRITE);

	pub const WRITABLE_MASK: Access = Access::WRITE_ONLY_EXCLUSIVE_MASK
		.union(Access::UAV_MASK)
		.union(Access::DSV_WRITE);

	pub const READABLE_MASK: Access = Access::READ_ONLY_EXCLUSIVE_MASK.union(Access::UAV_MASK);

	#[inline]
	pub fn has_any(self, mask: Access) -> bool {
		self.intersects(mask)
	}

	#[inline]
	pub fn is_readable(self) -> bool {
		self.has_any(Access::READABLE_MASK)
	}

	#[inline]
	pub fn is_writable(self) -> bool {
		self.has_any(Access::WRITABLE_MASK)
	}

	/// An access mask is invalid when it mixes a read-only-exclusive state
	/// with any writable state, a write-only-exclusive state with any
	/// readable state, or combines `COMMON` with anything else.
	#[inline]
	pub fn is_invalid_combination(self) -> bool {
		(self.has_any(Access::READ_ONLY_EXCLUSIVE_MASK) && self.has_any(Access::WRITABLE_MASK))
			|| (self.has_any(Access::WRITE_ONLY_EXCLUSIVE_MASK) && self.has_any(Access::READABLE_MASK))
			|| (self.contains(Access::COMMON) && self != Access::COMMON)
	}
}

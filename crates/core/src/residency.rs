//! Residency tracking for resources referenced by a command list.
//!
//! The residency manager itself is an external collaborator; this module only
//! collects the opaque per-resource handles it hands out, guaranteeing every
//! resource referenced by a recorded barrier is registered exactly once per
//! command-list recording.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::sync::Arc;

/// Opaque handle minted by the residency manager for one memory block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResidencyHandle(pub u64);

/// Set of residency handles referenced by one command-list recording.
///
/// Opened on command-list reset, closed exactly once at command-list close
/// (possibly late, after deferred entries are folded in).
#[derive(Default)]
pub struct ResidencySet {
	open: bool,
	handles: FxHashSet<ResidencyHandle>,
}

impl ResidencySet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn open(&mut self) {
		assert!(!self.open, "residency set opened twice");
		self.open = true;
		self.handles.clear();
	}

	pub fn add_handles(&mut self, handles: &[ResidencyHandle]) {
		assert!(self.open, "residency update on a closed set");
		self.handles.extend(handles.iter().copied());
	}

	pub fn close(&mut self) {
		assert!(self.open, "residency set closed twice");
		self.open = false;
	}

	#[inline]
	pub fn is_open(&self) -> bool {
		self.open
	}

	#[inline]
	pub fn contains(&self, handle: ResidencyHandle) -> bool {
		self.handles.contains(&handle)
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.handles.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}
}

struct ResourceResidency {
	handles: SmallVec<[ResidencyHandle; 1]>,
	/// Still waiting for the owner to finalize the handle list. Until then
	/// residency registration must be deferred to command-list close.
	pending: bool,
}

/// The slice of a resource this layer cares about: its residency handles and
/// whether they are stable yet.
pub struct Resource {
	residency: Mutex<ResourceResidency>,
}

impl Resource {
	/// Resource whose residency handles are already finalized.
	pub fn new(handles: impl IntoIterator<Item = ResidencyHandle>) -> Arc<Self> {
		Arc::new(Self {
			residency: Mutex::new(ResourceResidency {
				handles: handles.into_iter().collect(),
				pending: false,
			}),
		})
	}

	/// Resource whose residency handles arrive later (closer to submission).
	/// Residency registration for it is deferred until command-list close.
	pub fn new_pending() -> Arc<Self> {
		Arc::new(Self {
			residency: Mutex::new(ResourceResidency {
				handles: SmallVec::new(),
				pending: true,
			}),
		})
	}

	/// Installs the final handle list. May only happen once.
	pub fn finalize_residency_handles(&self, handles: impl IntoIterator<Item = ResidencyHandle>) {
		let mut residency = self.residency.lock();
		assert!(residency.pending, "residency handles finalized twice");
		residency.handles = handles.into_iter().collect();
		residency.pending = false;
	}

	#[inline]
	pub fn needs_deferred_residency(&self) -> bool {
		self.residency.lock().pending
	}

	/// Snapshot of the resource's residency handles. Panics while the handle
	/// list is still pending.
	pub fn residency_handles(&self) -> SmallVec<[ResidencyHandle; 1]> {
		let residency = self.residency.lock();
		assert!(!residency.pending, "residency handles read before finalization");
		residency.handles.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_lifecycle() {
		let mut set = ResidencySet::new();
		set.open();
		set.add_handles(&[ResidencyHandle(1), ResidencyHandle(2), ResidencyHandle(1)]);
		assert_eq!(set.len(), 2);
		set.close();
		assert!(!set.is_open());
	}

	#[test]
	#[should_panic(expected = "closed twice")]
	fn double_close_panics() {
		let mut set = ResidencySet::new();
		set.open();
		set.close();
		set.close();
	}

	#[test]
	#[should_panic(expected = "on a closed set")]
	fn add_to_closed_set_panics() {
		let mut set = ResidencySet::new();
		set.add_handles(&[ResidencyHandle(1)]);
	}

	#[test]
	fn pending_resource_defers_then_finalizes() {
		let resource = Resource::new_pending();
		assert!(resource.needs_deferred_residency());
		resource.finalize_residency_handles([ResidencyHandle(7)]);
		assert!(!resource.needs_deferred_residency());
		assert_eq!(resource.residency_handles().as_slice(), &[ResidencyHandle(7)]);
	}

	#[test]
	#[should_panic(expected = "before finalization")]
	fn reading_pending_handles_panics() {
		let resource = Resource::new_pending();
		let _ = resource.residency_handles();
	}
}

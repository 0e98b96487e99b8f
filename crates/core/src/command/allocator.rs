use crate::platform::{verify, PlatformCommandAllocator, PlatformDevice};
use crate::queue::QueueType;

/// Owns one native command-allocator object for one (device, queue-type)
/// pair. At most one command list records out of it at a time, and it may
/// only be reset once no list built from it is outstanding.
pub struct CommandAllocator {
	queue: QueueType,
	native: Box<dyn PlatformCommandAllocator>,
	list_outstanding: bool,
}

impl CommandAllocator {
	pub fn new(device: &dyn PlatformDevice, queue: QueueType) -> Self {
		let native = verify(device.create_command_allocator(queue), "command allocator creation");
		Self {
			queue,
			native,
			list_outstanding: false,
		}
	}

	#[inline]
	pub fn queue_type(&self) -> QueueType {
		self.queue
	}

	#[inline]
	pub fn has_outstanding_list(&self) -> bool {
		self.list_outstanding
	}

	/// Reclaims the allocator's backing memory. The GPU must be done with
	/// every list recorded from it, and no list may still be recording.
	pub fn reset(&mut self) {
		assert!(!self.list_outstanding, "command allocator reset while a list is outstanding");
		verify(self.native.reset(), "command allocator reset");
	}

	pub(crate) fn native_mut(&mut self) -> &mut dyn PlatformCommandAllocator {
		self.native.as_mut()
	}

	pub(crate) fn mark_list_open(&mut self) {
		assert!(!self.list_outstanding, "command allocator already has an open list");
		self.list_outstanding = true;
	}

	pub(crate) fn mark_list_closed(&mut self) {
		debug_assert!(self.list_outstanding);
		self.list_outstanding = false;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::null::NullDevice;

	#[test]
	fn reset_when_idle() {
		let device = NullDevice::new();
		let mut allocator = CommandAllocator::new(device.as_ref(), QueueType::Compute);
		assert_eq!(allocator.queue_type(), QueueType::Compute);
		allocator.reset();
	}

	#[test]
	#[should_panic(expected = "while a list is outstanding")]
	fn reset_with_outstanding_list_panics() {
		let device = NullDevice::new();
		let mut allocator = CommandAllocator::new(device.as_ref(), QueueType::Direct);
		allocator.mark_list_open();
		allocator.reset();
	}
}

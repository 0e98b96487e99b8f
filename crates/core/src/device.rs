//! One GPU of an adapter group.

use crate::barrier::BarrierBatcher;
use crate::command::allocator::CommandAllocator;
use crate::command::context::CommandContext;
use crate::command::list::LocalQueries;
use crate::descriptor::allocator::BindlessDescriptorAllocator;
use crate::descriptor::manager::BindlessDescriptorManager;
use crate::platform::PlatformDevice;
use crate::query::{QueryHeap, QueryKind};
use crate::queue::QueueType;
use std::sync::Arc;

pub struct Device {
	gpu_index: u32,
	platform: Arc<dyn PlatformDevice>,
	bindless: Arc<BindlessDescriptorManager>,
}

impl Device {
	pub(crate) fn new(gpu_index: u32, platform: Arc<dyn PlatformDevice>, allocator: Arc<BindlessDescriptorAllocator>) -> Arc<Self> {
		let bindless = BindlessDescriptorManager::new(gpu_index, platform.clone(), allocator);
		Arc::new(Self {
			gpu_index,
			platform,
			bindless,
		})
	}

	#[inline]
	pub fn gpu_index(&self) -> u32 {
		self.gpu_index
	}

	#[inline]
	pub fn platform(&self) -> &Arc<dyn PlatformDevice> {
		&self.platform
	}

	#[inline]
	pub fn bindless(&self) -> &Arc<BindlessDescriptorManager> {
		&self.bindless
	}

	pub fn create_command_allocator(&self, queue: QueueType) -> CommandAllocator {
		CommandAllocator::new(self.platform.as_ref(), queue)
	}

	pub fn create_query_heap(&self, kind: QueryKind, capacity: u32) -> Arc<QueryHeap> {
		QueryHeap::new(self.platform.as_ref(), kind, capacity)
	}

	/// Opens a new recording context on this device.
	pub fn create_context(
		&self,
		queue: QueueType,
		local: LocalQueries,
		batcher: Box<dyn BarrierBatcher>,
	) -> CommandContext {
		let allocator = self.create_command_allocator(queue);
		CommandContext::new(self.platform.as_ref(), self.bindless.clone(), allocator, local, batcher)
	}
}

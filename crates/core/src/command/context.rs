use crate::access::Access;
use crate::barrier::BarrierBatcher;
use crate::command::allocator::CommandAllocator;
use crate::command::list::{CommandList, LocalQueries};
use crate::descriptor::manager::BindlessDescriptorManager;
use crate::descriptor::resource_manager::ContextBindlessState;
use crate::platform::PlatformDevice;
use crate::residency::Resource;
use std::sync::Arc;

/// One recording context: a command list, its bindless heap assignment and
/// the barrier-batching collaborator.
///
/// Open/close form a strict bracket around each recording; [`Self::finalize`]
/// tears the context down and must only run after the bracket is closed.
pub struct CommandContext {
	list: CommandList,
	bindless: ContextBindlessState,
	manager: Arc<BindlessDescriptorManager>,
	batcher: Box<dyn BarrierBatcher>,
}

impl CommandContext {
	/// Creates the context with an open command list, a GPU heap assigned and
	/// the shader-visible heaps bound on the native list.
	pub fn new(
		device: &dyn PlatformDevice,
		manager: Arc<BindlessDescriptorManager>,
		allocator: CommandAllocator,
		local: LocalQueries,
		batcher: Box<dyn BarrierBatcher>,
	) -> Self {
		let mut bindless = ContextBindlessState::new();
		manager.open_command_list(&mut bindless);
		let list = CommandList::new(device, allocator, local);
		let mut context = Self {
			list,
			bindless,
			manager,
			batcher,
		};
		context.bind_descriptor_heaps();
		context
	}

	/// Reopens a closed context for the next recording.
	pub fn open(&mut self, allocator: CommandAllocator, local: LocalQueries) -> CommandAllocator {
		self.manager.open_command_list(&mut self.bindless);
		let previous = self.list.reset(allocator, local);
		self.bind_descriptor_heaps();
		previous
	}

	/// Flushes outstanding barriers, ends the recording and releases the
	/// context's GPU heap assignment.
	pub fn close(&mut self) {
		self.flush_resource_barriers();
		self.list.close();
		self.manager.close_command_list(&mut self.bindless);
	}

	/// Tears the context down. The recording bracket must be closed and no
	/// bindless refresh may be pending.
	pub fn finalize(self) {
		assert!(!self.list.is_open(), "context finalized while its command list is open");
		self.manager.finalize_context(self.bindless);
	}

	fn bind_descriptor_heaps(&mut self) {
		let sampler_heap = self.manager.sampler_heap().cloned();
		let native = self.list.native_mut();
		match self.bindless.current_heap() {
			Some(heap) => heap.with_native(|resource_heap| {
				native.set_descriptor_heaps(Some(resource_heap), sampler_heap.as_deref().map(|heap| heap.native()));
			}),
			None => native.set_descriptor_heaps(None, sampler_heap.as_deref().map(|heap| heap.native())),
		}
	}

	/// Copies descriptor updates accumulated since the context's heap was
	/// assigned into that heap.
	pub fn flush_pending_descriptor_updates(&mut self) {
		self.manager.flush_pending_descriptor_updates(&mut self.bindless);
	}

	/// Records a state transition for `resource` and registers it for
	/// residency: every transitioned resource is tracked at the point its
	/// barrier is recorded, never lazily.
	pub fn add_barrier(&mut self, resource: &Arc<Resource>, before: Access, after: Access, subresource: u32) {
		debug_assert!(!before.is_invalid_combination(), "invalid before-access mask {before:?}");
		debug_assert!(!after.is_invalid_combination(), "invalid after-access mask {after:?}");
		self.batcher.add_transition(Some(resource), before, after, subresource);
		self.list.update_residency(resource);
	}

	/// Records a resource-independent barrier.
	pub fn add_global_barrier(&mut self, before: Access, after: Access) {
		debug_assert!(!before.is_invalid_combination(), "invalid before-access mask {before:?}");
		debug_assert!(!after.is_invalid_combination(), "invalid after-access mask {after:?}");
		self.batcher.add_transition(None, before, after, crate::barrier::ALL_SUBRESOURCES);
	}

	/// Hands everything the batcher has queued to the native list.
	pub fn flush_resource_barriers(&mut self) {
		self.batcher.flush(self.list.native_mut());
	}

	#[inline]
	pub fn command_list(&self) -> &CommandList {
		&self.list
	}

	#[inline]
	pub fn command_list_mut(&mut self) -> &mut CommandList {
		&mut self.list
	}

	#[inline]
	pub fn bindless_state(&self) -> &ContextBindlessState {
		&self.bindless
	}
}

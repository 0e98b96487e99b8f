use crate::command::allocator::CommandAllocator;
use crate::platform::{verify, PlatformCommandList, PlatformDevice};
use crate::query::{QueryKind, QueryLocation};
use crate::queue::QueueType;
use crate::residency::{ResidencySet, Resource};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Queries bracketing one full recording: a top-of-list timestamp, an
/// end-of-list timestamp and an optional pipeline-statistics pair. Resolved
/// out of band by the submission stage, so they are deliberately excluded
/// from [`CommandList::timestamp_queries`].
#[derive(Default)]
pub struct LocalQueries {
	pub begin_timestamp: Option<QueryLocation>,
	pub end_timestamp: Option<QueryLocation>,
	pub pipeline_stats: Option<QueryLocation>,
}

/// Everything that lives for exactly one recording. Rebuilt from scratch on
/// every [`CommandList::reset`]; never survives into the next recording.
struct State {
	local: LocalQueries,
	local_queries_begun: bool,
	local_queries_ended: bool,
	occlusion_queries: Vec<QueryLocation>,
	timestamp_queries: Vec<QueryLocation>,
	pipeline_stats_queries: Vec<QueryLocation>,
	/// Resources whose residency handles were not stable when their barrier
	/// was recorded, keyed by address. Folded into the residency set at
	/// close, by which point the handles must be finalized.
	deferred_residency: FxHashMap<usize, Arc<Resource>>,
}

impl State {
	fn new(local: LocalQueries) -> Self {
		Self {
			local,
			local_queries_begun: false,
			local_queries_ended: false,
			occlusion_queries: Vec::new(),
			timestamp_queries: Vec::new(),
			pipeline_stats_queries: Vec::new(),
			deferred_residency: FxHashMap::default(),
		}
	}
}

/// Lifecycle wrapper around one native command list.
///
/// Identity (the native object, the residency set) persists across resets;
/// the per-recording `State` is replaced wholesale each time.
pub struct CommandList {
	queue: QueueType,
	native: Box<dyn PlatformCommandList>,
	allocator: CommandAllocator,
	residency: ResidencySet,
	state: State,
	open: bool,
}

impl CommandList {
	/// Creates the native list in the open state, recording into `allocator`,
	/// and issues the begin-of-recording local queries.
	pub fn new(device: &dyn PlatformDevice, mut allocator: CommandAllocator, local: LocalQueries) -> Self {
		let queue = allocator.queue_type();
		let native = verify(
			device.create_command_list(allocator.native_mut(), queue),
			"command list creation",
		);
		allocator.mark_list_open();
		let mut list = Self {
			queue,
			native,
			allocator,
			residency: ResidencySet::new(),
			state: State::new(local),
			open: true,
		};
		list.residency.open();
		list.begin_local_queries();
		list
	}

	#[inline]
	pub fn queue_type(&self) -> QueueType {
		self.queue
	}

	#[inline]
	pub fn is_open(&self) -> bool {
		self.open
	}

	/// Reopens the list for a new recording, rebinding it to `allocator` and
	/// returning the previous allocator. The list must be closed.
	pub fn reset(&mut self, mut allocator: CommandAllocator, local: LocalQueries) -> CommandAllocator {
		assert!(!self.open, "reset of a command list that is still open");
		assert_eq!(
			allocator.queue_type(),
			self.queue,
			"command allocator queue type does not match the list"
		);

		verify(self.native.reset(allocator.native_mut()), "command list reset");
		allocator.mark_list_open();
		let previous = std::mem::replace(&mut self.allocator, allocator);

		// fresh recording: new state, same identity
		self.state = State::new(local);
		self.residency.open();
		self.open = true;
		self.begin_local_queries();
		previous
	}

	/// Ends the recording: issues the end-of-recording local queries (the
	/// very last queries recorded), folds any deferred residency updates into
	/// the residency set, and closes the native list.
	pub fn close(&mut self) {
		assert!(self.open, "close of a command list that is not open");
		self.end_local_queries();

		if self.state.deferred_residency.is_empty() {
			self.residency.close();
		} else {
			// late additions: handles were unstable at barrier time and are
			// finalized only now, close to submission
			let deferred = std::mem::take(&mut self.state.deferred_residency);
			for resource in deferred.into_values() {
				self.residency.add_handles(&resource.residency_handles());
			}
			self.residency.close();
		}

		verify(self.native.close(), "command list close");
		self.open = false;
		self.allocator.mark_list_closed();
	}

	fn begin_local_queries(&mut self) {
		debug_assert!(!self.state.local_queries_begun, "local queries begun twice");
		if let Some(timestamp) = &self.state.local.begin_timestamp {
			// timestamps are end-only on the native API
			self.native
				.end_query(timestamp.heap().native(), QueryKind::Timestamp, timestamp.index());
		}
		if let Some(stats) = &self.state.local.pipeline_stats {
			self.native
				.begin_query(stats.heap().native(), QueryKind::PipelineStatistics, stats.index());
		}
		self.state.local_queries_begun = true;
	}

	fn end_local_queries(&mut self) {
		debug_assert!(self.state.local_queries_begun, "local queries ended before they begun");
		debug_assert!(!self.state.local_queries_ended, "local queries ended twice");
		if let Some(stats) = &self.state.local.pipeline_stats {
			self.native
				.end_query(stats.heap().native(), QueryKind::PipelineStatistics, stats.index());
		}
		if let Some(timestamp) = &self.state.local.end_timestamp {
			self.native
				.end_query(timestamp.heap().native(), QueryKind::Timestamp, timestamp.index());
		}
		self.state.local_queries_ended = true;
	}

	/// Records the begin of an occlusion or pipeline-statistics query.
	/// Timestamp queries have no begin.
	pub fn begin_query(&mut self, location: &QueryLocation) {
		assert!(self.open, "query recorded on a closed command list");
		match location.kind() {
			QueryKind::Occlusion | QueryKind::PipelineStatistics => {
				self.native
					.begin_query(location.heap().native(), location.kind(), location.index());
			}
			QueryKind::Timestamp => panic!("timestamp queries have no begin"),
		}
	}

	/// Records the end of a query and registers it for resolution by the
	/// submission stage.
	pub fn end_query(&mut self, location: &QueryLocation) {
		assert!(self.open, "query recorded on a closed command list");
		self.native
			.end_query(location.heap().native(), location.kind(), location.index());
		let queries = match location.kind() {
			QueryKind::Occlusion => &mut self.state.occlusion_queries,
			QueryKind::Timestamp => &mut self.state.timestamp_queries,
			QueryKind::PipelineStatistics => &mut self.state.pipeline_stats_queries,
		};
		queries.push(location.clone());
	}

	/// Registers a resource's memory with the residency set, immediately when
	/// its handles are stable, otherwise deferred to close.
	pub fn update_residency(&mut self, resource: &Arc<Resource>) {
		assert!(self.open, "residency update on a closed command list");
		if resource.needs_deferred_residency() {
			self.state
				.deferred_residency
				.insert(Arc::as_ptr(resource) as usize, resource.clone());
		} else {
			self.residency.add_handles(&resource.residency_handles());
		}
	}

	#[inline]
	pub fn residency_set(&self) -> &ResidencySet {
		&self.residency
	}

	pub fn has_deferred_residency(&self, resource: &Arc<Resource>) -> bool {
		self.state
			.deferred_residency
			.contains_key(&(Arc::as_ptr(resource) as usize))
	}

	pub fn occlusion_queries(&self) -> &[QueryLocation] {
		&self.state.occlusion_queries
	}

	pub fn timestamp_queries(&self) -> &[QueryLocation] {
		&self.state.timestamp_queries
	}

	pub fn pipeline_stats_queries(&self) -> &[QueryLocation] {
		&self.state.pipeline_stats_queries
	}

	pub(crate) fn native_mut(&mut self) -> &mut dyn PlatformCommandList {
		self.native.as_mut()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::null::{NullCommandList, NullDevice, QueryEvent};
	use crate::query::QueryHeap;
	use crate::residency::ResidencyHandle;

	fn local_queries(device: &NullDevice) -> (LocalQueries, Arc<QueryHeap>) {
		let timestamps = QueryHeap::new(device, QueryKind::Timestamp, 16);
		let stats = QueryHeap::new(device, QueryKind::PipelineStatistics, 4);
		(
			LocalQueries {
				begin_timestamp: Some(QueryLocation::new(timestamps.clone(), 0)),
				end_timestamp: Some(QueryLocation::new(timestamps.clone(), 1)),
				pipeline_stats: Some(QueryLocation::new(stats, 0)),
			},
			timestamps,
		)
	}

	fn recorded_events(list: &mut CommandList) -> Vec<QueryEvent> {
		list.native_mut()
			.as_any()
			.downcast_ref::<NullCommandList>()
			.unwrap()
			.query_events
			.clone()
	}

	#[test]
	fn local_queries_bracket_the_recording() {
		let device = NullDevice::new();
		let (local, timestamps) = local_queries(&device);
		let allocator = CommandAllocator::new(device.as_ref(), QueueType::Direct);
		let mut list = CommandList::new(device.as_ref(), allocator, local);

		// a user query in the middle of the recording
		let user = QueryLocation::new(timestamps.clone(), 8);
		list.end_query(&user);
		list.close();

		let events = recorded_events(&mut list);
		// begin timestamp + stats begin first, user query, stats end + end timestamp last
		assert_eq!(events.first().unwrap().kind, QueryKind::Timestamp);
		assert_eq!(events.first().unwrap().index, 0);
		assert_eq!(events[1], QueryEvent { kind: QueryKind::PipelineStatistics, index: 0, begin: true });
		assert_eq!(events[2], QueryEvent { kind: QueryKind::Timestamp, index: 8, begin: false });
		assert_eq!(events[events.len() - 2].kind, QueryKind::PipelineStatistics);
		assert_eq!(events.last().unwrap(), &QueryEvent { kind: QueryKind::Timestamp, index: 1, begin: false });

		// the local bracket never shows up in the user-visible query lists
		assert_eq!(list.timestamp_queries().len(), 1);
		assert_eq!(list.timestamp_queries()[0].index(), 8);
		assert!(list.pipeline_stats_queries().is_empty());
	}

	#[test]
	fn reset_rebuilds_recording_state_but_keeps_identity() {
		let device = NullDevice::new();
		let (local, timestamps) = local_queries(&device);
		let allocator = CommandAllocator::new(device.as_ref(), QueueType::Direct);
		let mut list = CommandList::new(device.as_ref(), allocator, local);

		list.end_query(&QueryLocation::new(timestamps.clone(), 4));
		list.update_residency(&Resource::new([ResidencyHandle(1)]));
		list.close();
		assert_eq!(list.timestamp_queries().len(), 1);
		assert_eq!(list.residency_set().len(), 1);

		let second = CommandAllocator::new(device.as_ref(), QueueType::Direct);
		let previous = list.reset(second, LocalQueries::default());
		assert!(!previous.has_outstanding_list());
		assert!(list.is_open());
		// per-recording state was rebuilt, residency set reopened empty
		assert!(list.timestamp_queries().is_empty());
		assert_eq!(list.residency_set().len(), 0);
		list.close();
	}

	#[test]
	#[should_panic(expected = "still open")]
	fn reset_of_open_list_panics() {
		let device = NullDevice::new();
		let allocator = CommandAllocator::new(device.as_ref(), QueueType::Direct);
		let mut list = CommandList::new(device.as_ref(), allocator, LocalQueries::default());
		let second = CommandAllocator::new(device.as_ref(), QueueType::Direct);
		let _ = list.reset(second, LocalQueries::default());
	}

	#[test]
	#[should_panic(expected = "no begin")]
	fn timestamp_begin_panics() {
		let device = NullDevice::new();
		let allocator = CommandAllocator::new(device.as_ref(), QueueType::Direct);
		let mut list = CommandList::new(device.as_ref(), allocator, LocalQueries::default());
		let timestamps = QueryHeap::new(device.as_ref(), QueryKind::Timestamp, 4);
		list.begin_query(&QueryLocation::new(timestamps, 0));
	}

	#[test]
	fn occlusion_queries_collect_per_kind() {
		let device = NullDevice::new();
		let allocator = CommandAllocator::new(device.as_ref(), QueueType::Direct);
		let mut list = CommandList::new(device.as_ref(), allocator, LocalQueries::default());
		let occlusion = QueryHeap::new(device.as_ref(), QueryKind::Occlusion, 4);

		let query = QueryLocation::new(occlusion, 2);
		list.begin_query(&query);
		list.end_query(&query);
		list.close();

		assert_eq!(list.occlusion_queries().len(), 1);
		assert_eq!(list.occlusion_queries()[0].index(), 2);
		assert!(list.timestamp_queries().is_empty());
	}

	#[test]
	fn stable_residency_lands_immediately() {
		let device = NullDevice::new();
		let allocator = CommandAllocator::new(device.as_ref(), QueueType::Direct);
		let mut list = CommandList::new(device.as_ref(), allocator, LocalQueries::default());

		let resource = Resource::new([ResidencyHandle(10), ResidencyHandle(11)]);
		list.update_residency(&resource);
		assert!(list.residency_set().contains(ResidencyHandle(10)));
		assert!(list.residency_set().contains(ResidencyHandle(11)));
		list.close();
	}

	#[test]
	fn pending_residency_defers_to_close() {
		let device = NullDevice::new();
		let allocator = CommandAllocator::new(device.as_ref(), QueueType::Direct);
		let mut list = CommandList::new(device.as_ref(), allocator, LocalQueries::default());

		let resource = Resource::new_pending();
		list.update_residency(&resource);
		list.update_residency(&resource);
		assert!(list.has_deferred_residency(&resource));
		assert!(list.residency_set().is_empty());

		resource.finalize_residency_handles([ResidencyHandle(77)]);
		list.close();
		assert!(list.residency_set().contains(ResidencyHandle(77)));
		assert_eq!(list.residency_set().len(), 1);
	}
}

//! End-to-end recording loop against the null backend: allocate and update
//! descriptors, record barriers across contexts, close, garbage-collect.

use dx_bindless_core::access::Access;
use dx_bindless_core::barrier::ALL_SUBRESOURCES;
use dx_bindless_core::command::LocalQueries;
use dx_bindless_core::descriptor::{DescriptorData, DescriptorType};
use dx_bindless_core::platform::null::NullBarrierBatcher;
use dx_bindless_core::query::{QueryKind, QueryLocation};
use dx_bindless_core::queue::QueueType;
use dx_bindless_core::residency::{ResidencyHandle, Resource};
use integration_test::{bring_up, test_config};

#[test]
fn full_frame_cycle_on_one_device() {
	let rig = bring_up(test_config(), 1);
	let device = &rig.devices[0];
	let bindless = device.bindless();

	// a texture view goes bindless
	let srv = bindless.allocate_descriptor(DescriptorType::ShaderResource).unwrap();
	bindless.initialize_descriptor(srv, &DescriptorData([0xAB, 0, 0, 0]));
	let sampler = bindless.allocate_descriptor(DescriptorType::Sampler).unwrap();
	bindless.initialize_descriptor(sampler, &DescriptorData([0xCD, 0, 0, 0]));

	let timestamps = device.create_query_heap(QueryKind::Timestamp, 8);
	let mut context = device.create_context(
		QueueType::Direct,
		LocalQueries {
			begin_timestamp: Some(QueryLocation::new(timestamps.clone(), 0)),
			end_timestamp: Some(QueryLocation::new(timestamps.clone(), 1)),
			pipeline_stats: None,
		},
		Box::new(NullBarrierBatcher::default()),
	);

	// frame recording: transition the texture, then re-describe the view
	let texture = Resource::new([ResidencyHandle(1)]);
	context.add_barrier(&texture, Access::COPY_DEST, Access::SRV_GRAPHICS, ALL_SUBRESOURCES);
	assert!(context.command_list().residency_set().contains(ResidencyHandle(1)));

	bindless.update_descriptor(srv, &DescriptorData([0xEF, 0, 0, 0]));
	context.flush_pending_descriptor_updates();

	context.close();
	context.finalize();

	bindless.free_deferred(srv);
	bindless.free_deferred(sampler);
	bindless.garbage_collect();
}

#[test]
fn two_gpus_mirror_one_index_space() {
	let rig = bring_up(test_config(), 2);
	let bindless0 = rig.devices[0].bindless();
	let bindless1 = rig.devices[1].bindless();

	// allocation decided once at the adapter, applied to both GPU mirrors
	let handle = bindless0.allocate_descriptor(DescriptorType::ShaderResource).unwrap();
	bindless0.initialize_descriptor(handle, &DescriptorData([1, 2, 3, 4]));
	bindless1.initialize_descriptor(handle, &DescriptorData([1, 2, 3, 4]));

	// the same index cannot be handed out again by the other device
	let other = bindless1.allocate_descriptor(DescriptorType::ShaderResource).unwrap();
	assert_ne!(handle.index(), other.index());

	for device in &rig.devices {
		let mut context = device.create_context(
			QueueType::Direct,
			LocalQueries::default(),
			Box::new(NullBarrierBatcher::default()),
		);
		context.close();
		context.finalize();
	}

	bindless0.free_now(handle);
	bindless1.free_now(other);
}

#[test]
fn heap_growth_survives_open_contexts() {
	let rig = bring_up(test_config(), 1);
	let device = &rig.devices[0];
	let bindless = device.bindless();

	let mut context = device.create_context(
		QueueType::Direct,
		LocalQueries::default(),
		Box::new(NullBarrierBatcher::default()),
	);

	// exhaust the initial index space while the context records
	let fill = bindless
		.allocator()
		.allocate_descriptors(DescriptorType::ShaderResource, 32)
		.unwrap();
	let extra = bindless.allocate_descriptor(DescriptorType::ShaderResource).unwrap();
	assert!(extra.index() >= 32);

	bindless.update_descriptor(extra, &DescriptorData([7, 7, 7, 7]));
	// the open context refreshes onto the grown table instead of diffing
	context.flush_pending_descriptor_updates();

	context.close();
	context.finalize();

	bindless.allocator().free_descriptors(DescriptorType::ShaderResource, fill);
	bindless.free_now(extra);
}

#[test]
fn gc_retires_idle_heaps_but_spares_recent_ones() {
	let rig = bring_up(test_config(), 1);
	let device = &rig.devices[0];
	let bindless = device.bindless();
	let resources = bindless.resource_manager().unwrap().clone();

	let mut context = device.create_context(
		QueueType::Direct,
		LocalQueries::default(),
		Box::new(NullBarrierBatcher::default()),
	);
	context.close();
	context.finalize();
	assert_eq!(resources.active_heap_count(), 1);

	// grace period: the pass right after release must not reclaim
	bindless.garbage_collect();
	assert_eq!(resources.active_heap_count(), 1);
	bindless.garbage_collect();
	assert_eq!(resources.active_heap_count(), 0);
	assert_eq!(resources.pooled_heap_count(), 1);
}

#[test]
fn deferred_frees_replayed_by_gc_only() {
	let rig = bring_up(test_config(), 1);
	let bindless = rig.devices[0].bindless();

	let handles: Vec<_> = (0..4)
		.map(|_| bindless.allocate_descriptor(DescriptorType::ShaderResource).unwrap())
		.collect();
	for handle in &handles {
		bindless.free_deferred(*handle);
	}
	// slots stay reserved until the sweep, protecting in-flight readers
	assert!(bindless.allocator().allocated_resource_range().is_some());
	bindless.garbage_collect();
	assert_eq!(bindless.allocator().allocated_resource_range(), None);
}

//! Shared fixtures for the end-to-end tests driving the public API against
//! the null platform backend.

use dx_bindless_core::adapter::Adapter;
use dx_bindless_core::config::BindlessConfig;
use dx_bindless_core::device::Device;
use dx_bindless_core::platform::null::NullDevice;
use std::sync::Arc;

pub struct TestRig {
	pub adapter: Arc<Adapter>,
	pub devices: Vec<Arc<Device>>,
	pub backends: Vec<Arc<NullDevice>>,
}

pub fn test_config() -> BindlessConfig {
	BindlessConfig {
		initial_resource_heap_size: 32,
		max_resource_heap_size: 256,
		sampler_heap_size: 16,
		..BindlessConfig::default()
	}
}

/// Adapter with `gpu_count` symmetric devices, each on its own null backend.
pub fn bring_up(config: BindlessConfig, gpu_count: u32) -> TestRig {
	let adapter = Adapter::new(config);
	let backends: Vec<_> = (0..gpu_count).map(|_| NullDevice::new()).collect();
	let devices = backends
		.iter()
		.enumerate()
		.map(|(gpu_index, backend)| adapter.create_device(gpu_index as u32, backend.clone()))
		.collect();
	TestRig {
		adapter,
		devices,
		backends,
	}
}

//! Configuration inputs consumed once at adapter initialization.
//!
//! There is no runtime interface to change any of these; they mirror what the
//! engine configuration system resolved at startup.

/// Policy for growing the number of simultaneously active GPU-visible heaps.
///
/// The in-use heap count is fed into a moving-window maximum; a new active
/// heap is requested once `window max + margin >= active heap count`. The
/// exact trigger threshold is deliberately a tunable, not a constant.
#[derive(Copy, Clone, Debug)]
pub struct HeapGrowthPolicy {
	/// Number of open/close samples the load estimate smooths over.
	pub window: usize,
	/// Extra headroom heaps kept beyond the observed maximum.
	pub margin: u32,
}

impl Default for HeapGrowthPolicy {
	fn default() -> Self {
		Self { window: 100, margin: 0 }
	}
}

#[derive(Clone, Debug)]
pub struct BindlessConfig {
	/// Bindless access enabled for CBV/SRV/UAV views.
	pub resources_enabled: bool,
	/// Bindless access enabled for samplers.
	pub samplers_enabled: bool,
	/// Starting capacity of the resource index space; grows on demand.
	pub initial_resource_heap_size: u32,
	/// Hard ceiling for the resource index space. Exhausting it is a fatal
	/// configuration error, not a recoverable condition.
	pub max_resource_heap_size: u32,
	/// Fixed capacity of the sampler heap; never resized.
	pub sampler_heap_size: u32,
	pub growth: HeapGrowthPolicy,
	/// GC cycles a heap must stay unreferenced before it is reclaimed.
	pub gc_grace_cycles: u64,
	/// GC cycles a pooled heap may sit unused before it is destroyed.
	pub pooled_heap_retirement_cycles: u64,
}

impl Default for BindlessConfig {
	fn default() -> Self {
		Self {
			resources_enabled: true,
			samplers_enabled: true,
			initial_resource_heap_size: 64 * 1024,
			max_resource_heap_size: 1024 * 1024,
			// D3D12 caps shader-visible sampler heaps at 2048 entries
			sampler_heap_size: 2048,
			growth: HeapGrowthPolicy::default(),
			gc_grace_cycles: 1,
			pooled_heap_retirement_cycles: 64,
		}
	}
}

impl BindlessConfig {
	pub fn validate(&self) {
		if self.resources_enabled {
			assert!(self.initial_resource_heap_size > 0, "resource heap size must be non-zero");
			assert!(
				self.initial_resource_heap_size <= self.max_resource_heap_size,
				"initial resource heap size {} exceeds maximum {}",
				self.initial_resource_heap_size,
				self.max_resource_heap_size
			);
		}
		if self.samplers_enabled {
			assert!(self.sampler_heap_size > 0, "sampler heap size must be non-zero");
		}
		assert!(self.growth.window > 0, "growth window must be non-zero");
		assert!(self.gc_grace_cycles >= 1, "GC grace period must be at least one cycle");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_is_valid() {
		BindlessConfig::default().validate();
	}

	#[test]
	#[should_panic(expected = "exceeds maximum")]
	fn oversized_initial_heap_rejected() {
		BindlessConfig {
			initial_resource_heap_size: 2048,
			max_resource_heap_size: 1024,
			..BindlessConfig::default()
		}
		.validate();
	}
}

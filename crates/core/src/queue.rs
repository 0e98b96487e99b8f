use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Logical queue a command allocator / command list records for. Allocators
/// and lists of different queue types are never interchangeable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum QueueType {
	Direct,
	Compute,
	Copy,
}

pub const QUEUE_TYPE_COUNT: usize = 3;

impl QueueType {
	pub const ALL: [QueueType; QUEUE_TYPE_COUNT] = [QueueType::Direct, QueueType::Compute, QueueType::Copy];
}

/// GPU module - resource traits, the GPU command queue and the CPU-only mock device

// Module declarations
pub mod device;
pub mod staging_buffer;
pub mod texture;
pub mod queue;
pub mod mock_gpu_device;

// Re-export everything
pub use device::*;
pub use staging_buffer::*;
pub use texture::*;
pub use queue::*;

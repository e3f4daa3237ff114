mod local_device;

pub use local_device::LocalArloDevice;

pub mod metrics;
pub mod mqtt;
pub mod process;
pub mod sdk;

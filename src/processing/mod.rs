pub mod autoscale;
pub mod downsampling;
pub mod snap;

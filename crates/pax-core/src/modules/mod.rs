pub mod deconvolve;
pub mod serialization;
pub mod simulate;

pub use deconvolve::{DeconvolutionConfig, DeconvolutionEngine, ResultPackage, StopReason};
pub use simulate::{ForwardSimulator, NoiseKind, NoiseModel};

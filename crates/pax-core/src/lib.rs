//! PAX→RIXS reconstruction: forward simulation of photoelectron-based
//! measurements and Richardson–Lucy deconvolution of the response.

pub mod domain;
pub mod modules;
pub mod numerics;

pub mod errors;
pub mod spectrum;

pub use errors::{
    ComputeResult, DimensionMismatch, GridError, ParserResult, PaxError, PaxErrorCategory,
    PaxResult, diagnostic_line,
};
pub use spectrum::{
    EnergyGrid, ResponseFunction, SPACING_RELATIVE_TOLERANCE, Spectrum, check_response_compatible,
    convolve, divide_safe, mean_spectrum, normalize, spacings_match,
};

pub type PaxResult<T> = Result<T, PaxError>;
pub type ComputeResult<T> = PaxResult<T>;
pub type ParserResult<T> = PaxResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaxErrorCategory {
    Success,
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl PaxErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DimensionMismatch {
    #[error(
        "grid spacing mismatch: {left_label} spacing {left_spacing:e}, {right_label} spacing {right_spacing:e}"
    )]
    Spacing {
        left_label: &'static str,
        left_spacing: f64,
        right_label: &'static str,
        right_spacing: f64,
    },
    #[error("length mismatch: expected {expected} samples, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("response has {kernel} samples but the measured spectrum only has {signal}")]
    KernelLongerThanSignal { kernel: usize, signal: usize },
    #[error("'{label}' is sampled on a different energy grid than the measured spectrum")]
    DifferentGrid { label: &'static str },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("energy grid requires at least {minimum} points, got {actual}")]
    InsufficientPoints { minimum: usize, actual: usize },
    #[error("energy grid entry must be finite at index {index}, got {value}")]
    NonFiniteEnergy { index: usize, value: f64 },
    #[error(
        "energy grid must be strictly increasing, index {index} has {current} after {previous}"
    )]
    NonIncreasingEnergy {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("energy grid must be uniform, step {index} is {step:e} against {expected:e}")]
    NonUniformSpacing {
        index: usize,
        step: f64,
        expected: f64,
    },
    #[error("grid spacing must be finite and > 0, got {value}")]
    InvalidSpacing { value: f64 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaxError {
    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatch),
    #[error("degenerate spectrum '{label}': intensity sum {sum:e} is not above {epsilon:e}")]
    DegenerateSpectrum {
        label: &'static str,
        sum: f64,
        epsilon: f64,
    },
    #[error("invalid noise configuration: {message}")]
    InvalidNoiseConfig { message: String },
    #[error(transparent)]
    InvalidGrid(#[from] GridError),
    #[error("invalid spectrum '{label}': intensity at index {index} is {value}")]
    InvalidSpectrum {
        label: String,
        index: usize,
        value: f64,
    },
    #[error("invalid deconvolution configuration: {message}")]
    InvalidConfig { message: String },
    #[error("{label} line {line}: {message}")]
    InvalidTable {
        label: String,
        line: usize,
        message: String,
    },
}

impl PaxError {
    pub fn invalid_noise_config(message: impl Into<String>) -> Self {
        Self::InvalidNoiseConfig {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn invalid_table(label: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::InvalidTable {
            label: label.into(),
            line,
            message: message.into(),
        }
    }

    pub const fn category(&self) -> PaxErrorCategory {
        match self {
            Self::DegenerateSpectrum { .. } => PaxErrorCategory::ComputationError,
            _ => PaxErrorCategory::InputValidationError,
        }
    }

    pub const fn placeholder(&self) -> &'static str {
        match self {
            Self::DimensionMismatch(_) => "INPUT.DIMENSION_MISMATCH",
            Self::DegenerateSpectrum { .. } => "RUN.DEGENERATE_SPECTRUM",
            Self::InvalidNoiseConfig { .. } => "INPUT.NOISE_CONFIG",
            Self::InvalidGrid(_) => "INPUT.ENERGY_GRID",
            Self::InvalidSpectrum { .. } => "INPUT.SPECTRUM_VALUES",
            Self::InvalidConfig { .. } => "INPUT.DECONVOLUTION_CONFIG",
            Self::InvalidTable { .. } => "INPUT.SPECTRUM_TABLE",
        }
    }

    pub const fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        diagnostic_line(self.category(), self.placeholder(), &self.to_string())
    }
}

/// Renders the `SEVERITY: [CODE] message` line printed on stderr.
pub fn diagnostic_line(category: PaxErrorCategory, placeholder: &str, message: &str) -> String {
    let severity = if category.is_fatal() { "ERROR" } else { "INFO" };
    format!("{}: [{}] {}", severity, placeholder, message)
}

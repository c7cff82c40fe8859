use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PlanResult<T> = Result<T, PlanError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanErrorCategory {
    InputValidationError,
    IoSystemError,
    InternalError,
}

impl PlanErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::InternalError => "InternalError",
        }
    }
}

/// Structurally invalid input that the caller has to reject before the
/// engine runs. Geometry problems inside a valid plan never become a
/// `PlanError`; they are recovered and reported as a [`GeometryIssue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanError {
    category: PlanErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl PlanError {
    pub fn new(
        category: PlanErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            PlanErrorCategory::InputValidationError,
            placeholder,
            message,
        )
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(PlanErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(PlanErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> PlanErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }
}

impl Display for PlanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for PlanError {}

/// Recoverable geometry conditions. The engine substitutes the documented
/// fallback and logs the issue; none of these abort a calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryIssue {
    /// Mismatched bank lengths, missing leaf widths, non-finite positions.
    MalformedGeometry,
    /// Zero control points, MU, beams or union aperture.
    DegenerateInput,
    /// Contour that cannot be turned into a usable BEV polygon.
    UnprojectableStructure,
}

impl GeometryIssue {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedGeometry => "malformed-geometry",
            Self::DegenerateInput => "degenerate-input",
            Self::UnprojectableStructure => "unprojectable-structure",
        }
    }
}

impl Display for GeometryIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

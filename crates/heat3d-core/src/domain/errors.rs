use std::error::Error;
use std::fmt::{Display, Formatter};

pub type Heat3dResult<T> = Result<T, Heat3dError>;
pub type ParserResult<T> = Heat3dResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heat3dErrorCategory {
    Success,
    ConfigError,
    IoSystemError,
    ParseError,
    LaunchError,
    ComputationError,
    InternalError,
}

impl Heat3dErrorCategory {
    pub const fn exit_status(self) -> ExitStatusMapping {
        match self {
            Self::Success => ExitStatusMapping {
                exit_code: 0,
                category_name: "Success",
                severity_class: "SUCCESS",
            },
            Self::ConfigError => ExitStatusMapping {
                exit_code: 2,
                category_name: "ConfigError",
                severity_class: "CONFIG_FATAL",
            },
            Self::IoSystemError => ExitStatusMapping {
                exit_code: 3,
                category_name: "IoSystemError",
                severity_class: "IO_FATAL",
            },
            Self::ParseError => ExitStatusMapping {
                exit_code: 4,
                category_name: "ParseError",
                severity_class: "PARSE_FATAL",
            },
            Self::LaunchError => ExitStatusMapping {
                exit_code: 5,
                category_name: "LaunchError",
                severity_class: "LAUNCH_FATAL",
            },
            Self::ComputationError => ExitStatusMapping {
                exit_code: 6,
                category_name: "ComputationError",
                severity_class: "RUN_FATAL",
            },
            Self::InternalError => ExitStatusMapping {
                exit_code: 7,
                category_name: "InternalError",
                severity_class: "SYS_FATAL",
            },
        }
    }

    pub const fn exit_code(self) -> i32 {
        self.exit_status().exit_code
    }

    pub const fn category_name(self) -> &'static str {
        self.exit_status().category_name
    }

    pub const fn severity_class(self) -> &'static str {
        self.exit_status().severity_class
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatusMapping {
    pub exit_code: i32,
    pub category_name: &'static str,
    pub severity_class: &'static str,
}

/// Error shared by every heat3d operation.
///
/// `placeholder` is a stable dotted identifier (`CONFIG.HF_MODEL`,
/// `PARSE.LAMINAR_ROWS`, ...) that tests and log scrapers can match on
/// without depending on the human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heat3dError {
    category: Heat3dErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl Heat3dError {
    pub fn new(
        category: Heat3dErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn config(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(Heat3dErrorCategory::ConfigError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(Heat3dErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn parse(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(Heat3dErrorCategory::ParseError, placeholder, message)
    }

    pub fn launch(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(Heat3dErrorCategory::LaunchError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(Heat3dErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(Heat3dErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> Heat3dErrorCategory {
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
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for Heat3dError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.category_name(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for Heat3dError {}

#[cfg(test)]
mod tests {
    use super::{Heat3dError, Heat3dErrorCategory};

    #[test]
    fn exit_mapping_is_stable() {
        let cases = [
            (Heat3dErrorCategory::Success, 0, "Success", "SUCCESS"),
            (Heat3dErrorCategory::ConfigError, 2, "ConfigError", "CONFIG_FATAL"),
            (Heat3dErrorCategory::IoSystemError, 3, "IoSystemError", "IO_FATAL"),
            (Heat3dErrorCategory::ParseError, 4, "ParseError", "PARSE_FATAL"),
            (Heat3dErrorCategory::LaunchError, 5, "LaunchError", "LAUNCH_FATAL"),
            (
                Heat3dErrorCategory::ComputationError,
                6,
                "ComputationError",
                "RUN_FATAL",
            ),
            (Heat3dErrorCategory::InternalError, 7, "InternalError", "SYS_FATAL"),
        ];

        for (category, exit_code, name, class) in cases {
            let mapping = category.exit_status();
            assert_eq!(mapping.exit_code, exit_code);
            assert_eq!(mapping.category_name, name);
            assert_eq!(mapping.severity_class, class);
        }
    }

    #[test]
    fn fatal_error_renders_diagnostic_lines() {
        let error = Heat3dError::config("CONFIG.HF_MODEL", "no valid model selected");

        assert_eq!(error.exit_code(), 2);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [CONFIG.HF_MODEL] no valid model selected"
        );
        assert_eq!(
            error.fatal_exit_line().as_deref(),
            Some("FATAL EXIT CODE: 2")
        );
        assert_eq!(
            error.to_string(),
            "ConfigError [CONFIG.HF_MODEL] no valid model selected"
        );
    }
}

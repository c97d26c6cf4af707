//! Structured error types for service responses.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,
    InvalidState,

    // Not found errors
    CustomerNotFound,
    TaskNotFound,
    ProgressNotFound,
    TaskFileNotFound,
    StaffNotFound,

    // Conflict errors
    AlreadyExists,

    // Access errors
    Unauthenticated,
    PermissionDenied,

    // Collaborator errors
    ExternalServiceError,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// Broad category of the code.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ErrorCode::MissingRequiredField | ErrorCode::InvalidFieldValue | ErrorCode::InvalidState
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ErrorCode::CustomerNotFound
                | ErrorCode::TaskNotFound
                | ErrorCode::ProgressNotFound
                | ErrorCode::TaskFileNotFound
                | ErrorCode::StaffNotFound
        )
    }
}

/// Structured error for service responses.
#[derive(Debug, Serialize)]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, reason)
    }

    pub fn customer_not_found(customer_id: &str) -> Self {
        Self::new(
            ErrorCode::CustomerNotFound,
            format!("Customer not found: {}", customer_id),
        )
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn progress_not_found(progress_id: &str) -> Self {
        Self::new(
            ErrorCode::ProgressNotFound,
            format!("Progress row not found: {}", progress_id),
        )
    }

    pub fn task_file_not_found(file_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskFileNotFound,
            format!("Task file not found: {}", file_id),
        )
    }

    pub fn staff_not_found(staff_id: &str) -> Self {
        Self::new(
            ErrorCode::StaffNotFound,
            format!("Staff member not found: {}", staff_id),
        )
    }

    pub fn already_exists(what: &str, key: &str) -> Self {
        Self::new(
            ErrorCode::AlreadyExists,
            format!("{} already exists: {}", what, key),
        )
    }

    pub fn unauthenticated(email: Option<&str>) -> Self {
        match email {
            Some(email) => Self::new(
                ErrorCode::Unauthenticated,
                format!("No staff or customer record for {}", email),
            ),
            None => Self::new(ErrorCode::Unauthenticated, "Not signed in"),
        }
    }

    pub fn permission_denied(operation: impl fmt::Debug) -> Self {
        Self::new(
            ErrorCode::PermissionDenied,
            format!("Not allowed: {:?}", operation),
        )
    }

    pub fn external(service: &str, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{} failed: {}", service, err),
        )
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ServiceError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ServiceError>() {
            Ok(service_err) => service_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(sql_err) => ServiceError::database(sql_err),
                Err(err) => ServiceError::internal(err),
            },
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

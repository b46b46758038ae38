// Macros file - tracing macros are imported within the macro definitions

/// Standardized logging macros for consistent field names and message
/// patterns across the application: api operation boundaries, system
/// lifecycle events and validation outcomes.

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation with consistent fields
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, user_id = $user_id:expr) => {
        tracing::debug!(
            operation = $operation,
            user_id = %$user_id,
            "API operation started"
        );
    };
    ($operation:expr, generation_id = $generation_id:expr) => {
        tracing::debug!(
            operation = $operation,
            generation_id = %$generation_id,
            "API operation started"
        );
    };
    ($operation:expr, flashcard_id = $flashcard_id:expr) => {
        tracing::debug!(
            operation = $operation,
            flashcard_id = %$flashcard_id,
            "API operation started"
        );
    };
    ($operation:expr) => {
        tracing::debug!(operation = $operation, "API operation started");
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, generation_id = $generation_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            generation_id = %$generation_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, flashcard_id = $flashcard_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            flashcard_id = %$flashcard_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, count = $count:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            count = $count,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            "API operation completed: {}", $msg
        );
    };
}

// Error logging lives in ApiError::to_response_with_context, where the
// classified severity is known.

/// Log API operation warnings (recoverable or user-caused conditions)
#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, generation_id = $generation_id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            generation_id = %$generation_id,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, flashcard_id = $flashcard_id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            flashcard_id = %$flashcard_id,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            "API operation warning: {}", $msg
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system lifecycle events (startup, config, shutdown)
#[macro_export]
macro_rules! log_system_event {
    (config, $msg:expr) => {
        tracing::info!(component = "config", "System event: {}", $msg);
    };
    (database, $msg:expr) => {
        tracing::info!(component = "database", "System event: {}", $msg);
    };
    (server, $msg:expr) => {
        tracing::info!(component = "server", "System event: {}", $msg);
    };
}

/// Log validation outcomes with a consistent shape
#[macro_export]
macro_rules! log_validation {
    (success, $subject:expr, $msg:expr) => {
        tracing::debug!(subject = $subject, "Validation passed: {}", $msg);
    };
    (failure, $subject:expr, $msg:expr) => {
        tracing::warn!(subject = $subject, "Validation failed: {}", $msg);
    };
}

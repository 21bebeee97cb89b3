use thiserror::Error;

use crate::cron::CronField;

/// Why a cron expression could not be parsed or scheduled.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("invalid {field} token `{token}`: {reason}")]
    Parse {
        field: CronField,
        token: String,
        reason: String,
    },

    #[error("expected 4, 5 or 6 fields but found {found} in `{expression}`")]
    FieldCount { found: usize, expression: String },

    #[error("no time within {years} years after {reference}ms satisfies `{expression}`")]
    ScheduleUnsatisfiable {
        expression: String,
        reference: i64,
        years: i32,
    },

    #[error("reference time {0}ms is outside the supported calendar range")]
    OutOfRange(i64),
}

impl CronError {
    pub(crate) fn parse(field: CronField, token: &str, reason: impl Into<String>) -> Self {
        CronError::Parse {
            field,
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

/// Enables logging of errors, to move forward without returning the error.
pub trait LogError<T>: Sized {
    /// Logs if there was an error and converts the result into an option
    fn log(self) -> Option<T> {
        self.log_as(tracing::log::Level::Error)
    }
    /// Lazily logs if there was an error with a message and converts the result into an option
    fn log_with_context<Ctx: Fn() -> String>(self, ctx: Ctx) -> Option<T> {
        self.log_with_context_as(tracing::log::Level::Error, ctx)
    }

    /// Logs if there was an error and converts the result into an option
    fn log_as(self, level: tracing::log::Level) -> Option<T>;
    /// Lazily logs if there was an error with a message at the provided log level, and converts the result into an option
    fn log_with_context_as<Ctx: Fn() -> String>(
        self,
        level: tracing::log::Level,
        ctx: Ctx,
    ) -> Option<T>;
}

impl<T, E: std::fmt::Display + 'static> LogError<T> for Result<T, E> {
    fn log_as(self, level: tracing::log::Level) -> Option<T> {
        match self {
            Ok(t) => Some(t),
            Err(e) => {
                let es = display_error(&e);
                log!(level, "{es}");
                None
            }
        }
    }

    fn log_with_context_as<Ctx: Fn() -> String>(
        self,
        level: tracing::log::Level,
        ctx: Ctx,
    ) -> Option<T> {
        match self {
            Ok(t) => Some(t),
            Err(e) => {
                let ctx = ctx();
                let es = display_error(&e);
                log!(level, "error: `{ctx}` - {es}");
                None
            }
        }
    }
}

macro_rules! log {
    ($level:expr, $($args:tt),*) => {
        match $level {
            tracing::log::Level::Error => tracing::error!($($args),*),
            tracing::log::Level::Warn => tracing::warn!($($args),*),
            tracing::log::Level::Info => tracing::info!($($args),*),
            tracing::log::Level::Debug => tracing::debug!($($args),*),
            tracing::log::Level::Trace => tracing::trace!($($args),*),
        };
    };
}
pub(crate) use log;

/// Renders the whole cause chain for anyhow errors, and the plain display
/// string for anything else.
pub fn display_error<E: std::fmt::Display + 'static>(e: &E) -> String {
    match (e as &dyn std::any::Any).downcast_ref::<anyhow::Error>() {
        Some(err) => format!("{err:#}"),
        None => format!("{e}"),
    }
}

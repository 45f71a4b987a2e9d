use tokio::sync::mpsc::error::SendError;
use tui_logger::TuiLoggerError;

use crate::{api::ApiError, app::AppEvent};

#[allow(dead_code)]
#[derive(Debug)]
pub enum TunefeedError {
    Logger(String),
    IO(String),
    Config(String),
    Api(ApiError),
    Send(String),
}

impl From<TuiLoggerError> for TunefeedError {
    fn from(value: TuiLoggerError) -> Self {
        TunefeedError::Logger(match value {
            TuiLoggerError::SetLoggerError(set_logger_error) => set_logger_error.to_string(),
            TuiLoggerError::ThreadError(error) => error.to_string(),
        })
    }
}

impl From<std::io::Error> for TunefeedError {
    fn from(value: std::io::Error) -> Self {
        TunefeedError::IO(value.to_string())
    }
}

impl From<toml::de::Error> for TunefeedError {
    fn from(value: toml::de::Error) -> Self {
        TunefeedError::Config(value.to_string())
    }
}

impl From<toml::ser::Error> for TunefeedError {
    fn from(value: toml::ser::Error) -> Self {
        TunefeedError::Config(value.to_string())
    }
}

impl From<ApiError> for TunefeedError {
    fn from(value: ApiError) -> Self {
        TunefeedError::Api(value)
    }
}

impl From<SendError<AppEvent>> for TunefeedError {
    fn from(value: SendError<AppEvent>) -> Self {
        TunefeedError::Send(value.to_string())
    }
}

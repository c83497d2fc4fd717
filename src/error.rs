/*!
This provides the common error type used across the stack.
*/

use quick_xml::Error as XMLError;
use std::io::Error as IOError;
use std::str::Utf8Error;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// This provides a common error type across the stack.
///
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    NetworkTransport(#[from] IOError),

    #[error(transparent)]
    MessageFormat(#[from] MessageFormatError),

    #[error("The URL `{url}` is missing a host, port, or path component")]
    InvalidUrl { url: String },

    #[error("The supplied configuration is unusable ({message})")]
    Configuration { message: String },
}

///
/// Where a malformed value was encountered.
///
#[derive(Clone, Copy, Debug, Error)]
pub enum ValueSource {
    #[error("socket")]
    Socket,
    #[error("message header")]
    Header,
    #[error("message field")]
    Field,
}

///
/// Errors arising from the content of a message rather than its transport.
///
#[derive(Debug, Error)]
pub enum MessageFormatError {
    #[error(transparent)]
    XmlFormat(XMLError),

    #[error(transparent)]
    SourceEncoding(Utf8Error),

    #[error("A required {source} `{name}` was either missing or empty")]
    MissingRequiredValue { source: ValueSource, name: String },

    #[error("The {source} `{name}` was incorrectly formatted (Value: `{value}`)")]
    InvalidValue {
        source: ValueSource,
        name: String,
        value: String,
    },
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

pub fn missing_required_header<S>(name: S) -> MessageFormatError
where
    S: Into<String>,
{
    MessageFormatError::MissingRequiredValue {
        source: ValueSource::Header,
        name: name.into(),
    }
}

pub fn invalid_header_value<S1, S2>(name: S1, value: S2) -> MessageFormatError
where
    S1: Into<String>,
    S2: Into<String>,
{
    MessageFormatError::InvalidValue {
        source: ValueSource::Header,
        name: name.into(),
        value: value.into(),
    }
}

pub fn missing_required_field<S>(name: S) -> MessageFormatError
where
    S: Into<String>,
{
    MessageFormatError::MissingRequiredValue {
        source: ValueSource::Field,
        name: name.into(),
    }
}

pub fn invalid_field_value<S1, S2>(name: S1, value: S2) -> MessageFormatError
where
    S1: Into<String>,
    S2: Into<String>,
{
    MessageFormatError::InvalidValue {
        source: ValueSource::Field,
        name: name.into(),
        value: value.into(),
    }
}

pub fn invalid_url<S>(url: S) -> Error
where
    S: Into<String>,
{
    Error::InvalidUrl { url: url.into() }
}

pub fn configuration<S>(message: S) -> Error
where
    S: Into<String>,
{
    Error::Configuration {
        message: message.into(),
    }
}

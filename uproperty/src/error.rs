use std::borrow::Cow;
use std::error::Error;

use crate::name::FName;

pub type Result<T> = std::result::Result<T, PropertyError>;

#[derive(Debug)]
pub enum PropertyError {
    Msg(Cow<'static, str>),
    Io(std::io::Error),
    /// Malformed or unexpected data while reading an archive.
    Archive(Cow<'static, str>),
    /// Text could not be imported into a property.
    Import {
        property: FName,
        message: String,
    },
    /// A typed accessor was used on a property holding a different value type.
    TypeMismatch {
        property: FName,
        expected: &'static str,
    },
    /// An object was passed as container for a property owned by an unrelated class.
    ClassMismatch {
        object: String,
        class: FName,
        property: FName,
        owner: FName,
    },
    IndexOutOfRange {
        index: i32,
        len: i32,
    },
    FieldNotFound {
        name: String,
        scope: String,
    },
    ObjectNotFound(String),
    NotLinked(FName),
}

impl std::fmt::Display for PropertyError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PropertyError::Msg(msg) => write!(f, "{msg}"),
            PropertyError::Io(err) => write!(f, "archive I/O error: {err}"),
            PropertyError::Archive(msg) => write!(f, "archive error: {msg}"),
            PropertyError::Import { property, message } => {
                write!(f, "ImportText ({property}): {message}")
            }
            PropertyError::TypeMismatch { property, expected } => {
                write!(f, "property '{property}' does not hold a value of type {expected}")
            }
            PropertyError::ClassMismatch {
                object,
                class,
                property,
                owner,
            } => write!(
                f,
                "'{object}' is of class '{class}' however property '{property}' belongs to class '{owner}'"
            ),
            PropertyError::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            PropertyError::FieldNotFound { name, scope } => {
                write!(f, "failed to find {name} in {scope}")
            }
            PropertyError::ObjectNotFound(path) => write!(f, "failed to find object '{path}'"),
            PropertyError::NotLinked(name) => write!(f, "struct '{name}' has not been linked"),
        }
    }
}

impl Error for PropertyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PropertyError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PropertyError {
    fn from(value: std::io::Error) -> Self {
        PropertyError::Io(value)
    }
}

#[macro_export]
macro_rules! _bail_out {
    ($($arg:tt)*) => {
        return Err($crate::error::PropertyError::Msg(format!($($arg)*).into()))
    };
}
pub use _bail_out as bail_out;

pub trait Context<T>
where
    Self: Sized,
{
    fn context(self, msg: &'static str) -> Result<T>;
}
impl<T> Context<T> for Option<T> {
    fn context(self, msg: &'static str) -> Result<T> {
        match self {
            Some(value) => Ok(value),
            None => Err(PropertyError::Msg(msg.into())),
        }
    }
}

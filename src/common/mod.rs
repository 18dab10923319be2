pub mod error;

pub use error::{ChannelError, ChannelErrorKind, Error, Result};

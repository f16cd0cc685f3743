/*!
 * Error Code Translation
 * Maps host-specific failures onto the portable error-code enumeration
 */

mod code;
mod tables;
mod translator;

pub use code::ErrorCode;
pub use tables::{Platform, PlatformTables};
pub use translator::{ErrorCodeTranslator, Operation};

use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! io_error {
    ($path:expr, $source:expr) => {
        crate::Error::Io {
            path: $path.to_path_buf(),
            source: $source,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this crate
/// can potentially return.
///
/// This enum covers every failure mode of a patch run: parsing a module image,
/// resolving the structural signature of the patch target, splicing
/// instructions into method bodies, and driving the file swap protocol. Each
/// variant provides enough context (file path, missing element name) to
/// diagnose a version mismatch of the target module.
///
/// # Error Categories
///
/// ## Image Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid image structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the data boundaries
/// - [`Error::NotSupported`] - Unsupported image format or version
/// - [`Error::Empty`] - Empty input provided
///
/// ## Structural Resolution Errors
/// - [`Error::TargetTypeNotFound`] - The target type is absent from the module
/// - [`Error::MissingBaseType`] - The target type declares no base type
/// - [`Error::MemberNotFound`] - No member matches the structural signature
/// - [`Error::AmbiguousMember`] - More than one member matches the signature
///
/// These are fatal and signal that the target module's shape is incompatible
/// with the expected component; retrying cannot succeed.
///
/// ## Patch Errors
/// - [`Error::MalformedBody`] - A method body lacks the expected anchor shape
///
/// ## File State and I/O Errors
/// - [`Error::FileState`] - Swap protocol precondition violated
/// - [`Error::Io`] - Read/write/rename failure, surfaced with the failing path
/// - [`Error::UnresolvedReference`] - External module not found in the search
///   directories
/// - [`Error::ReadOnly`] - Attempted to mutate or serialize a read-only load
#[derive(Error, Debug)]
pub enum Error {
    /// The module image is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the image.
    ///
    /// This error occurs when trying to read data beyond the end of the input.
    /// It's a safety check to prevent buffer overruns during parsing.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    ///
    /// Indicates that the input file is not a supported module image, or uses
    /// a container version that is not implemented by this crate.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// The target type is absent from the module.
    ///
    /// The associated name is the full (namespace-qualified) type name that
    /// was searched for. Raised both for the patch target itself and for a
    /// base type that could not be located in its declaring module.
    #[error("Target type not found - {0}")]
    TargetTypeNotFound(String),

    /// The target type declares no base type.
    ///
    /// The import-mode property is expected on the base of the target type;
    /// a target without a base type is structurally incompatible.
    #[error("Type has no base type - {0}")]
    MissingBaseType(String),

    /// No member of the declaring type matches the structural signature.
    ///
    /// # Fields
    ///
    /// * `declaring_type` - Full name of the type that was searched
    /// * `member` - Description of the member that was expected
    #[error("Member not found on {declaring_type} - {member}")]
    MemberNotFound {
        /// Full name of the type that was searched
        declaring_type: String,
        /// Description of the member that was expected
        member: String,
    },

    /// More than one member of the declaring type matches the structural
    /// signature.
    ///
    /// The engine requires structural lookups to yield exactly one match;
    /// multiple matches are never silently reduced to a first pick.
    #[error("Ambiguous member on {declaring_type} - {member}")]
    AmbiguousMember {
        /// Full name of the type that was searched
        declaring_type: String,
        /// Description of the member that matched more than once
        member: String,
    },

    /// A method body does not have the shape the patch anchors assume.
    ///
    /// Raised when a constructor has no return instruction, or when a property
    /// setter body is too short or does not end in the conventional
    /// store-then-return sequence.
    #[error("Malformed method body in {method} - {message}")]
    MalformedBody {
        /// Full name of the method whose body was rejected
        method: String,
        /// Description of the violated shape assumption
        message: String,
    },

    /// A swap protocol precondition is violated.
    ///
    /// For example, disable was requested but neither a backup nor an active
    /// file is present. User-correctable; no retry.
    #[error("Invalid file state for {} - {message}", path.display())]
    FileState {
        /// The active file name the operation was pointed at
        path: PathBuf,
        /// Description of the precondition that failed
        message: String,
    },

    /// File I/O failure, surfaced with the failing path.
    #[error("{}: {source}", path.display())]
    Io {
        /// The path on which the operation failed
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// An external module reference could not be resolved.
    ///
    /// The referenced module file was not found in any of the configured
    /// search directories. Failure to resolve a reference encountered during
    /// load is a load error, never a silent skip.
    #[error("Unresolved module reference - {0}")]
    UnresolvedReference(String),

    /// Attempted to mutate or serialize a module that was loaded read-only.
    #[error("Module was loaded read-only - {0}")]
    ReadOnly(String),
}

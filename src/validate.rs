//! The file validation policy.
//!
//! A candidate is accepted iff its declared MIME type is in the allowed set
//! and its size is at most 16 MiB. The two checks are independent and each
//! failure has its own user-facing message, but both leave the workflow
//! untouched.

/// MIME types the recognition service accepts. `image/jpg` is nonstandard
/// but common enough in the wild that we allow it alongside `image/jpeg`.
pub const ALLOWED_MIME_TYPES: &[&str] =
    &["image/png", "image/jpeg", "image/jpg", "image/bmp"];

/// Maximum accepted file size, matching the server's upload limit.
pub const MAX_FILE_SIZE: usize = 16 * 1024 * 1024;

/// Why a candidate file was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// The declared MIME type is not an accepted image type.
    InvalidType,

    /// The file exceeds [`MAX_FILE_SIZE`].
    TooLarge,
}

/// Check a candidate's declared MIME type and size against the policy.
pub fn check(mime_type: &str, size: usize) -> Result<(), ValidationError> {
    if !ALLOWED_MIME_TYPES.contains(&mime_type) {
        return Err(ValidationError::InvalidType);
    }
    if size > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge);
    }
    Ok(())
}

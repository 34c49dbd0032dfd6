//! Test Helper Utilities
//!
//! Shared utilities for testing insureguard-ai

pub mod mock_collaborators;
pub mod multipart;

// Re-export commonly used items
pub use mock_collaborators::{ImageBehavior, MockImage, MockText, MockVoice, Mocks};
pub use multipart::{png_bytes, wav_bytes, MultipartBody};

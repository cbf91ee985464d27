//! Service layer for separating concerns
//!
//! This module contains services that separate different concerns from the
//! job and batch orchestration, making the system more testable and maintainable.

pub mod format;
pub mod io;
pub mod progress;
pub mod staging;

pub use format::OutputFormatHandler;
pub use io::{ImageIOService, ImageInfo};
pub use progress::{BatchProgressReporter, LogProgressReporter, NoOpProgressReporter};
pub use staging::{fit_within, ImageStager, StagedImage};

//! Border trimming via ImageMagick.
//!
//! Cropped cards keep a thin rim of background from the padded rotation.
//! ImageMagick's fuzzy `-trim` removes it far more robustly than a fixed
//! inset, so the step shells out rather than reimplementing it.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::core::errors::{ScanError, ScanResult};

/// Default fuzz tolerance, in percent. High enough to eat unevenly lit
/// background rims without biting into the card art.
pub const DEFAULT_FUZZ_PERCENT: u32 = 35;

/// Shells out to ImageMagick to trim near-uniform borders.
#[derive(Debug, Clone)]
pub struct Trimmer {
    program: String,
    fuzz_percent: u32,
}

impl Default for Trimmer {
    fn default() -> Self {
        Self {
            program: "convert".to_string(),
            fuzz_percent: DEFAULT_FUZZ_PERCENT,
        }
    }
}

impl Trimmer {
    /// A trimmer invoking a specific program, for hosts where ImageMagick is
    /// installed under a different name.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Sets the fuzz tolerance in percent.
    pub fn fuzz_percent(mut self, percent: u32) -> Self {
        self.fuzz_percent = percent;
        self
    }

    /// Trims near-uniform borders off one image.
    ///
    /// Equivalent to `convert <input> -fuzz N% -trim <output>`.
    ///
    /// # Arguments
    ///
    /// * `input` - The image to trim.
    /// * `output` - Where the trimmed copy is written.
    pub fn trim(&self, input: &Path, output: &Path) -> ScanResult<()> {
        debug!(input = %input.display(), output = %output.display(), "trimming borders");
        let result = Command::new(&self.program)
            .arg(input)
            .arg("-fuzz")
            .arg(format!("{}%", self.fuzz_percent))
            .arg("-trim")
            .arg(output)
            .output()
            .map_err(|e| ScanError::Trim {
                message: format!("failed to launch {}: {e}", self.program),
            })?;

        if !result.status.success() {
            return Err(ScanError::Trim {
                message: format!(
                    "{} exited with {}: {}",
                    self.program,
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_an_error() {
        let trimmer = Trimmer::with_program("definitely-not-imagemagick");
        let err = trimmer
            .trim(Path::new("a.png"), Path::new("b.png"))
            .unwrap_err();
        assert!(matches!(err, ScanError::Trim { .. }));
    }

    #[test]
    fn test_successful_exit_is_ok() {
        // `true` ignores its arguments and exits 0.
        let trimmer = Trimmer::with_program("true");
        assert!(trimmer.trim(Path::new("a.png"), Path::new("b.png")).is_ok());
    }

    #[test]
    fn test_failing_exit_reports_trim_error() {
        let trimmer = Trimmer::with_program("false");
        let err = trimmer
            .trim(Path::new("a.png"), Path::new("b.png"))
            .unwrap_err();
        assert!(matches!(err, ScanError::Trim { .. }));
    }
}

//! Background coverage checks

use crate::error::{CompositeError, Result};
use crate::types::PixelBuffer;

/// Checks that a background is large enough to be cropped to the subject
pub struct DimensionValidator;

impl DimensionValidator {
    /// `Ok` when `background` covers `subject` in both axes
    ///
    /// # Errors
    /// - `DimensionMismatch` carrying both sizes when either axis is short
    pub fn ensure_covers(subject: (u32, u32), background: (u32, u32)) -> Result<()> {
        let (sw, sh) = subject;
        let (bw, bh) = background;
        if bw >= sw && bh >= sh {
            Ok(())
        } else {
            Err(CompositeError::dimension_mismatch(subject, background))
        }
    }

    /// Buffer form of [`DimensionValidator::ensure_covers`]
    pub fn validate(subject: &PixelBuffer, background: &PixelBuffer) -> Result<()> {
        Self::ensure_covers(subject.dimensions(), background.dimensions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_covering_backgrounds_pass() {
        assert!(DimensionValidator::ensure_covers((100, 100), (100, 100)).is_ok());
        assert!(DimensionValidator::ensure_covers((100, 100), (200, 150)).is_ok());
    }

    #[test]
    fn test_short_axis_fails_with_both_sizes() {
        for background in [(99, 200), (200, 99), (50, 50)] {
            let err = DimensionValidator::ensure_covers((100, 100), background).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
            match err {
                CompositeError::DimensionMismatch {
                    subject,
                    background: reported,
                } => {
                    assert_eq!(subject, (100, 100));
                    assert_eq!(reported, background);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_validate_buffers() {
        let subject = PixelBuffer::new(4, 3).unwrap();
        let background = PixelBuffer::new(3, 4).unwrap();
        assert!(DimensionValidator::validate(&subject, &background).is_err());
        assert!(DimensionValidator::validate(&background, &background).is_ok());
    }
}

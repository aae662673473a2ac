use serde::Serialize;

/// Bucket boundaries are tunable policy, chosen around the lengths real
/// prospectuses and bare listing scrapes actually produce.
const VERY_LOW_MAX: usize = 200;
const LOW_MAX: usize = 600;
const MEDIUM_MAX: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextQuality {
    None,
    VeryLow,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityVerdict {
    pub quality: TextQuality,
    pub text_length: usize,
    pub needs_manual_upload: bool,
    pub message: String,
}

/// Classify whether the winning text is enough to trust automated
/// extraction, or whether the user should be asked for the prospectus PDF.
pub fn assess(text: &str) -> QualityVerdict {
    let text_length = text.trim().len();
    let quality = match text_length {
        0 => TextQuality::None,
        n if n < VERY_LOW_MAX => TextQuality::VeryLow,
        n if n < LOW_MAX => TextQuality::Low,
        n if n < MEDIUM_MAX => TextQuality::Medium,
        _ => TextQuality::High,
    };
    let needs_manual_upload = matches!(
        quality,
        TextQuality::None | TextQuality::VeryLow | TextQuality::Low
    );
    let message = match quality {
        TextQuality::None => {
            "No document text could be extracted. Please upload the sales prospectus (PDF)."
        }
        TextQuality::VeryLow | TextQuality::Low => {
            "Very little document text was extracted; the analysis would be unreliable. \
             Please upload the sales prospectus (PDF)."
        }
        TextQuality::Medium => {
            "A usable amount of document text was extracted. Uploading the full prospectus \
             may still improve the analysis."
        }
        TextQuality::High => "The full prospectus text was extracted.",
    };

    QualityVerdict {
        quality,
        text_length,
        needs_manual_upload,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_by_length() {
        assert_eq!(assess("").quality, TextQuality::None);
        assert_eq!(assess(&"x".repeat(50)).quality, TextQuality::VeryLow);
        assert_eq!(assess(&"x".repeat(300)).quality, TextQuality::Low);
        assert_eq!(assess(&"x".repeat(2000)).quality, TextQuality::Medium);
        assert_eq!(assess(&"x".repeat(5000)).quality, TextQuality::High);
    }

    #[test]
    fn manual_upload_gate() {
        assert!(assess("").needs_manual_upload);
        assert!(assess(&"x".repeat(50)).needs_manual_upload);
        assert!(assess(&"x".repeat(300)).needs_manual_upload);
        assert!(!assess(&"x".repeat(2000)).needs_manual_upload);
        assert!(!assess(&"x".repeat(5000)).needs_manual_upload);
    }

    #[test]
    fn whitespace_only_counts_as_none() {
        let verdict = assess("   \n\t  ");
        assert_eq!(verdict.quality, TextQuality::None);
        assert_eq!(verdict.text_length, 0);
    }
}

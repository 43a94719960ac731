//! # Submission validation
//!
//! Everything here runs before any network call. A rejected draft never
//! reaches the media store or the record store.

use std::path::Path;

use cb_core::{AnonymousId, AppError, MediaKind, Result};

pub const MAX_CONTENT_CHARS: usize = 1_000;
pub const MAX_ATTACHMENTS: usize = 7;
pub const MAX_ATTACHMENT_BYTES: usize = 3 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionLimits {
    pub max_content_chars: usize,
    pub max_attachments: usize,
    pub max_attachment_bytes: usize,
}

impl Default for SubmissionLimits {
    fn default() -> Self {
        Self {
            max_content_chars: MAX_CONTENT_CHARS,
            max_attachments: MAX_ATTACHMENTS,
            max_attachment_bytes: MAX_ATTACHMENT_BYTES,
        }
    }
}

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Content type guessed from the file extension.
    pub fn from_file_name(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        Self { file_name, content_type, bytes }
    }

    /// Extension for the stored object: the file's own, else one for its MIME type.
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(str::to_ascii_lowercase)
            .or_else(|| {
                mime_guess::get_mime_extensions_str(&self.content_type)
                    .and_then(|exts| exts.first())
                    .map(|ext| ext.to_string())
            })
            .unwrap_or_else(|| "bin".to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfessionDraft {
    pub content: String,
    pub attachments: Vec<Attachment>,
}

/// A draft that passed validation. Content is trimmed, blank becomes `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidConfession {
    pub content: Option<String>,
    pub attachments: Vec<(Attachment, MediaKind)>,
}

pub fn validate_confession(draft: ConfessionDraft, limits: &SubmissionLimits) -> Result<ValidConfession> {
    if draft.attachments.len() > limits.max_attachments {
        return Err(AppError::validation(format!(
            "at most {} files per confession",
            limits.max_attachments
        )));
    }

    let mut attachments = Vec::with_capacity(draft.attachments.len());
    for attachment in draft.attachments {
        if attachment.bytes.len() > limits.max_attachment_bytes {
            return Err(AppError::validation(format!(
                "{} is larger than {} bytes",
                attachment.file_name, limits.max_attachment_bytes
            )));
        }
        let Some(kind) = MediaKind::from_mime(&attachment.content_type) else {
            return Err(AppError::validation(format!(
                "{} is not an image or video",
                attachment.file_name
            )));
        };
        attachments.push((attachment, kind));
    }

    let content = draft.content.trim();
    if content.chars().count() > limits.max_content_chars {
        return Err(AppError::validation(format!(
            "confession exceeds {} characters",
            limits.max_content_chars
        )));
    }
    if content.is_empty() && attachments.is_empty() {
        return Err(AppError::validation("write something or attach a file"));
    }

    Ok(ValidConfession {
        content: (!content.is_empty()).then(|| content.to_string()),
        attachments,
    })
}

/// Trims a comment body; blank comments are rejected.
pub fn validate_comment(content: &str) -> Result<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("comment cannot be empty"));
    }
    Ok(trimmed.to_string())
}

/// `{author}-{unix_millis}-{index}.{ext}`
pub fn upload_name(author: &AnonymousId, unix_millis: i64, index: usize, attachment: &Attachment) -> String {
    format!("{author}-{unix_millis}-{index}.{}", attachment.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, len: usize) -> Attachment {
        Attachment::from_file_name(name, vec![0u8; len])
    }

    fn draft(content: &str, attachments: Vec<Attachment>) -> ConfessionDraft {
        ConfessionDraft { content: content.to_string(), attachments }
    }

    #[test]
    fn test_content_is_trimmed() {
        let valid = validate_confession(draft("  hello \n", vec![]), &SubmissionLimits::default()).unwrap();
        assert_eq!(valid.content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_media_only_confession_has_no_content() {
        let valid = validate_confession(draft("   ", vec![image("cat.png", 10)]), &SubmissionLimits::default()).unwrap();
        assert_eq!(valid.content, None);
        assert_eq!(valid.attachments[0].1, MediaKind::Image);
    }

    #[test]
    fn test_empty_confession_rejected() {
        let err = validate_confession(draft(" \t", vec![]), &SubmissionLimits::default()).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_content_length_limit_counts_chars() {
        let limits = SubmissionLimits::default();
        assert!(validate_confession(draft(&"é".repeat(1_000), vec![]), &limits).is_ok());
        assert!(validate_confession(draft(&"é".repeat(1_001), vec![]), &limits).is_err());
    }

    #[test]
    fn test_attachment_limits() {
        let limits = SubmissionLimits::default();
        let eight = (0..8).map(|i| image(&format!("{i}.jpg"), 1)).collect();
        assert!(validate_confession(draft("x", eight), &limits).is_err());

        let big = image("big.png", MAX_ATTACHMENT_BYTES + 1);
        assert!(validate_confession(draft("x", vec![big]), &limits).is_err());

        let exact = image("exact.png", MAX_ATTACHMENT_BYTES);
        assert!(validate_confession(draft("x", vec![exact]), &limits).is_ok());
    }

    #[test]
    fn test_non_media_attachment_rejected() {
        let pdf = Attachment::from_file_name("notes.pdf", vec![1, 2, 3]);
        let err = validate_confession(draft("x", vec![pdf]), &SubmissionLimits::default()).unwrap_err();
        assert!(err.to_string().contains("notes.pdf"));
    }

    #[test]
    fn test_validate_comment() {
        assert_eq!(validate_comment("  nice  ").unwrap(), "nice");
        assert!(validate_comment("\n\t ").is_err());
    }

    #[test]
    fn test_upload_name() {
        let author = AnonymousId::parse("12345").unwrap();
        assert_eq!(upload_name(&author, 1_700_000_000_000, 2, &image("Clip.PNG", 1)), "12345-1700000000000-2.png");

        let unnamed = Attachment { file_name: "blob".into(), content_type: "video/mp4".into(), bytes: vec![] };
        assert!(upload_name(&author, 1, 0, &unnamed).starts_with("12345-1-0."));
    }
}

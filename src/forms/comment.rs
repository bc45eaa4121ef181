//! Comment form

use super::{required, FormErrors};
use crate::models::Comment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn from_comment(comment: &Comment) -> Self {
        Self {
            text: comment.text.clone(),
        }
    }

    /// The trimmed comment text
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let text = required(&mut errors, "text", &self.text).to_string();
        errors.into_result(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_form() {
        let form = CommentForm {
            text: "  Nice trip!  ".into(),
        };
        assert_eq!(form.validate().unwrap(), "Nice trip!");

        let errors = CommentForm::default().validate().unwrap_err();
        assert!(errors.has_field("text"));
    }
}

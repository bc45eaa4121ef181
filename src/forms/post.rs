//! Post create/edit form

use super::{checkbox, max_length, required, FormErrors};
use crate::models::{Category, Location, Post, PostInput};
use crate::services::post::TITLE_MAX_LEN;
use crate::services::{MediaError, MediaService};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// Format used to show `pub_date` in a `datetime-local` input
pub const PUB_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";

const PUB_DATE_INPUTS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a submitted publication date, interpreted as UTC
pub fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    PUB_DATE_INPUTS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// A file received with the form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Raw values of the post form
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostForm {
    pub title: String,
    pub text: String,
    pub pub_date: String,
    pub category: String,
    pub location: String,
    pub is_published: bool,
    pub image_clear: bool,
    #[serde(skip)]
    pub image: Option<UploadedFile>,
}

impl PostForm {
    /// Empty form for a new post, published now by default
    pub fn blank(now: DateTime<Utc>) -> Self {
        Self {
            pub_date: now.format(PUB_DATE_FORMAT).to_string(),
            is_published: true,
            ..Default::default()
        }
    }

    /// Form pre-filled from an existing post
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: post.pub_date.format(PUB_DATE_FORMAT).to_string(),
            category: post.category_id.map(|id| id.to_string()).unwrap_or_default(),
            location: post.location_id.map(|id| id.to_string()).unwrap_or_default(),
            is_published: post.is_published,
            image_clear: false,
            image: None,
        }
    }

    /// Apply one submitted text field. Unknown names are ignored.
    ///
    /// Checkboxes are absent from a submission when unticked, so start from
    /// `PostForm::default()` before applying fields.
    pub fn set_field(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = value,
            "text" => self.text = value,
            "pub_date" => self.pub_date = value,
            "category" => self.category = value,
            "location" => self.location = value,
            "is_published" => self.is_published = checkbox(&value),
            "image_clear" => self.image_clear = checkbox(&value),
            _ => {}
        }
    }

    /// Validate against the available choices.
    ///
    /// `current_image` is the image of the post being edited. The returned
    /// input keeps it unless the form clears it; a newly uploaded file is
    /// only checked here and has to be stored by the caller.
    pub fn validate(
        &self,
        categories: &[Category],
        locations: &[Location],
        media: &MediaService,
        current_image: Option<&str>,
    ) -> Result<PostInput, FormErrors> {
        let mut errors = FormErrors::new();

        let title = required(&mut errors, "title", &self.title);
        max_length(&mut errors, "title", title, TITLE_MAX_LEN);
        let text = required(&mut errors, "text", &self.text);

        let pub_date = match required(&mut errors, "pub_date", &self.pub_date) {
            "" => None,
            raw => {
                let parsed = parse_pub_date(raw);
                if parsed.is_none() {
                    errors.add_field("pub_date", "Enter a valid date/time.");
                }
                parsed
            }
        };

        let category_id = match required(&mut errors, "category", &self.category) {
            "" => None,
            raw => {
                let found = raw
                    .parse::<i64>()
                    .ok()
                    .filter(|id| categories.iter().any(|c| c.id == *id));
                if found.is_none() {
                    errors.add_field("category", "Select a valid choice.");
                }
                found
            }
        };

        let location_id = match self.location.trim() {
            "" => None,
            raw => {
                let found = raw
                    .parse::<i64>()
                    .ok()
                    .filter(|id| locations.iter().any(|l| l.id == *id));
                if found.is_none() {
                    errors.add_field("location", "Select a valid choice.");
                }
                found
            }
        };

        if let Some(file) = &self.image {
            match media.check_image(&file.filename, file.data.len() as u64) {
                Ok(_) => {}
                Err(MediaError::TooLarge { max, .. }) => errors.add_field(
                    "image",
                    format!("The file is too large (maximum {} MB).", max / 1024 / 1024),
                ),
                Err(_) => errors.add_field("image", "Upload a valid image (jpg, jpeg or png)."),
            }
        }

        let image = if self.image_clear {
            None
        } else {
            current_image.map(str::to_string)
        };

        match (pub_date, errors.is_empty()) {
            (Some(pub_date), true) => Ok(PostInput {
                title: title.to_string(),
                text: text.to_string(),
                pub_date,
                category_id,
                location_id,
                image,
                is_published: self.is_published,
            }),
            _ => Err(errors),
        }
    }
}

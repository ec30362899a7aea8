//! Editor state for the create forms and the image upload widget.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::{FieldRule, ARTICLE_FIELDS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0} is required.")]
    Missing(&'static str),
    #[error("Failed to retrieve uploaded image URL.")]
    UploadWithoutUrl,
}

/// Success payload of the upload widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadInfo {
    #[serde(default)]
    pub secure_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub public_id: Option<String>,
}

impl UploadInfo {
    /// Prefers the HTTPS URL.
    pub fn hosted_url(&self) -> Option<&str> {
        self.secure_url
            .as_deref()
            .or(self.url.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

/// Body sent when creating an article-like record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemForm {
    pub title: String,
    pub description: String,
    pub image_url: String,
    /// Every image uploaded while the form was open, oldest first.
    pub hosted_urls: Vec<String>,
}

impl ItemForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_image_url(&mut self, url: impl Into<String>) {
        self.image_url = url.into();
    }

    /// The latest upload becomes the item's image.
    pub fn on_upload_success(&mut self, info: &UploadInfo) -> Result<(), FormError> {
        let url = info.hosted_url().ok_or(FormError::UploadWithoutUrl)?;
        self.hosted_urls.push(url.to_string());
        self.image_url = url.to_string();
        Ok(())
    }

    /// Forget an uploaded image. Clears `image_url` if it pointed there.
    pub fn remove_hosted(&mut self, url: &str) {
        self.hosted_urls.retain(|u| u != url);
        if self.image_url == url {
            self.image_url = self.hosted_urls.last().cloned().unwrap_or_default();
        }
    }

    fn value(&self, key: &str) -> &str {
        match key {
            "title" => &self.title,
            "description" => &self.description,
            "imageUrl" => &self.image_url,
            _ => "",
        }
    }

    /// Hand the entered values to `on_submit` and reset the form.
    ///
    /// Nothing is submitted, and nothing cleared, while a required field is
    /// blank.
    pub fn submit<F: FnOnce(NewItem)>(&mut self, on_submit: F) -> Result<(), FormError> {
        check_required(ARTICLE_FIELDS, |key| self.value(key))?;
        let item = NewItem {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            image_url: self.image_url.trim().to_string(),
        };
        *self = Self::default();
        on_submit(item);
        Ok(())
    }
}

fn check_required<'a>(
    rules: &[FieldRule],
    value: impl Fn(&str) -> &'a str,
) -> Result<(), FormError> {
    match rules
        .iter()
        .find(|rule| rule.required && value(rule.key).trim().is_empty())
    {
        Some(rule) => Err(FormError::Missing(rule.label)),
        None => Ok(()),
    }
}

/// Body sent by the public contact form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// The contact form asks for a name as well as the email the store requires.
const CONTACT_FORM_FIELDS: &[FieldRule] = &[
    FieldRule {
        key: "name",
        column: "name",
        label: "Name",
        required: true,
    },
    FieldRule {
        key: "email",
        column: "email",
        label: "Email",
        required: true,
    },
    FieldRule {
        key: "message",
        column: "message",
        label: "Message",
        required: false,
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactForm {
    pub fn new() -> Self {
        Self::default()
    }

    fn value(&self, key: &str) -> &str {
        match key {
            "name" => &self.name,
            "email" => &self.email,
            "message" => &self.message,
            _ => "",
        }
    }

    pub fn submit<F: FnOnce(NewContact)>(&mut self, on_submit: F) -> Result<(), FormError> {
        check_required(CONTACT_FORM_FIELDS, |key| self.value(key))?;
        let contact = NewContact {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            message: self.message.trim().to_string(),
        };
        *self = Self::default();
        on_submit(contact);
        Ok(())
    }
}

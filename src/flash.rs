//! One-shot messages carried across a redirect.
//!
//! The import form redirects back to the catalog page; the outcome rides
//! along in a short-lived cookie that the page consumes and clears.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "ooc_flash";
pub const CLEAR_FLASH_COOKIE: &str = "ooc_flash=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Warning,
    Danger,
}

impl FlashCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

impl Flash {
    pub fn new(category: FlashCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashCategory::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FlashCategory::Warning, message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(FlashCategory::Danger, message)
    }

    /// `Set-Cookie` value carrying this flash.
    pub fn to_set_cookie(&self) -> String {
        // Serializing two plain fields cannot fail.
        let payload = serde_json::to_vec(self).unwrap_or_default();
        format!(
            "{FLASH_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    /// Reads the flash out of a `Cookie` request header, if present and
    /// well formed.
    pub fn from_cookie_header(header: &str) -> Option<Self> {
        let value = header.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == FLASH_COOKIE).then_some(value)
        })?;
        let payload = URL_SAFE_NO_PAD.decode(value).ok()?;
        serde_json::from_slice(&payload).ok()
    }
}

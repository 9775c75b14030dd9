use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::defaults;

/// Either an embedded `data:` payload produced by the image codec or a static path like `/NG-141.jpg`.
pub type ImageRef = String;

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid hex color regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteImages {
    pub hero: ImageRef,
    pub quote_parallax: ImageRef,
    pub gallery: Vec<ImageRef>, // newest first
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteTexts {
    pub hero_title: String,
    pub hero_subtitle: String,
    pub cta_button: String,
    pub manifesto_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteColors {
    pub primary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    /// Empty means leads go straight to the datastore.
    pub form_endpoint: String,
}

/// Everything the admin editor can change on the landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub images: SiteImages,
    pub texts: SiteTexts,
    pub colors: SiteColors,
    pub integration: Integration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextSlot {
    HeroTitle,
    HeroSubtitle,
    CtaButton,
    ManifestoTitle,
}

impl TextSlot {
    /// Human description of where the text shows up, fed to the copywriter prompt.
    pub fn context(&self) -> &'static str {
        match self {
            TextSlot::HeroTitle => "Título principal da seção hero (headline provocativa)",
            TextSlot::HeroSubtitle => "Subtítulo da seção hero, logo abaixo da headline",
            TextSlot::CtaButton => "Texto do botão de chamada para ação (máximo 3 palavras)",
            TextSlot::ManifestoTitle => "Título da seção manifesto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageSlot {
    Hero,
    QuoteParallax,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditError {
    #[error("'{0}' is not a hex color")]
    InvalidColor(String),
    #[error("gallery has {len} images, index {index} is out of range")]
    GalleryIndexOutOfRange { index: usize, len: usize },
    #[error("form endpoint must be empty or an http(s) URL")]
    InvalidEndpoint,
}

pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR.is_match(value)
}

/// Deep-merges `overlay` into `base`. Objects merge key by key, everything else
/// (arrays included) replaces. Nulls in the overlay are skipped so a stored
/// `null` can never blank out a default.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => {
            if !overlay.is_null() {
                *base = overlay;
            }
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        defaults::DEFAULT_SITE_CONFIG.clone()
    }
}

impl SiteConfig {
    /// Lays a possibly partial JSON document over the bundled default and types it.
    pub fn from_partial(overlay: Value) -> Result<Self, serde_json::Error> {
        let mut merged = defaults::default_site_config_value();
        merge_json(&mut merged, overlay);
        let config: SiteConfig = serde_json::from_value(merged)?;
        Ok(config.normalized())
    }

    pub fn normalized(mut self) -> Self {
        if !is_hex_color(&self.colors.primary) {
            self.colors.primary = defaults::DEFAULT_SITE_CONFIG.colors.primary.clone();
        }
        self
    }

    pub fn text(&self, slot: TextSlot) -> &str {
        match slot {
            TextSlot::HeroTitle => &self.texts.hero_title,
            TextSlot::HeroSubtitle => &self.texts.hero_subtitle,
            TextSlot::CtaButton => &self.texts.cta_button,
            TextSlot::ManifestoTitle => &self.texts.manifesto_title,
        }
    }

    pub fn with_text(&self, slot: TextSlot, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        let target = match slot {
            TextSlot::HeroTitle => &mut next.texts.hero_title,
            TextSlot::HeroSubtitle => &mut next.texts.hero_subtitle,
            TextSlot::CtaButton => &mut next.texts.cta_button,
            TextSlot::ManifestoTitle => &mut next.texts.manifesto_title,
        };
        *target = value.into();
        next
    }

    pub fn with_primary_color(&self, value: &str) -> Result<Self, EditError> {
        if !is_hex_color(value) {
            return Err(EditError::InvalidColor(value.to_string()));
        }
        let mut next = self.clone();
        next.colors.primary = value.to_string();
        Ok(next)
    }

    pub fn with_form_endpoint(&self, value: &str) -> Result<Self, EditError> {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            let parsed = url::Url::parse(trimmed).map_err(|_| EditError::InvalidEndpoint)?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(EditError::InvalidEndpoint);
            }
        }
        let mut next = self.clone();
        next.integration.form_endpoint = trimmed.to_string();
        Ok(next)
    }

    pub fn with_image(&self, slot: ImageSlot, image: ImageRef) -> Self {
        let mut next = self.clone();
        match slot {
            ImageSlot::Hero => next.images.hero = image,
            ImageSlot::QuoteParallax => next.images.quote_parallax = image,
        }
        next
    }

    /// New gallery uploads go to the front.
    pub fn with_gallery_image(&self, image: ImageRef) -> Self {
        let mut next = self.clone();
        next.images.gallery.insert(0, image);
        next
    }

    pub fn without_gallery_image(&self, index: usize) -> Result<Self, EditError> {
        let len = self.images.gallery.len();
        if index >= len {
            return Err(EditError::GalleryIndexOutOfRange { index, len });
        }
        let mut next = self.clone();
        next.images.gallery.remove(index);
        Ok(next)
    }

    /// Pretty JSON in the same layout as `assets/default_site_config.json`,
    /// so an export can be dropped in as the new bundled default.
    pub fn to_snapshot(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    pub fn serialized_len(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }
}

use serde::Serialize;

pub const ORIGINAL_LINK_LABEL: &str = "Abrir original";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: url::Url,
    pub label: &'static str,
    pub external: bool,
}

/// Shows a single image enlarged. Holds nothing but the URL being shown.
#[derive(Debug, Clone, Default)]
pub struct ImageViewer {
    url: Option<url::Url>,
}

impl ImageViewer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn open(&mut self, url: url::Url) {
        self.url = Some(url);
    }

    pub fn close(&mut self) {
        self.url = None;
    }

    pub fn is_open(&self) -> bool {
        self.url.is_some()
    }

    pub fn image_url(&self) -> Option<&url::Url> {
        self.url.as_ref()
    }

    pub fn original_link(&self) -> Option<Link> {
        self.url.as_ref().map(|url| Link {
            href: url.clone(),
            label: ORIGINAL_LINK_LABEL,
            external: true,
        })
    }
}

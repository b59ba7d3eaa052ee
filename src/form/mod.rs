//! Upload form
//!
//! Adding an image is a two-phase operation. Selecting a file validates it
//! and pushes the bytes to the image host right away; submitting the form
//! sends the hosted URL together with the title and description to the
//! image API. Once validation passes, a submission always ends with the
//! draft discarded and the form closed, whatever the outcome.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    api::{ImageApi, ImageHost, NewImage},
    cache::QueryCache,
    feed::IMAGES_KEY,
};

mod file;
pub mod validate;

pub use file::{Error as FileError, SelectedFile};
pub use validate::{Field, FieldErrors};

pub const NOTIFICATION_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Success,
    Error,
}

/// Toast shown to the user once a submission ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: &'static str,
    pub description: &'static str,
    pub status: NotificationStatus,
    pub duration: Duration,
    pub closable: bool,
}

impl Notification {
    fn new(status: NotificationStatus, title: &'static str, description: &'static str) -> Self {
        Self {
            title,
            description,
            status,
            duration: NOTIFICATION_DURATION,
            closable: true,
        }
    }

    pub fn missing_image() -> Self {
        Self::new(
            NotificationStatus::Error,
            "Imagem não adicionada",
            "É preciso adicionar e aguardar o upload de uma imagem antes de realizar o cadastro",
        )
    }

    pub fn created() -> Self {
        Self::new(
            NotificationStatus::Success,
            "Imagem cadastrada",
            "Sua imagem foi cadastrada com sucesso.",
        )
    }

    pub fn failed() -> Self {
        Self::new(
            NotificationStatus::Error,
            "Falha no cadastro",
            "Ocorreu um erro ao tentar cadastrar a sua imagem.",
        )
    }

    pub fn is_success(&self) -> bool {
        self.status == NotificationStatus::Success
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Form state between opening the form and finishing (or cancelling) a submission.
#[derive(Debug, Clone, Default)]
pub struct UploadDraft {
    file: Option<SelectedFile>,
    title: String,
    description: String,
    uploaded_url: Option<url::Url>,
    local_preview: Option<String>,
}

impl UploadDraft {
    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn uploaded_url(&self) -> Option<&url::Url> {
        self.uploaded_url.as_ref()
    }

    pub fn local_preview(&self) -> Option<&str> {
        self.local_preview.as_deref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError<E> {
    #[error("invalid image: {0}")]
    Invalid(&'static str),
    #[error("failed to upload image: {0}")]
    Upload(E),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("the upload form is not open")]
    Closed,
    #[error("invalid fields: {0}")]
    Invalid(FieldErrors),
}

#[derive(Default)]
pub struct UploadForm {
    draft: Option<UploadDraft>,
    errors: FieldErrors,
}

impl UploadForm {
    pub fn new() -> Self {
        Default::default()
    }

    /// Opens the form with an empty draft, or returns the draft already being edited.
    pub fn open(&mut self) -> &mut UploadDraft {
        self.draft.get_or_insert_with(|| {
            debug!("open upload form");
            UploadDraft::default()
        })
    }

    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    pub fn draft(&self) -> Option<&UploadDraft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut UploadDraft> {
        self.draft.as_mut()
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn cancel(&mut self) {
        if self.draft.is_some() {
            debug!("cancel upload form");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.draft = None;
        self.errors = FieldErrors::default();
    }

    /// Stores the file in the draft and uploads it to the image host when it is acceptable.
    pub async fn select_file<H: ImageHost>(
        &mut self,
        host: &H,
        file: SelectedFile,
    ) -> Result<url::Url, SelectError<H::Error>> {
        let draft = self.draft.get_or_insert_with(UploadDraft::default);
        draft.uploaded_url = None;
        draft.local_preview = Some(file.name().to_owned());
        let file: &SelectedFile = draft.file.insert(file);

        if let Err(message) = validate::validate_image(Some(file)) {
            debug!(name = %file.name(), message, "rejected selected file");
            self.errors.set(Field::Image, message);
            return Err(SelectError::Invalid(message));
        }

        match host.upload(file).await {
            Ok(url) => {
                info!(name = %file.name(), %url, "image uploaded");
                draft.uploaded_url = Some(url.clone());
                self.errors.clear_field(Field::Image);
                Ok(url)
            }
            Err(error) => {
                warn!(name = %file.name(), %error, "image upload failed");
                self.errors.set(Field::Image, validate::IMAGE_UPLOAD_FAILED);
                Err(SelectError::Upload(error))
            }
        }
    }

    /// Validates the draft. Errors are kept on the form for inline display.
    pub fn validate(&mut self) -> Result<(), SubmitError> {
        let draft = self.draft.as_ref().ok_or(SubmitError::Closed)?;
        let errors = validate::validate_draft(draft);
        self.errors = errors.clone();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SubmitError::Invalid(errors))
        }
    }

    /// Sends the draft's metadata to the image API.
    ///
    /// Invalid fields keep the draft open. Past validation, the draft is
    /// dropped whether or not the request succeeds, and the outcome is
    /// reported as a [`Notification`].
    pub async fn submit<A: ImageApi, V>(
        &mut self,
        api: &A,
        cache: &mut QueryCache<V>,
    ) -> Result<Notification, SubmitError> {
        self.validate()
            .inspect_err(|error| debug!(%error, "submission blocked"))?;
        let draft = self.draft.take().ok_or(SubmitError::Closed)?;
        self.reset();

        let Some(url) = draft.uploaded_url else {
            warn!("submitted without an uploaded image");
            return Ok(Notification::missing_image());
        };
        let image = NewImage {
            url,
            title: draft.title,
            description: draft.description,
        };
        match api.create_image(&image).await {
            Ok(()) => {
                cache.invalidate(IMAGES_KEY);
                info!(title = %image.title, url = %image.url, "image registered");
                Ok(Notification::created())
            }
            Err(error) => {
                warn!(title = %image.title, %error, "failed to register image");
                Ok(Notification::failed())
            }
        }
    }
}

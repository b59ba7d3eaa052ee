//! Field validation for the upload form
//!
//! Each field has an ordered list of rules; only the first failing rule is
//! reported. Lengths are counted in characters, not bytes.

use indexmap::IndexMap;
use serde::Serialize;

use super::{SelectedFile, UploadDraft};

/// Exclusive upper bound on the image size (10 MiB).
pub const MAX_IMAGE_SIZE: u64 = 10_485_760;
pub const TITLE_MIN_CHARS: usize = 2;
pub const TITLE_MAX_CHARS: usize = 20;
pub const DESCRIPTION_MAX_CHARS: usize = 65;

pub const IMAGE_REQUIRED: &str = "Arquivo obrigatório";
pub const IMAGE_FORMAT: &str = "Somente são aceitos arquivos PNG, JPEG e GIF";
pub const IMAGE_TOO_LARGE: &str = "O arquivo deve ser menor que 10MB";
pub const IMAGE_UPLOAD_FAILED: &str = "Falha no envio, tente novamente.";
pub const TITLE_REQUIRED: &str = "Título obrigatório";
pub const TITLE_TOO_SHORT: &str = "Mínimo de 2 caracteres";
pub const TITLE_TOO_LONG: &str = "Máximo de 20 caracteres";
pub const DESCRIPTION_REQUIRED: &str = "Descrição obrigatória";
pub const DESCRIPTION_TOO_LONG: &str = "Máximo de 65 caracteres";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Image,
    Title,
    Description,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Image => "image",
            Field::Title => "title",
            Field::Description => "description",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// User-facing messages keyed by field, in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(IndexMap<Field, &'static str>);

impl FieldErrors {
    pub fn get(&self, field: Field) -> Option<&'static str> {
        self.0.get(&field).copied()
    }

    pub fn set(&mut self, field: Field, message: &'static str) {
        self.0.insert(field, message);
    }

    pub fn clear_field(&mut self, field: Field) {
        self.0.shift_remove(&field);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &'static str)> + '_ {
        self.0.iter().map(|(field, message)| (*field, *message))
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (field, message)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}

pub fn validate_image(file: Option<&SelectedFile>) -> Result<(), &'static str> {
    let file = file.ok_or(IMAGE_REQUIRED)?;
    if !matches!(
        file.content_type().essence_str(),
        "image/png" | "image/jpeg" | "image/gif"
    ) {
        return Err(IMAGE_FORMAT);
    }
    if file.size() >= MAX_IMAGE_SIZE {
        return Err(IMAGE_TOO_LARGE);
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), &'static str> {
    let len = title.chars().count();
    if len == 0 {
        Err(TITLE_REQUIRED)
    } else if len < TITLE_MIN_CHARS {
        Err(TITLE_TOO_SHORT)
    } else if len > TITLE_MAX_CHARS {
        Err(TITLE_TOO_LONG)
    } else {
        Ok(())
    }
}

pub fn validate_description(description: &str) -> Result<(), &'static str> {
    let len = description.chars().count();
    if len == 0 {
        Err(DESCRIPTION_REQUIRED)
    } else if len > DESCRIPTION_MAX_CHARS {
        Err(DESCRIPTION_TOO_LONG)
    } else {
        Ok(())
    }
}

pub fn validate_draft(draft: &UploadDraft) -> FieldErrors {
    let mut errors = FieldErrors::default();
    let checks = [
        (Field::Image, validate_image(draft.file())),
        (Field::Title, validate_title(draft.title())),
        (Field::Description, validate_description(draft.description())),
    ];
    for (field, result) in checks {
        if let Err(message) = result {
            errors.set(field, message);
        }
    }
    errors
}

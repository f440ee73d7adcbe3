// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use base64::Engine as _;
use std::fs;
use std::path::Path;

use crate::AttachmentError;

pub const MAX_IMAGE_SIZE: u64 = 5 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub data_uri: String,
}

impl ImageAttachment {
    pub fn from_bytes(file_name: &str, mime_type: &str, data: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        Self {
            file_name: file_name.to_owned(),
            mime_type: mime_type.to_owned(),
            size_bytes: data.len() as u64,
            data_uri: format!("data:{mime_type};base64,{encoded}"),
        }
    }
}

pub fn load_image(path: &Path, max_bytes: u64) -> Result<ImageAttachment, AttachmentError> {
    let display = path.display().to_string();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_().as_str() != "image" {
        return Err(AttachmentError::NotAnImage {
            path: display,
            mime: mime.essence_str().to_owned(),
        });
    }

    let size = fs::metadata(path)
        .map_err(|source| AttachmentError::Io {
            path: display.clone(),
            source,
        })?
        .len();
    if size > max_bytes {
        return Err(AttachmentError::TooLarge {
            path: display,
            size,
            limit: max_bytes,
        });
    }

    let data = fs::read(path).map_err(|source| AttachmentError::Io {
        path: display.clone(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or(display);

    tracing::debug!(file = %file_name, size, mime = %mime, "image attached");
    Ok(ImageAttachment::from_bytes(
        &file_name,
        mime.essence_str(),
        &data,
    ))
}

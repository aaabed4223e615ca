//! Password protection and removal.
//!
//! This is the in-process half of `/unlock`; when it fails for any reason
//! other than a wrong password the route retries with qpdf.

use super::open_any;
use crate::error::ApiError;
use lopdf::encryption::{DecryptionError, EncryptionState, EncryptionVersion, Permissions};
use lopdf::{Document, Object, StringFormat};
use uuid::Uuid;

/// Encrypts the document with `password` as both user and owner password.
///
/// Existing protection is replaced when it can be opened without a password;
/// a document locked with a real password is refused.
pub fn protect(path: &std::path::Path, password: &str) -> Result<Document, ApiError> {
    const OPERATION: &str = "add-password";

    let mut doc = open_any(path, OPERATION)?;
    if doc.is_encrypted() {
        doc.decrypt("").map_err(|_| ApiError::DocumentEncrypted)?;
        strip_encryption(&mut doc);
    }
    ensure_file_id(&mut doc);

    let version = EncryptionVersion::V2 {
        document: &doc,
        owner_password: password,
        user_password: password,
        key_length: 128,
        permissions: Permissions::all(),
    };
    let state =
        EncryptionState::try_from(version).map_err(|e| ApiError::conversion(OPERATION, e))?;
    doc.encrypt(&state)
        .map_err(|e| ApiError::conversion(OPERATION, e))?;

    Ok(doc)
}

/// Opens and decrypts the document. Unencrypted input is returned unchanged.
pub fn unlock(path: &std::path::Path, password: &str) -> Result<Document, ApiError> {
    const OPERATION: &str = "unlock";

    let mut doc = open_any(path, OPERATION)?;
    if !doc.is_encrypted() {
        return Ok(doc);
    }

    doc.decrypt(password).map_err(|e| {
        if is_wrong_password(&e) {
            ApiError::WrongPassword
        } else {
            ApiError::conversion(OPERATION, e)
        }
    })?;
    strip_encryption(&mut doc);

    Ok(doc)
}

fn is_wrong_password(err: &lopdf::Error) -> bool {
    matches!(
        err,
        lopdf::Error::Decryption(DecryptionError::IncorrectPassword)
    )
}

fn strip_encryption(doc: &mut Document) {
    doc.trailer.remove(b"Encrypt");
    doc.encryption_state = None;
}

/// Standard security handlers key on the first file identifier.
fn ensure_file_id(doc: &mut Document) {
    if doc.trailer.has(b"ID") {
        return;
    }
    let id = Uuid::new_v4().as_bytes().to_vec();
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id, StringFormat::Hexadecimal),
        ]),
    );
}

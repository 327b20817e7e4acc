//! OpenAPI generation for the account views.

use std::path::{Path, PathBuf};

use crate::handlers;
use thiserror::Error;
use utoipa::OpenApi;

/// Top-level OpenAPI document; the per-view documents are merged into it.
#[derive(OpenApi)]
#[openapi(
    info(title = "accounts", description = "Server-rendered account views"),
    tags((name = "accounts", description = "Sign up, sign in, sign out and password reset"))
)]
pub struct AccountsApiDoc;

/// OpenAPI generation and file-write errors.
#[derive(Debug, Error)]
pub enum OpenApiError {
    /// OpenAPI serialization failed.
    #[error("failed to serialize openapi spec: {0}")]
    Serialize(#[from] serde_yaml::Error),

    /// Creating the docs directory failed.
    #[error("failed to create docs directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the OpenAPI file failed.
    #[error("failed to write openapi spec at {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Build the OpenAPI document for every account view.
pub fn openapi_build() -> utoipa::openapi::OpenApi {
    let mut doc = AccountsApiDoc::openapi();
    doc.merge(handlers::sign_up::SignUpApi::openapi());
    doc.merge(handlers::sign_in::SignInApi::openapi());
    doc.merge(handlers::sign_out::SignOutApi::openapi());
    doc.merge(handlers::password_reset::PasswordResetApi::openapi());
    doc
}

/// Generate the OpenAPI document as YAML.
pub fn openapi_yaml_generate() -> Result<String, OpenApiError> {
    Ok(serde_yaml::to_string(&openapi_build())?)
}

/// Write the OpenAPI YAML document to an arbitrary path.
pub fn openapi_yaml_write(path: impl AsRef<Path>) -> Result<(), OpenApiError> {
    let path = path.as_ref();
    let docs_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    std::fs::create_dir_all(&docs_dir).map_err(|source| OpenApiError::CreateDir {
        path: docs_dir.clone(),
        source,
    })?;

    let spec = openapi_yaml_generate()?;
    std::fs::write(path, spec).map_err(|source| OpenApiError::WriteFile {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

/// Write `docs/openapi.yml` next to the manifest and return the written path.
pub fn openapi_yaml_write_default() -> Result<PathBuf, OpenApiError> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("docs")
        .join("openapi.yml");
    openapi_yaml_write(&path)?;
    Ok(path)
}

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm::media::{load_image_file, EncodedImage, MediaError};
use crate::llm::styling::{StylingError, StylingService};
use crate::options::StylingOptions;
use crate::state::{Completion, GenerationTicket, SessionState};
use crate::store::error::StoreError;
use crate::store::kv::KeyValueStore;
use crate::store::models::{SavedLook, User};
use crate::store::profile::ProfileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityMode {
    /// Fresh random id per sign-in; earlier favorites stay under the old id.
    #[default]
    Session,
    /// Id derived from the lower-cased email, so favorites follow the address.
    Email,
}

#[derive(Debug, Clone)]
pub struct StudioSettings {
    pub namespace: String,
    pub identity_mode: IdentityMode,
    pub default_options: StylingOptions,
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self {
            namespace: "barber".to_string(),
            identity_mode: IdentityMode::Session,
            default_options: StylingOptions::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("A valid email address is required (got '{0}')")]
    InvalidEmail(String),
    #[error("There is no generated look to export yet")]
    NothingToExport,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("Failed to write {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            SessionError::InvalidEmail(_) => "Pass an address such as --email you@example.com.",
            SessionError::NothingToExport => "Generate a look before exporting it.",
            SessionError::Store(err) => err.recovery_hint(),
            SessionError::Media(_) => "Choose a readable JPEG, PNG, WebP or HEIC photo.",
            SessionError::Export { .. } => "Check that the output location exists and is writable.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// No image, or a request is already running.
    Skipped,
    Generated,
    Failed,
    Discarded,
}

pub struct Studio<S, K> {
    service: S,
    profiles: ProfileStore<K>,
    identity_mode: IdentityMode,
    state: SessionState,
}

impl<S: StylingService, K: KeyValueStore> Studio<S, K> {
    /// A fresh session that ignores anything already persisted.
    pub fn new(service: S, store: K, settings: StudioSettings) -> Self {
        Self {
            service,
            profiles: ProfileStore::new(store, settings.namespace),
            identity_mode: settings.identity_mode,
            state: SessionState::new(settings.default_options),
        }
    }

    pub fn restore(service: S, store: K, settings: StudioSettings) -> Result<Self, SessionError> {
        let mut studio = Self::new(service, store, settings);
        if let Some(user) = studio.profiles.load_current_user()? {
            let favorites = studio.profiles.load_favorites(&user.id)?;
            info!(
                "Restored user {} with {} favorite(s)",
                user.id,
                favorites.len()
            );
            studio.transition(|state| state.with_signed_in(user, favorites));
        }
        Ok(studio)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    #[cfg(test)]
    pub fn profiles(&self) -> &ProfileStore<K> {
        &self.profiles
    }

    fn transition(&mut self, step: impl FnOnce(SessionState) -> SessionState) {
        let current = std::mem::take(&mut self.state);
        self.state = step(current);
    }

    pub fn upload_image(&mut self, image: EncodedImage) -> Result<(), SessionError> {
        image.validate()?;
        info!(
            "Uploaded {} image ({} bytes)",
            image.mime_type,
            image.data.len()
        );
        self.transition(|state| state.with_uploaded_image(image));
        Ok(())
    }

    pub fn upload_image_file(&mut self, path: &Path) -> Result<(), SessionError> {
        let image = load_image_file(path)?;
        self.upload_image(image)
    }

    pub fn set_options(&mut self, options: StylingOptions) {
        self.transition(|state| state.with_options(options));
    }

    pub fn begin_generation(&mut self) -> Option<GenerationTicket> {
        let current = std::mem::take(&mut self.state);
        match current.clone().begin_generation() {
            Some((next, ticket)) => {
                self.state = next;
                Some(ticket)
            }
            None => {
                self.state = current;
                None
            }
        }
    }

    pub fn finish_generation(
        &mut self,
        ticket: &GenerationTicket,
        result: Result<EncodedImage, StylingError>,
    ) -> GenerateOutcome {
        let current = std::mem::take(&mut self.state);
        let (next, completion) = current.complete_generation(ticket, result);
        self.state = next;
        match completion {
            Completion::Applied => GenerateOutcome::Generated,
            Completion::Failed => GenerateOutcome::Failed,
            Completion::Stale => {
                warn!("Discarding a styled image for a photo that was replaced");
                GenerateOutcome::Discarded
            }
        }
    }

    pub async fn generate(&mut self) -> GenerateOutcome {
        let Some(ticket) = self.begin_generation() else {
            info!("Generate skipped: no photo uploaded or a request is already running");
            return GenerateOutcome::Skipped;
        };
        let result = self
            .service
            .apply_style(&ticket.source, &ticket.options)
            .await;
        self.finish_generation(&ticket, result)
    }

    pub fn save_favorite(&mut self) -> Result<Option<SavedLook>, SessionError> {
        let (Some(image), Some(user)) = (
            self.state.generated_image.as_ref(),
            self.state.current_user.as_ref(),
        ) else {
            return Ok(None);
        };

        let look = SavedLook {
            id: Uuid::new_v4().to_string(),
            image_url: image.to_data_url(),
            options: self
                .state
                .generated_options
                .clone()
                .unwrap_or_else(|| self.state.options.clone()),
            created_at: Utc::now().timestamp_millis(),
        };
        let mut favorites = Vec::with_capacity(self.state.favorites.len() + 1);
        favorites.push(look.clone());
        favorites.extend(self.state.favorites.iter().cloned());
        self.profiles.save_favorites(&user.id, &favorites)?;

        let saved = look.clone();
        self.transition(|state| state.with_favorite(saved));
        Ok(Some(look))
    }

    pub fn sign_in(&mut self, email: &str, name: &str) -> Result<User, SessionError> {
        let email = email.trim();
        let Some((local_part, _)) = email.split_once('@').filter(|(local, domain)| {
            !local.is_empty() && !domain.is_empty()
        }) else {
            return Err(SessionError::InvalidEmail(email.to_string()));
        };
        let name = match name.trim() {
            "" => local_part.to_string(),
            value => value.to_string(),
        };

        let user = User {
            id: mint_user_id(self.identity_mode, email),
            email: email.to_string(),
            name,
        };
        let favorites = self.profiles.load_favorites(&user.id)?;
        self.profiles.save_current_user(&user)?;
        info!(
            "Signed in {} as {} ({} favorite(s))",
            user.email,
            user.id,
            favorites.len()
        );

        let signed_in = user.clone();
        self.transition(|state| state.with_signed_in(signed_in, favorites));
        Ok(user)
    }

    pub fn sign_out(&mut self) -> Result<(), SessionError> {
        self.profiles.clear_current_user()?;
        if let Some(user) = &self.state.current_user {
            info!("Signed out {}", user.id);
        }
        self.transition(SessionState::with_signed_out);
        Ok(())
    }

    pub async fn export_generated(&self, path: &Path) -> Result<(), SessionError> {
        let image = self
            .state
            .generated_image
            .as_ref()
            .ok_or(SessionError::NothingToExport)?;
        write_file(path, &image.data).await?;
        info!("Exported generated look to {}", path.display());
        Ok(())
    }

    /// Writes each favorite as `{created_at}-{id}.{ext}` under `dir`.
    pub async fn export_favorites(&self, dir: &Path) -> Result<Vec<PathBuf>, SessionError> {
        fs::create_dir_all(dir)
            .await
            .map_err(|source| SessionError::Export {
                path: dir.to_path_buf(),
                source,
            })?;

        let mut written = Vec::with_capacity(self.state.favorites.len());
        for look in &self.state.favorites {
            let image = EncodedImage::from_data_url(&look.image_url)?;
            let path = dir.join(format!(
                "{}-{}.{}",
                look.created_at,
                look.id,
                image.extension()
            ));
            write_file(&path, &image.data).await?;
            written.push(path);
        }
        info!(
            "Exported {} favorite(s) to {}",
            written.len(),
            dir.display()
        );
        Ok(written)
    }
}

fn mint_user_id(mode: IdentityMode, email: &str) -> String {
    match mode {
        IdentityMode::Session => Uuid::new_v4().to_string(),
        IdentityMode::Email => {
            let address = format!("mailto:{}", email.to_lowercase());
            Uuid::new_v5(&Uuid::NAMESPACE_URL, address.as_bytes()).to_string()
        }
    }
}

async fn write_file(path: &Path, data: &[u8]) -> Result<(), SessionError> {
    fs::write(path, data)
        .await
        .map_err(|source| SessionError::Export {
            path: path.to_path_buf(),
            source,
        })
}

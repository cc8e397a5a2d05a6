use crate::llm::media::EncodedImage;
use crate::llm::styling::StylingError;
use crate::options::StylingOptions;
use crate::store::models::{SavedLook, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Ready,
    Generating,
    Generated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    pub source: EncodedImage,
    pub options: StylingOptions,
    upload_epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Failed,
    /// The source image changed while the request was in flight.
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub original_image: Option<EncodedImage>,
    pub generated_image: Option<EncodedImage>,
    /// Options that produced `generated_image`, which can differ from the
    /// current selectors.
    pub generated_options: Option<StylingOptions>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub options: StylingOptions,
    pub current_user: Option<User>,
    pub favorites: Vec<SavedLook>,
    upload_epoch: u64,
}

impl SessionState {
    pub fn new(options: StylingOptions) -> Self {
        SessionState {
            options,
            ..Default::default()
        }
    }

    pub fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Generating
        } else if self.original_image.is_none() {
            Phase::Idle
        } else if self.error.is_some() {
            Phase::Failed
        } else if self.generated_image.is_some() {
            Phase::Generated
        } else {
            Phase::Ready
        }
    }

    pub fn can_save_favorite(&self) -> bool {
        self.generated_image.is_some() && self.current_user.is_some()
    }

    pub fn with_uploaded_image(self, image: EncodedImage) -> Self {
        SessionState {
            original_image: Some(image),
            generated_image: None,
            generated_options: None,
            error: None,
            upload_epoch: self.upload_epoch.wrapping_add(1),
            ..self
        }
    }

    pub fn with_options(self, options: StylingOptions) -> Self {
        SessionState { options, ..self }
    }

    /// Returns `None` when there is nothing to style or a request is already
    /// running.
    pub fn begin_generation(self) -> Option<(Self, GenerationTicket)> {
        if self.is_loading {
            return None;
        }
        let source = self.original_image.clone()?;
        let ticket = GenerationTicket {
            source,
            options: self.options.clone(),
            upload_epoch: self.upload_epoch,
        };
        let next = SessionState {
            is_loading: true,
            error: None,
            ..self
        };
        Some((next, ticket))
    }

    pub fn complete_generation(
        self,
        ticket: &GenerationTicket,
        result: Result<EncodedImage, StylingError>,
    ) -> (Self, Completion) {
        let settled = SessionState {
            is_loading: false,
            ..self
        };
        if ticket.upload_epoch != settled.upload_epoch {
            return (settled, Completion::Stale);
        }
        match result {
            Ok(image) => (
                SessionState {
                    generated_image: Some(image),
                    generated_options: Some(ticket.options.clone()),
                    error: None,
                    ..settled
                },
                Completion::Applied,
            ),
            Err(err) => (
                SessionState {
                    error: Some(err.user_message()),
                    ..settled
                },
                Completion::Failed,
            ),
        }
    }

    pub fn with_signed_in(self, user: User, favorites: Vec<SavedLook>) -> Self {
        SessionState {
            current_user: Some(user),
            favorites,
            ..self
        }
    }

    pub fn with_signed_out(self) -> Self {
        SessionState {
            current_user: None,
            favorites: Vec::new(),
            ..self
        }
    }

    /// Prepends `look`. Ignored without a signed-in user.
    pub fn with_favorite(self, look: SavedLook) -> Self {
        if self.current_user.is_none() {
            return self;
        }
        let mut favorites = self.favorites;
        favorites.insert(0, look);
        SessionState { favorites, ..self }
    }
}

pub mod gemini;
pub mod media;
pub mod prompt;
pub mod styling;

pub use gemini::GeminiStylist;
pub use styling::ConsoleCredentialPrompt;

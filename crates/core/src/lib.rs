pub mod assess;
pub mod chat;
pub mod class;
pub mod entities;
pub mod intent;
pub mod models;
pub mod points;
pub mod responder;
pub mod text;

pub use assess::{default_assessment, personalized_assessment, recommendations};
pub use chat::{get_response, ChatOutcome};
pub use class::{efficiency_score, environmental_class};
pub use entities::extract;
pub use intent::classify;
pub use models::*;
pub use points::{score, validate};
pub use responder::compose;
pub use text::{normalize, normalize_with_stats};

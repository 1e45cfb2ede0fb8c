pub mod consumer;
pub mod ingest;
pub mod preprocess;
pub mod refresh;
pub mod suggestions;
pub mod training;
pub mod user_context;

pub use consumer::KafkaEventConsumer;
pub use ingest::EventIngestor;
pub use refresh::RefreshScheduler;
pub use suggestions::SuggestionService;
pub use training::{TrainingQueue, TrainingWorker};
pub use user_context::UserContextService;

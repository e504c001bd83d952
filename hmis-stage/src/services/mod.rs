//! Service layer: export client, outcome log, orchestration, ID extraction

pub mod id_extractor;
pub mod jsoc_client;
pub mod outcome_log;
pub mod stage_orchestrator;

pub use id_extractor::{Extraction, IdExtractor};
pub use jsoc_client::JsocClient;
pub use outcome_log::{OutcomeLog, OutcomeRecord};
pub use stage_orchestrator::{summarize, SessionReport, StageOrchestrator, StageSettings, WorkItem};

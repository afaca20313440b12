mod app_config;
mod candidate;
mod record;
mod source;

pub use app_config::{AppConfig, DbConfig, FetchConfig, LoggingConfig, ScheduleConfig, VerifyConfig};
pub use candidate::{Candidate, Protocol};
pub use record::{EndpointTestResult, StoreStats, StoredProxy, TestOutcome, ValidationRecord};
pub use source::{default_sources, Source, SourceFormat};

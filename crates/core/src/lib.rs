pub mod auth;
pub mod backend;
pub mod config;
pub mod redemption;
pub mod scanner;
pub mod stats;
pub mod testing;
pub mod ticket;

pub use auth::{
    create_authenticator, establish_session, AuthError, AuthSession, Authenticator,
    Credentials, CredentialsAuthenticator, SharedAuthSession,
};
pub use backend::{BackendError, HttpTicketBackend, TicketBackend};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use redemption::{
    create_workflow_channel, OperatorAction, RedemptionController, SessionSnapshot,
    WorkflowHandle, WorkflowState,
};
pub use scanner::{GatedScanner, ScanCapability, ScanEvent};
pub use stats::{StatsMonitor, StatsMonitorHandle, StatsReport};
pub use ticket::{parse_code, ParsedCode, Ticket, TicketStatus};

pub mod event_log;
pub mod history_client;
pub mod logging;
pub mod mock_history;

pub use event_log::{read_event_log, EventLogParser};
pub use history_client::HttpHistorySource;
pub use mock_history::MockHistorySource;

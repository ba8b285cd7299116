pub mod debug_log;
pub mod grouping;
pub mod method_history;
pub mod pagination;
pub mod roster;
pub mod typing;
pub mod window;

pub use debug_log::{DebugEntry, DebugLog};
pub use grouping::{group_messages, GroupedItem, GroupingMemo, InlineGroup, RecomputePath};
pub use method_history::MethodHistory;
pub use pagination::{HistoryPage, HistorySource, OrderedEvent, PaginationGuard};
pub use roster::{RosterOutcome, RosterTracker, SenderView};
pub use typing::{TypingController, TypingSignal, TypingState};
pub use window::{MessageWindow, MessageWindowState};

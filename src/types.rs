mod event;
mod message;
mod method;
mod notice;
mod participant;

pub use event::{
    AgentDebugEvent, AgentDebugPayload, ChannelEvent, ErrorEvent, EventBody, ExecutionPauseEvent,
    LifecycleEvent, MessageEvent, MethodCallEvent, MethodResultEvent, RosterChange, RosterUpdate,
    UpdateMessageEvent,
};
pub use message::{
    Attachment, ChatMessage, DisconnectNotice, MessageKind, MessagePayload, MethodRef,
    SenderMetadata, CONTENT_TYPE_ACTION, CONTENT_TYPE_THINKING, CONTENT_TYPE_TYPING,
};
pub use method::{MethodCallRecord, MethodRecordPatch, MethodStatus};
pub use notice::{DismissibleNotice, NoticeKind};
pub use participant::{
    ExecutionMode, MethodAdvertisement, ParticipantMetrics, ParticipantSnapshot, ParticipantType,
};

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

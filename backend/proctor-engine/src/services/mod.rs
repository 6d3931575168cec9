pub mod attempt_gate;
pub mod catalog;
pub mod integrity;
pub mod result_sink;
pub mod scoring;
pub mod session;
pub mod timer;

pub use attempt_gate::{AttemptGate, AttemptGrant, CatalogProvider, Eligibility};
pub use catalog::InMemoryCatalog;
pub use integrity::{
    EnvironmentSignalSource, IntegrityMonitor, ManualSignalSource, SignalListener, SignalOutcome,
};
pub use result_sink::{DeliveryStatus, JsonLinesResultSink, MemoryResultSink, ResultSink};
pub use session::{ProctoredSession, SessionEngine, Submission};

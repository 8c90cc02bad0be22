pub mod metrics;
pub mod providers;
pub mod relay;

pub use providers::gemini::{GeminiConfig, GeminiLiveProvider};
pub use providers::mock::{MockLiveProvider, MockRecorder};
pub use providers::{LiveProvider, ProviderError};
pub use relay::{relay_connection, PumpExit, RelayOutcome};

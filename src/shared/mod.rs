pub mod clock;
pub mod errors;
pub mod retry;
pub mod shutdown;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{db_err, DomainError, DomainResult, InfraError};
pub use retry::{retry_with_backoff, RetryConfig};
pub use shutdown::{ShutdownNotified, ShutdownSignal};

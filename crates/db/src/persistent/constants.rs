//! This module contains all the constants used in the persistence layer.

use std::time::Duration;

/// The number of times to retry a busy database before erroring out.
pub const DEFAULT_MAX_RETRY_COUNT: usize = 5;

/// The period of time to wait before retrying a busy database.
pub const DEFAULT_BACKOFF_PERIOD: Duration = Duration::from_millis(200);

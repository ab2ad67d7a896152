pub mod error;
pub mod filter;
pub mod ftp;
pub mod job;
pub mod metrics;
pub mod normalize;
pub mod scan;
pub mod source;
pub mod store;
pub mod sync;
pub mod wellness;

pub use error::{FetchError, SetupError, StoreError};
pub use filter::{load_activity_filter, ActivityFilter};
pub use ftp::{resolve_ftp, FtpConfig, FtpResult, FtpSource};
pub use job::{JobConfig, RunSummary};
pub use normalize::{to_record, ActivityRecord, ACTIVITY_FIELDS};
pub use scan::{extract_ftp_watts_strict, positive_f64, scan_for_keys};
pub use source::{ActivitySource, GarminClient, WellnessSource};
pub use wellness::{build_daily_wellness, DailyWellnessRecord, WELLNESS_HEADERS};

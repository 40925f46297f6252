pub mod config;
pub mod directory;
pub mod filter;
pub mod money;
pub mod period;
pub mod voucher;
pub mod workflow;

pub use config::{ConfigError, Correction, DateFormat, ExtractionSettings, OcrSettings, VoucherConfig};
pub use directory::{Directory, Person, PersonId, Role, StaticDirectory};
pub use filter::VoucherFilter;
pub use money::Money;
pub use period::DateRange;
pub use voucher::{ExpenseItem, ValidationError, Voucher, VoucherId, VoucherStatus};
pub use workflow::{Action, WorkflowError};

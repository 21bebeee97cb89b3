mod entry;
mod field;

pub use entry::{CronEntry, DEFAULT_LOOKAHEAD_YEARS};
pub use field::{CronField, FieldMask};

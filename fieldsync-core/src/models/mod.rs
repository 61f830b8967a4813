mod birth;
mod identity;
mod payload;
mod pregnancy;
mod record_type;
mod validation;

pub use birth::{BirthRecord, Sex};
pub use identity::Identity;
pub use payload::RecordPayload;
pub use pregnancy::PregnancyRecord;
pub use record_type::RecordType;
pub use validation::ValidationStatus;

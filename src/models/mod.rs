pub mod conversation;
pub mod enums;
pub mod record;

pub use conversation::ChatMessage;
pub use enums::{CardMediaType, CardStatus, InvalidEnumValue, MessageRole, PrecautionSource};
pub use record::{DueVaccine, PatientInfo, ReceivedVaccine, VaccinationRecord};

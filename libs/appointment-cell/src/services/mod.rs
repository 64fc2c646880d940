pub mod booking;
pub mod clock;
pub mod conflict;
pub mod directory;
pub mod memory;
pub mod policy;
pub mod store;
pub mod supabase;

pub use booking::AppointmentBookingService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use conflict::ConflictDetectionService;
pub use directory::PatientDirectory;
pub use memory::{InMemoryAppointmentStore, InMemoryPatientDirectory};
pub use policy::{AccessPolicy, Operation};
pub use store::{AppointmentStore, StoreError};
pub use supabase::{SupabaseAppointmentStore, SupabasePatientDirectory};

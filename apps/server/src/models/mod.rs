//! Domain models for the appointment platform

pub mod appointment;
pub mod doctor;
pub mod lab;
pub mod pharmacist;
pub mod prescription;
pub mod user;

pub use appointment::{Appointment, AppointmentStatusUpdate, BookingStatus, NewAppointment};
pub use doctor::{Doctor, DoctorProfile, DoctorUpdate};
pub use lab::{
    LabBooking, LabBookingStatusUpdate, LabTechnique, LabTechniqueUpdate,
    NewLabBooking, NewLabTechnique,
};
pub use pharmacist::{Pharmacist, PharmacistProfile, PharmacistUpdate};
pub use prescription::{Medication, NewPrescription, Prescription, PrescriptionStatus};
pub use user::{NewUser, Role, User, UserUpdate};

/// Error returned when a stored or submitted enumeration value is unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl From<UnknownVariant> for crate::Error {
    fn from(e: UnknownVariant) -> Self {
        crate::Error::Validation(e.to_string())
    }
}

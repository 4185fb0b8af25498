//! Database layer - document queries and repositories

pub mod appointments;
pub mod doctors;
pub mod document;
pub mod filter;
pub mod lab_bookings;
pub mod lab_techniques;
pub mod pharmacists;
pub mod prescriptions;
pub mod query;
pub mod users;

use sqlx::PgPool;
use std::time::Instant;

pub use appointments::AppointmentRepository;
pub use doctors::DoctorRepository;
pub use document::{attach_aliases, to_document, Column, ColumnType, EntityDef, Relation};
pub use filter::{Filter, FilterArray, FilterValue};
pub use lab_bookings::LabBookingRepository;
pub use lab_techniques::LabTechniqueRepository;
pub use pharmacists::PharmacistRepository;
pub use prescriptions::PrescriptionRepository;
pub use query::{FindQuery, SortDirection};
pub use users::{Registration, UserRepository};

/// One repository per entity, all sharing the same pool.
#[derive(Clone)]
pub struct Repositories {
    pub users: UserRepository,
    pub doctors: DoctorRepository,
    pub pharmacists: PharmacistRepository,
    pub appointments: AppointmentRepository,
    pub prescriptions: PrescriptionRepository,
    pub lab_techniques: LabTechniqueRepository,
    pub lab_bookings: LabBookingRepository,
}

impl Repositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            doctors: DoctorRepository::new(pool.clone()),
            pharmacists: PharmacistRepository::new(pool.clone()),
            appointments: AppointmentRepository::new(pool.clone()),
            prescriptions: PrescriptionRepository::new(pool.clone()),
            lab_techniques: LabTechniqueRepository::new(pool.clone()),
            lab_bookings: LabBookingRepository::new(pool),
        }
    }
}

pub(crate) fn observe(entity: &str, operation: &str, start: Instant) {
    crate::metrics::DB_QUERY_DURATION_SECONDS
        .with_label_values(&[entity, operation])
        .observe(start.elapsed().as_secs_f64());
}

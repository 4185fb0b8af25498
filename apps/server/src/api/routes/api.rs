//! JSON API routes mounted under `/api`
//!
//! Every route runs behind the bearer-token middleware. Handlers decide
//! whether a principal is required and which roles may proceed.

use crate::api::handlers::{
    appointments, auth, doctors, lab_bookings, lab_techniques, pharmacists, prescriptions, users,
};
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Users (exact routes before parameterized ones)
        .route("/users", get(users::list_users))
        .route("/users/me", patch(users::update_me))
        .route("/users/:id", get(users::get_user).delete(users::delete_user))
        // Doctors
        .route("/doctors", get(doctors::list_doctors))
        .route("/doctors/me", patch(doctors::update_me))
        .route("/doctors/:id", get(doctors::get_doctor))
        // Pharmacists
        .route("/pharmacists", get(pharmacists::list_pharmacists))
        .route("/pharmacists/me", patch(pharmacists::update_me))
        .route("/pharmacists/:id", get(pharmacists::get_pharmacist))
        // Appointments
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/appointments/:id",
            get(appointments::get_appointment).delete(appointments::delete_appointment),
        )
        .route(
            "/appointments/:id/status",
            patch(appointments::update_status),
        )
        // Prescriptions
        .route(
            "/prescriptions",
            get(prescriptions::list_prescriptions).post(prescriptions::create_prescription),
        )
        .route("/prescriptions/:id", get(prescriptions::get_prescription))
        .route(
            "/prescriptions/:id/dispense",
            patch(prescriptions::dispense_prescription),
        )
        .route(
            "/prescriptions/:id/cancel",
            patch(prescriptions::cancel_prescription),
        )
        // Lab catalogue and bookings
        .route(
            "/lab-techniques",
            get(lab_techniques::list_lab_techniques).post(lab_techniques::create_lab_technique),
        )
        .route(
            "/lab-techniques/:id",
            get(lab_techniques::get_lab_technique)
                .patch(lab_techniques::update_lab_technique)
                .delete(lab_techniques::delete_lab_technique),
        )
        .route(
            "/lab-bookings",
            get(lab_bookings::list_lab_bookings).post(lab_bookings::create_lab_booking),
        )
        .route(
            "/lab-bookings/:id",
            get(lab_bookings::get_lab_booking).delete(lab_bookings::delete_lab_booking),
        )
        .route(
            "/lab-bookings/:id/status",
            patch(lab_bookings::update_status),
        )
}

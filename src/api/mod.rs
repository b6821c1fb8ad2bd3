pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod extract;
pub mod drivers;
pub mod facilities;
pub mod health;
pub mod invoices;
pub mod messages;
pub mod notifications;
pub mod trips;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::infrastructure::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::get_me))
        .route("/auth/change-password", post(auth::change_password))
        // Dashboard
        .route("/dashboard/stats", get(dashboard::get_stats))
        // Trips
        .route("/trips", get(trips::list_trips).post(trips::create_trip))
        .route("/trips/actions", post(trips::trip_action))
        .route(
            "/trips/:id",
            get(trips::get_trip)
                .put(trips::update_trip)
                .delete(trips::delete_trip),
        )
        .route("/trips/:id/assign-driver", post(trips::assign_driver))
        .route("/trips/:id/approve", post(trips::approve_trip))
        .route("/trips/:id/reject", post(trips::reject_trip))
        .route("/trips/:id/complete", post(trips::complete_trip))
        // Drivers
        .route(
            "/drivers",
            get(drivers::list_drivers).post(drivers::create_driver),
        )
        .route(
            "/drivers/:id",
            get(drivers::get_driver)
                .put(drivers::update_driver)
                .delete(drivers::delete_driver),
        )
        // Individual clients
        .route(
            "/clients",
            get(clients::list_clients).post(clients::create_client),
        )
        .route(
            "/clients/:id",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        )
        // Facility-managed clients
        .route(
            "/managed-clients",
            get(clients::list_managed_clients).post(clients::create_managed_client),
        )
        .route(
            "/managed-clients/:id",
            put(clients::update_managed_client).delete(clients::delete_managed_client),
        )
        // Facilities
        .route(
            "/facilities",
            get(facilities::list_facilities).post(facilities::create_facility),
        )
        .route(
            "/facilities/:id",
            get(facilities::get_facility)
                .put(facilities::update_facility)
                .delete(facilities::delete_facility),
        )
        .route(
            "/facilities/:id/users",
            post(facilities::create_facility_user),
        )
        // Invoices
        .route(
            "/invoices",
            get(invoices::list_invoices).post(invoices::create_invoice),
        )
        .route("/invoices/generate", post(invoices::generate_invoice))
        .route("/invoices/export", get(invoices::export_invoices))
        .route("/invoices/mark-overdue", post(invoices::mark_overdue))
        .route(
            "/invoices/:id",
            get(invoices::get_invoice).delete(invoices::delete_invoice),
        )
        .route("/invoices/:id/status", put(invoices::update_invoice_status))
        .route("/invoices/:id/claim-payment", post(invoices::claim_payment))
        .route("/invoices/:id/verify-payment", post(invoices::verify_payment))
        .route(
            "/payment-verification",
            get(invoices::list_pending_verification),
        )
        // Messages
        .route(
            "/messages/conversations",
            get(messages::list_conversations).post(messages::start_conversation),
        )
        .route(
            "/messages/conversations/:id",
            get(messages::get_conversation).post(messages::post_message),
        )
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route(
            "/push-tokens",
            post(notifications::register_push_token).delete(notifications::remove_push_token),
        )
        .with_state(state)
}

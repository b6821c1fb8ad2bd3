use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::auth::login,
        api::auth::get_me,
        api::dashboard::get_stats,
        api::trips::trip_action,
        api::invoices::generate_invoice,
    ),
    tags(
        (name = "dispatch-admin", description = "Dispatcher administration API")
    )
)]
pub struct ApiDoc;

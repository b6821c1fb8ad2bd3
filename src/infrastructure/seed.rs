use crate::auth::hash_password;
use crate::models::{facility, managed_client, profile, trip};
use sea_orm::*;

/// Create the bootstrap dispatcher account unless a dispatcher already exists.
/// Returns true when an account was created.
pub async fn ensure_dispatcher(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
) -> Result<bool, DbErr> {
    let existing = profile::Entity::find()
        .filter(profile::Column::Role.eq("dispatcher"))
        .count(db)
        .await?;
    if existing > 0 {
        return Ok(false);
    }

    let password_hash = hash_password(password).map_err(DbErr::Custom)?;
    let now = chrono::Utc::now().to_rfc3339();

    profile::ActiveModel {
        email: Set(email.trim().to_lowercase()),
        password_hash: Set(password_hash),
        first_name: Set("Dispatch".to_owned()),
        last_name: Set("Admin".to_owned()),
        role: Set("dispatcher".to_owned()),
        status: Set("active".to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Bootstrap dispatcher {} created", email);
    Ok(true)
}

pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    // 1. Facility with one managed client
    let facility = facility::ActiveModel {
        name: Set("Sunrise Senior Living".to_owned()),
        address: Set(Some("400 Sunrise Blvd".to_owned())),
        phone: Set(Some("555-0100".to_owned())),
        billing_email: Set(Some("billing@sunrise.example".to_owned())),
        contact_name: Set(Some("Pat Morgan".to_owned())),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let resident = managed_client::ActiveModel {
        facility_id: Set(facility.id),
        first_name: Set("Eleanor".to_owned()),
        last_name: Set("Reyes".to_owned()),
        phone: Set(Some("555-0101".to_owned())),
        medical_notes: Set(Some("Uses a foldable wheelchair".to_owned())),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    // 2. Driver and individual client
    let demo_password = hash_password("demo1234").map_err(DbErr::Custom)?;
    let mut accounts = Vec::new();
    for (email, first, last, role) in [
        ("driver@demo.example", "Sam", "Okafor", "driver"),
        ("client@demo.example", "Lee", "Chen", "client"),
    ] {
        let res = profile::Entity::insert(profile::ActiveModel {
            email: Set(email.to_owned()),
            password_hash: Set(demo_password.clone()),
            first_name: Set(first.to_owned()),
            last_name: Set(last.to_owned()),
            role: Set(role.to_owned()),
            status: Set("active".to_owned()),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        })
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(profile::Column::Email)
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await;
        match res {
            Ok(r) => accounts.push(r.last_insert_id),
            Err(DbErr::RecordNotInserted) => {
                tracing::debug!("Demo account {} already present", email)
            }
            Err(e) => return Err(e),
        }
    }

    // 3. Trips: one pending facility trip, one pending individual trip
    let tomorrow = (chrono::Utc::now() + chrono::Duration::days(1)).to_rfc3339();
    let mut trips = vec![trip::ActiveModel {
        managed_client_id: Set(Some(resident.id)),
        facility_id: Set(Some(facility.id)),
        pickup_address: Set("400 Sunrise Blvd".to_owned()),
        destination_address: Set("Mercy Dialysis Center".to_owned()),
        pickup_time: Set(tomorrow.clone()),
        is_round_trip: Set(true),
        wheelchair_type: Set(Some("foldable".to_owned())),
        additional_passengers: Set(0),
        price: Set(Some(68.0)),
        status: Set("upcoming".to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }];
    if let Some(client_id) = accounts.get(1) {
        trips.push(trip::ActiveModel {
            user_id: Set(Some(*client_id)),
            pickup_address: Set("12 Oak St".to_owned()),
            destination_address: Set("City Medical Plaza".to_owned()),
            pickup_time: Set(tomorrow),
            is_round_trip: Set(false),
            additional_passengers: Set(1),
            price: Set(Some(42.5)),
            status: Set("pending".to_owned()),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        });
    }
    trip::Entity::insert_many(trips).exec(db).await?;

    Ok(())
}

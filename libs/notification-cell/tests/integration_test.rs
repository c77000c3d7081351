use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use notification_cell::{
    router::notification_routes, NewNotification, NotificationChannel, NotificationError,
    NotificationStore, NotificationType,
};
use shared_utils::test_utils::TestClinic;

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn seed_notification(clinic: &TestClinic, patient_id: Uuid) -> Uuid {
    clinic
        .state
        .db
        .write(move |conn| -> Result<Uuid, NotificationError> {
            NotificationStore::insert(
                conn,
                &NewNotification {
                    appointment_id: None,
                    patient_id,
                    notification_type: NotificationType::AppointmentReminder,
                    channel: NotificationChannel::InApp,
                    title: "Recordatorio".to_string(),
                    message: "Tiene una cita mañana.".to_string(),
                },
                Utc::now(),
            )
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_patient_lists_and_reads_own_notifications() {
    let clinic = TestClinic::seeded().await;
    let token = clinic.token_for(&clinic.patient);
    let id = seed_notification(&clinic, clinic.patient_profile()).await;
    seed_notification(&clinic, clinic.patient_profile()).await;

    let response = notification_routes(clinic.state.clone())
        .oneshot(request("GET", "/", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = json_body(response).await;
    assert_eq!(listed["total"], 2);
    assert_eq!(listed["unread"], 2);
    assert_eq!(listed["notifications"][0]["notification_type"], "APPOINTMENT_REMINDER");
    assert_eq!(listed["notifications"][0]["channel"], "IN_APP");

    let response = notification_routes(clinic.state.clone())
        .oneshot(request("POST", &format!("/{}/read", id), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["notification"]["read_at"].is_string());

    let response = notification_routes(clinic.state.clone())
        .oneshot(request("GET", "/?unread_only=true", &token))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["total"], 1);

    let response = notification_routes(clinic.state.clone())
        .oneshot(request("POST", "/read-all", &token))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["updated"], 1);
}

#[tokio::test]
async fn test_foreign_notification_is_not_found() {
    let clinic = TestClinic::seeded().await;
    let other_patient = shared_utils::test_utils::TestUser::patient("other@example.com");
    let other_profile = shared_utils::test_utils::TestFixtures::seed_patient(
        &clinic.state.db,
        &other_patient,
        "Otro",
    )
    .await;
    let id = seed_notification(&clinic, other_profile).await;

    let response = notification_routes(clinic.state.clone())
        .oneshot(request("GET", &format!("/{}", id), &clinic.token_for(&clinic.patient)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = notification_routes(clinic.state.clone())
        .oneshot(request("GET", &format!("/{}", id), &clinic.token_for(&clinic.admin)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_only_staff_record_delivery() {
    let clinic = TestClinic::seeded().await;
    let id = seed_notification(&clinic, clinic.patient_profile()).await;
    let uri = format!("/{}/sent", id);

    let response = notification_routes(clinic.state.clone())
        .oneshot(request("POST", &uri, &clinic.token_for(&clinic.patient)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = notification_routes(clinic.state.clone())
        .oneshot(request("POST", &uri, &clinic.token_for(&clinic.professional)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["notification"]["sent_at"].is_string());

    let response = notification_routes(clinic.state.clone())
        .oneshot(request(
            "POST",
            &format!("/{}/sent", Uuid::new_v4()),
            &clinic.token_for(&clinic.admin),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

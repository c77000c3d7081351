use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rusqlite::params;
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{time::encode_timestamp, AppState, Database, DbResult};
use shared_models::auth::{Actor, Role, User};

pub struct TestConfig {
    pub jwt_secret: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            database_path: ":memory:".to_string(),
            jwt_secret: self.jwt_secret.clone(),
            ..AppConfig::default()
        }
    }

    /// Fresh state backed by its own in-memory database.
    pub fn to_app_state(&self) -> Arc<AppState> {
        let db = Database::open_in_memory().expect("in-memory database should open");
        Arc::new(AppState::new(self.to_app_config(), db))
    }
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub profile_id: Option<Uuid>,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("test@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            profile_id: None,
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn professional(email: &str) -> Self {
        Self::new(email, "professional")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn with_profile(mut self, profile_id: Uuid) -> Self {
        self.profile_id = Some(profile_id);
        self
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            profile_id: self.profile_id,
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn to_actor(&self) -> Actor {
        let role = self.role.parse::<Role>().expect("test user role should parse");
        Actor::new(self.id.clone(), role, self.profile_id)
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "app_metadata": { "profile_id": user.profile_id.map(|id| id.to_string()) },
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Raw-SQL seeding for rows the API itself only lets admins create.
pub struct TestFixtures;

impl TestFixtures {
    pub async fn seed_patient(db: &Database, user: &TestUser, full_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let user_id = user.id.clone();
        let full_name = full_name.to_string();
        db.write(move |conn| -> DbResult<()> {
            conn.execute(
                "INSERT INTO patient_profiles (id, user_id, full_name, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), user_id, full_name, encode_timestamp(&Utc::now())],
            )?;
            Ok(())
        })
        .await
        .expect("patient fixture should insert");
        id
    }

    pub async fn seed_professional(db: &Database, user: &TestUser, full_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let user_id = user.id.clone();
        let full_name = full_name.to_string();
        db.write(move |conn| -> DbResult<()> {
            conn.execute(
                "INSERT INTO professional_profiles (id, user_id, full_name, specialty, created_at)
                 VALUES (?1, ?2, ?3, 'Fisioterapia', ?4)",
                params![id.to_string(), user_id, full_name, encode_timestamp(&Utc::now())],
            )?;
            Ok(())
        })
        .await
        .expect("professional fixture should insert");
        id
    }

    pub async fn seed_room(db: &Database, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let name = name.to_string();
        db.write(move |conn| -> DbResult<()> {
            conn.execute(
                "INSERT INTO rooms (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![id.to_string(), name, encode_timestamp(&Utc::now())],
            )?;
            Ok(())
        })
        .await
        .expect("room fixture should insert");
        id
    }

    pub async fn seed_equipment(db: &Database, name: &str, room_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        let name = name.to_string();
        db.write(move |conn| -> DbResult<()> {
            let now = encode_timestamp(&Utc::now());
            conn.execute(
                "INSERT INTO equipment (id, name, room_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id.to_string(), name, room_id.map(|r| r.to_string()), now],
            )?;
            Ok(())
        })
        .await
        .expect("equipment fixture should insert");
        id
    }
}

/// A small clinic: one room, one patient, two professionals and an admin.
pub struct TestClinic {
    pub config: TestConfig,
    pub state: Arc<AppState>,
    pub room_id: Uuid,
    pub patient: TestUser,
    pub professional: TestUser,
    pub other_professional: TestUser,
    pub admin: TestUser,
}

impl TestClinic {
    pub async fn seeded() -> Self {
        let config = TestConfig::default();
        let state = config.to_app_state();

        let room_id = TestFixtures::seed_room(&state.db, "Sala 1").await;

        let patient = TestUser::patient("patient@example.com");
        let patient_profile = TestFixtures::seed_patient(&state.db, &patient, "Ana Paciente").await;
        let patient = patient.with_profile(patient_profile);

        let professional = TestUser::professional("pro@example.com");
        let professional_profile =
            TestFixtures::seed_professional(&state.db, &professional, "Luis Fisio").await;
        let professional = professional.with_profile(professional_profile);

        let other = TestUser::professional("other@example.com");
        let other_profile = TestFixtures::seed_professional(&state.db, &other, "Eva Fisio").await;
        let other_professional = other.with_profile(other_profile);

        let admin = TestUser::admin("admin@example.com");

        Self {
            config,
            state,
            room_id,
            patient,
            professional,
            other_professional,
            admin,
        }
    }

    pub fn token_for(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, None)
    }

    pub fn patient_profile(&self) -> Uuid {
        self.patient.profile_id.unwrap_or_default()
    }

    pub fn professional_profile(&self) -> Uuid {
        self.professional.profile_id.unwrap_or_default()
    }
}

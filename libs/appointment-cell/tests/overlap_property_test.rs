use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use appointment_cell::services::conflict::{appointments_overlap, detect_conflict, SlotCandidate};
use appointment_cell::{
    Appointment, AppointmentBookingService, AppointmentError, AppointmentListQuery,
    AppointmentStatus, CreateAppointmentRequest,
};
use shared_utils::test_utils::{TestClinic, TestFixtures};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 4, 1, 7, 0, 0).unwrap()
}

fn day_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 4, 2, 8, 0, 0).unwrap()
}

#[derive(Debug, Clone)]
struct Attempt {
    professional: usize,
    room: usize,
    offset_quarters: i64,
    length_quarters: i64,
    cancel_after: bool,
}

fn attempt() -> impl Strategy<Value = Attempt> {
    (0usize..2, 0usize..2, 0i64..32, 1i64..8, any::<bool>()).prop_map(
        |(professional, room, offset_quarters, length_quarters, cancel_after)| Attempt {
            professional,
            room,
            offset_quarters,
            length_quarters,
            cancel_after,
        },
    )
}

fn assert_no_overlaps(appointments: &[Appointment]) {
    let active: Vec<&Appointment> = appointments.iter().filter(|a| a.is_active()).collect();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            let shares = a.professional_id == b.professional_id || a.room_id == b.room_id;
            assert!(
                !(shares && appointments_overlap(a.start_time, a.end_time, b.start_time, b.end_time)),
                "active appointments {} and {} overlap",
                a.id,
                b.id
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn booked_schedule_never_double_books(attempts in prop::collection::vec(attempt(), 1..16)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let clinic = TestClinic::seeded().await;
            let second_room = TestFixtures::seed_room(&clinic.state.db, "Sala 2").await;
            let professionals = [
                clinic.professional_profile(),
                clinic.other_professional.profile_id.unwrap(),
            ];
            let rooms = [clinic.room_id, second_room];
            let service = AppointmentBookingService::new(&clinic.state);
            let admin = clinic.admin.to_actor();

            for attempt in attempts {
                let start = day_start() + Duration::minutes(15 * attempt.offset_quarters);
                let request = CreateAppointmentRequest {
                    patient_id: Some(clinic.patient_profile()),
                    professional_id: Some(professionals[attempt.professional]),
                    room_id: Some(rooms[attempt.room]),
                    equipment_ids: vec![],
                    start_time: start,
                    end_time: Some(start + Duration::minutes(15 * attempt.length_quarters)),
                    treatment_type: "Fisioterapia".to_string(),
                    notes: String::new(),
                };

                match service.create_appointment(admin.clone(), request, now()).await {
                    Ok(created) => {
                        assert_eq!(created.version, 1);
                        if attempt.cancel_after {
                            service.cancel(admin.clone(), created.id, None, now()).await.unwrap();
                        }
                    }
                    Err(AppointmentError::ProfessionalConflict { .. })
                    | Err(AppointmentError::RoomConflict { .. }) => {}
                    Err(other) => panic!("unexpected booking failure: {}", other),
                }
            }

            let all = service
                .list_appointments(admin, AppointmentListQuery::default())
                .await
                .unwrap();
            assert_no_overlaps(&all);
        });
    }

    #[test]
    fn snapshot_check_matches_pairwise_rule(
        existing in prop::collection::vec((0i64..24, 1i64..6, 0usize..2, 0usize..2, any::<bool>()), 0..10),
        probe in (0i64..24, 1i64..6, 0usize..2, 0usize..2),
    ) {
        let professionals = [Uuid::new_v4(), Uuid::new_v4()];
        let rooms = [Uuid::new_v4(), Uuid::new_v4()];
        let snapshot: Vec<Appointment> = existing
            .iter()
            .map(|&(offset, length, professional, room, active)| {
                let start = day_start() + Duration::minutes(30 * offset);
                Appointment {
                    id: Uuid::new_v4(),
                    patient_id: Uuid::new_v4(),
                    professional_id: professionals[professional],
                    room_id: rooms[room],
                    equipment_ids: vec![],
                    start_time: start,
                    end_time: start + Duration::minutes(30 * length),
                    status: if active { AppointmentStatus::Confirmed } else { AppointmentStatus::Cancelled },
                    treatment_type: "Masaje".to_string(),
                    notes: String::new(),
                    created_by: None,
                    version: 1,
                    created_at: now(),
                    updated_at: now(),
                }
            })
            .collect();

        let start = day_start() + Duration::minutes(30 * probe.0);
        let candidate = SlotCandidate {
            professional_id: professionals[probe.2],
            room_id: Some(rooms[probe.3]),
            start,
            end: start + Duration::minutes(30 * probe.1),
            exclude: None,
        };

        let blocked = snapshot.iter().any(|a| {
            a.is_active()
                && (a.professional_id == candidate.professional_id || Some(a.room_id) == candidate.room_id)
                && appointments_overlap(a.start_time, a.end_time, candidate.start, candidate.end)
        });
        prop_assert_eq!(detect_conflict(&candidate, &snapshot).has_conflict(), blocked);
    }
}

#[test]
fn touching_intervals_do_not_overlap() {
    let start = day_start();
    let end = start + Duration::hours(1);
    assert!(!appointments_overlap(start, end, end, end + Duration::hours(1)));
    assert!(appointments_overlap(start, end, end - Duration::minutes(1), end + Duration::hours(1)));
}

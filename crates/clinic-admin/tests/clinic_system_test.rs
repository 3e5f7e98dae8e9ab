use clinic_admin::lifecycle::{ClinicConfig, ClinicSystem};
use clinic_admin::model::{Department, Doctor, DoctorDraft, Gender, RecordId};
use crud_sync::mock::MockTransport;
use crud_sync::transport::{Method, RequestBody};
use crud_sync::{
    AuthFailure, Credential, CredentialStore, FileStore, ListPhase, LoginDraft, SessionStatus,
    SubmitError, SyncError,
};
use serde_json::json;

fn config() -> ClinicConfig {
    ClinicConfig {
        api_url: "http://clinic.test".into(),
        credential_file: None,
        mailbox_size: 8,
        request_timeout_secs: None,
    }
}

fn signed_in() -> CredentialStore {
    let credentials = CredentialStore::in_memory();
    credentials.set(Credential::new("clinic-token")).unwrap();
    credentials
}

fn complete_doctor() -> DoctorDraft {
    DoctorDraft {
        name: "Dilnoza Karimova".into(),
        phone: "+998901234567".into(),
        spec: "s1".into(),
        department: "d1".into(),
        gender: Gender::Female.code(),
        birthday: "1985-04-12".into(),
        family_phone: "+998907654321".into(),
        region: "Tashkent".into(),
        district: "Yunusabad".into(),
        education: "TMA".into(),
        ..DoctorDraft::default()
    }
}

#[tokio::test]
async fn test_sign_in_then_manage_departments() {
    let mock = MockTransport::new();
    mock.expect(Method::Post, "/auth/login")
        .respond_json(200, json!({ "token": "fresh" }));
    mock.expect(Method::Post, "/department")
        .respond_json(201, json!({ "_id": "d1", "title": "Cardiology" }));
    mock.expect(Method::Get, "/department").respond_json(
        200,
        json!([{ "_id": "d1", "title": "Cardiology", "status": 1, "userId": "u1" }]),
    );
    mock.expect(Method::Delete, "/department/d1").respond_status(200);
    mock.expect(Method::Get, "/department").respond_json(200, json!([]));

    let system =
        ClinicSystem::with_transport(&config(), mock.shared(), CredentialStore::in_memory());
    assert_eq!(*system.session().borrow(), SessionStatus::SignedOut);

    let login = LoginDraft {
        login: "admin".into(),
        password: "secret".into(),
    };
    system.auth.login(&login).await.unwrap();
    assert_eq!(*system.session().borrow(), SessionStatus::SignedIn);

    let mut form = system.form::<Department>();
    form.open_create().unwrap();
    form.draft_mut().unwrap().title = "Cardiology".into();
    let saved = form.submit(&system.departments).await.unwrap();

    assert_eq!(saved.id, RecordId::from("d1"));
    assert!(form.is_closed());
    assert_eq!(system.departments.items()[0].user_id.as_deref(), Some("u1"));

    system.departments.remove(saved.id.clone()).await.unwrap();
    assert!(system.departments.items().is_empty());

    let requests = mock.requests();
    assert_eq!(requests[1].header("Authorization"), Some("Bearer fresh"));
    assert_eq!(requests[1].url, "http://clinic.test/department");
    mock.verify();

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_doctor_with_avatar_is_sent_as_multipart() {
    let mock = MockTransport::new();
    mock.expect(Method::Post, "/doctor")
        .respond_json(201, json!({ "_id": "doc1", "name": "Dilnoza Karimova" }));
    mock.expect(Method::Get, "/doctor").respond_json(
        200,
        json!([{
            "_id": "doc1",
            "name": "Dilnoza Karimova",
            "phone": "+998901234567",
            "spec": "s1",
            "department": "d1",
            "gender": "2",
            "birthday": 482112000000i64,
            "family": 3,
            "familyphone": "+998907654321",
            "worktime": 3,
            "region": "Tashkent",
            "district": "Yunusabad",
            "education": "TMA",
            "avatar": "uploads/doc1.png"
        }]),
    );

    let system = ClinicSystem::with_transport(&config(), mock.shared(), signed_in());
    let mut form = system.form::<Doctor>();
    form.open_create().unwrap();
    *form.draft_mut().unwrap() =
        complete_doctor().with_avatar("doc1.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]);

    form.submit(&system.doctors).await.unwrap();

    let post = &mock.requests()[0];
    match &post.body {
        RequestBody::Multipart { fields, files } => {
            assert!(fields.contains(&("familyPhone".to_string(), "+998907654321".to_string())));
            assert!(fields.contains(&("workTime".to_string(), "3".to_string())));
            assert!(fields.contains(&("gender".to_string(), "2".to_string())));
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].field, "avatar");
            assert_eq!(files[0].file_name, "doc1.png");
        }
        other => panic!("expected multipart body, got {other:?}"),
    }

    let doctors = system.doctors.items();
    assert_eq!(doctors[0].gender, Some(Gender::Female));
    assert_eq!(doctors[0].avatar.as_deref(), Some("uploads/doc1.png"));
    mock.verify();
}

#[tokio::test]
async fn test_invalid_doctor_never_reaches_the_server() {
    let mock = MockTransport::new();
    let system = ClinicSystem::with_transport(&config(), mock.shared(), signed_in());

    let mut form = system.form::<Doctor>();
    form.open_create().unwrap();
    *form.draft_mut().unwrap() = DoctorDraft {
        family: 0,
        ..complete_doctor()
    };

    match form.submit(&system.doctors).await {
        Err(SubmitError::Invalid(fields)) => {
            assert_eq!(fields.len(), 1);
            assert!(fields.contains("family"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(form.errors().unwrap().fields.len(), 1);
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn test_rejected_token_signs_out_every_screen() {
    let mock = MockTransport::new();
    mock.expect(Method::Get, "/room").respond_status(401);

    let credentials = signed_in();
    let system = ClinicSystem::with_transport(&config(), mock.shared(), credentials.clone());
    let mut session = system.session();

    let err = system.rooms.refresh().await.unwrap_err();
    assert_eq!(err, SyncError::Auth(AuthFailure::Rejected { status: 401 }));
    session.changed().await.unwrap();
    assert_eq!(*session.borrow(), SessionStatus::SignedOut);

    // Other controllers share the store, so they are gated too.
    let err = system.doctors.refresh().await.unwrap_err();
    assert_eq!(err, SyncError::Auth(AuthFailure::MissingCredential));
    assert!(system.reporter.report(&err).terminal);
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn test_refresh_all_without_session_sends_nothing() {
    let mock = MockTransport::new();
    let system =
        ClinicSystem::with_transport(&config(), mock.shared(), CredentialStore::in_memory());

    let results = system.refresh_all().await;
    let endpoints: Vec<&str> = results.iter().map(|(endpoint, _)| *endpoint).collect();

    assert_eq!(endpoints, vec!["doctor", "department", "position", "room", "spec"]);
    assert!(results.iter().all(|(_, result)| matches!(result, Err(e) if e.is_auth())));
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn test_shutdown_closes_held_handles() {
    let mock = MockTransport::new();
    let system = ClinicSystem::with_transport(&config(), mock.shared(), signed_in());
    let rooms = system.rooms.clone();

    system.shutdown().await.unwrap();

    assert!(rooms.is_closed());
    assert_eq!(rooms.refresh().await.unwrap_err(), SyncError::ControllerClosed);
    assert_eq!(rooms.phase(), ListPhase::Idle);
    assert!(rooms.items().is_empty());
}

#[tokio::test]
async fn test_stored_token_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    CredentialStore::new(FileStore::new(&path))
        .set(Credential::new("persisted"))
        .unwrap();

    let config = ClinicConfig {
        credential_file: Some(path),
        ..config()
    };
    let system = ClinicSystem::new(&config).unwrap();

    assert_eq!(system.credentials.get().unwrap().token(), "persisted");
    assert_eq!(*system.session().borrow(), SessionStatus::SignedIn);
    system.shutdown().await.unwrap();
}

mod common;

use common::{dept, draft, signed_in, spawn_list, titles, Department, BASE_URL};
use crud_sync::mock::{gate, MockTransport};
use crud_sync::transport::{Method, RequestBody};
use crud_sync::{
    AuthFailure, CredentialStore, ErrorReporter, ListController, ListPhase, ResourceClient,
    SessionStatus, SyncError,
};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_refresh_preserves_server_order() {
    let mock = MockTransport::new();
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d2", "Surgery"), dept("d1", "Cardiology")]));

    let credentials = signed_in();
    let (list, _task) = spawn_list(&mock, &credentials);
    assert_eq!(list.phase(), ListPhase::Idle);

    list.refresh().await.unwrap();

    let snapshot = list.snapshot();
    assert_eq!(snapshot.phase, ListPhase::Loaded);
    assert_eq!(snapshot.ids(), vec!["d2".to_string(), "d1".to_string()]);
    assert_eq!(snapshot.epoch, 1);

    let request = &mock.requests()[0];
    assert_eq!(request.header("Authorization"), Some("Bearer test-token"));
    mock.verify();
}

#[tokio::test]
async fn test_duplicate_identifiers_are_collapsed() {
    let mock = MockTransport::new();
    mock.expect(Method::Get, "/department").respond_json(
        200,
        json!([dept("d1", "Cardiology"), dept("d1", "Cardiology (copy)"), dept("d2", "Lab")]),
    );

    let (list, _task) = spawn_list(&mock, &signed_in());
    list.refresh().await.unwrap();

    assert_eq!(titles(&list), vec!["Cardiology", "Lab"]);
}

#[tokio::test]
async fn test_stale_refresh_never_overwrites_newer_result() {
    let mock = MockTransport::new();
    let (slow, release_slow) = gate();
    mock.expect(Method::Get, "/department")
        .after(slow)
        .respond_json(200, json!([dept("old", "Stale")]));
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("new", "Fresh")]));

    let (list, _task) = spawn_list(&mock, &signed_in());

    let first = {
        let list = list.clone();
        tokio::spawn(async move { list.refresh().await })
    };
    mock.wait_for_requests(1).await;

    list.refresh().await.unwrap();
    assert_eq!(titles(&list), vec!["Fresh"]);

    // Refresh A is answered with the newest result.
    first.await.unwrap().unwrap();

    release_slow.open();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = list.snapshot();
    assert_eq!(snapshot.phase, ListPhase::Loaded);
    assert_eq!(snapshot.ids(), vec!["new".to_string()]);
    assert_eq!(snapshot.epoch, 2);
    mock.verify();
}

#[tokio::test]
async fn test_create_then_remove_round_trip() {
    let mock = MockTransport::new();
    mock.expect(Method::Get, "/department").respond_json(200, json!([]));
    mock.expect(Method::Post, "/department")
        .respond_json(201, dept("d1", "Cardiology"));
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "Cardiology")]));
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "Cardiology")]));
    mock.expect(Method::Delete, "/department/d1").respond_status(200);
    mock.expect(Method::Get, "/department").respond_json(200, json!([]));
    mock.expect(Method::Get, "/department").respond_json(200, json!([]));

    let (list, _task) = spawn_list(&mock, &signed_in());
    list.refresh().await.unwrap();
    assert!(list.items().is_empty());

    let created = list.create(draft("Cardiology")).await.unwrap();
    assert_eq!(created.id, "d1");

    list.refresh().await.unwrap();
    let items = list.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Cardiology");
    assert_eq!(items[0].id, "d1");

    list.remove(created.id.clone()).await.unwrap();
    list.refresh().await.unwrap();
    assert!(list.items().is_empty());

    let post = &mock.requests()[1];
    assert_eq!(post.header("Content-Type"), Some("application/json"));
    assert_eq!(post.body, RequestBody::Json(json!({ "title": "Cardiology" })));
    assert_eq!(
        mock.calls(),
        vec![
            "GET /department",
            "POST /department",
            "GET /department",
            "GET /department",
            "DELETE /department/d1",
            "GET /department",
            "GET /department",
        ]
    );
    mock.verify();
}

#[tokio::test]
async fn test_deleting_missing_id_is_success() {
    let mock = MockTransport::new();
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "Cardiology")]));
    mock.expect(Method::Delete, "/department/ghost").respond_status(404);
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "Cardiology")]));

    let (list, _task) = spawn_list(&mock, &signed_in());
    list.refresh().await.unwrap();

    list.remove("ghost".to_string()).await.unwrap();

    assert_eq!(titles(&list), vec!["Cardiology"]);
    assert_eq!(list.phase(), ListPhase::Loaded);
    mock.verify();
}

#[tokio::test]
async fn test_missing_credential_issues_no_requests() {
    let mock = MockTransport::new();
    let (list, _task) = spawn_list(&mock, &CredentialStore::in_memory());

    let missing = SyncError::Auth(AuthFailure::MissingCredential);
    assert_eq!(list.refresh().await.unwrap_err(), missing);
    assert_eq!(list.create(draft("Lab")).await.unwrap_err(), missing);
    assert_eq!(
        list.update("d1".to_string(), draft("Lab")).await.unwrap_err(),
        missing
    );
    assert_eq!(list.remove("d1".to_string()).await.unwrap_err(), missing);

    assert_eq!(mock.request_count(), 0);
    assert_eq!(list.phase(), ListPhase::Failed(missing));
}

#[tokio::test]
async fn test_queued_mutations_share_one_trailing_refresh() {
    let mock = MockTransport::new();
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "Old"), dept("d2", "Closing")]));
    let (held, release) = gate();
    mock.expect(Method::Put, "/department")
        .after(held)
        .respond_json(200, dept("d1", "New"));
    mock.expect(Method::Delete, "/department/d2").respond_status(204);
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "New")]));

    let (list, _task) = spawn_list(&mock, &signed_in());
    list.refresh().await.unwrap();

    let update = {
        let list = list.clone();
        tokio::spawn(async move { list.update("d1".to_string(), draft("New")).await })
    };
    mock.wait_for_requests(2).await;

    let remove = {
        let list = list.clone();
        tokio::spawn(async move { list.remove("d2".to_string()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.open();

    assert_eq!(update.await.unwrap().unwrap().title, "New");
    remove.await.unwrap().unwrap();

    assert_eq!(
        mock.calls(),
        vec![
            "GET /department",
            "PUT /department",
            "DELETE /department/d2",
            "GET /department",
        ]
    );
    assert_eq!(titles(&list), vec!["New"]);

    let put = &mock.requests()[1];
    assert_eq!(
        put.body,
        RequestBody::Json(json!({ "_id": "d1", "title": "New" }))
    );
    mock.verify();
}

#[tokio::test]
async fn test_mutation_waits_for_in_flight_refresh() {
    let mock = MockTransport::new();
    let (held, release) = gate();
    mock.expect(Method::Get, "/department")
        .after(held)
        .respond_json(200, json!([]));
    mock.expect(Method::Post, "/department")
        .respond_json(201, dept("d1", "Lab"));
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "Lab")]));

    let (list, _task) = spawn_list(&mock, &signed_in());
    let refresh = {
        let list = list.clone();
        tokio::spawn(async move { list.refresh().await })
    };
    mock.wait_for_requests(1).await;

    let create = {
        let list = list.clone();
        tokio::spawn(async move { list.create(draft("Lab")).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(mock.calls(), vec!["GET /department"]);
    assert!(!create.is_finished());

    release.open();
    refresh.await.unwrap().unwrap();
    assert_eq!(create.await.unwrap().unwrap().id, "d1");

    assert_eq!(
        mock.calls(),
        vec!["GET /department", "POST /department", "GET /department"]
    );
    assert_eq!(titles(&list), vec!["Lab"]);
    mock.verify();
}

#[tokio::test]
async fn test_coalesce_limit_forces_refresh_between_mutations() {
    let mock = MockTransport::new();
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "Old"), dept("d2", "Closing")]));
    let (held, release) = gate();
    mock.expect(Method::Put, "/department")
        .after(held)
        .respond_json(200, dept("d1", "New"));
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "New"), dept("d2", "Closing")]));
    mock.expect(Method::Delete, "/department/d2").respond_status(204);
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "New")]));

    let credentials = signed_in();
    let client = ResourceClient::<Department>::new(BASE_URL, mock.shared(), credentials.clone());
    let (controller, list) = ListController::new(client, 16);
    let _task = tokio::spawn(
        controller
            .with_coalesce_limit(1)
            .run(ErrorReporter::new(credentials)),
    );
    list.refresh().await.unwrap();

    let update = {
        let list = list.clone();
        tokio::spawn(async move { list.update("d1".to_string(), draft("New")).await })
    };
    mock.wait_for_requests(2).await;
    let remove = {
        let list = list.clone();
        tokio::spawn(async move { list.remove("d2".to_string()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.open();

    assert_eq!(update.await.unwrap().unwrap().title, "New");
    remove.await.unwrap().unwrap();

    assert_eq!(
        mock.calls(),
        vec![
            "GET /department",
            "PUT /department",
            "GET /department",
            "DELETE /department/d2",
            "GET /department",
        ]
    );
    assert_eq!(titles(&list), vec!["New"]);
    mock.verify();
}

#[tokio::test]
async fn test_refresh_during_mutation_is_folded() {
    let mock = MockTransport::new();
    let (held, release) = gate();
    mock.expect(Method::Post, "/department")
        .after(held)
        .respond_json(201, dept("d1", "Lab"));
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "Lab")]));

    let (list, _task) = spawn_list(&mock, &signed_in());

    let create = {
        let list = list.clone();
        tokio::spawn(async move { list.create(draft("Lab")).await })
    };
    mock.wait_for_requests(1).await;

    let refresh = {
        let list = list.clone();
        tokio::spawn(async move { list.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.open();

    create.await.unwrap().unwrap();
    refresh.await.unwrap().unwrap();
    assert_eq!(mock.calls(), vec!["POST /department", "GET /department"]);
    assert_eq!(titles(&list), vec!["Lab"]);
}

#[tokio::test]
async fn test_failed_mutation_leaves_list_untouched() {
    let mock = MockTransport::new();
    mock.expect(Method::Get, "/department")
        .respond_json(200, json!([dept("d1", "Cardiology")]));
    mock.expect(Method::Post, "/department")
        .respond_json(400, json!({ "message": "Title already exists" }));

    let (list, _task) = spawn_list(&mock, &signed_in());
    list.refresh().await.unwrap();

    let err = list.create(draft("Cardiology")).await.unwrap_err();
    assert_eq!(
        err,
        SyncError::Server {
            status: 400,
            message: "Title already exists".into()
        }
    );
    assert_eq!(titles(&list), vec!["Cardiology"]);
    assert_eq!(list.phase(), ListPhase::Loaded);
    assert_eq!(mock.request_count(), 2);
    mock.verify();
}

#[tokio::test]
async fn test_rejected_token_ends_session() {
    let mock = MockTransport::new();
    mock.expect(Method::Get, "/department").respond_status(401);

    let credentials = signed_in();
    let mut session = credentials.subscribe();
    let (list, _task) = spawn_list(&mock, &credentials);

    let err = list.refresh().await.unwrap_err();
    assert_eq!(err, SyncError::Auth(AuthFailure::Rejected { status: 401 }));

    session.changed().await.unwrap();
    assert_eq!(*session.borrow(), SessionStatus::SignedOut);
    assert!(credentials.get().is_none());

    // Every later call is gated locally.
    assert!(list.refresh().await.unwrap_err().is_auth());
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn test_network_failure_is_classified() {
    let mock = MockTransport::new();
    mock.expect(Method::Get, "/department")
        .fail_network("connection refused");

    let (list, _task) = spawn_list(&mock, &signed_in());
    let err = list.refresh().await.unwrap_err();

    assert_eq!(err, SyncError::Network("connection refused".into()));
    assert_eq!(list.phase(), ListPhase::Failed(err));
}

#[tokio::test]
async fn test_teardown_ignores_late_response() {
    let mock = MockTransport::new();
    let (held, release) = gate();
    mock.expect(Method::Get, "/department")
        .after(held)
        .respond_json(200, json!([dept("d1", "Late")]));

    let (list, task) = spawn_list(&mock, &signed_in());
    let pending = {
        let list = list.clone();
        tokio::spawn(async move { list.refresh().await })
    };
    mock.wait_for_requests(1).await;

    list.close();
    task.await.unwrap();
    release.open();

    assert_eq!(pending.await.unwrap().unwrap_err(), SyncError::ControllerClosed);
    assert_eq!(
        list.refresh().await.unwrap_err(),
        SyncError::ControllerClosed
    );
    assert!(list.is_closed());

    let snapshot = list.snapshot();
    assert_eq!(snapshot.phase, ListPhase::Loading);
    assert!(snapshot.items.is_empty());
}

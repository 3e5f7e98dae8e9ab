#![allow(dead_code)]

use crud_sync::mock::MockTransport;
use crud_sync::{
    Credential, CredentialStore, ErrorReporter, ListController, ListHandle, ResourceClient,
    SyncEntity, Validator,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

pub const BASE_URL: &str = "http://mock.local";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Department {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DepartmentDraft {
    pub title: String,
}

impl SyncEntity for Department {
    type Id = String;
    type Draft = DepartmentDraft;
    const ENDPOINT: &'static str = "department";

    fn id(&self) -> &String {
        &self.id
    }

    fn to_draft(&self) -> DepartmentDraft {
        DepartmentDraft {
            title: self.title.clone(),
        }
    }

    fn rules() -> Validator<DepartmentDraft> {
        Validator::<DepartmentDraft>::new().required("title", "Title is required", |d| &d.title)
    }
}

pub fn draft(title: &str) -> DepartmentDraft {
    DepartmentDraft {
        title: title.to_string(),
    }
}

pub fn dept(id: &str, title: &str) -> Value {
    json!({ "_id": id, "title": title })
}

pub fn signed_in() -> CredentialStore {
    let credentials = CredentialStore::in_memory();
    credentials.set(Credential::new("test-token")).unwrap();
    credentials
}

pub fn spawn_list(
    mock: &MockTransport,
    credentials: &CredentialStore,
) -> (ListHandle<Department>, JoinHandle<()>) {
    let client = ResourceClient::<Department>::new(BASE_URL, mock.shared(), credentials.clone());
    let (controller, handle) = ListController::new(client, 16);
    let task = tokio::spawn(controller.run(ErrorReporter::new(credentials.clone())));
    (handle, task)
}

pub fn titles(list: &ListHandle<Department>) -> Vec<String> {
    list.items().into_iter().map(|d| d.title).collect()
}

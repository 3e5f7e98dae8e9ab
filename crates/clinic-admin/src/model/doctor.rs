//! Doctor records.
//!
//! The list endpoint and the create/update forms disagree on a few field names
//! (`familyphone` vs `familyPhone`, `worktime` vs `workTime`) and on types (gender is
//! a string in listings and a number in forms, birthday a timestamp or a date). The
//! decoded [`Doctor`] accepts both spellings. [`DoctorDraft`] always sends the form
//! spelling.

use super::RecordId;
use chrono::{DateTime, NaiveDate, Utc};
use crud_sync::{Attachment, SyncEntity, Validator};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::{self, Display};

pub const DEFAULT_FAMILY: u32 = 3;
pub const DEFAULT_WORK_TIME: u32 = 3;

/// Multipart field name of the avatar file.
pub const AVATAR_FIELD: &str = "avatar";

/// Date format the forms send for `birthday`.
pub const BIRTHDAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    pub const CODES: [u8; 2] = [1, 2];

    pub fn code(self) -> u8 {
        match self {
            Gender::Male => 1,
            Gender::Female => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Gender::Male),
            2 => Some(Gender::Female),
            _ => None,
        }
    }
}

impl Serialize for Gender {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u8),
            Text(String),
        }

        let code = match Raw::deserialize(deserializer)? {
            Raw::Code(code) => code,
            Raw::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "male" => 1,
                "female" => 2,
                other => other
                    .parse()
                    .map_err(|_| de::Error::custom(format!("invalid gender {text:?}")))?,
            },
        };
        Gender::from_code(code).ok_or_else(|| de::Error::custom(format!("unknown gender code {code}")))
    }
}

/// Listings carry a millisecond timestamp; forms send a date string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Birthday {
    Timestamp(i64),
    Date(String),
}

impl Birthday {
    /// The `YYYY-MM-DD` value an edit form starts from.
    ///
    /// Timestamps are read as UTC. ISO date-times are cut to their date part. Anything
    /// unparseable is passed through for the user to correct.
    pub fn to_form_value(&self) -> String {
        match self {
            Birthday::Timestamp(ms) => DateTime::<Utc>::from_timestamp_millis(*ms)
                .map(|at| at.date_naive().format(BIRTHDAY_FORMAT).to_string())
                .unwrap_or_else(|| ms.to_string()),
            Birthday::Date(date) => date
                .get(..10)
                .filter(|day| is_form_date(day))
                .unwrap_or(date.as_str())
                .to_string(),
        }
    }
}

fn is_form_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value.trim(), BIRTHDAY_FORMAT).is_ok()
}

impl Display for Birthday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Birthday::Timestamp(ms) => write!(f, "{ms}"),
            Birthday::Date(date) => f.write_str(date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Doctor {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    /// Specialization id.
    #[serde(default)]
    pub spec: RecordId,
    /// Department id.
    #[serde(default)]
    pub department: RecordId,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub birthday: Option<Birthday>,
    #[serde(default)]
    pub family: Option<u32>,
    #[serde(default, rename = "familyphone", alias = "familyPhone")]
    pub family_phone: String,
    #[serde(default, rename = "worktime", alias = "workTime")]
    pub work_time: Option<u32>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub education: String,
    /// Stored image path, when the server has one.
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorDraft {
    pub name: String,
    pub phone: String,
    pub spec: RecordId,
    pub department: RecordId,
    /// Gender code, see [`Gender::code`].
    pub gender: u8,
    pub birthday: String,
    pub family: u32,
    #[serde(rename = "familyPhone")]
    pub family_phone: String,
    #[serde(rename = "workTime")]
    pub work_time: u32,
    pub region: String,
    pub district: String,
    pub education: String,
    #[serde(skip)]
    pub avatar: Option<Attachment>,
}

impl Default for DoctorDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            phone: String::new(),
            spec: RecordId::default(),
            department: RecordId::default(),
            gender: Gender::Male.code(),
            birthday: String::new(),
            family: DEFAULT_FAMILY,
            family_phone: String::new(),
            work_time: DEFAULT_WORK_TIME,
            region: String::new(),
            district: String::new(),
            education: String::new(),
            avatar: None,
        }
    }
}

impl DoctorDraft {
    /// Attaches an avatar image; the request becomes multipart.
    pub fn with_avatar(mut self, file_name: &str, mime: &str, bytes: Vec<u8>) -> Self {
        self.avatar = Some(Attachment::new(AVATAR_FIELD, file_name, bytes).with_mime(mime));
        self
    }
}

impl SyncEntity for Doctor {
    type Id = RecordId;
    type Draft = DoctorDraft;
    const ENDPOINT: &'static str = "doctor";

    fn id(&self) -> &RecordId {
        &self.id
    }

    /// The stored avatar stays on the server unless a new file is attached.
    fn to_draft(&self) -> DoctorDraft {
        DoctorDraft {
            name: self.name.clone(),
            phone: self.phone.clone(),
            spec: self.spec.clone(),
            department: self.department.clone(),
            gender: self.gender.unwrap_or_default().code(),
            birthday: self
                .birthday
                .as_ref()
                .map(Birthday::to_form_value)
                .unwrap_or_default(),
            family: self.family.unwrap_or(DEFAULT_FAMILY),
            family_phone: self.family_phone.clone(),
            work_time: self.work_time.unwrap_or(DEFAULT_WORK_TIME),
            region: self.region.clone(),
            district: self.district.clone(),
            education: self.education.clone(),
            avatar: None,
        }
    }

    fn rules() -> Validator<DoctorDraft> {
        Validator::<DoctorDraft>::new()
            .required("name", "Name is required", |d| &d.name)
            .required("phone", "Phone is required", |d| &d.phone)
            .required("spec", "Specialization is required", |d| d.spec.as_str())
            .required("department", "Department is required", |d| d.department.as_str())
            .one_of("gender", &Gender::CODES, "Gender must be male or female", |d| d.gender)
            .required("birthday", "Birthday is required", |d| &d.birthday)
            .rule("birthday", |d| {
                (!is_form_date(&d.birthday))
                    .then(|| "Birthday must be a date (YYYY-MM-DD)".to_string())
            })
            .range("family", 1..=30, "Family size must be between 1 and 30", |d| d.family)
            .required("familyPhone", "Family phone is required", |d| &d.family_phone)
            .range("workTime", 0..=60, "Work time must be between 0 and 60 years", |d| d.work_time)
            .required("region", "Region is required", |d| &d.region)
            .required("district", "District is required", |d| &d.district)
            .required("education", "Education is required", |d| &d.education)
    }

    fn attachments(draft: &DoctorDraft) -> Vec<Attachment> {
        draft.avatar.iter().cloned().collect()
    }
}

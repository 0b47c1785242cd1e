use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Kind of drive entry, stored as a single letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    #[serde(rename = "I")]
    Image,
    #[serde(rename = "F")]
    File,
    #[serde(rename = "V")]
    Video,
}

impl FileType {
    pub fn code(self) -> &'static str {
        match self {
            FileType::Image => "I",
            FileType::File => "F",
            FileType::Video => "V",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "I" => Some(FileType::Image),
            "F" => Some(FileType::File),
            "V" => Some(FileType::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriveFile {
    pub id: Uuid,
    pub name: String,
    pub file_type: FileType,
    pub link: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDriveFileRequest {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
    pub file_type: FileType,
    #[validate(url(message = "must be a valid URL"))]
    pub link: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RenameDriveFileRequest {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
}

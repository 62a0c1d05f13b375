use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Extensions (lowercase) that classify an upload as video; everything else
/// is treated as an image.
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mov", "mkv", "webm"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(10))")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[sea_orm(string_value = "image")]
    Image,
    #[sea_orm(string_value = "video")]
    Video,
}

impl MediaType {
    /// Classifies by the last dot-separated segment of the filename,
    /// case-insensitive. A name without a dot falls through to image.
    /// Fixed at creation time; existing rows are never reclassified.
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaType::Video
        } else {
            MediaType::Image
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "return_media")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub return_request_id: String,
    // Locator relative to the media root; the bytes live in storage
    pub file: String,
    pub media_type: MediaType,
    pub uploaded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::return_requests::Entity",
        from = "Column::ReturnRequestId",
        to = "super::return_requests::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    ReturnRequests,
}

impl Related<super::return_requests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReturnRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_extensions_any_case() {
        for name in ["clip.mp4", "clip.MP4", "clip.Mov", "clip.MKV", "a.b.webm", "x.AVI"] {
            assert_eq!(MediaType::from_filename(name), MediaType::Video, "{name}");
        }
    }

    #[test]
    fn test_everything_else_is_image() {
        for name in ["photo.JPG", "photo.png", "scan.pdf", "noext", "video.mp4.txt"] {
            assert_eq!(MediaType::from_filename(name), MediaType::Image, "{name}");
        }
    }
}

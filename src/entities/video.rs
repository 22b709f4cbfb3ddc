use crate::media::Resolution;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[sea_orm(string_value = "fantasy")]
    Fantasy,
    #[sea_orm(string_value = "action")]
    Action,
    #[sea_orm(string_value = "romantic")]
    Romantic,
    #[sea_orm(string_value = "documentary")]
    Documentary,
    #[sea_orm(string_value = "comedy")]
    Comedy,
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fantasy" => Ok(Self::Fantasy),
            "action" => Ok(Self::Action),
            "romantic" => Ok(Self::Romantic),
            "documentary" => Ok(Self::Documentary),
            "comedy" => Ok(Self::Comedy),
            other => Err(format!("\"{}\" is not a valid choice.", other)),
        }
    }
}

/// An uploaded video. `video_file` is set on creation; the thumbnail and the
/// `video_<label>` columns are filled in by the transcode job only.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "videos")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub video_file: String,
    pub thumbnail: Option<String>,
    pub video_120p: Option<String>,
    pub video_360p: Option<String>,
    pub video_720p: Option<String>,
    pub video_1080p: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn rendition(&self, resolution: Resolution) -> Option<&str> {
        match resolution {
            Resolution::P120 => self.video_120p.as_deref(),
            Resolution::P360 => self.video_360p.as_deref(),
            Resolution::P720 => self.video_720p.as_deref(),
            Resolution::P1080 => self.video_1080p.as_deref(),
        }
    }

    /// Every file the record points at, source first.
    pub fn stored_files(&self) -> Vec<&str> {
        let mut files = vec![self.video_file.as_str()];
        files.extend(self.thumbnail.as_deref());
        files.extend(Resolution::LADDER.iter().filter_map(|r| self.rendition(*r)));
        files
    }
}

impl Column {
    /// Column holding the encode for `resolution`.
    pub fn for_resolution(resolution: Resolution) -> Self {
        match resolution {
            Resolution::P120 => Column::Video120p,
            Resolution::P360 => Column::Video360p,
            Resolution::P720 => Column::Video720p,
            Resolution::P1080 => Column::Video1080p,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

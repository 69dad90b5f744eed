// Video URL parsing
// Only the query string matters: "v" is the video id (required),
// "list" is an optional playlist id. Host and path are not checked.

use url::form_urlencoded;

use crate::error::{PlayerError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub url: String,
    pub video_id: String,
    pub playlist_id: Option<String>,
}

impl VideoRef {
    pub fn parse(url: &str) -> Result<Self> {
        // Everything after the last '?', without any fragment
        let query = url.rsplit_once('?').map_or(url, |(_, query)| query);
        let query = query.split_once('#').map_or(query, |(query, _)| query);

        let mut video_id = None;
        let mut playlist_id = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "v" if video_id.is_none() && !value.is_empty() => video_id = Some(value.into_owned()),
                "list" if playlist_id.is_none() && !value.is_empty() => playlist_id = Some(value.into_owned()),
                _ => {}
            }
        }

        let video_id = video_id.ok_or_else(|| PlayerError::MissingVideoId(url.to_string()))?;

        Ok(VideoRef {
            url: url.to_string(),
            video_id,
            playlist_id,
        })
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }

    pub fn playlist_url(&self) -> Option<String> {
        self.playlist_id
            .as_ref()
            .map(|list| format!("https://www.youtube.com/playlist?list={}", list))
    }
}

use log::debug;

use crate::error::{PlayerError, PlayerResult};

/// Playlist formats an endpoint may point at instead of a raw stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistKind {
    Pls,
    M3u,
}

/// Common parsing utilities used when opening a stream endpoint
pub struct ParsingUtils;

impl ParsingUtils {
    /// Parse a .pls playlist file to extract the first stream URL
    pub fn parse_pls_content(content: &str) -> Option<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("File"))
            .find_map(|line| line.split_once('=').map(|(_, url)| url.trim().to_string()))
            .filter(|url| !url.is_empty())
    }

    /// Parse an .m3u/.m3u8 playlist: the first non-comment line is the stream
    pub fn parse_m3u_content(content: &str) -> Option<String> {
        content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
    }

    /// Determine whether a URL names a playlist rather than a stream
    pub fn playlist_kind(url: &str) -> Option<PlaylistKind> {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if path.ends_with(".pls") {
            Some(PlaylistKind::Pls)
        } else if path.ends_with(".m3u") || path.ends_with(".m3u8") {
            Some(PlaylistKind::M3u)
        } else {
            None
        }
    }

    pub fn parse_playlist(kind: PlaylistKind, content: &str) -> Option<String> {
        match kind {
            PlaylistKind::Pls => Self::parse_pls_content(content),
            PlaylistKind::M3u => Self::parse_m3u_content(content),
        }
    }

    /// Resolve URL to actual stream URL (fetches and parses playlists)
    pub fn resolve_stream_url(client: &reqwest::blocking::Client, url: &str) -> PlayerResult<String> {
        let Some(kind) = Self::playlist_kind(url) else {
            return Ok(url.to_string());
        };

        debug!("Resolving {:?} playlist at {}", kind, url);
        let content = client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|e| PlayerError::connection(url, e))?;

        let stream = Self::parse_playlist(kind, &content)
            .ok_or_else(|| PlayerError::connection(url, "no stream URL found in playlist"))?;
        debug!("Playlist {} points at {}", url, stream);
        Ok(stream)
    }
}

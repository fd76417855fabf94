//! Lookup parameters handed unchanged to every provider in a chain.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::text::{clean_title, strip_bracket_suffix};
use crate::Error;

/// Kind of media entity being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    MovieSet,
    TvShow,
    Season,
    Episode,
    Artist,
    Album,
    Track,
    Channel,
    Recording,
    #[default]
    Unknown,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::MovieSet => "movieset",
            MediaKind::TvShow => "tvshow",
            MediaKind::Season => "season",
            MediaKind::Episode => "episode",
            MediaKind::Artist => "artist",
            MediaKind::Album => "album",
            MediaKind::Track => "track",
            MediaKind::Channel => "channel",
            MediaKind::Recording => "recording",
            MediaKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" | "movies" => Ok(MediaKind::Movie),
            "movieset" | "set" | "setmovies" => Ok(MediaKind::MovieSet),
            "tvshow" | "tvshows" | "tv" => Ok(MediaKind::TvShow),
            "season" | "seasons" => Ok(MediaKind::Season),
            "episode" | "episodes" => Ok(MediaKind::Episode),
            "artist" | "artists" => Ok(MediaKind::Artist),
            "album" | "albums" => Ok(MediaKind::Album),
            "track" | "song" | "songs" => Ok(MediaKind::Track),
            "channel" | "tvchannel" => Ok(MediaKind::Channel),
            "recording" | "recordings" => Ok(MediaKind::Recording),
            "" | "unknown" => Ok(MediaKind::Unknown),
            other => Err(Error::invalid_input(format!("unknown media kind: {other}"))),
        }
    }
}

/// Immutable tuple of lookup parameters for one resolution.
///
/// Titles are stored without any ` (...)` suffix, which hosts use to append
/// the year or a disambiguation note. Album and track titles also lose
/// featuring credits and bracketed edition notes.
/// External ids are keyed by scheme (`imdb`, `tvdb`, `tmdb`, `musicbrainz`,
/// ...). `extra` carries kind-specific hints such as `artist`, `album` or
/// `channel`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ProviderQuery {
    pub title: String,
    pub year: Option<u16>,
    pub kind: MediaKind,
    #[serde(default)]
    pub ids: BTreeMap<String, String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ProviderQuery {
    pub fn new(kind: MediaKind, title: impl AsRef<str>) -> Self {
        let title = match kind {
            MediaKind::Album | MediaKind::Track => clean_title(title.as_ref()),
            _ => strip_bracket_suffix(title.as_ref()).to_string(),
        };
        Self {
            title,
            kind,
            ..Default::default()
        }
    }

    /// Query by external id only.
    pub fn by_id(kind: MediaKind, scheme: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(kind, "").with_id(scheme, id)
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_id(mut self, scheme: impl Into<String>, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.is_empty() {
            self.ids.insert(scheme.into(), id);
        }
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.extra.insert(key.into(), value);
        }
        self
    }

    pub fn id(&self, scheme: &str) -> Option<&str> {
        self.ids.get(scheme).map(String::as_str)
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    /// Stable, case-insensitive cache-key fragment identifying this query.
    ///
    /// ```
    /// use metaforged_common::{MediaKind, ProviderQuery};
    ///
    /// let a = ProviderQuery::new(MediaKind::Movie, "The Matrix (1999)").with_year(1999);
    /// let b = ProviderQuery::new(MediaKind::Movie, "the matrix").with_year(1999);
    /// assert_eq!(a.fingerprint(), b.fingerprint());
    /// assert_eq!(a.fingerprint(), "movie|the matrix|1999");
    /// ```
    pub fn fingerprint(&self) -> String {
        let mut out = format!("{}|{}", self.kind, self.title.trim().to_lowercase());
        if let Some(year) = self.year {
            out.push('|');
            out.push_str(&year.to_string());
        }
        for (scheme, id) in &self.ids {
            out.push_str(&format!("|{scheme}={}", id.to_lowercase()));
        }
        for (key, value) in &self.extra {
            out.push_str(&format!("|{key}:{}", value.to_lowercase()));
        }
        out
    }

    /// A query with neither a title nor any id cannot be resolved.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.ids.is_empty()
    }
}

//! Card model for Songline
//!
//! A card is a playable track annotated with its release date. Raw catalog
//! entries are validated into cards before they can enter a deck.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// How precise the source release date was
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    Year,
    Month,
    Day,
}

impl DatePrecision {
    fn from_hint(hint: &str) -> Option<Self> {
        match hint.to_ascii_lowercase().as_str() {
            "year" => Some(Self::Year),
            "month" => Some(Self::Month),
            "day" => Some(Self::Day),
            _ => None,
        }
    }
}

/// Release date normalized to day precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDate {
    /// Calendar date; missing month/day default to the 1st
    pub date: NaiveDate,
    /// Accuracy of the source value
    pub precision: DatePrecision,
}

impl ReleaseDate {
    /// Parse `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    ///
    /// A precision hint coarser than the string shape wins, so a
    /// `1999-01-01` tagged `year` stays a year-precision date.
    pub fn parse(raw: &str, precision_hint: Option<&str>) -> Option<Self> {
        let mut parts = raw.trim().splitn(3, '-');
        let year: i32 = parts.next()?.parse().ok()?;
        if !(1000..=9999).contains(&year) {
            return None;
        }

        let (month, day, shape) = match (parts.next(), parts.next()) {
            (None, _) => (1, 1, DatePrecision::Year),
            (Some(m), None) => (m.parse().ok()?, 1, DatePrecision::Month),
            (Some(m), Some(d)) => (m.parse().ok()?, d.parse().ok()?, DatePrecision::Day),
        };

        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let precision = precision_hint
            .and_then(DatePrecision::from_hint)
            .map_or(shape, |hint| hint.min(shape));

        Some(Self { date, precision })
    }

    /// Release year, the only field timelines compare on
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

/// A drawable unit of the deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Unique within a deck
    pub track_id: String,
    /// Opaque playback reference
    pub uri: String,
    pub name: String,
    pub artist: String,
    pub album: Option<String>,
    pub cover_url: Option<String>,
    pub release: ReleaseDate,
}

impl Card {
    pub fn year(&self) -> i32 {
        self.release.year()
    }

    /// The part of the card that may be shown before the placement resolves
    pub fn hidden(&self) -> HiddenSong {
        HiddenSong {
            track_id: self.track_id.clone(),
            uri: self.uri.clone(),
        }
    }
}

/// A drawn card with everything that would reveal the answer stripped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiddenSong {
    pub track_id: String,
    pub uri: String,
}

/// Raw entry as returned by a catalog, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogTrack {
    pub id: Option<String>,
    pub uri: Option<String>,
    pub name: Option<String>,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub cover_url: Option<String>,
    pub release_date: Option<String>,
    pub release_date_precision: Option<String>,
}

impl CatalogTrack {
    /// Validate into a card
    ///
    /// Returns `None` when id, uri, name, artist or a parseable release
    /// date is missing.
    pub fn into_card(self) -> Option<Card> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let track_id = non_empty(self.id)?;
        let uri = non_empty(self.uri)?;
        let name = non_empty(self.name)?;
        let artist = self
            .artists
            .into_iter()
            .filter(|a| !a.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if artist.is_empty() {
            return None;
        }
        let release = ReleaseDate::parse(
            self.release_date.as_deref()?,
            self.release_date_precision.as_deref(),
        )?;

        Some(Card {
            track_id,
            uri,
            name,
            artist,
            album: non_empty(self.album),
            cover_url: non_empty(self.cover_url),
            release,
        })
    }
}

//! Wine database records

use serde::{Deserialize, Serialize};

/// Wine style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WineColor {
    #[default]
    Red,
    White,
    Rose,
    Sparkling,
    Dessert,
    Fortified,
    Orange,
}

/// A wine as stored in the external database; read-only to the scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WineRecord {
    /// Database identifier
    pub id: String,
    /// Producer or estate name
    pub producer: String,
    /// Wine name, possibly including the producer
    pub name: String,
    /// Vintage year; `None` for non-vintage wines
    #[serde(default)]
    pub vintage: Option<u16>,
    /// Region or appellation
    #[serde(default)]
    pub region: String,
    /// Country of origin
    #[serde(default)]
    pub country: String,
    /// Wine style
    #[serde(default)]
    pub color: WineColor,
    /// Grape varieties in the blend
    #[serde(default)]
    pub grape_varieties: Vec<String>,
    /// Critic score (0-100)
    pub score: u8,
    /// Critic tasting note
    #[serde(default)]
    pub tasting_note: String,
    /// Initials of the reviewer
    #[serde(default)]
    pub reviewer_initials: String,
    /// First year of the drink window
    #[serde(default)]
    pub drink_window_start: Option<u16>,
    /// Last year of the drink window
    #[serde(default)]
    pub drink_window_end: Option<u16>,
    /// Release price in USD
    #[serde(default)]
    pub release_price: Option<f64>,
}

impl WineRecord {
    /// Producer and name without repeating the producer, plus vintage or "NV"
    pub fn display_name(&self) -> String {
        let base = if self.name.starts_with(&self.producer) || self.producer.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.producer, self.name)
        };
        match self.vintage {
            Some(year) => format!("{} {}", base, year),
            None => format!("{} NV", base),
        }
    }

    /// Whether `year` falls inside the drink window.
    ///
    /// An open end counts as unbounded; a record without any window is never
    /// in it.
    pub fn is_in_drink_window(&self, year: u16) -> bool {
        if self.drink_window_start.is_none() && self.drink_window_end.is_none() {
            return false;
        }
        self.drink_window_start.map_or(true, |start| year >= start)
            && self.drink_window_end.map_or(true, |end| year <= end)
    }
}

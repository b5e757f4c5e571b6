use serde::Serialize;

/// Closed set of coin kinds. Pickup resolution matches on this exhaustively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CoinKind {
    #[serde(rename = "normal")]
    Normal,
    /// Grants the picker a short client-side speed multiplier.
    #[serde(rename = "red")]
    BonusSpeed,
    /// Freezes every other player for a fixed window.
    #[serde(rename = "frozen")]
    FreezeHazard,
}

impl CoinKind {
    pub fn is_normal(&self) -> bool {
        matches!(self, CoinKind::Normal)
    }

    /// Prefix used in generated ids and as a metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            CoinKind::Normal => "normal",
            CoinKind::BonusSpeed => "bonus",
            CoinKind::FreezeHazard => "frozen",
        }
    }
}

/// A collectible coin. Normal coins go out on the wire without a `type` field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Coin {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type", skip_serializing_if = "CoinKind::is_normal")]
    pub kind: CoinKind,
}

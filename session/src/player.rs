use engine::MaiaWeights;
use serde::{Deserialize, Serialize};

/// A participant in a game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Player {
    Human { name: String, rating: u32 },
    Bot(Bot),
}

impl Player {
    pub fn human(name: impl Into<String>) -> Self {
        Self::Human {
            name: name.into(),
            rating: 1500,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Human { name, .. } => name,
            Self::Bot(bot) => &bot.name,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Self::Bot(_))
    }
}

/// An engine opponent backed by one set of Maia weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bot {
    pub slug: String,
    pub name: String,
    pub elo: u16,
}

impl Bot {
    pub fn from_weights(weights: MaiaWeights) -> Self {
        let label = match weights {
            MaiaWeights::Elo1100 => "Novice",
            MaiaWeights::Elo1200 => "Beginner",
            MaiaWeights::Elo1300 => "Intermediate",
            MaiaWeights::Elo1400 => "Advanced",
            MaiaWeights::Elo1900 => "Master",
        };
        Self {
            slug: weights.slug().to_string(),
            name: format!("{} ({})", label, weights.elo()),
            elo: weights.elo(),
        }
    }

    pub fn weights(&self) -> Option<MaiaWeights> {
        MaiaWeights::from_slug(&self.slug)
    }
}

/// One bot per bundled weights file, weakest first.
pub fn default_bots() -> Vec<Bot> {
    MaiaWeights::ALL.iter().copied().map(Bot::from_weights).collect()
}

pub fn bot_from_slug(slug: &str) -> Option<Bot> {
    MaiaWeights::from_slug(slug).map(Bot::from_weights)
}

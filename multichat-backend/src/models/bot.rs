use serde::{Deserialize, Serialize};

/// One `{name, args}` modelfile instruction attached to a bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub name: String,
    #[serde(default)]
    pub args: String,
}

impl Directive {
    pub fn new(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
        }
    }
}

/// Parsed bot configuration as stored in the `bots.config` column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// `None` when the bot has no modelfile at all, as opposed to an empty one.
    #[serde(default)]
    pub modelfile: Option<Vec<Directive>>,
    /// UI-only reaction buttons; never forwarded to executors.
    #[serde(default)]
    pub react_btn: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    pub id: i64,
    pub model_id: i64,
    pub name: String,
    pub config: BotConfig,
}

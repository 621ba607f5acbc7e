use strum::Display;

/// Which front end a channel belongs to; decides the user's lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AppType {
    Chatroom,
    Api,
}

impl AppType {
    /// `API_...` channels belong to the API, everything else to the chatroom.
    pub fn from_channel(channel: &str) -> Self {
        let prefix = channel.split('_').next().unwrap_or_default();
        if prefix.eq_ignore_ascii_case("api") {
            Self::Api
        } else {
            Self::Chatroom
        }
    }

    pub fn lane_key(&self, user_id: i64) -> String {
        match self {
            Self::Api => format!("api_{}", user_id),
            Self::Chatroom => format!("usertask_{}", user_id),
        }
    }
}

use serde::{Deserialize, Serialize};

pub const MAX_NAME_LEN: usize = 42;
pub const MAX_CHAT_LEN: usize = 300;
pub const SYSTEM_CHAT_ID: i64 = -1;
pub const LATENCY_NO_RESPONSE: f64 = 999.0;
pub const LATENCY_ACK: &str = "response :)";

/// Rotation as `[x, y, z, w]`.
pub type Quaternion = [f64; 4];

pub const IDENTITY_QUATERNION: Quaternion = [0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Vector3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Full player state as exchanged on the wire.
///
/// Clients submit this shape in `playerData` and the server rebroadcasts the
/// authoritative copy in `remotePlayerData`. `health`, `inventory` and
/// `lastDamageTime` are owned by the server and overwritten on every update.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlayerData {
    pub id: i64,
    pub speed: f64,
    pub acceleration: f64,
    pub name: String,
    pub game_version: String,
    pub position: Vector3,
    pub velocity: Vector3,
    pub gravity: f64,
    pub look_quaternion: Quaternion,
    pub quaternion: Quaternion,
    pub chat_active: bool,
    pub chat_msg: String,
    pub latency: f64,
    pub health: f64,
    pub forced: bool,
    pub forced_acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_damage_time: Option<f64>,
    pub inventory: Vec<i64>,
}

impl PlayerData {
    /// A freshly connected client's state before the server has placed it.
    pub fn new(id: i64, name: &str, game_version: &str) -> Self {
        Self {
            id,
            speed: 0.0,
            acceleration: 0.0,
            name: name.to_string(),
            game_version: game_version.to_string(),
            position: Vector3::ZERO,
            velocity: Vector3::ZERO,
            gravity: 0.0,
            look_quaternion: IDENTITY_QUATERNION,
            quaternion: IDENTITY_QUATERNION,
            chat_active: false,
            chat_msg: String::new(),
            latency: LATENCY_NO_RESPONSE,
            health: 100.0,
            forced: false,
            forced_acknowledged: false,
            update_timestamp: None,
            last_damage_time: None,
            inventory: Vec::new(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorldItem {
    pub id: u32,
    pub vector: Vector3,
    pub item_type: i64,
    /// Server-side bookkeeping, never sent to clients.
    #[serde(skip)]
    pub created_at: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChatMessage {
    pub id: i64,
    pub name: String,
    pub message: String,
}

impl ChatMessage {
    /// A server-originated line, shown without a sender.
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            id: SYSTEM_CHAT_ID,
            name: String::new(),
            message: message.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.id == SYSTEM_CHAT_ID && self.name.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DamageRequest {
    pub local_player: PlayerData,
    pub target_player: PlayerData,
    pub damage: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub max_players: usize,
    pub current_players: usize,
    pub map_name: String,
    pub tick_rate: u32,
    pub version: String,
}

/// Inbound frame before its payload has been checked.
#[derive(Debug, Deserialize, Clone)]
pub struct RawEvent {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Outbound frames, encoded as `{"event": ..., "data": ...}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    RemotePlayerData(Vec<PlayerData>),
    WorldItemData(Vec<WorldItem>),
    ChatMsg(ChatMessage),
    LatencyTest(String),
    ServerInfo(ServerInfo),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::RemotePlayerData(_) => "remotePlayerData",
            ServerEvent::WorldItemData(_) => "worldItemData",
            ServerEvent::ChatMsg(_) => "chatMsg",
            ServerEvent::LatencyTest(_) => "latencyTest",
            ServerEvent::ServerInfo(_) => "serverInfo",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Builds an inbound frame the way a client would send it.
pub fn client_frame<T: Serialize>(event: &str, data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&serde_json::json!({ "event": event, "data": data }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use serde_json::json;

    #[test]
    fn test_vector_distance() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(3.0, 4.0, 0.0);
        assert_approx_eq!(a.distance_to(&b), 5.0);
        assert_approx_eq!(b.distance_to(&a), 5.0);
        assert_approx_eq!(a.distance_to(&a), 0.0);
    }

    #[test]
    fn test_player_data_uses_camel_case() {
        let player = PlayerData::new(7, "Rae", "v1");
        let value = serde_json::to_value(&player).unwrap();

        assert_eq!(value["gameVersion"], "v1");
        assert_eq!(value["lookQuaternion"], json!([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(value["forcedAcknowledged"], false);
        assert!(value.get("updateTimestamp").is_none());
        assert!(value.get("lastDamageTime").is_none());
    }

    #[test]
    fn test_player_data_optional_timestamps() {
        let mut value = serde_json::to_value(PlayerData::new(1, "a", "v1")).unwrap();
        value["lastDamageTime"] = json!(12.5);

        let player: PlayerData = serde_json::from_value(value).unwrap();
        assert_eq!(player.last_damage_time, Some(12.5));
        assert_eq!(player.update_timestamp, None);
    }

    #[test]
    fn test_player_data_rejects_unknown_fields() {
        let mut value = serde_json::to_value(PlayerData::new(1, "a", "v1")).unwrap();
        value["teleport"] = json!(true);

        let result: Result<PlayerData, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn test_quaternion_requires_four_components() {
        let mut value = serde_json::to_value(PlayerData::new(1, "a", "v1")).unwrap();
        value["quaternion"] = json!([0.0, 0.0, 1.0]);

        let result: Result<PlayerData, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn test_system_chat_message() {
        let msg = ChatMessage::system("Rae joined");
        assert_eq!(msg.id, SYSTEM_CHAT_ID);
        assert!(msg.name.is_empty());
        assert!(msg.is_system());

        let player_msg = ChatMessage {
            id: -1,
            name: "Rae".to_string(),
            message: "hi".to_string(),
        };
        assert!(!player_msg.is_system());
    }

    #[test]
    fn test_server_event_envelope() {
        let event = ServerEvent::ChatMsg(ChatMessage::system("hello"));
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(value["event"], "chatMsg");
        assert_eq!(value["data"]["id"], -1);
        assert_eq!(value["data"]["message"], "hello");
        assert_eq!(event.name(), "chatMsg");
    }

    #[test]
    fn test_latency_ack_envelope() {
        let event = ServerEvent::LatencyTest(LATENCY_ACK.to_string());
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(value["event"], "latencyTest");
        assert_eq!(value["data"], LATENCY_ACK);
    }

    #[test]
    fn test_world_item_hides_creation_time() {
        let item = WorldItem {
            id: 12,
            vector: Vector3::new(1.0, 2.0, 3.0),
            item_type: 1,
            created_at: 55.0,
        };
        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["itemType"], 1);
        assert_eq!(value["vector"]["y"], 2.0);
        assert!(value.get("createdAt").is_none());
    }

    #[test]
    fn test_raw_event_without_data() {
        let raw: RawEvent = serde_json::from_str(r#"{"event":"latencyTest"}"#).unwrap();
        assert_eq!(raw.event, "latencyTest");
        assert!(raw.data.is_null());
    }

    #[test]
    fn test_client_frame() {
        let msg = ChatMessage {
            id: 3,
            name: "Rae".to_string(),
            message: "gg".to_string(),
        };
        let frame = client_frame("chatMsg", &msg).unwrap();
        let raw: RawEvent = serde_json::from_str(&frame).unwrap();

        assert_eq!(raw.event, "chatMsg");
        assert_eq!(raw.data["message"], "gg");
    }
}

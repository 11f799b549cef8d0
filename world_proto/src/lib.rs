use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Default port the command channel listens on when the host does not
/// override it.
pub const DEFAULT_COMMAND_PORT: u16 = 8765;

/// Thematic axes of the staged world. Wire names are case-sensitive
/// snake_case; anything else is rejected at the decode boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraitKind {
    Militarism,
    Prosperity,
    Religiosity,
    Lawfulness,
    Openness,
}

impl TraitKind {
    pub const ALL: [TraitKind; 5] = [
        TraitKind::Militarism,
        TraitKind::Prosperity,
        TraitKind::Religiosity,
        TraitKind::Lawfulness,
        TraitKind::Openness,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "militarism" => Some(TraitKind::Militarism),
            "prosperity" => Some(TraitKind::Prosperity),
            "religiosity" => Some(TraitKind::Religiosity),
            "lawfulness" => Some(TraitKind::Lawfulness),
            "openness" => Some(TraitKind::Openness),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TraitKind::Militarism => "militarism",
            TraitKind::Prosperity => "prosperity",
            TraitKind::Religiosity => "religiosity",
            TraitKind::Lawfulness => "lawfulness",
            TraitKind::Openness => "openness",
        }
    }
}

/// Overall mood of the staged world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Atmosphere {
    WarTorn,
    Prosperous,
    Mysterious,
    Sacred,
    Desolate,
    Vibrant,
}

impl Atmosphere {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "war_torn" => Some(Atmosphere::WarTorn),
            "prosperous" => Some(Atmosphere::Prosperous),
            "mysterious" => Some(Atmosphere::Mysterious),
            "sacred" => Some(Atmosphere::Sacred),
            "desolate" => Some(Atmosphere::Desolate),
            "vibrant" => Some(Atmosphere::Vibrant),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Atmosphere::WarTorn => "war_torn",
            Atmosphere::Prosperous => "prosperous",
            Atmosphere::Mysterious => "mysterious",
            Atmosphere::Sacred => "sacred",
            Atmosphere::Desolate => "desolate",
            Atmosphere::Vibrant => "vibrant",
        }
    }
}

impl Default for Atmosphere {
    fn default() -> Self {
        Atmosphere::Mysterious
    }
}

/// Classification of a placed landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkKind {
    Settlement,
    Fortress,
    Monastery,
    Ruin,
    Natural,
}

impl LandmarkKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "settlement" => Some(LandmarkKind::Settlement),
            "fortress" => Some(LandmarkKind::Fortress),
            "monastery" => Some(LandmarkKind::Monastery),
            "ruin" => Some(LandmarkKind::Ruin),
            "natural" => Some(LandmarkKind::Natural),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LandmarkKind::Settlement => "settlement",
            LandmarkKind::Fortress => "fortress",
            LandmarkKind::Monastery => "monastery",
            LandmarkKind::Ruin => "ruin",
            LandmarkKind::Natural => "natural",
        }
    }
}

/// Narrative era descriptor. `SET_ERA` replaces the whole struct; the sync
/// path merges field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Era {
    pub id: String,
    pub name: String,
    pub period: String,
    pub description: String,
}

/// The five trait scalars. Every write path funnels through [`TraitSet::set`]
/// so values stay inside `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitSet {
    pub militarism: f32,
    pub prosperity: f32,
    pub religiosity: f32,
    pub lawfulness: f32,
    pub openness: f32,
}

impl TraitSet {
    pub fn value(&self, kind: TraitKind) -> f32 {
        match kind {
            TraitKind::Militarism => self.militarism,
            TraitKind::Prosperity => self.prosperity,
            TraitKind::Religiosity => self.religiosity,
            TraitKind::Lawfulness => self.lawfulness,
            TraitKind::Openness => self.openness,
        }
    }

    pub fn set(&mut self, kind: TraitKind, value: f32) {
        let clamped = value.clamp(0.0, 1.0);
        match kind {
            TraitKind::Militarism => self.militarism = clamped,
            TraitKind::Prosperity => self.prosperity = clamped,
            TraitKind::Religiosity => self.religiosity = clamped,
            TraitKind::Lawfulness => self.lawfulness = clamped,
            TraitKind::Openness => self.openness = clamped,
        }
    }
}

impl Default for TraitSet {
    fn default() -> Self {
        Self {
            militarism: 0.5,
            prosperity: 0.5,
            religiosity: 0.5,
            lawfulness: 0.5,
            openness: 0.5,
        }
    }
}

/// Engine-agnostic position; the host converts to its own vector type at the
/// crate boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPosition {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// A placed landmark record. `id` is the uniqueness key; `kind` serializes
/// under the wire name `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LandmarkKind,
    pub description: String,
    pub position: WorldPosition,
}

/// Full staged-world aggregate. Landmarks keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub era: Era,
    pub traits: TraitSet,
    pub atmosphere: Atmosphere,
    pub landmarks: Vec<Landmark>,
}

impl WorldState {
    pub fn trait_value(&self, kind: TraitKind) -> f32 {
        self.traits.value(kind)
    }

    pub fn set_trait(&mut self, kind: TraitKind, value: f32) {
        self.traits.set(kind, value);
    }
}

pub fn encode_state_json(state: &WorldState) -> serde_json::Result<String> {
    serde_json::to_string(state)
}

pub fn decode_state_json(data: &str) -> serde_json::Result<WorldState> {
    serde_json::from_str(data)
}

/// Control frames the host writes back to the controller, one JSON object
/// per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlFrame {
    #[serde(rename = "CONNECTED")]
    Connected { message: String },
    #[serde(rename = "ACK")]
    Ack { status: String },
}

impl ControlFrame {
    pub fn connected(message: impl Into<String>) -> Self {
        ControlFrame::Connected {
            message: message.into(),
        }
    }

    pub fn ack() -> Self {
        ControlFrame::Ack {
            status: "ok".to_owned(),
        }
    }
}

/// Encode a control frame as a newline-terminated wire line.
pub fn encode_frame_line(frame: &ControlFrame) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(frame)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_frame(line: &str) -> serde_json::Result<ControlFrame> {
    serde_json::from_str(line)
}

/// Structural failure of an inbound line: not a JSON object, or no `type`
/// tag to route on.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed command payload: {0}")]
    MalformedPayload(String),
    #[error("command payload missing `type` tag")]
    MissingType,
}

/// A recognized command whose fields fail validation. The command is dropped;
/// nothing downstream of the decoder ever sees an out-of-range enum.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown trait `{0}`")]
    UnknownTrait(String),
    #[error("unknown atmosphere `{0}`")]
    UnknownAtmosphere(String),
    #[error("unknown landmark type `{0}`")]
    UnknownLandmarkType(String),
    #[error("missing or mistyped field `{field}`")]
    InvalidField { field: &'static str },
}

/// Spawn request as it arrives on the wire; the planner assigns the position
/// later.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSpec {
    pub id: String,
    pub name: String,
    pub kind: LandmarkKind,
    pub description: String,
}

/// Field-wise era overlay carried by `SYNC_WORLD_STATE`. Absent fields leave
/// the current value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EraPatch {
    pub id: Option<String>,
    pub name: Option<String>,
    pub period: Option<String>,
    pub description: Option<String>,
}

/// Trait overlay carried by `SYNC_WORLD_STATE`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TraitPatch {
    pub militarism: Option<f32>,
    pub prosperity: Option<f32>,
    pub religiosity: Option<f32>,
    pub lawfulness: Option<f32>,
    pub openness: Option<f32>,
}

impl TraitPatch {
    pub fn entries(&self) -> impl Iterator<Item = (TraitKind, f32)> {
        [
            (TraitKind::Militarism, self.militarism),
            (TraitKind::Prosperity, self.prosperity),
            (TraitKind::Religiosity, self.religiosity),
            (TraitKind::Lawfulness, self.lawfulness),
            (TraitKind::Openness, self.openness),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.map(|value| (kind, value)))
    }
}

/// Partial state carried by `SYNC_WORLD_STATE`. `None` means the section was
/// absent (or unusable, for the atmosphere) and must not be touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub era: Option<EraPatch>,
    pub traits: Option<TraitPatch>,
    pub atmosphere: Option<Atmosphere>,
}

/// Typed command surface. `Unrecognized` keeps forward compatibility: new
/// controller verbs are acknowledged and ignored instead of killing the
/// session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetEra(Era),
    SetTrait { kind: TraitKind, value: f32 },
    SetAtmosphere(Atmosphere),
    SpawnLandmark(LandmarkSpec),
    SyncWorldState(StatePatch),
    Unrecognized { kind: String },
}

/// An inbound line after envelope parsing: the routing tag plus the raw
/// object. Kept as a separate stage so the host can announce receipt before
/// typed validation runs.
#[derive(Debug, Clone)]
pub struct RawCommand {
    pub kind: String,
    body: Map<String, Value>,
}

/// Parse one framed line into a command envelope.
pub fn parse_envelope(line: &str) -> Result<RawCommand, DecodeError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|err| DecodeError::MalformedPayload(err.to_string()))?;
    let body = match value {
        Value::Object(map) => map,
        _ => {
            return Err(DecodeError::MalformedPayload(
                "payload is not a JSON object".to_owned(),
            ))
        }
    };
    let kind = body
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_owned();
    Ok(RawCommand { kind, body })
}

impl RawCommand {
    /// Validate the envelope into a typed command. Required fields that are
    /// missing or mistyped reject the whole command; optional descriptive
    /// fields fall back to empty strings.
    pub fn decode(&self) -> Result<Command, ValidationError> {
        match self.kind.as_str() {
            "SET_ERA" => {
                let era = object_field(&self.body, "era")
                    .ok_or(ValidationError::InvalidField { field: "era" })?;
                Ok(Command::SetEra(era_from_object(era)))
            }
            "SET_TRAIT" => {
                let name = string_field(&self.body, "trait")
                    .ok_or(ValidationError::InvalidField { field: "trait" })?;
                let kind = TraitKind::from_name(name)
                    .ok_or_else(|| ValidationError::UnknownTrait(name.to_owned()))?;
                let value = number_field(&self.body, "value")
                    .ok_or(ValidationError::InvalidField { field: "value" })?;
                Ok(Command::SetTrait {
                    kind,
                    value: value as f32,
                })
            }
            "SET_ATMOSPHERE" => {
                let name = string_field(&self.body, "atmosphere")
                    .ok_or(ValidationError::InvalidField { field: "atmosphere" })?;
                let atmosphere = Atmosphere::from_name(name)
                    .ok_or_else(|| ValidationError::UnknownAtmosphere(name.to_owned()))?;
                Ok(Command::SetAtmosphere(atmosphere))
            }
            "SPAWN_SETTLEMENT" => {
                let spec = object_field(&self.body, "settlement")
                    .ok_or(ValidationError::InvalidField { field: "settlement" })?;
                let kind_name = string_field(spec, "type").ok_or(ValidationError::InvalidField {
                    field: "settlement.type",
                })?;
                let kind = LandmarkKind::from_name(kind_name)
                    .ok_or_else(|| ValidationError::UnknownLandmarkType(kind_name.to_owned()))?;
                Ok(Command::SpawnLandmark(LandmarkSpec {
                    id: string_field(spec, "id").unwrap_or_default().to_owned(),
                    name: string_field(spec, "name").unwrap_or_default().to_owned(),
                    kind,
                    description: string_field(spec, "description")
                        .unwrap_or_default()
                        .to_owned(),
                }))
            }
            "SYNC_WORLD_STATE" => {
                let state = object_field(&self.body, "state")
                    .ok_or(ValidationError::InvalidField { field: "state" })?;
                Ok(Command::SyncWorldState(patch_from_object(state)))
            }
            _ => Ok(Command::Unrecognized {
                kind: self.kind.clone(),
            }),
        }
    }
}

fn era_from_object(obj: &Map<String, Value>) -> Era {
    Era {
        id: string_field(obj, "id").unwrap_or_default().to_owned(),
        name: string_field(obj, "name").unwrap_or_default().to_owned(),
        period: string_field(obj, "period").unwrap_or_default().to_owned(),
        description: string_field(obj, "description")
            .unwrap_or_default()
            .to_owned(),
    }
}

// Sync tolerates per-field damage: a missing or mistyped sub-field skips that
// field only, including atmosphere names nobody recognizes.
fn patch_from_object(state: &Map<String, Value>) -> StatePatch {
    let era = object_field(state, "era").map(|era| EraPatch {
        id: string_field(era, "id").map(str::to_owned),
        name: string_field(era, "name").map(str::to_owned),
        period: string_field(era, "period").map(str::to_owned),
        description: string_field(era, "description").map(str::to_owned),
    });
    let traits = object_field(state, "traits").map(|traits| TraitPatch {
        militarism: number_field(traits, "militarism").map(|v| v as f32),
        prosperity: number_field(traits, "prosperity").map(|v| v as f32),
        religiosity: number_field(traits, "religiosity").map(|v| v as f32),
        lawfulness: number_field(traits, "lawfulness").map(|v| v as f32),
        openness: number_field(traits, "openness").map(|v| v as f32),
    });
    let atmosphere = string_field(state, "atmosphere").and_then(Atmosphere::from_name);
    StatePatch {
        era,
        traits,
        atmosphere,
    }
}

fn object_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    obj.get(key).and_then(Value::as_object)
}

fn string_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

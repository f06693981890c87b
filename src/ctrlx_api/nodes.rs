use crate::ctrlx_api::types::CtrlxError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Route under which every data-layer node is addressed
pub const NODES_ROUTE: &str = "/automation/api/v2/nodes/";

/// EtherCAT master input data, browsed to list the connected drives
pub const ETHERCAT_BROWSE_NODE: &str =
    "fieldbuses/ethercat/master/instances/ethercatmaster/realtime_data/input/data";

/// String node holding the selected drive
pub const DRIVE_VALUE_NODE: &str = "sdk/cpp/datalayer/provider/simple/string-Drive";

/// Slash-separated address of a data-layer node
///
/// The whole path is sent as one URL segment, so every `/` in it is
/// percent-encoded along with any other reserved character.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(String);

impl NodePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path percent-encoded as a single URL path segment
    ///
    /// ```
    /// use ctrlx_sdk::NodePath;
    ///
    /// let path = NodePath::new("plc/app/my var");
    /// assert_eq!(path.encoded(), "plc%2Fapp%2Fmy%20var");
    /// ```
    pub fn encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }

    /// Full node URL for a device base URL (without trailing slash)
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}{}", base_url, NODES_ROUTE, self.encoded())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for NodePath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl From<&String> for NodePath {
    fn from(path: &String) -> Self {
        Self(path.clone())
    }
}

/// Motion-data channels published by the simple data-layer provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MotionChannel {
    /// Torque samples
    Couple,
    Position,
    /// Speed samples
    Vitesse,
    /// Sample timestamps
    Temps,
}

impl MotionChannel {
    /// All channels, in the order they are read
    pub const ALL: [MotionChannel; 4] = [
        MotionChannel::Couple,
        MotionChannel::Position,
        MotionChannel::Vitesse,
        MotionChannel::Temps,
    ];

    /// Key used for this channel in [`MotionData::All`]
    pub fn key(&self) -> &'static str {
        match self {
            MotionChannel::Couple => "couple",
            MotionChannel::Position => "position",
            MotionChannel::Vitesse => "vitesse",
            MotionChannel::Temps => "temps",
        }
    }

    pub fn node_path(&self) -> NodePath {
        // "Postion" is how the provider names the node.
        let node = match self {
            MotionChannel::Couple => "array-of-float32-Couple",
            MotionChannel::Position => "array-of-float32-Postion",
            MotionChannel::Vitesse => "array-of-float32-Vitesse",
            MotionChannel::Temps => "array-of-int32-Time",
        };
        NodePath::new(format!("sdk/cpp/datalayer/provider/simple/{}", node))
    }
}

impl fmt::Display for MotionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for MotionChannel {
    type Err = CtrlxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "couple" | "torque" => Ok(MotionChannel::Couple),
            "position" => Ok(MotionChannel::Position),
            "vitesse" | "speed" => Ok(MotionChannel::Vitesse),
            "temps" | "time" => Ok(MotionChannel::Temps),
            _ => Err(CtrlxError::UnknownChannel(s.to_string())),
        }
    }
}

/// Result of a motion-data read
#[derive(Debug, Clone, PartialEq)]
pub enum MotionData {
    /// Bare value of the one requested channel
    Channel(Value),
    /// Values of every channel keyed by [`MotionChannel::key`]
    All(BTreeMap<String, Value>),
}

impl MotionData {
    pub fn into_value(self) -> Value {
        match self {
            MotionData::Channel(value) => value,
            MotionData::All(map) => Value::Object(map.into_iter().collect()),
        }
    }
}

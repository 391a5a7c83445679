//! # Cross-Context Message Protocol
//!
//! Messages posted between the orchestrating context and the worker.
//! Both sides must agree on these definitions.
//!
//! ```text
//! ORCHESTRATOR                          WORKER
//!   |                                     |
//!   |<------------- workerIsReady --------|  (after instantiate + handle)
//!   |--- init {devicePixelRatio} -------->|  (surface in transfer slot)
//!   |--- mousemove / leftBtDown / ... --->|
//!   |<------------- pick {list} ----------|
//!   |--- hover {list} ------------------->|
//! ```
//!
//! The wire form is a flat JSON object whose `ty` field names the message.
//! A `ty` this build does not know decodes to `Unknown` and is dropped by
//! the receiver; newer peers can add message types without breaking older
//! ones.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::pick::{PickItem, PickList};
use crate::surface::OffscreenSurface;

/// Orchestrator → worker messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ty", rename_all = "camelCase")]
pub enum WorkerMessage {
    /// Bind the transferred surface and start the frame loop.
    Init {
        /// Physical pixels per logical pixel.
        #[serde(rename = "devicePixelRatio")]
        device_pixel_ratio: f32,
    },
    /// Resume the frame loop if it was stopped.
    StartRunning,
    /// Pause render calls; the loop keeps ticking.
    StopRunning,
    /// Pointer moved, logical coordinates.
    #[serde(rename = "mousemove")]
    MouseMove {
        /// Logical x.
        x: f32,
        /// Logical y.
        y: f32,
    },
    /// Left button pressed over a picked item.
    LeftBtDown {
        /// The first entry of the latest pick.
        #[serde(rename = "pickItem")]
        pick_item: PickItem,
        /// Logical x.
        x: f32,
        /// Logical y.
        y: f32,
    },
    /// Left button released.
    LeftBtUp,
    /// Replace the selection.
    Select {
        /// Items to select.
        list: PickList,
    },
    /// Replace the hover highlight.
    Hover {
        /// Items to highlight.
        list: PickList,
    },
    /// Set the synthetic render busy-wait.
    BlockRender {
        /// Busy-wait duration in milliseconds.
        #[serde(rename = "blockTime")]
        block_time: f64,
    },
    /// Toggle auto-animation.
    AutoAnimation {
        /// Whether the scene animates without input.
        #[serde(rename = "autoAnimation")]
        auto_animation: bool,
    },
    /// Any `ty` this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl WorkerMessage {
    /// The wire tag, for logging.
    #[must_use]
    pub const fn ty(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::StartRunning => "startRunning",
            Self::StopRunning => "stopRunning",
            Self::MouseMove { .. } => "mousemove",
            Self::LeftBtDown { .. } => "leftBtDown",
            Self::LeftBtUp => "leftBtUp",
            Self::Select { .. } => "select",
            Self::Hover { .. } => "hover",
            Self::BlockRender { .. } => "blockRender",
            Self::AutoAnimation { .. } => "autoAnimation",
            Self::Unknown => "unknown",
        }
    }
}

/// Worker → orchestrator messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ty", rename_all = "camelCase")]
pub enum HostMessage {
    /// The worker has instantiated its module and created its handle.
    WorkerIsReady,
    /// The worker's engine produced a new pick result.
    Pick {
        /// Picked items, nearest first.
        list: PickList,
    },
    /// Any `ty` this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl HostMessage {
    /// The wire tag, for logging.
    #[must_use]
    pub const fn ty(&self) -> &'static str {
        match self {
            Self::WorkerIsReady => "workerIsReady",
            Self::Pick { .. } => "pick",
            Self::Unknown => "unknown",
        }
    }
}

/// A message plus the objects whose ownership moves with it.
#[derive(Debug)]
pub struct Envelope<M> {
    message: M,
    transfer: Option<OffscreenSurface>,
}

impl<M> Envelope<M> {
    /// Wraps a message with nothing to transfer.
    #[must_use]
    pub const fn new(message: M) -> Self {
        Self {
            message,
            transfer: None,
        }
    }

    /// Wraps a message and moves `surface` along with it.
    #[must_use]
    pub const fn with_transfer(message: M, surface: OffscreenSurface) -> Self {
        Self {
            message,
            transfer: Some(surface),
        }
    }

    /// The message payload.
    #[inline]
    #[must_use]
    pub const fn message(&self) -> &M {
        &self.message
    }

    /// Whether a surface travels with this envelope.
    #[inline]
    #[must_use]
    pub const fn has_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    /// Splits the envelope into its payload and transferred surface.
    #[must_use]
    pub fn into_parts(self) -> (M, Option<OffscreenSurface>) {
        (self.message, self.transfer)
    }
}

impl<M: Serialize> Envelope<M> {
    /// Renders the payload to its JSON wire form. The transfer slot is
    /// out-of-band and never serialized.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if the payload cannot be serialized.
    pub fn to_json(&self) -> ProtocolResult<String> {
        serde_json::to_string(&self.message).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

impl<M: DeserializeOwned> Envelope<M> {
    /// Parses a JSON payload and re-attaches an out-of-band transfer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Decode`] if the text is not a JSON object
    /// with a string `ty` field, or if a known `ty` has malformed fields.
    pub fn from_json(text: &str, transfer: Option<OffscreenSurface>) -> ProtocolResult<Self> {
        let message = serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))?;
        Ok(Self { message, transfer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags_match_page_protocol() {
        let json = Envelope::new(WorkerMessage::MouseMove { x: 10.0, y: 20.0 })
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"ty":"mousemove","x":10.0,"y":20.0}"#);

        let json = Envelope::new(WorkerMessage::StartRunning).to_json().unwrap();
        assert_eq!(json, r#"{"ty":"startRunning"}"#);

        let json = Envelope::new(HostMessage::WorkerIsReady).to_json().unwrap();
        assert_eq!(json, r#"{"ty":"workerIsReady"}"#);
    }

    #[test]
    fn test_decode_pick_in_display_form() {
        let env: Envelope<HostMessage> = Envelope::from_json(r#"{"ty":"pick","list":["e7",12]}"#, None).unwrap();
        assert_eq!(
            env.message(),
            &HostMessage::Pick {
                list: vec![PickItem::new(7), PickItem::new(12)].into()
            }
        );

        let env: Envelope<WorkerMessage> =
            Envelope::from_json(r#"{"ty":"leftBtDown","pickItem":"e7","x":1.5,"y":2.0}"#, None).unwrap();
        assert!(matches!(env.message(), WorkerMessage::LeftBtDown { pick_item, .. } if pick_item.bits() == 7));

        assert!(matches!(
            Envelope::<HostMessage>::from_json(r#"{"ty":"pick","list":["seven"]}"#, None),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_left_bt_down() {
        let env: Envelope<WorkerMessage> =
            Envelope::from_json(r#"{"ty":"leftBtDown","pickItem":7,"x":1.5,"y":2.0}"#, None).unwrap();
        assert_eq!(
            env.message(),
            &WorkerMessage::LeftBtDown {
                pick_item: PickItem::new(7),
                x: 1.5,
                y: 2.0
            }
        );
    }

    #[test]
    fn test_unknown_type_decodes_to_unknown() {
        let env: Envelope<WorkerMessage> =
            Envelope::from_json(r#"{"ty":"resizeCanvas","width":3}"#, None).unwrap();
        assert_eq!(env.message(), &WorkerMessage::Unknown);

        let env: Envelope<HostMessage> = Envelope::from_json(r#"{"ty":"stats"}"#, None).unwrap();
        assert_eq!(env.message(), &HostMessage::Unknown);
    }

    #[test]
    fn test_missing_tag_is_decode_error() {
        let err = Envelope::<WorkerMessage>::from_json(r#"{"x":1}"#, None).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_transfer_is_out_of_band() {
        let env = Envelope::with_transfer(
            WorkerMessage::Init {
                device_pixel_ratio: 2.0,
            },
            OffscreenSurface::new(1, 800, 600),
        );
        assert!(env.has_transfer());
        assert_eq!(env.to_json().unwrap(), r#"{"ty":"init","devicePixelRatio":2.0}"#);

        let (message, surface) = env.into_parts();
        assert_eq!(message.ty(), "init");
        assert_eq!(surface.unwrap().id(), 1);
    }

    #[test]
    fn test_pick_list_wire_form() {
        let env = Envelope::new(HostMessage::Pick {
            list: vec![PickItem::new(7)].into(),
        });
        assert_eq!(env.to_json().unwrap(), r#"{"ty":"pick","list":[7]}"#);
    }
}

use crate::plugin::PluginEvent;

#[derive(Debug, serde::Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub struct Event {
    pub event: EventInner,
}

#[derive(Debug, serde::Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub enum EventInner {
    TurnOn,
    TurnOff,

    SetBrightness(u8),

    ShowText {
        text: String,

        #[serde(default)]
        repeat: Option<u32>,
    },

    ActivatePlugin(usize),
    ActivatePluginNamed(String),
    NextPlugin,
    PreviousPlugin,

    /// Forwarded untouched to the active plugin.
    PluginEvent(PluginEvent),
}

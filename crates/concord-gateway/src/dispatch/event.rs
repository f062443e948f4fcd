//! Listener arguments produced by transformers

use concord_core::{Channel, Guild, Interaction, Message, Ready, Snowflake, User, VoiceState};
use serde_json::Value;

/// A single positional listener argument
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    Ready(Box<Ready>),
    Guild(Box<Guild>),
    Channel(Box<Channel>),
    User(Box<User>),
    VoiceState(Box<VoiceState>),
    Message(Box<Message>),
    Interaction(Box<Interaction>),
    Id(Snowflake),
    /// Untransformed payload
    Raw(Value),
}

/// Types that can be borrowed out of an [`EventValue`]
pub trait FromEventValue {
    fn from_event_value(value: &EventValue) -> Option<&Self>;
}

macro_rules! event_value_conversions {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl FromEventValue for $ty {
                fn from_event_value(value: &EventValue) -> Option<&Self> {
                    match value {
                        EventValue::$variant(inner) => Some(inner.as_ref()),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for EventValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(Box::new(value))
                }
            }
        )*
    };
}

event_value_conversions! {
    Ready => Ready,
    Guild => Guild,
    Channel => Channel,
    User => User,
    VoiceState => VoiceState,
    Message => Message,
    Interaction => Interaction,
}

impl FromEventValue for Snowflake {
    fn from_event_value(value: &EventValue) -> Option<&Self> {
        match value {
            EventValue::Id(id) => Some(id),
            _ => None,
        }
    }
}

impl FromEventValue for Value {
    fn from_event_value(value: &EventValue) -> Option<&Self> {
        match value {
            EventValue::Raw(raw) => Some(raw),
            _ => None,
        }
    }
}

impl From<Snowflake> for EventValue {
    fn from(id: Snowflake) -> Self {
        Self::Id(id)
    }
}

impl From<Value> for EventValue {
    fn from(raw: Value) -> Self {
        Self::Raw(raw)
    }
}

/// Positional listener arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventArgs(Vec<EventValue>);

impl EventArgs {
    #[must_use]
    pub fn new(values: Vec<EventValue>) -> Self {
        Self(values)
    }

    /// A single argument
    pub fn single(value: impl Into<EventValue>) -> Self {
        Self(vec![value.into()])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Argument at `index`, if it has type `T`
    pub fn get<T: FromEventValue>(&self, index: usize) -> Option<&T> {
        self.0.get(index).and_then(T::from_event_value)
    }

    /// First argument, if it has type `T`
    pub fn first<T: FromEventValue>(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn value(&self, index: usize) -> Option<&EventValue> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventValue> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<EventValue> {
        self.0
    }
}

impl From<Vec<EventValue>> for EventArgs {
    fn from(values: Vec<EventValue>) -> Self {
        Self(values)
    }
}

impl<'a> IntoIterator for &'a EventArgs {
    type Item = &'a EventValue;
    type IntoIter = std::slice::Iter<'a, EventValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

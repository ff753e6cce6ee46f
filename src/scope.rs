//! Broker-scoped session accessors
//!
//! `ScopedSession` is the only way handlers are expected to read and
//! write session variables. In flat mode it reads and writes the session
//! data directly. In isolated mode every variable lives under
//! `_data.<broker alias>.<name>`, so two brokers sharing one session
//! never see each other's variables.
//!
//! ```rust
//! use a3s_session::{Broker, CookieOptions, Decoration, Session, SessionRequest};
//!
//! let mut session = Session::new(&CookieOptions::default());
//! session.decorate(Decoration::new(true));
//!
//! let mut req = SessionRequest::new().with_broker(Broker::new("sports"));
//! req.set_session(session);
//!
//! let mut scoped = req.scoped().unwrap();
//! scoped.set("cart", Some(serde_json::json!([42])));
//! assert_eq!(scoped.get("cart"), Some(&serde_json::json!([42])));
//! ```

use crate::error::Result;
use crate::session::Session;
use crate::types::{Broker, SessionData};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Session key holding the per-broker containers
pub const ISOLATED_DATA_KEY: &str = "_data";

/// Accessor mode attached to a session by the first layer that handles it
///
/// Never persisted; re-applied on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoration {
    isolated: bool,
}

impl Decoration {
    pub fn new(isolated: bool) -> Self {
        Self { isolated }
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated
    }
}

/// Session view bound to one request's broker
pub struct ScopedSession<'a> {
    session: &'a mut Session,
    broker: Option<&'a Broker>,
    isolated: bool,
}

impl<'a> ScopedSession<'a> {
    /// Wrap a decorated session; `None` if it was never decorated
    pub fn new(session: &'a mut Session, broker: Option<&'a Broker>) -> Option<Self> {
        let isolated = session.decoration()?.is_isolated();
        Some(Self {
            session,
            broker,
            isolated,
        })
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    pub fn broker(&self) -> Option<&Broker> {
        self.broker
    }

    /// Read a variable
    pub fn get(&self, name: &str) -> Option<&Value> {
        if !self.isolated {
            return self.session.data().get(name);
        }
        self.broker_container()?.get(name)
    }

    /// Read a variable and deserialize it
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Write a variable; `None` removes it
    ///
    /// Isolated writes without a broker are dropped.
    pub fn set(&mut self, name: &str, value: Option<Value>) {
        if !self.isolated {
            let data = self.session.data_mut();
            match value {
                Some(value) => {
                    data.insert(name.to_string(), value);
                }
                None => {
                    data.remove(name);
                }
            }
            return;
        }

        let Some(broker) = self.broker else {
            tracing::trace!(name = %name, "Isolated session write without broker dropped");
            return;
        };

        let data = self.session.data_mut();
        match value {
            Some(value) => {
                let container = object_slot(
                    data.entry(ISOLATED_DATA_KEY)
                        .or_insert_with(|| Value::Object(SessionData::new())),
                )
                .and_then(|containers| {
                    object_slot(
                        containers
                            .entry(broker.alias.as_str())
                            .or_insert_with(|| Value::Object(SessionData::new())),
                    )
                });
                if let Some(container) = container {
                    container.insert(name.to_string(), value);
                }
            }
            None => {
                let container = data
                    .get_mut(ISOLATED_DATA_KEY)
                    .and_then(Value::as_object_mut)
                    .and_then(|containers| containers.get_mut(&broker.alias))
                    .and_then(Value::as_object_mut);
                if let Some(container) = container {
                    container.remove(name);
                }
            }
        }
    }

    /// Serialize and write a variable
    pub fn insert<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(name, Some(value));
        Ok(())
    }

    /// Remove a variable
    pub fn remove(&mut self, name: &str) {
        self.set(name, None);
    }

    /// Every variable visible in this scope
    ///
    /// Flat mode borrows the whole session data. Isolated mode returns the
    /// broker's container, or `None` if there is no broker or nothing has
    /// been written for it yet.
    pub fn all(&self) -> Option<&SessionData> {
        if !self.isolated {
            return Some(self.session.data());
        }
        self.broker_container()
    }

    fn broker_container(&self) -> Option<&SessionData> {
        let broker = self.broker?;
        self.session
            .data()
            .get(ISOLATED_DATA_KEY)?
            .as_object()?
            .get(&broker.alias)?
            .as_object()
    }

    pub fn id(&self) -> &str {
        self.session.id()
    }

    /// Refresh the cookie expiry
    pub fn touch(&mut self) {
        self.session.touch();
    }

    /// Force a save on commit
    pub fn save(&mut self) {
        self.session.save();
    }

    /// Destroy the stored session on commit
    pub fn destroy(&mut self) {
        self.session.destroy();
    }

    /// Move the session to a new id on commit
    pub fn regenerate(&mut self) {
        self.session.regenerate();
    }
}

/// Make `slot` an object (replacing any scalar) and borrow it as a map
fn object_slot(slot: &mut Value) -> Option<&mut SessionData> {
    if !slot.is_object() {
        *slot = Value::Object(SessionData::new());
    }
    slot.as_object_mut()
}

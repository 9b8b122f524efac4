pub mod attack;
pub mod capture;
pub mod classify;
pub mod clients;
pub mod config;
pub mod ieee80211;
pub mod power;
pub mod radio;

pub use attack::portal::{CaptivePortal, NullPortal, PortalVariant};
pub use attack::session::{AttackKind, AttackStats, DeauthMode, FloodMode};
pub use attack::{AttackEngine, TargetDescriptor, TargetError};
pub use capture::CaptureBuffer;
pub use classify::{ClassifyPolicy, PacketClassifier};
pub use clients::{ClientRecord, ClientRegistry};
pub use config::Config;
pub use ieee80211::MacAddr;
pub use power::{PerfLevel, PowerMode, PowerThrottler};
pub use radio::{DummyRadio, RadioDriver, RxFrame};

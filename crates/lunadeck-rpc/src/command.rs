//! Outbound command envelope and the transport seam.

use std::str::FromStr;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

/// Where the reply to a command is routed.
///
/// Every target is a known handler, so a command can never name one that
/// does not exist. [`DispatchTarget::Void`] means no handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchTarget {
    Void,
    VersionOnUpdateStatus,
    VersionOnUpdatedMoonraker,
    VersionOnUpdatedKlipper,
    VersionOnUpdatedClient,
    VersionOnUpdatedSystem,
    DevicePowerInit,
    DevicePowerOnStatus,
    DevicePowerOnToggle,
    SocketOnPrinterInfo,
    SocketOnQueryEndstops,
    SocketOnPrinterObjectsList,
    SocketOnPrinterObjectsSubscribe,
    SocketOnPrintCancel,
    SocketOnPrintPause,
    SocketOnPrintResume,
    SocketOnGcodeScript,
    SocketNotifyKlippyDisconnected,
    SocketOnServerInfo,
    SocketOnTemperatureStore,
    SocketOnGcodeStore,
    FilesOnFileUpdate,
    FilesOnServerFilesGetDirectory,
}

impl DispatchTarget {
    pub const ALL: [DispatchTarget; 23] = [
        Self::Void,
        Self::VersionOnUpdateStatus,
        Self::VersionOnUpdatedMoonraker,
        Self::VersionOnUpdatedKlipper,
        Self::VersionOnUpdatedClient,
        Self::VersionOnUpdatedSystem,
        Self::DevicePowerInit,
        Self::DevicePowerOnStatus,
        Self::DevicePowerOnToggle,
        Self::SocketOnPrinterInfo,
        Self::SocketOnQueryEndstops,
        Self::SocketOnPrinterObjectsList,
        Self::SocketOnPrinterObjectsSubscribe,
        Self::SocketOnPrintCancel,
        Self::SocketOnPrintPause,
        Self::SocketOnPrintResume,
        Self::SocketOnGcodeScript,
        Self::SocketNotifyKlippyDisconnected,
        Self::SocketOnServerInfo,
        Self::SocketOnTemperatureStore,
        Self::SocketOnGcodeStore,
        Self::FilesOnFileUpdate,
        Self::FilesOnServerFilesGetDirectory,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::VersionOnUpdateStatus => "version/onUpdateStatus",
            Self::VersionOnUpdatedMoonraker => "version/onUpdatedMoonraker",
            Self::VersionOnUpdatedKlipper => "version/onUpdatedKlipper",
            Self::VersionOnUpdatedClient => "version/onUpdatedClient",
            Self::VersionOnUpdatedSystem => "version/onUpdatedSystem",
            Self::DevicePowerInit => "devicePower/init",
            Self::DevicePowerOnStatus => "devicePower/onStatus",
            Self::DevicePowerOnToggle => "devicePower/onToggle",
            Self::SocketOnPrinterInfo => "socket/onPrinterInfo",
            Self::SocketOnQueryEndstops => "socket/onQueryEndstops",
            Self::SocketOnPrinterObjectsList => "socket/onPrinterObjectsList",
            Self::SocketOnPrinterObjectsSubscribe => "socket/onPrinterObjectsSubscribe",
            Self::SocketOnPrintCancel => "socket/onPrintCancel",
            Self::SocketOnPrintPause => "socket/onPrintPause",
            Self::SocketOnPrintResume => "socket/onPrintResume",
            Self::SocketOnGcodeScript => "socket/onGcodeScript",
            Self::SocketNotifyKlippyDisconnected => "socket/notifyKlippyDisconnected",
            Self::SocketOnServerInfo => "socket/onServerInfo",
            Self::SocketOnTemperatureStore => "socket/onTemperatureStore",
            Self::SocketOnGcodeStore => "socket/onGcodeStore",
            Self::FilesOnFileUpdate => "files/onFileUpdate",
            Self::FilesOnServerFilesGetDirectory => "files/onServerFilesGetDirectory",
        }
    }

    #[must_use]
    pub fn is_void(self) -> bool {
        matches!(self, Self::Void)
    }
}

impl std::fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|target| target.as_str() == s)
            .ok_or_else(|| format!("unknown dispatch target: {s}"))
    }
}

/// One outbound request: method, routing target, params and wait token.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub method: String,
    pub dispatch: DispatchTarget,
    pub params: Option<Value>,
    pub wait: Option<String>,
}

impl Command {
    #[must_use]
    pub fn new(method: impl Into<String>, dispatch: DispatchTarget) -> Self {
        Self {
            method: method.into(),
            dispatch,
            params: None,
            wait: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    #[must_use]
    pub fn with_wait(mut self, wait: Option<impl Into<String>>) -> Self {
        self.wait = wait.map(Into::into);
        self
    }
}

/// Where commands go once built. Implementations own error handling;
/// submitting never fails from the caller's point of view.
pub trait Transport {
    fn emit(&self, command: Command);
}

impl<T: Transport + ?Sized> Transport for &T {
    fn emit(&self, command: Command) {
        (**self).emit(command);
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn emit(&self, command: Command) {
        (**self).emit(command);
    }
}

/// Queues commands for a socket writer task.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Command>,
}

impl ChannelTransport {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    /// A transport plus the receiving end of its queue.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Transport for ChannelTransport {
    fn emit(&self, command: Command) {
        if let Err(err) = self.tx.send(command) {
            warn!("Dropping '{}': socket writer has shut down", err.0.method);
        }
    }
}

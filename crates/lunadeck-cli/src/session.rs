//! A connected session: socket client, dispatcher and store wired together.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use lunadeck_core::{
    ApiConfig, FileConfigLoad, FileStorage, InstancesInit, Paths, State, Store,
};
use lunadeck_rpc::{
    ChannelTransport, ClientError, InboundEvent, SocketActions, SocketClient, WaitRegistry,
};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

/// Open the store over the on-disk storage, without connecting anywhere.
pub fn open_store(paths: &Paths, waits: WaitRegistry) -> Result<Store> {
    paths
        .ensure_exists()
        .with_context(|| format!("Failed to create {}", paths.data.display()))?;
    let store = Store::new(Arc::new(FileStorage::new(&paths.storage)), waits);
    store.init_local().context("Failed to load local config")?;
    Ok(store)
}

pub struct Session {
    client: SocketClient,
    actions: SocketActions<ChannelTransport>,
    store: Store,
    timeout: Duration,
}

impl Session {
    /// Connect to Moonraker and remember the endpoint as the active instance.
    pub async fn connect(
        socket: &Path,
        api_url: &str,
        paths: &Paths,
        timeout: Duration,
    ) -> Result<Self> {
        if !socket.exists() {
            bail!(
                "Moonraker socket not found at {}.\nPass --socket or check that Moonraker is running.",
                socket.display()
            );
        }

        let waits = WaitRegistry::new();
        let store = open_store(paths, waits.clone())?;
        store.set_connection(false, true);

        let client = SocketClient::connect_to(socket, waits)
            .await
            .with_context(|| format!("Failed to connect to {}", socket.display()))?;
        store.set_connection(true, false);
        info!("Connected to {}", socket.display());

        let api = ApiConfig::new(api_url, format!("unix://{}", socket.display()));
        store.init_api_config(&api);
        store.init_file(None)?;
        store
            .init_instances(&InstancesInit {
                api_config: Some(api),
                file_config: FileConfigLoad::Missing,
            })
            .context("Failed to save instance list")?;

        let actions = client.actions();
        Ok(Self {
            client,
            actions,
            store,
            timeout,
        })
    }

    pub fn state(&self) -> Arc<State> {
        self.store.snapshot()
    }

    /// Issue one command and feed everything that arrives into the store
    /// until its reply does.
    pub async fn request(
        &mut self,
        send: impl FnOnce(&SocketActions<ChannelTransport>),
    ) -> Result<Value> {
        send(&self.actions);

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = self.client.next_event(remaining).await?;
            let reply = match &event {
                InboundEvent::Response { method, result, .. } => {
                    debug!("Reply to {method}");
                    Some(result.clone())
                }
                InboundEvent::Notification(_) => None,
                InboundEvent::Disconnected => {
                    self.store.apply(InboundEvent::Disconnected);
                    return Err(ClientError::ConnectionClosed.into());
                }
            };
            self.store.apply(event);
            if let Some(result) = reply {
                return Ok(result.map_err(ClientError::from)?);
            }
        }
    }

    /// Keep applying notifications for `duration`, e.g. to catch console
    /// output that trails a reply.
    pub async fn drain(&mut self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            match self.client.next_event(remaining).await {
                Ok(InboundEvent::Disconnected) => {
                    self.store.apply(InboundEvent::Disconnected);
                    return Err(ClientError::ConnectionClosed.into());
                }
                Ok(event) => self.store.apply(event),
                Err(ClientError::Timeout) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Load `printer.info`, the object list and a subscription to every
    /// object, so the projections have a complete graph to work on.
    pub async fn load_printer(&mut self) -> Result<()> {
        self.request(|actions| actions.printer_info())
            .await
            .context("printer.info failed")?;
        self.request(|actions| actions.printer_objects_list())
            .await
            .context("printer.objects.list failed")?;

        let objects = self.state().socket.objects.clone();
        self.request(|actions| actions.printer_objects_subscribe(objects))
            .await
            .context("printer.objects.subscribe failed")?;
        Ok(())
    }
}

//! FormRunner – wires a [`HostShell`] and a [`FormInstance`] to the two ends
//! of a channel and drives both as tokio tasks.
//!
//! The form side is driven by a small loop that feeds host messages and user
//! actions into the instance one at a time, forwards whatever the instance
//! emits, and publishes a fresh [`FormSnapshot`] after every step. Callers
//! interact with the form only through the returned [`FormHandle`].
//!
//! Dropping every clone of a [`FormHandle`] unmounts the form: the driver
//! stops, its port closes, and the host loop ends after any in-flight
//! submission settles.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{Instrument, debug, info_span, warn};

use crate::brand::BrandCatalog;
use crate::bus::{Port, channel};
use crate::error::{FormError, Result};
use crate::form::{Clock, FormInstance, FormSnapshot, FormState, Step, UserAction};
use crate::host::HostShell;

type ActionRequest = (UserAction, oneshot::Sender<Result<FormSnapshot>>);

/// Handle on a running form. Fields change only through [`dispatch`];
/// reads go through snapshots.
///
/// [`dispatch`]: FormHandle::dispatch
#[derive(Clone)]
pub struct FormHandle {
    actions: mpsc::Sender<ActionRequest>,
    snapshots: watch::Receiver<FormSnapshot>,
}

impl FormHandle {
    /// Apply a user action and return the snapshot right after it.
    pub async fn dispatch(&self, action: UserAction) -> Result<FormSnapshot> {
        let (reply, response) = oneshot::channel();
        self.actions
            .send((action, reply))
            .await
            .map_err(|_| FormError::ChannelClosed)?;
        response.await.map_err(|_| FormError::ChannelClosed)?
    }

    pub fn snapshot(&self) -> FormSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<FormSnapshot>
    where
        F: Fn(&FormSnapshot) -> bool,
    {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| FormError::ChannelClosed)?;
        Ok(snapshot.clone())
    }

    /// Resolves once the form's driver has stopped. The future holds no
    /// handle, so awaiting it does not keep the form mounted.
    pub fn finished(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut snapshots = self.snapshots.clone();
        async move { while snapshots.changed().await.is_ok() {} }
    }
}

/// Builds form instances with shared brand copy and clock.
#[derive(Clone)]
pub struct FormRunner {
    brands: Arc<BrandCatalog>,
    clock: Option<Clock>,
}

impl FormRunner {
    pub fn new(brands: Arc<BrandCatalog>) -> Self {
        Self { brands, clock: None }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn brands(&self) -> &Arc<BrandCatalog> {
        &self.brands
    }

    fn instance(&self) -> FormInstance {
        let instance = FormInstance::new(self.brands.clone());
        match &self.clock {
            Some(clock) => {
                let clock = clock.clone();
                instance.with_clock(move || clock())
            }
            None => instance,
        }
    }

    /// Mount a form under `host`. Both halves run until the returned handle
    /// is dropped.
    pub fn open(&self, session_id: &str, host: HostShell) -> FormHandle {
        let (host_port, form_port) = channel();
        let handle = spawn_form(self.instance(), form_port, session_id);

        let span = info_span!("host", session_id = %session_id);
        tokio::spawn(
            async move {
                if let Err(e) = host.run(host_port).await {
                    warn!(error = %e, "host stopped");
                }
            }
            .instrument(span),
        );
        handle
    }
}

/// Drive `instance` on `port` in a background task.
pub fn spawn_form(instance: FormInstance, port: Port, session_id: &str) -> FormHandle {
    let (actions, action_rx) = mpsc::channel(16);
    let (snapshot_tx, snapshots) = watch::channel(instance.snapshot());

    let span = info_span!("form", session_id = %session_id);
    tokio::spawn(drive(instance, port, action_rx, snapshot_tx).instrument(span));

    FormHandle { actions, snapshots }
}

async fn drive(
    mut instance: FormInstance,
    mut port: Port,
    mut actions: mpsc::Receiver<ActionRequest>,
    snapshots: watch::Sender<FormSnapshot>,
) {
    loop {
        tokio::select! {
            message = port.recv() => {
                let Some(message) = message else {
                    debug!("host went away");
                    break;
                };
                let step = instance.handle_message(message);
                publish(&instance, &port, step, &snapshots);
            }
            request = actions.recv() => {
                let Some((action, reply)) = request else {
                    debug!("form unmounted");
                    break;
                };
                let answer = instance
                    .handle_action(action)
                    .map(|step| publish(&instance, &port, step, &snapshots));
                let _ = reply.send(answer);
            }
        }
    }

    if instance.state() == FormState::Submitting {
        warn!("form stopped while a submission was in flight");
    }
}

fn publish(
    instance: &FormInstance,
    port: &Port,
    step: Step,
    snapshots: &watch::Sender<FormSnapshot>,
) -> FormSnapshot {
    if let Some(message) = step.outgoing {
        if let Err(e) = port.send(&message) {
            warn!(event = message.name(), error = %e, "could not reach host");
        }
    }
    let snapshot = instance.snapshot();
    snapshots.send_replace(snapshot.clone());
    snapshot
}

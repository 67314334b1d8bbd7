use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

use crate::host::{RenderSurface, SurfaceError};

use super::MapBridge;
use super::events::{BridgeCommand, BridgeEvent, EmbeddedMessage};

/// Cloneable command side of a running bridge worker.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    command_tx: UnboundedSender<BridgeCommand>,
}

impl BridgeHandle {
    pub fn toggle_heatmap(&self) -> bool {
        self.send(BridgeCommand::ToggleHeatmap)
    }

    pub fn toggle_live_conditions(&self) -> bool {
        self.send(BridgeCommand::ToggleLiveConditions)
    }

    pub fn embedded(&self, message: EmbeddedMessage) -> bool {
        self.send(BridgeCommand::Embedded { message })
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(BridgeCommand::Shutdown);
    }

    fn send(&self, command: BridgeCommand) -> bool {
        self.command_tx.send(command).is_ok()
    }
}

/// Moves a mounted bridge onto the runtime. The bridge is unmounted when the
/// handle shuts it down or every handle is dropped.
pub fn spawn_bridge_worker<S>(
    handle: &Handle,
    bridge: MapBridge<S>,
) -> (BridgeHandle, UnboundedReceiver<BridgeEvent>)
where
    S: RenderSurface + Send + 'static,
{
    let (command_tx, command_rx) = unbounded_channel();
    let (event_tx, event_rx) = unbounded_channel();

    let _task = handle.spawn(run_bridge_loop(bridge, command_rx, event_tx));

    (BridgeHandle { command_tx }, event_rx)
}

async fn run_bridge_loop<S: RenderSurface>(
    mut bridge: MapBridge<S>,
    mut command_rx: UnboundedReceiver<BridgeCommand>,
    event_tx: UnboundedSender<BridgeEvent>,
) {
    loop {
        let outcome = tokio::select! {
            maybe_command = command_rx.recv() => match maybe_command {
                Some(BridgeCommand::ToggleHeatmap) => bridge.toggle_heatmap().map(Some),
                Some(BridgeCommand::ToggleLiveConditions) => {
                    bridge.toggle_live_conditions().map(Some)
                }
                Some(BridgeCommand::Embedded { message }) => Ok(bridge.handle_embedded(message)),
                Some(BridgeCommand::Shutdown) | None => break,
            },
            signal = bridge.next_signal() => bridge.handle_signal(signal),
        };

        if !forward(&event_tx, outcome) {
            break;
        }
    }

    debug!("bridge worker stopping");
    let _surface = bridge.unmount();
}

fn forward(
    event_tx: &UnboundedSender<BridgeEvent>,
    outcome: Result<Option<BridgeEvent>, SurfaceError>,
) -> bool {
    let event = match outcome {
        Ok(Some(event)) => event,
        Ok(None) => return true,
        Err(error) => {
            warn!(error = %error, "bridge surface operation failed");
            BridgeEvent::SurfaceFailed {
                error: error.to_string(),
            }
        }
    };
    event_tx.send(event).is_ok()
}

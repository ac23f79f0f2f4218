//! UI boundary for interactive stages
//!
//! A surface is whatever shows the selection overlay and the countdown: a
//! desktop shell, a terminal, or a test script. Channels are the windows:
//! dropping the sending half means the window closed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::countdown::CountdownEvent;
use crate::error::Result;
use crate::selection::{SelectionEvent, SelectionInit};
use crate::types::{Display, Region};

/// Payload sent to the surface when a countdown starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountdownInit {
    pub duration_secs: u32,
    /// Region being recorded, for positioning the countdown
    pub region: Region,
}

/// Open countdown window
pub struct CountdownSurface {
    /// Fires when the user cancels; closing it also cancels
    pub cancel: mpsc::Receiver<()>,
    /// Tick notifications for display; `None` if the surface shows nothing
    pub events: Option<mpsc::UnboundedSender<CountdownEvent>>,
}

/// Host surface for the selection and countdown stages
#[async_trait]
pub trait CaptureSurface: Send + Sync {
    /// Snapshot of the current display layout
    async fn displays(&self) -> Result<Vec<Display>>;

    /// Show the selection overlay; events arrive in canvas-local coordinates
    async fn open_selection(&self, init: SelectionInit) -> Result<mpsc::Receiver<SelectionEvent>>;

    /// Show the countdown
    async fn open_countdown(&self, init: CountdownInit) -> Result<CountdownSurface>;
}

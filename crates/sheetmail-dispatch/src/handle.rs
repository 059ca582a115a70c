//! Background dispatch runs.

use std::sync::Arc;

use sheetmail_core::{DataSet, Template};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::{DispatchEngine, SendOptions};
use crate::error::DispatchError;
use crate::report::DispatchReport;

/// A bulk send running on its own task. The caller keeps control: it can
/// cancel between rows or await the final report.
pub struct DispatchHandle {
    cancel: CancellationToken,
    join: JoinHandle<Result<DispatchReport, DispatchError>>,
}

impl DispatchHandle {
    /// Ask the run to stop. The row in flight completes first.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn wait(self) -> Result<DispatchReport, DispatchError> {
        self.join
            .await
            .map_err(|e| DispatchError::Aborted(e.to_string()))?
    }
}

impl DispatchEngine {
    /// Start `send_bulk` on a separate task and return immediately.
    pub fn spawn_bulk(self: &Arc<Self>, dataset: DataSet, template: Template, options: SendOptions) -> DispatchHandle {
        let cancel = CancellationToken::new();
        let engine = Arc::clone(self);
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            engine
                .send_bulk(&dataset, &template, &options, &token)
                .await
        });
        DispatchHandle { cancel, join }
    }
}

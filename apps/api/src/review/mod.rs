// Review: the polling reconciler, manual refresh, and the surfaces that render a record.
// Reads only. Records are written by the upload pipeline and the analysis worker.

pub mod console;
pub mod handlers;
pub mod previews;
pub mod reconciler;
pub mod session;

pub use self::reconciler::PollPolicy;
pub use self::session::ReviewSession;

use crate::store::ResumeStore;
use self::reconciler::{decode, Fetch};

/// A single read-and-decode of `resume:<id>`, as one polling cycle would see it.
pub async fn inspect(store: &ResumeStore, id: &str) -> Fetch {
    match store.fetch_raw(id).await {
        Ok(raw) => decode(raw),
        Err(e) => Fetch::Unavailable(e.to_string()),
    }
}
